//! Init commands: configuration file and database schema

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::Store;
use std::path::PathBuf;
use tracing::info;

/// Write a default configuration file at `config_path`
pub fn cmd_init(base_dir: PathBuf, config_path: PathBuf, force: bool) -> Result<Config> {
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.paths.base_dir = base_dir;
    config.paths.config_file = config_path;
    config.validate()?;
    config.save()?;

    Ok(config)
}

/// Create the tables, indexes and vector extension
pub async fn cmd_db_init(store: &dyn Store) -> Result<()> {
    store.init_schema().await?;
    info!("Database schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        cmd_init(dir.path().to_path_buf(), path.clone(), false).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.database_url, Config::default().database_url);
        assert_eq!(loaded.paths.config_file, path);
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "database_url = \"memory://\"\n").unwrap();

        let err = cmd_init(dir.path().to_path_buf(), path.clone(), false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        cmd_init(dir.path().to_path_buf(), path, true).unwrap();
    }

    #[tokio::test]
    async fn test_db_init_on_memory_store() {
        let store = MemoryStore::new();
        cmd_db_init(&store).await.unwrap();
    }
}
