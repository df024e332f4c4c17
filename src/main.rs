//! awesome-index CLI entry point

use awesome_index::{
    commands::{
        cmd_categories, cmd_collection, cmd_collections, cmd_db_init, cmd_init, cmd_projects,
        cmd_search, cmd_stats, cmd_sweep, print_categories, print_collection, print_collections,
        print_projects, print_search_results, print_stats, print_sweep_stats,
    },
    config::Config,
    error::Result,
    models::RepoIdentity,
    progress::init_logging,
    service::AppContext,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "awesome-index")]
#[command(version, about = "Searchable index of curated awesome lists", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "AWESOME_INDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Manage the database
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Start the JSON-RPC server on stdio
    Serve,

    /// Fetch several awesome lists
    Collections {
        /// Repositories as owner/repo, host/owner/repo or URL
        #[arg(required = true)]
        repos: Vec<RepoIdentity>,
    },

    /// Show one awesome list
    Collection { repo: RepoIdentity },

    /// List the categories of an awesome list
    Categories { repo: RepoIdentity },

    /// List the projects of one category
    Projects {
        repo: RepoIdentity,

        /// Category name (case-insensitive)
        category: String,
    },

    /// Search indexed projects
    Search {
        /// Free-text query; leave empty for recently updated projects
        #[arg(default_value = "")]
        query: String,

        /// Restrict to projects listed by these awesome lists
        #[arg(short, long = "repo")]
        repos: Vec<RepoIdentity>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<i64>,
    },

    /// Show star and open issue counts of a repository
    Stats { repo: RepoIdentity },

    /// Refresh missing and outdated embeddings
    Sweep {
        /// Re-embed anything older than this; negative disables the age check
        #[arg(long, allow_hyphen_values = true)]
        ttl_secs: Option<i64>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Database management actions
#[derive(Subcommand)]
enum DbAction {
    /// Create the vector extension, tables and indexes
    Init,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json);

    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force);
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "awesome-index", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config)?;
    let ctx = AppContext::connect(config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => {}

        Commands::Db { action } => match action {
            DbAction::Init => {
                cmd_db_init(ctx.store.as_ref()).await?;
                if cli.json {
                    println!(r#"{{"status": "ok", "message": "Schema initialized"}}"#);
                } else {
                    println!("✓ Database schema initialized");
                }
            }
        },

        Commands::Serve => {
            ctx.rpc_server().run_stdio().await?;
        }

        Commands::Collections { repos } => {
            let collections = cmd_collections(&ctx, &repos).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&collections)?);
            } else {
                print_collections(&collections);
            }
        }

        Commands::Collection { repo } => {
            let collection = cmd_collection(&ctx, &repo).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&collection)?);
            } else {
                print_collection(&collection);
            }
        }

        Commands::Categories { repo } => {
            let categories = cmd_categories(&ctx, &repo).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&categories)?);
            } else {
                print_categories(&categories);
            }
        }

        Commands::Projects { repo, category } => {
            let projects = cmd_projects(&ctx, &repo, &category).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else {
                print_projects(&projects);
            }
        }

        Commands::Search {
            query,
            repos,
            limit,
        } => {
            let results = cmd_search(&ctx, &query, &repos, limit).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_search_results(&results);
            }
        }

        Commands::Stats { repo } => {
            let stats = cmd_stats(&ctx, &repo).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }

        Commands::Sweep { ttl_secs } => {
            let stats = cmd_sweep(&ctx, ttl_secs, !cli.json).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_sweep_stats(&stats);
            }
        }
    }

    Ok(())
}

/// Split `--config` into a base directory and config file path
fn resolve_paths(config: Option<PathBuf>) -> (PathBuf, PathBuf) {
    match config {
        Some(path) => {
            let is_file = path.extension().is_some_and(|e| e == "toml");
            if is_file {
                let base = path
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(Config::default_base_dir);
                (base, path)
            } else {
                (path.clone(), path.join("config.toml"))
            }
        }
        None => {
            let base = Config::default_base_dir();
            (base.clone(), base.join("config.toml"))
        }
    }
}

fn handle_init(config: Option<PathBuf>, force: bool) -> Result<()> {
    let (base_dir, config_path) = resolve_paths(config);
    let config = cmd_init(base_dir, config_path, force)?;

    println!("✓ awesome-index initialized");
    println!("  Config: {}", config.paths.config_file.display());
    println!("\nNext steps:");
    println!("  1. Set database_url to a Postgres instance with pgvector");
    println!("  2. Create the schema: awesome-index db init");
    println!("  3. Fetch a list: awesome-index collection avelino/awesome-go");

    Ok(())
}

/// Load the config file, falling back to defaults when none exists
fn load_config(config: Option<PathBuf>) -> Result<Config> {
    let (base_dir, config_path) = resolve_paths(config);
    if config_path.exists() {
        Config::load(&config_path)
    } else {
        Config::load_from(Some(base_dir))
    }
}
