//! Repository stats command

use crate::error::{Error, Result};
use crate::models::{ProjectStats, RepoIdentity};
use crate::service::AppContext;

pub async fn cmd_stats(ctx: &AppContext, repo: &RepoIdentity) -> Result<ProjectStats> {
    ctx.coordinator
        .get_project_stats(repo)
        .await?
        .ok_or_else(|| Error::NotFound(format!("repository {} not found", repo.url())))
}

pub fn print_stats(stats: &ProjectStats) {
    println!("\n📊 {}\n", stats.repository);
    println!("  Stars: {}", stats.stargazers_count);
    println!("  Open issues: {}", stats.open_issue_count);
    println!("  Updated: {}", stats.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
}
