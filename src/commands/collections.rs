//! Collection browsing commands

use crate::error::{Error, Result};
use crate::models::{CategorySummary, Project, RepoIdentity, RepositoryCollection};
use crate::service::AppContext;

/// Fetch several collections; repositories that fail are skipped
pub async fn cmd_collections(
    ctx: &AppContext,
    repos: &[RepoIdentity],
) -> Result<Vec<RepositoryCollection>> {
    Ok(ctx.coordinator.list_collections(repos).await)
}

pub async fn cmd_collection(ctx: &AppContext, repo: &RepoIdentity) -> Result<RepositoryCollection> {
    ctx.coordinator
        .get_collection(repo)
        .await?
        .ok_or_else(|| not_found(repo))
}

pub async fn cmd_categories(ctx: &AppContext, repo: &RepoIdentity) -> Result<Vec<CategorySummary>> {
    ctx.coordinator
        .list_categories(repo)
        .await?
        .ok_or_else(|| not_found(repo))
}

pub async fn cmd_projects(
    ctx: &AppContext,
    repo: &RepoIdentity,
    category: &str,
) -> Result<Vec<Project>> {
    ctx.coordinator
        .list_projects(repo, category)
        .await?
        .ok_or_else(|| not_found(repo))
}

fn not_found(repo: &RepoIdentity) -> Error {
    Error::NotFound(format!("no awesome list at {}", repo.url()))
}

/// Print a collection summary table
pub fn print_collections(collections: &[RepositoryCollection]) {
    println!("\n📚 Collections\n");

    if collections.is_empty() {
        println!("No collections found.");
        return;
    }

    println!(
        "{:<45} {:<15} {:>10} {:>9}  Updated",
        "Repository", "Language", "Categories", "Projects"
    );
    println!("{}", "-".repeat(100));
    for c in collections {
        println!(
            "{:<45} {:<15} {:>10} {:>9}  {}",
            truncate(&c.repository.to_string(), 45),
            truncate(&c.collection.language, 15),
            c.collection.categories.len(),
            c.collection.project_count(),
            c.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
}

pub fn print_collection(collection: &RepositoryCollection) {
    println!(
        "\n📚 {} ({})\n",
        collection.collection.language, collection.repository
    );

    for category in &collection.collection.categories {
        println!("{} ({})", category.name, category.projects.len());
        for project in &category.projects {
            print_project_line(project);
        }
        println!();
    }
}

pub fn print_categories(categories: &[CategorySummary]) {
    if categories.is_empty() {
        println!("No categories found.");
        return;
    }

    for category in categories {
        println!("{:>5}  {}", category.project_count, category.name);
    }
}

pub fn print_projects(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects found.");
        return;
    }

    for project in projects {
        print_project_line(project);
    }
}

fn print_project_line(project: &Project) {
    if project.description.is_empty() {
        println!("  • {} <{}>", project.name, project.repo.url());
    } else {
        println!(
            "  • {} <{}>: {}",
            project.name,
            project.repo.url(),
            project.description
        );
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
