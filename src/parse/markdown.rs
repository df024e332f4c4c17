//! Markdown awesome-list parsing

use super::ParseOptions;
use crate::error::{Error, Result};
use crate::models::{Category, Collection, Project, RepoIdentity};
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use std::collections::{HashMap, HashSet};

/// Decode raw README bytes into a collection
pub fn parse_collection(bytes: &[u8], options: &ParseOptions) -> Result<Collection> {
    let content = std::str::from_utf8(bytes)
        .map_err(|e| Error::Decode(format!("document is not valid UTF-8: {}", e)))?;
    parse_markdown_collection(content, options)
}

/// Per list-item state while walking the event stream
#[derive(Default)]
struct ItemState {
    link_url: Option<String>,
    link_text: String,
    in_first_link: bool,
    first_link_done: bool,
    description: String,
    /// A nested list started; later text belongs to child items
    closed: bool,
}

#[derive(Default)]
struct CollectionBuilder {
    categories: Vec<Category>,
    index_by_name: HashMap<String, usize>,
    seen_repos: Vec<HashSet<RepoIdentity>>,
    current: Option<usize>,
}

impl CollectionBuilder {
    fn open_category(&mut self, name: &str) {
        let key = name.to_lowercase();
        let idx = match self.index_by_name.get(&key) {
            Some(idx) => *idx,
            None => {
                self.categories.push(Category {
                    name: name.to_string(),
                    projects: Vec::new(),
                });
                self.seen_repos.push(HashSet::new());
                let idx = self.categories.len() - 1;
                self.index_by_name.insert(key, idx);
                idx
            }
        };
        self.current = Some(idx);
    }

    fn close_category(&mut self) {
        self.current = None;
    }

    fn add_project(&mut self, project: Project) {
        let Some(idx) = self.current else {
            return;
        };
        if self.seen_repos[idx].insert(project.repo.clone()) {
            self.categories[idx].projects.push(project);
        }
    }

    fn finish(self, language: String) -> Collection {
        Collection {
            language,
            categories: self
                .categories
                .into_iter()
                .filter(|c| !c.projects.is_empty())
                .collect(),
        }
    }
}

/// Parse a markdown awesome-list into categories and projects
pub fn parse_markdown_collection(content: &str, options: &ParseOptions) -> Result<Collection> {
    let parser = Parser::new(content);

    let mut language: Option<String> = None;
    let mut builder = CollectionBuilder::default();
    let mut started = options.start_section.is_none();
    let mut current_heading: Option<(u8, String)> = None;
    let mut items: Vec<ItemState> = Vec::new();
    let mut image_depth = 0usize;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current_heading = Some((heading_level_to_u8(level), String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                let Some((level, text)) = current_heading.take() else {
                    continue;
                };
                let heading = collapse_whitespace(&text);
                if heading.is_empty() {
                    continue;
                }

                if level == 1 && language.is_none() {
                    language = Some(language_from_heading(&heading));
                }

                if !started {
                    if matches_section(&heading, options.start_section.as_deref()) {
                        started = true;
                    } else {
                        continue;
                    }
                } else if matches_section(&heading, options.end_section.as_deref()) {
                    break;
                }

                match level {
                    1 => builder.close_category(),
                    2 => builder.open_category(&heading),
                    _ if options.sub_headings_as_categories => builder.open_category(&heading),
                    _ => {}
                }
            }
            Event::Start(Tag::Image { .. }) => image_depth += 1,
            Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
            Event::Start(Tag::Item) => items.push(ItemState::default()),
            Event::End(TagEnd::Item) => {
                if let Some(item) = items.pop() {
                    if started {
                        if let Some(project) = item_to_project(item) {
                            builder.add_project(project);
                        }
                    }
                }
            }
            Event::Start(Tag::List(_)) => {
                if let Some(parent) = items.last_mut() {
                    parent.closed = true;
                }
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                if let Some(item) = items.last_mut() {
                    if !item.closed && item.link_url.is_none() {
                        item.link_url = Some(dest_url.to_string());
                        item.in_first_link = true;
                    }
                }
            }
            Event::End(TagEnd::Link) => {
                if let Some(item) = items.last_mut() {
                    if item.in_first_link {
                        item.in_first_link = false;
                        item.first_link_done = true;
                    }
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if image_depth > 0 {
                    continue;
                }
                if let Some((_, ref mut heading)) = current_heading {
                    heading.push_str(&text);
                } else if let Some(item) = items.last_mut() {
                    push_item_text(item, &text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some((_, ref mut heading)) = current_heading {
                    heading.push(' ');
                } else if let Some(item) = items.last_mut() {
                    push_item_text(item, " ");
                }
            }
            _ => {}
        }
    }

    if !started {
        return Err(Error::SectionNotFound(
            options.start_section.clone().unwrap_or_default(),
        ));
    }

    Ok(builder.finish(language.unwrap_or_default()))
}

fn push_item_text(item: &mut ItemState, text: &str) {
    if item.closed {
        return;
    }
    if item.in_first_link {
        item.link_text.push_str(text);
    } else if item.first_link_done {
        item.description.push_str(text);
    }
}

fn item_to_project(item: ItemState) -> Option<Project> {
    let url = item.link_url?;
    let repo = RepoIdentity::from_url(&url)?;
    let name = collapse_whitespace(&item.link_text);
    let name = if name.is_empty() { repo.repo.clone() } else { name };
    Some(Project {
        name,
        description: clean_description(&item.description),
        repo,
    })
}

fn matches_section(heading: &str, section: Option<&str>) -> bool {
    section.is_some_and(|s| heading.eq_ignore_ascii_case(s.trim()))
}

/// "Awesome Go" → "Go"; headings without the prefix are kept whole
fn language_from_heading(heading: &str) -> String {
    let lower = heading.to_lowercase();
    for prefix in ["awesome-", "awesome "] {
        if !lower.starts_with(prefix) {
            continue;
        }
        if let Some(rest) = heading.get(prefix.len()..).map(str::trim) {
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    heading.to_string()
}

fn clean_description(raw: &str) -> String {
    let text = collapse_whitespace(raw);
    let trimmed = text.trim_start_matches(|c: char| matches!(c, '-' | '–' | '—' | ':') || c.is_whitespace());
    trimmed.trim().to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(owner: &str, name: &str) -> RepoIdentity {
        RepoIdentity::new("github.com", owner, name).unwrap()
    }

    #[test]
    fn test_single_category_single_project() {
        let markdown = "## Actor Model\n\n- [foo](https://github.com/x/foo) - does things\n";
        let collection = parse_markdown_collection(markdown, &ParseOptions::default()).unwrap();

        assert_eq!(collection.categories.len(), 1);
        let category = &collection.categories[0];
        assert_eq!(category.name, "Actor Model");
        assert_eq!(
            category.projects,
            vec![Project {
                name: "foo".to_string(),
                description: "does things".to_string(),
                repo: repo("x", "foo"),
            }]
        );
    }

    #[test]
    fn test_language_from_top_heading() {
        let markdown = r#"
# Awesome Go [![Build](https://example.com/badge.svg)](https://example.com)

## Audio

- [beep](https://github.com/faiface/beep) - Sound library.
"#;
        let collection = parse_markdown_collection(markdown, &ParseOptions::default()).unwrap();
        assert_eq!(collection.language, "Go");
        assert_eq!(collection.categories[0].projects[0].description, "Sound library.");
    }

    #[test]
    fn test_start_and_end_sections() {
        let markdown = r#"
# Awesome Rust

## Contents

- [Applications](#applications)

## Applications

- [alacritty](https://github.com/alacritty/alacritty) — A GPU terminal

## Libraries

- [tokio](https://github.com/tokio-rs/tokio): async runtime

## Resources

- [book](https://github.com/rust-lang/book) - The book
"#;
        let options = ParseOptions {
            start_section: Some("applications".to_string()),
            end_section: Some("Resources".to_string()),
            sub_headings_as_categories: false,
        };
        let collection = parse_markdown_collection(markdown, &options).unwrap();

        let names: Vec<&str> = collection.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Applications", "Libraries"]);
        assert_eq!(collection.categories[0].projects[0].description, "A GPU terminal");
        assert_eq!(collection.categories[1].projects[0].description, "async runtime");
    }

    #[test]
    fn test_missing_start_section_is_an_error() {
        let options = ParseOptions {
            start_section: Some("Nowhere".to_string()),
            ..Default::default()
        };
        let err = parse_markdown_collection("## A\n\n- [a](https://github.com/a/a)\n", &options)
            .unwrap_err();
        assert!(matches!(err, Error::SectionNotFound(s) if s == "Nowhere"));
    }

    #[test]
    fn test_sub_headings_fold_or_split() {
        let markdown = r#"
## Web

### Frameworks

- [gin](https://github.com/gin-gonic/gin) - HTTP framework

### Middleware

- [cors](https://github.com/rs/cors) - CORS handler
"#;
        let folded = parse_markdown_collection(markdown, &ParseOptions::default()).unwrap();
        assert_eq!(folded.categories.len(), 1);
        assert_eq!(folded.categories[0].name, "Web");
        assert_eq!(folded.categories[0].projects.len(), 2);

        let split = parse_markdown_collection(
            markdown,
            &ParseOptions {
                sub_headings_as_categories: true,
                ..Default::default()
            },
        )
        .unwrap();
        let names: Vec<&str> = split.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Frameworks", "Middleware"]);
    }

    #[test]
    fn test_non_repository_items_are_skipped() {
        let markdown = r#"
## Tools

- [site](https://golang.org/) - not a repository
- [anchor](#tools)
- plain text item
- [real](https://github.com/a/real) - kept
"#;
        let collection = parse_markdown_collection(markdown, &ParseOptions::default()).unwrap();
        assert_eq!(collection.project_count(), 1);
        assert_eq!(collection.categories[0].projects[0].name, "real");
    }

    #[test]
    fn test_duplicate_repositories_and_categories_merge() {
        let markdown = r#"
## Tools

- [a](https://github.com/x/a) - first
- [a again](https://github.com/X/A.git) - duplicate

## tools

- [b](https://github.com/x/b) - second
"#;
        let collection = parse_markdown_collection(markdown, &ParseOptions::default()).unwrap();
        assert_eq!(collection.categories.len(), 1);
        let projects = &collection.categories[0].projects;
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].description, "first");
    }

    #[test]
    fn test_nested_items_use_their_own_links() {
        let markdown = r#"
## Databases

- [parent](https://github.com/x/parent) - Parent project
    - [child](https://github.com/x/child) - Child project
"#;
        let collection = parse_markdown_collection(markdown, &ParseOptions::default()).unwrap();
        let projects = &collection.categories[0].projects;
        assert_eq!(projects.len(), 2);
        let parent = projects.iter().find(|p| p.name == "parent").unwrap();
        assert_eq!(parent.description, "Parent project");
        let child = projects.iter().find(|p| p.name == "child").unwrap();
        assert_eq!(child.description, "Child project");
    }

    #[test]
    fn test_empty_categories_are_dropped() {
        let markdown = "## Empty\n\nJust prose.\n\n## Full\n\n- [a](https://github.com/x/a)\n";
        let collection = parse_markdown_collection(markdown, &ParseOptions::default()).unwrap();
        assert_eq!(collection.categories.len(), 1);
        assert_eq!(collection.categories[0].name, "Full");
        assert_eq!(collection.categories[0].projects[0].description, "");
    }

    #[test]
    fn test_invalid_utf8_is_a_decode_error() {
        let err = parse_collection(&[0xff, 0xfe, 0x00], &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_inline_code_in_description() {
        let markdown = "## CLI\n\n- [tool](https://github.com/x/tool) - Wraps `grep` nicely\n";
        let collection = parse_markdown_collection(markdown, &ParseOptions::default()).unwrap();
        assert_eq!(collection.categories[0].projects[0].description, "Wraps grep nicely");
    }
}
