//! Awesome-list document decoding
//!
//! Turns a README into a [`Collection`]: the top-level heading names the
//! language, section headings become categories and list items linking to a
//! repository become projects.

mod markdown;

pub use markdown::*;

use crate::config::Config;
use crate::error::Result;
use crate::models::RepoIdentity;
use std::collections::HashMap;

/// Options controlling which part of a document is read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Heading where categories begin (inclusive); `None` reads from the top
    pub start_section: Option<String>,
    /// Heading where parsing stops (exclusive)
    pub end_section: Option<String>,
    /// Whether level-3+ headings open categories of their own
    pub sub_headings_as_categories: bool,
}

/// Parse options per list repository, with a shared fallback
#[derive(Debug, Clone, Default)]
pub struct ParseProfiles {
    default: ParseOptions,
    overrides: HashMap<RepoIdentity, ParseOptions>,
}

impl ParseProfiles {
    pub fn new(default: ParseOptions) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, repo: RepoIdentity, options: ParseOptions) -> Self {
        self.overrides.insert(repo, options);
        self
    }

    /// Build profiles from the `[parse]` section and `[[lists]]` entries
    pub fn from_config(config: &Config) -> Result<Self> {
        let default = config.parse.options();
        let mut profiles = Self::new(default.clone());
        for list in &config.lists {
            profiles
                .overrides
                .insert(list.identity()?, list.options(&default));
        }
        Ok(profiles)
    }

    pub fn options_for(&self, repo: &RepoIdentity) -> &ParseOptions {
        self.overrides.get(repo).unwrap_or(&self.default)
    }

    /// Decode a document with the options registered for `repo`
    pub fn decode(&self, repo: &RepoIdentity, bytes: &[u8]) -> Result<crate::models::Collection> {
        parse_collection(bytes, self.options_for(repo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_fall_back_to_default() {
        let special = RepoIdentity::new("github.com", "x", "special").unwrap();
        let other = RepoIdentity::new("github.com", "x", "other").unwrap();
        let profiles = ParseProfiles::new(ParseOptions::default()).with_override(
            special.clone(),
            ParseOptions {
                start_section: Some("Libraries".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(
            profiles.options_for(&special).start_section.as_deref(),
            Some("Libraries")
        );
        assert_eq!(profiles.options_for(&other), &ParseOptions::default());
    }
}
