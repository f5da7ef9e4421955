//! Prompt guide documents.
//!
//! Guides ship compiled into the binary; files in the user prompt directory
//! win over built-ins by name. The guide name is the filename minus its
//! extension.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::json;

use stg_domain::error::{Error, Result};

/// Built-in guides compiled into the binary.
const BUILTINS: &[(&str, &str)] = &[
    (
        "http-testing",
        include_str!("../prompts/http-testing.md"),
    ),
    (
        "mission-workflow",
        include_str!("../prompts/mission-workflow.md"),
    ),
];

const GUIDE_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "yaml", "yml"];

/// Output format negotiated via the resource query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptFormat {
    #[default]
    Markdown,
    Json,
    Yaml,
}

impl std::str::FromStr for PromptFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!("Unknown prompt format: {other}")),
        }
    }
}

/// Loader for prompt guides.
pub struct PromptLibrary {
    user_dir: PathBuf,
}

impl PromptLibrary {
    #[must_use]
    pub fn new(user_dir: PathBuf) -> Self {
        Self { user_dir }
    }

    /// Names of all available guides, user files over built-ins.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: BTreeMap<String, ()> = BUILTINS
            .iter()
            .map(|(name, _)| ((*name).to_owned(), ()))
            .collect();
        if let Ok(entries) = std::fs::read_dir(&self.user_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_guide = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| GUIDE_EXTENSIONS.contains(&e));
                if is_guide
                    && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                {
                    names.insert(stem.to_owned(), ());
                }
            }
        }
        names.into_keys().collect()
    }

    /// Fetch one guide, rendered in the requested format.
    ///
    /// # Errors
    ///
    /// Returns `not_found` for unknown guide names.
    pub fn get(&self, name: &str, format: PromptFormat) -> Result<String> {
        let content = self
            .user_content(name)
            .or_else(|| {
                BUILTINS
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, c)| (*c).to_owned())
            })
            .ok_or_else(|| Error::not_found(format!("prompt guide '{name}'")))?;

        Ok(match format {
            PromptFormat::Markdown => content,
            PromptFormat::Json => json!({ "name": name, "content": content }).to_string(),
            PromptFormat::Yaml => {
                serde_yaml::to_string(&json!({ "name": name, "content": content }))
                    .unwrap_or(content)
            }
        })
    }

    fn user_content(&self, name: &str) -> Option<String> {
        // Reject separators so names cannot address outside the prompt dir.
        if name.contains('/') || name.contains("..") {
            return None;
        }
        GUIDE_EXTENSIONS.iter().find_map(|ext| {
            std::fs::read_to_string(self.user_dir.join(format!("{name}.{ext}"))).ok()
        })
    }
}
