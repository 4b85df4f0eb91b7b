//! Durable pattern → category rules and category descriptions.
//!
//! Read once at start-up; learned rules are written back by the rule writer.

use indexmap::IndexMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::rule_file::{self, Line};

/// Rule table plus the descriptions registered in the same file.
#[derive(Debug, Clone)]
pub struct RuleStore {
    pub(crate) path: PathBuf,
    /// Upper-cased pattern → category, in file order. A pattern seen twice
    /// keeps its first position and its last category.
    pub(crate) rules: IndexMap<String, String>,
    pub(crate) descriptions: IndexMap<String, String>,
}

impl RuleStore {
    /// Load the rules file. Never fails: a missing or unreadable file yields
    /// an empty store, malformed lines are logged and skipped.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "rules file not found; starting with no rules");
                String::new()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "could not read rules file");
                String::new()
            }
        };
        let store = Self::from_text(path, &content);
        info!(
            rules = store.rules.len(),
            descriptions = store.descriptions.len(),
            "loaded categorization rules"
        );
        store
    }

    /// Build a store from rules-file content; `path` is where writes go.
    pub fn from_text(path: impl Into<PathBuf>, content: &str) -> Self {
        let mut store = Self {
            path: path.into(),
            rules: IndexMap::new(),
            descriptions: IndexMap::new(),
        };

        for (idx, raw) in content.lines().enumerate() {
            match rule_file::parse_line(raw) {
                Line::Blank | Line::Comment => {}
                Line::Description { category, description } => {
                    store.descriptions.insert(category, description);
                }
                Line::Rule { pattern, category } => {
                    store.rules.insert(pattern, category);
                }
                Line::Malformed(reason) => {
                    warn!(line = idx + 1, text = raw.trim(), reason, "skipping malformed rules line");
                }
            }
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `(pattern, category)` pairs in match order
    pub fn rules(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn category_for(&self, pattern: &str) -> Option<&str> {
        self.rules.get(&pattern.to_uppercase()).map(String::as_str)
    }

    /// Every category named as a rule target, with repeats
    pub fn rule_targets(&self) -> impl Iterator<Item = &str> {
        self.rules.values().map(String::as_str)
    }

    /// Descriptions registered through `CATEGORY_DESC` lines
    pub fn descriptions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.descriptions.iter().map(|(c, d)| (c.as_str(), d.as_str()))
    }
}
