//! Writes learned rules and category descriptions back to the rules file.
//!
//! Failures are logged, never returned: the in-memory store stays
//! authoritative for the rest of the session.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{error, info};

use crate::rule_file;
use crate::rule_store::RuleStore;

/// What happened to the durable file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    AlreadyPresent,
    /// I/O failed; the in-memory store was still updated
    NotPersisted,
    /// Empty or multi-line pattern or category; nothing changed
    Rejected,
}

impl WriteOutcome {
    /// The file holds the entry after this call
    pub fn is_durable(&self) -> bool {
        matches!(self, WriteOutcome::Written | WriteOutcome::AlreadyPresent)
    }
}

impl RuleStore {
    /// Learn `pattern -> category`: file it under its section in the rules
    /// file (once) and make it active for the rest of the session.
    pub fn add_rule(&mut self, pattern: &str, category: &str) -> WriteOutcome {
        let pattern = pattern.trim().to_uppercase();
        let category = category.trim();
        if pattern.is_empty() || category.is_empty() {
            error!(pattern = %pattern, category, "refusing to add a rule with an empty side");
            return WriteOutcome::Rejected;
        }
        if !rule_file::fits_rule_line(&pattern) || !rule_file::fits_rule_line(category) {
            error!(pattern = ?pattern, category = ?category, "refusing to add a rule that spans lines or embeds the separator");
            return WriteOutcome::Rejected;
        }

        let outcome = match write_rule(&self.path, &pattern, category) {
            Ok(true) => {
                info!(pattern = %pattern, category, path = %self.path.display(), "added rule");
                WriteOutcome::Written
            }
            Ok(false) => {
                info!(pattern = %pattern, category, "rule already exists");
                WriteOutcome::AlreadyPresent
            }
            Err(e) => {
                error!(
                    error = %format!("{e:#}"),
                    rule = %rule_file::rule_line(&pattern, category),
                    "could not write rule; add it to the rules file by hand"
                );
                WriteOutcome::NotPersisted
            }
        };

        self.rules.insert(pattern, category.to_string());
        outcome
    }

    /// Append a `CATEGORY_DESC` line unless the category already has one.
    pub fn save_category_description(&mut self, category: &str, description: &str) -> WriteOutcome {
        let category = category.trim();
        let description = description.trim();
        if category.is_empty() || description.is_empty() {
            return WriteOutcome::Rejected;
        }

        let outcome = match write_description(&self.path, category, description) {
            Ok(true) => {
                info!(category, path = %self.path.display(), "saved category description");
                WriteOutcome::Written
            }
            Ok(false) => {
                info!(category, "category description already exists");
                WriteOutcome::AlreadyPresent
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), category, "could not save category description");
                WriteOutcome::NotPersisted
            }
        };

        self.descriptions
            .entry(category.to_string())
            .or_insert_with(|| description.to_string());
        outcome
    }
}

fn read_existing(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}

/// Ok(false) when the exact rule line is already in the file.
fn write_rule(path: &Path, pattern: &str, category: &str) -> Result<bool> {
    let content = read_existing(path)?;
    if rule_file::contains_rule(&content, pattern, category) {
        return Ok(false);
    }
    let updated = rule_file::insert_rule(&content, pattern, category);
    fs::write(path, updated).with_context(|| format!("write {}", path.display()))?;
    Ok(true)
}

fn write_description(path: &Path, category: &str, description: &str) -> Result<bool> {
    let content = read_existing(path)?;
    if rule_file::has_description(&content, category) {
        return Ok(false);
    }
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    writeln!(f, "\n{}", rule_file::description_line(category, description))
        .with_context(|| format!("append {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(content: &str) -> (tempfile::TempDir, RuleStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transaction_rules.txt");
        fs::write(&path, content).unwrap();
        let store = RuleStore::load(&path);
        (dir, store)
    }

    #[test]
    fn test_add_rule_is_idempotent() {
        let (_dir, mut store) = store_with("# Transportation\nTTC -> Transportation\n");
        assert_eq!(store.add_rule("presto fare", "Transportation"), WriteOutcome::Written);
        assert_eq!(store.add_rule("PRESTO FARE", "Transportation"), WriteOutcome::AlreadyPresent);

        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.matches("PRESTO FARE -> Transportation").count(), 1);
        assert_eq!(store.category_for("PRESTO FARE"), Some("Transportation"));
    }

    #[test]
    fn test_existing_rule_leaves_file_untouched() {
        let original = "# Misc (known patterns that should be misc)\nAMAZON -> Misc\n";
        let (_dir, mut store) = store_with(original);
        assert_eq!(store.add_rule("AMAZON", "Misc"), WriteOutcome::AlreadyPresent);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), original);
    }

    #[test]
    fn test_add_rule_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RuleStore::load(dir.path().join("new_rules.txt"));
        assert_eq!(store.add_rule("LCBO", "Partying"), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "LCBO -> Partying\n");
    }

    /// A failed write still teaches the in-memory store.
    #[test]
    fn test_io_failure_keeps_memory_rule() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be makes both read and write fail
        let path = dir.path().join("rules.txt");
        fs::create_dir(&path).unwrap();
        let mut store = RuleStore::from_text(&path, "");

        assert_eq!(store.add_rule("ZARA", "Clothing"), WriteOutcome::NotPersisted);
        assert_eq!(store.category_for("ZARA"), Some("Clothing"));
    }

    #[test]
    fn test_empty_rule_rejected() {
        let (_dir, mut store) = store_with("");
        assert_eq!(store.add_rule("  ", "Misc"), WriteOutcome::Rejected);
        assert!(store.is_empty());
    }

    #[test]
    fn test_multiline_or_separator_rule_rejected() {
        let original = "# Clothing\nH&M -> Clothing\n";
        let (_dir, mut store) = store_with(original);
        assert_eq!(store.add_rule("Pattern:\nZARA", "Clothing"), WriteOutcome::Rejected);
        assert_eq!(store.add_rule("ZARA -> X", "Clothing"), WriteOutcome::Rejected);
        assert_eq!(store.add_rule("ZARA", "Clothing\r\nMisc"), WriteOutcome::Rejected);

        assert_eq!(fs::read_to_string(store.path()).unwrap(), original);
        assert_eq!(store.len(), 1);
        assert_eq!(store.category_for("ZARA"), None);
    }

    #[test]
    fn test_save_description_once_per_category() {
        let (_dir, mut store) = store_with("LCBO -> Partying\n");
        assert_eq!(store.save_category_description("Pets", "Vet visits"), WriteOutcome::Written);
        assert_eq!(
            store.save_category_description("Pets", "Something else"),
            WriteOutcome::AlreadyPresent
        );

        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "LCBO -> Partying\n\n# CATEGORY_DESC: Pets | Vet visits\n");
        let descs: Vec<_> = store.descriptions().collect();
        assert_eq!(descs, vec![("Pets", "Vet visits")]);
    }
}
