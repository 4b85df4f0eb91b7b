//! Spending categories and the ordered category set valid for a session.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Category every unresolved transaction falls back to
pub const DEFAULT_CATEGORY: &str = "Misc";

/// Description shown for categories nobody has described
pub const CUSTOM_DESCRIPTION: &str = "Custom category";

/// Built-in categories in menu order, with their default descriptions.
pub const BUILT_IN_CATEGORIES: [(&str, &str); 11] = [
    ("Partying", "Alcohol purchases, bars, clubs, nightlife activities"),
    ("Groceries", "Food shopping, supermarkets, farmers markets, meal ingredients"),
    ("Misc", "Anything that doesn't fit other categories"),
    ("Transportation", "Public transit, rideshare, gas, parking, car maintenance"),
    ("Cafe", "Coffee shops, cafes, places for work or casual meetings"),
    ("Eating Out", "Restaurants, fast food, takeout, dining experiences"),
    ("Subscription", "Recurring bills and subscriptions (streaming, gym, phone, etc.)"),
    ("Clothing", "Clothing stores, fashion, apparel, shoes, accessories"),
    ("Technology", "Tech purchases, electronics, software, gadgets"),
    ("Events", "Event tickets, entertainment, concerts, shows, activities"),
    ("Vanity", "Beauty, grooming, personal care, cosmetics, spa treatments"),
];

/// Where a category entered the set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CategoryOrigin {
    #[serde(rename = "built-in")]
    BuiltIn,
    /// Discovered as a rule target in the rules file
    #[serde(rename = "rule-file")]
    RuleFile,
    /// Typed by the operator this session; lives only in memory
    #[serde(rename = "session")]
    SessionOnly,
    /// Typed by the operator this session and since written to the rules file
    #[serde(rename = "saved")]
    Saved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub origin: CategoryOrigin,
}

impl Category {
    pub fn is_persisted(&self) -> bool {
        self.origin != CategoryOrigin::SessionOnly
    }
}

/// Ordered, deduplicated set of category names for the current session.
///
/// Built-ins come first in their fixed order, then rule-file targets sorted by
/// name, then categories the operator adds during the session. Order never
/// changes once an entry is in.
#[derive(Debug, Clone, Default)]
pub struct CategorySet {
    entries: Vec<Category>,
    descriptions: HashMap<String, String>,
}

impl CategorySet {
    /// Union the built-in list with every category used as a rule target.
    pub fn from_rule_targets<'a>(targets: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = Self {
            entries: Vec::with_capacity(BUILT_IN_CATEGORIES.len()),
            descriptions: BUILT_IN_CATEGORIES
                .iter()
                .map(|(name, desc)| (name.to_string(), desc.to_string()))
                .collect(),
        };
        for (name, _) in BUILT_IN_CATEGORIES {
            set.entries.push(Category {
                name: name.to_string(),
                origin: CategoryOrigin::BuiltIn,
            });
        }

        let extra: BTreeSet<&str> = targets
            .into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !set.contains(t))
            .collect();
        for name in extra {
            set.entries.push(Category {
                name: name.to_string(),
                origin: CategoryOrigin::RuleFile,
            });
        }
        set
    }

    /// Override or register descriptions (e.g. `CATEGORY_DESC` markers).
    ///
    /// Descriptions may name categories that are not members of the set.
    pub fn with_descriptions<K, V>(mut self, descriptions: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, desc) in descriptions {
            self.descriptions.insert(name.into(), desc.into());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|c| c.name.as_str())
    }

    /// Zero-based lookup
    pub fn get(&self, index: usize) -> Option<&Category> {
        self.entries.get(index)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|c| c.name == name)
    }

    pub fn find(&self, name: &str) -> Option<&Category> {
        self.entries.iter().find(|c| c.name == name)
    }

    /// Description for display; unknown categories read as "Custom category".
    pub fn describe(&self, name: &str) -> &str {
        self.descriptions
            .get(name)
            .map(String::as_str)
            .unwrap_or(CUSTOM_DESCRIPTION)
    }

    pub fn has_description(&self, name: &str) -> bool {
        self.descriptions.contains_key(name)
    }

    pub fn set_description(&mut self, name: &str, description: &str) {
        self.descriptions
            .insert(name.to_string(), description.to_string());
    }

    /// Append an operator-entered category. Returns false if already present.
    pub fn push_session(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.entries.push(Category {
            name: name.to_string(),
            origin: CategoryOrigin::SessionOnly,
        });
        true
    }

    /// Flag a session category as written to durable storage.
    pub fn mark_saved(&mut self, name: &str) {
        if let Some(c) = self.entries.iter_mut().find(|c| c.name == name) {
            if c.origin == CategoryOrigin::SessionOnly {
                c.origin = CategoryOrigin::Saved;
            }
        }
    }
}
