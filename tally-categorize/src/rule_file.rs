//! Line grammar of the rules file.
//!
//!   # Groceries
//!   METRO -> Groceries
//!   # CATEGORY_DESC: Pets | Vet visits, food, toys
//!
//! Blank lines are ignored, `#` lines are comments / section headers, and
//! everything else must be a `PATTERN -> Category` rule.

/// Prefix of a category description line
pub const DESCRIPTION_MARKER: &str = "# CATEGORY_DESC:";

const RULE_SEPARATOR: &str = " -> ";
const DESCRIPTION_SEPARATOR: &str = " | ";

/// Section every category without its own header is filed under
pub const MISC_HEADER: &str = "# Misc (known patterns that should be misc)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Blank,
    /// Header or free comment
    Comment,
    Description { category: String, description: String },
    /// Pattern is upper-cased regardless of file casing
    Rule { pattern: String, category: String },
    Malformed(&'static str),
}

pub fn parse_line(raw: &str) -> Line {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Blank;
    }

    if let Some(rest) = line.strip_prefix(DESCRIPTION_MARKER) {
        return match rest.trim().split_once(DESCRIPTION_SEPARATOR) {
            Some((cat, desc)) if !cat.trim().is_empty() && !desc.trim().is_empty() => {
                Line::Description {
                    category: cat.trim().to_string(),
                    description: desc.trim().to_string(),
                }
            }
            Some(_) => Line::Malformed("empty category or description"),
            None => Line::Malformed("expected `# CATEGORY_DESC: <Category> | <Description>`"),
        };
    }

    if line.starts_with('#') {
        return Line::Comment;
    }

    match line.split_once(RULE_SEPARATOR) {
        Some((pattern, cat)) if !pattern.trim().is_empty() && !cat.trim().is_empty() => Line::Rule {
            pattern: pattern.trim().to_uppercase(),
            category: cat.trim().to_string(),
        },
        Some(_) => Line::Malformed("empty pattern or category"),
        None => Line::Malformed("expected `PATTERN -> Category`"),
    }
}

/// A rule side that would read back as the same single rule line: no line
/// breaks and no embedded separator.
pub fn fits_rule_line(side: &str) -> bool {
    !side.contains(['\n', '\r']) && !side.contains(RULE_SEPARATOR)
}

pub fn rule_line(pattern: &str, category: &str) -> String {
    format!("{pattern}{RULE_SEPARATOR}{category}")
}

pub fn description_line(category: &str, description: &str) -> String {
    format!("{DESCRIPTION_MARKER} {category}{DESCRIPTION_SEPARATOR}{description}")
}

/// Section header a category's learned rules are filed under.
pub fn section_header(category: &str) -> &'static str {
    match category {
        "Transportation" => "# Transportation",
        "Groceries" => "# Groceries",
        "Subscription" => "# Subscriptions",
        "Partying" => "# Partying (Alcohol/Bars/Clubs)",
        "Cafe" => "# Coffee/Cafes",
        "Eating Out" => "# Eating Out",
        "Clothing" => "# Clothing",
        "Technology" => "# Technology",
        "Events" => "# Events",
        "Vanity" => "# Vanity",
        _ => MISC_HEADER,
    }
}

/// True if `PATTERN -> Category` already appears as a line of `content`.
pub fn contains_rule(content: &str, pattern: &str, category: &str) -> bool {
    let wanted = rule_line(pattern, category);
    content.lines().any(|l| l.trim() == wanted)
}

/// True if `content` already carries a description marker for `category`.
pub fn has_description(content: &str, category: &str) -> bool {
    content.lines().any(|l| {
        matches!(parse_line(l), Line::Description { category: ref c, .. } if c == category)
    })
}

/// Insert a rule line into its category's section.
///
/// The line goes immediately before the next header after the section's own
/// header, or at the end of the file when the section is last or missing.
pub fn insert_rule(content: &str, pattern: &str, category: &str) -> String {
    let new_line = rule_line(pattern, category);
    if content.is_empty() {
        return format!("{new_line}\n");
    }

    let header = section_header(category);
    let mut lines: Vec<&str> = content.split('\n').collect();
    // A trailing newline leaves an empty last element; keep it last.
    let end = if content.ends_with('\n') {
        lines.len() - 1
    } else {
        lines.len()
    };

    let at = match lines[..end].iter().position(|l| l.trim() == header) {
        Some(i) => lines[i + 1..end]
            .iter()
            .position(|l| {
                let t = l.trim();
                t.starts_with("# ") && t != header
            })
            .map(|j| i + 1 + j)
            .unwrap_or(end),
        None => end,
    };

    lines.insert(at, &new_line);
    lines.join("\n")
}
