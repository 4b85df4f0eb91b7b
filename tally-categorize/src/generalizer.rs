//! Turn one concrete transaction title into a reusable rule pattern.
//!
//! The backend is asked first; its answer is only trusted when it is a single
//! line of 3 to 50 characters with no rule separator in it. Otherwise, and
//! whenever the backend fails, a deterministic clean-up is used instead.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::backend::TextGenerationClient;
use crate::rule_file;

pub const MIN_PATTERN_LEN: usize = 3;
pub const MAX_PATTERN_LEN: usize = 50;

// `/ABC123`, `#12345`, `*XYZ9`
static SEPARATOR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[/#*]\w+").expect("valid separator regex"));
static NUMBER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("valid number regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

pub struct PatternGeneralizer<'a, C: ?Sized> {
    client: &'a C,
    model: &'a str,
}

impl<'a, C: TextGenerationClient + ?Sized> PatternGeneralizer<'a, C> {
    pub fn new(client: &'a C, model: &'a str) -> Self {
        Self { client, model }
    }

    /// Always returns a usable, upper-cased pattern.
    pub fn extract_pattern(&self, title: &str) -> String {
        match self.client.generate(self.model, &pattern_prompt(title)) {
            Ok(reply) => {
                let pattern = reply.trim().to_uppercase();
                let len = pattern.chars().count();
                if (MIN_PATTERN_LEN..=MAX_PATTERN_LEN).contains(&len)
                    && rule_file::fits_rule_line(&pattern)
                {
                    debug!(title, pattern = %pattern, "backend generalized title");
                    pattern
                } else {
                    debug!(title, len, reply = ?pattern, "backend pattern rejected; using deterministic fallback");
                    fallback_pattern(title)
                }
            }
            Err(e) => {
                warn!(title, error = %e, "pattern extraction failed; using deterministic fallback");
                fallback_pattern(title)
            }
        }
    }
}

fn pattern_prompt(title: &str) -> String {
    format!(
        "Reduce this credit card transaction title to the part that identifies the merchant, \
so it can match future transactions from the same place.

Title: {title}

Drop order numbers, store numbers, reference codes and location details. Keep the \
merchant or business name and any words that say what kind of business it is. \
Reply with the pattern only, in UPPERCASE.

Examples:
PRESTO FARE/PKF123ABC -> PRESTO FARE
STARBUCKS #12345 -> STARBUCKS
AMAZON*4X5HZ3583 -> AMAZON
UBER CANADA/UBERTRIP -> UBER CANADA

Pattern:"
    )
}

/// Deterministic generalization.
///
/// Upper-cases, strips separator-led codes and standalone numbers, then
/// keeps at most the first two words. A title with nothing left comes back
/// upper-cased as-is.
pub fn fallback_pattern(title: &str) -> String {
    let upper = title.to_uppercase();
    let cleaned = SEPARATOR_TOKEN.replace_all(&upper, "");
    let cleaned = NUMBER_TOKEN.replace_all(&cleaned, "");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");

    let words: Vec<&str> = cleaned.split_whitespace().take(2).collect();
    if words.is_empty() {
        upper
    } else {
        words.join(" ")
    }
}
