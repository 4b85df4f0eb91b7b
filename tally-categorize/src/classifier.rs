//! Classifier bridge: prompt the text-generation backend, read back a
//! `Category:` / `Confidence:` pair.

use std::fmt::Write as _;
use tally_core::{CategorySet, Classification, DEFAULT_CONFIDENCE, Transaction, clamp_confidence};

use crate::backend::{GenerationError, TextGenerationClient};

/// Prompt listing every known category and the transaction's fields.
pub fn build_prompt(categories: &CategorySet, txn: &Transaction) -> String {
    let mut listing = String::new();
    for name in categories.names() {
        let _ = writeln!(listing, "- {}: {}", name, categories.describe(name));
    }

    format!(
        "You categorize credit card purchases. Pick exactly one of the categories below \
and say how sure you are.

Categories:
{}

Transaction:
- Name: {}
- Location: {}
- Amount: ${:.2}

Answer with exactly these two lines:
Category: <one category name from the list, spelled exactly>
Confidence: <number from 0.0 (guessing) to 1.0 (certain)>

Give lower confidence when the merchant name is unclear or could fit several categories.",
        listing.trim_end(),
        txn.title,
        txn.location,
        txn.abs_amount()
    )
}

/// Read a classifier reply.
///
/// Unknown category names keep the default; an unreadable confidence reads
/// as 0.5. Missing lines leave the defaults, which sit below any sensible
/// threshold and so route to the operator.
pub fn parse_response(text: &str, categories: &CategorySet) -> Classification {
    let mut out = Classification::default();

    for line in text.trim().lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Category:") {
            let value = value.trim();
            if categories.contains(value) {
                out.category = value.to_string();
            }
        } else if let Some(value) = line.strip_prefix("Confidence:") {
            out.confidence = value
                .trim()
                .parse::<f64>()
                .map(clamp_confidence)
                .unwrap_or(DEFAULT_CONFIDENCE);
        }
    }

    out
}

/// Ask the backend to classify one transaction.
pub fn classify<C>(
    client: &C,
    model: &str,
    categories: &CategorySet,
    txn: &Transaction,
) -> Result<Classification, GenerationError>
where
    C: TextGenerationClient + ?Sized,
{
    let prompt = build_prompt(categories, txn);
    let reply = client.generate(model, &prompt)?;
    Ok(parse_response(&reply, categories))
}
