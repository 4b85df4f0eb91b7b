//! Transaction records handed to the categorizer by the statement parser.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single purchase parsed from a bank export.
///
/// The categorizer only reads `title`, `location` and `amount`; `id` and
/// `date` travel through to the publisher untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Opaque identifier assigned by the bank (FITID for QFX exports)
    pub id: String,
    /// Merchant display title, never empty
    pub title: String,
    /// Free-text location / memo line
    pub location: String,
    /// Signed amount exactly as exported; sign is not normalized here
    pub amount: f64,
    /// Posting date, when the export carried a parseable one
    pub date: Option<NaiveDate>,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        location: impl Into<String>,
        amount: f64,
        date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            location: location.into(),
            amount,
            date,
        }
    }

    /// Absolute amount, as shown to the classifier and the operator
    pub fn abs_amount(&self) -> f64 {
        self.amount.abs()
    }

    /// Returns true for a charge exported with a negative sign
    pub fn is_debit(&self) -> bool {
        self.amount < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_creation() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 11).unwrap();
        let tx = Transaction::new("fit-001", "METRO 742", "TORONTO ON", -42.5, Some(date));
        assert_eq!(tx.abs_amount(), 42.5);
        assert!(tx.is_debit());
        assert_eq!(tx.date, Some(date));
    }

    #[test]
    fn test_transaction_serde() {
        let tx = Transaction::new("fit-002", "STARBUCKS", "TORONTO ON", 5.5, None);
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
        assert!(!back.is_debit());
    }
}
