use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_core::Transaction;

/// What a parsed statement contains, for the operator's benefit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSummary {
    pub count: usize,
    /// Earliest and latest posting dates among dated records
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Signed sum of all amounts
    pub total: f64,
}

impl StatementSummary {
    pub fn from_transactions(txns: &[Transaction]) -> Self {
        let mut dates = txns.iter().filter_map(|t| t.date);
        let date_range = dates.next().map(|first| {
            dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)))
        });
        Self {
            count: txns.len(),
            date_range,
            total: txns.iter().map(|t| t.amount).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_over_mixed_dates() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 7, day);
        let txns = vec![
            Transaction::new("1", "A", "", -10.0, d(12)),
            Transaction::new("2", "B", "", -2.5, None),
            Transaction::new("3", "C", "", -7.5, d(3)),
        ];
        let s = StatementSummary::from_transactions(&txns);
        assert_eq!(s.count, 3);
        assert_eq!(s.total, -20.0);
        assert_eq!(s.date_range, Some((d(3).unwrap(), d(12).unwrap())));
    }

    #[test]
    fn test_summary_empty() {
        let s = StatementSummary::from_transactions(&[]);
        assert_eq!(s.count, 0);
        assert_eq!(s.date_range, None);
        assert_eq!(s.total, 0.0);
    }
}
