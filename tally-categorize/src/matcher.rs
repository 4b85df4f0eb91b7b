//! Deterministic rule matching: case-insensitive substring scan of the title.

use tally_core::Transaction;

use crate::rule_store::RuleStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch<'a> {
    pub pattern: &'a str,
    pub category: &'a str,
}

/// First rule (in store order) whose pattern occurs in the upper-cased title.
pub fn find_match<'a>(store: &'a RuleStore, txn: &Transaction) -> Option<RuleMatch<'a>> {
    let title = txn.title.to_uppercase();
    store
        .rules()
        .find(|(pattern, _)| title.contains(&pattern.to_uppercase()))
        .map(|(pattern, category)| RuleMatch { pattern, category })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(title: &str) -> Transaction {
        Transaction::new("id", title, "TORONTO ON", -10.0, None)
    }

    #[test]
    fn test_substring_match_case_insensitive() {
        let store = RuleStore::from_text("r.txt", "METRO -> Groceries\n");
        let m = find_match(&store, &txn("metro 742 toronto")).unwrap();
        assert_eq!(m.category, "Groceries");
        assert_eq!(m.pattern, "METRO");
    }

    #[test]
    fn test_no_match_is_none() {
        let store = RuleStore::from_text("r.txt", "METRO -> Groceries\n");
        assert!(find_match(&store, &txn("STARBUCKS #12345")).is_none());
    }

    #[test]
    fn test_first_rule_in_store_order_wins() {
        let store = RuleStore::from_text("r.txt", "UBER -> Transportation\nUBER EATS -> Eating Out\n");
        let m = find_match(&store, &txn("UBER EATS TORONTO")).unwrap();
        assert_eq!(m.category, "Transportation");
    }
}
