//! Per-transaction pipeline: rules, then the classifier, then the operator,
//! then (optionally) rule learning.

use std::fmt::Write as _;
use tally_core::{
    CategorySet, Categorized, Classification, DEFAULT_CATEGORY, Method, Transaction,
};
use tracing::{debug, info, warn};

use crate::backend::{FALLBACK_MODEL, GenerationError, TextGenerationClient, is_model_available};
use crate::classifier;
use crate::escalation::{self, Confirm, Escalation, EscalationPort};
use crate::generalizer::PatternGeneralizer;
use crate::matcher;
use crate::rule_store::RuleStore;
use crate::rule_writer::WriteOutcome;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct CategorizerConfig {
    pub model: String,
    /// Classifications strictly below this go to the operator
    pub confidence_threshold: f64,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            model: FALLBACK_MODEL.to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Categorization engine for one session.
///
/// Owns the rule store and the session's category set; both grow as the
/// operator teaches it.
pub struct Categorizer<C, P> {
    config: CategorizerConfig,
    store: RuleStore,
    categories: CategorySet,
    client: C,
    port: P,
}

impl<C, P> Categorizer<C, P>
where
    C: TextGenerationClient,
    P: EscalationPort,
{
    pub fn new(config: CategorizerConfig, store: RuleStore, client: C, port: P) -> Self {
        let categories = CategorySet::from_rule_targets(store.rule_targets())
            .with_descriptions(store.descriptions());
        info!(
            categories = categories.len(),
            rules = store.len(),
            model = %config.model,
            threshold = config.confidence_threshold,
            "categorizer ready"
        );
        Self {
            config,
            store,
            categories,
            client,
            port,
        }
    }

    pub fn config(&self) -> &CategorizerConfig {
        &self.config
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Decide one transaction's category. Never fails.
    pub fn categorize(&mut self, txn: &Transaction) -> Categorized {
        if let Some(m) = matcher::find_match(&self.store, txn) {
            debug!(title = %txn.title, pattern = m.pattern, category = m.category, "rule matched");
            return Categorized {
                category: m.category.to_string(),
                method: Method::Rule,
            };
        }

        let verdict =
            match classifier::classify(&self.client, &self.config.model, &self.categories, txn) {
                Ok(v) => v,
                Err(e) => {
                    warn!(title = %txn.title, error = %e, "classification failed; using default category");
                    return Categorized {
                        category: DEFAULT_CATEGORY.to_string(),
                        method: Method::Fallback,
                    };
                }
            };
        debug!(
            title = %txn.title,
            category = %verdict.category,
            confidence = verdict.confidence,
            "classified"
        );

        if verdict.needs_escalation(self.config.confidence_threshold) {
            Categorized {
                category: self.escalate(txn, &verdict),
                method: Method::Operator,
            }
        } else {
            Categorized {
                category: verdict.category,
                method: Method::Model,
            }
        }
    }

    fn escalate(&mut self, txn: &Transaction, verdict: &Classification) -> String {
        let decision: Escalation = escalation::resolve(
            &mut self.port,
            &mut self.categories,
            txn,
            &verdict.category,
            verdict.confidence,
        );
        if decision.interrupted {
            info!(title = %txn.title, category = %decision.category, "escalation interrupted; keeping suggestion");
            return decision.category;
        }

        let mut pattern = None;
        if decision.learn_rule {
            let candidate = self.extract_pattern(&txn.title);
            match escalation::confirm_rule(
                &mut self.port,
                &candidate,
                &decision.category,
                self.store.path(),
            ) {
                Confirm::Yes => pattern = Some(candidate),
                Confirm::No => {}
                Confirm::Interrupted => {
                    info!(title = %txn.title, "rule confirmation interrupted; keeping suggestion");
                    return verdict.category.clone();
                }
            }
        }

        if let Some(description) = &decision.description_to_save {
            if self
                .store
                .save_category_description(&decision.category, description)
                .is_durable()
            {
                self.categories.mark_saved(&decision.category);
            }
        }
        if let Some(pattern) = pattern {
            if self.store.add_rule(&pattern, &decision.category).is_durable() {
                self.categories.mark_saved(&decision.category);
            }
        }

        decision.category
    }

    /// Generalize a title into a rule pattern.
    pub fn extract_pattern(&self, title: &str) -> String {
        PatternGeneralizer::new(&self.client, &self.config.model).extract_pattern(title)
    }

    /// Learn a rule for `title` outside the escalation flow.
    ///
    /// The category joins the session set if it is new.
    pub fn learn_rule(&mut self, title: &str, category: &str) -> (String, WriteOutcome) {
        let pattern = self.extract_pattern(title);
        let outcome = self.store.add_rule(&pattern, category);
        if outcome != WriteOutcome::Rejected {
            self.categories.push_session(category.trim());
            if outcome.is_durable() {
                self.categories.mark_saved(category.trim());
            }
        }
        (pattern, outcome)
    }

    /// Categorize in input order. One result per transaction.
    pub fn categorize_all(&mut self, transactions: &[Transaction]) -> CategorizationReport {
        info!(
            count = transactions.len(),
            model = %self.config.model,
            threshold = self.config.confidence_threshold,
            "categorizing transactions"
        );

        let rows: Vec<ReportRow> = transactions
            .iter()
            .map(|txn| ReportRow {
                title: txn.title.clone(),
                outcome: self.categorize(txn),
            })
            .collect();
        let report = CategorizationReport { rows };

        let s = report.summary();
        info!(
            rules = s.rules,
            model = s.model,
            manual = s.manual,
            fallback = s.fallback,
            "categorization summary"
        );
        report
    }

    /// Category names in input order, same length as `transactions`.
    pub fn categorize_transactions(&mut self, transactions: &[Transaction]) -> Vec<String> {
        self.categorize_all(transactions).categories()
    }

    /// List models, confirm the configured one is installed, then classify a
    /// known merchant.
    pub fn check_backend(&self) -> Result<BackendCheck, GenerationError> {
        let installed = self.client.list_models()?;
        let model_available = is_model_available(&self.config.model, &installed);
        let smoke_test = if model_available {
            let probe = Transaction::new("smoke-test", "STARBUCKS", "TORONTO ON", -5.50, None);
            Some(classifier::classify(
                &self.client,
                &self.config.model,
                &self.categories,
                &probe,
            )?)
        } else {
            None
        };
        Ok(BackendCheck {
            installed,
            model_available,
            smoke_test,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendCheck {
    pub installed: Vec<String>,
    pub model_available: bool,
    /// Classification of the STARBUCKS probe, when the model is installed
    pub smoke_test: Option<Classification>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub title: String,
    pub outcome: Categorized,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub rules: usize,
    pub model: usize,
    pub manual: usize,
    pub fallback: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorizationReport {
    pub rows: Vec<ReportRow>,
}

impl CategorizationReport {
    pub fn categories(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.outcome.category.clone()).collect()
    }

    pub fn summary(&self) -> Summary {
        let mut s = Summary::default();
        for row in &self.rows {
            match row.outcome.method {
                Method::Rule => s.rules += 1,
                Method::Model => s.model += 1,
                Method::Operator => s.manual += 1,
                Method::Fallback => s.fallback += 1,
            }
        }
        s
    }

    /// One numbered row per transaction plus the summary line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            let title: String = row.title.chars().take(30).collect();
            let _ = writeln!(
                out,
                "{:3}. {:<30} -> {:<15} ({})",
                i + 1,
                title,
                row.outcome.category,
                row.outcome.method.label()
            );
        }
        let s = self.summary();
        let _ = write!(
            out,
            "\nCategorization summary: {} by rules, {} by model, {} manual, {} fallback",
            s.rules, s.model, s.manual, s.fallback
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineClient;
    use crate::escalation::AutoAccept;

    fn row(title: &str, category: &str, method: Method) -> ReportRow {
        ReportRow {
            title: title.to_string(),
            outcome: Categorized {
                category: category.to_string(),
                method,
            },
        }
    }

    #[test]
    fn test_summary_counts_methods() {
        let report = CategorizationReport {
            rows: vec![
                row("METRO 742", "Groceries", Method::Rule),
                row("LCBO 0012", "Partying", Method::Rule),
                row("ZARA", "Clothing", Method::Model),
                row("??", "Misc", Method::Fallback),
                row("PETSMART", "Pets", Method::Operator),
            ],
        };
        assert_eq!(
            report.summary(),
            Summary {
                rules: 2,
                model: 1,
                manual: 1,
                fallback: 1
            }
        );
        assert_eq!(
            report.categories(),
            vec!["Groceries", "Partying", "Clothing", "Misc", "Pets"]
        );
    }

    #[test]
    fn test_render_truncates_titles() {
        let long = "A VERY LONG MERCHANT NAME THAT KEEPS GOING";
        let report = CategorizationReport {
            rows: vec![row(long, "Misc", Method::Model)],
        };
        let text = report.render();
        assert!(text.contains("  1. A VERY LONG MERCHANT NAME THAT -> Misc"));
        assert!(text.contains("(AI)"));
        assert!(text.ends_with("0 by rules, 1 by model, 0 manual, 0 fallback"));
    }

    #[test]
    fn test_offline_runs_on_rules_and_default() {
        let store = RuleStore::from_text("unused.txt", "METRO -> Groceries\n");
        let mut c = Categorizer::new(CategorizerConfig::default(), store, OfflineClient, AutoAccept);
        let txns = vec![
            Transaction::new("1", "METRO 742", "TORONTO ON", -20.0, None),
            Transaction::new("2", "ZARA #1", "TORONTO ON", -20.0, None),
        ];
        assert_eq!(c.categorize_transactions(&txns), vec!["Groceries", "Misc"]);
    }

    #[test]
    fn test_check_backend_offline_is_error() {
        let store = RuleStore::from_text("unused.txt", "");
        let c = Categorizer::new(CategorizerConfig::default(), store, OfflineClient, AutoAccept);
        assert!(matches!(c.check_backend(), Err(GenerationError::Unavailable(_))));
    }
}
