//! tally-categorize: rule store, classifier bridge, operator escalation and
//! rule learning for bank transactions

pub mod backend;
pub mod categorizer;
pub mod classifier;
pub mod escalation;
pub mod generalizer;
pub mod matcher;
pub mod rule_file;
pub mod rule_store;
pub mod rule_writer;

pub use backend::{
    FALLBACK_MODEL, GenerationError, OfflineClient, TextGenerationClient, is_model_available,
    recommended_model,
};
pub use categorizer::{
    BackendCheck, CategorizationReport, Categorizer, CategorizerConfig,
    DEFAULT_CONFIDENCE_THRESHOLD, ReportRow, Summary,
};
pub use escalation::{AutoAccept, Choice, Confirm, Escalation, EscalationPort, Reply};
pub use generalizer::{PatternGeneralizer, fallback_pattern};
pub use matcher::{RuleMatch, find_match};
pub use rule_store::RuleStore;
pub use rule_writer::WriteOutcome;
