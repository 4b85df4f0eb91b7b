//! tally-core: shared types for parsing, categorizing and publishing bank transactions

pub mod category;
pub mod classification;
pub mod transaction;

pub use category::{
    BUILT_IN_CATEGORIES, CUSTOM_DESCRIPTION, Category, CategoryOrigin, CategorySet,
    DEFAULT_CATEGORY,
};
pub use classification::{
    Categorized, Classification, DEFAULT_CONFIDENCE, Method, clamp_confidence,
};
pub use transaction::Transaction;
