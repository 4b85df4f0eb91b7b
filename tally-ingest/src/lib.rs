//! tally-ingest: bank export discovery and parsing into core transactions.

pub mod discover;
pub mod parsers;
pub mod types;

pub use discover::find_qfx_files;
pub use parsers::qfx::{QfxError, parse_qfx_file, parse_qfx_text};
pub use types::StatementSummary;
