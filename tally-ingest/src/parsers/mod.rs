//! Bank-specific export parsers.

pub mod qfx;

pub use qfx::{QfxError, parse_qfx_file, parse_qfx_text};
