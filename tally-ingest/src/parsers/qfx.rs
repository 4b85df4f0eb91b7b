//! QFX / OFX credit card export parser
//!
//! Only purchase records are kept: `<STMTTRN>` blocks whose `TRNTYPE` is
//! `DEBIT`. Payments and credits are dropped.
//!
//!   <STMTTRN>
//!   <TRNTYPE>DEBIT
//!   <DTPOSTED>20250711120000[-5:EST]
//!   <TRNAMT>-5.50
//!   <FITID>240000123
//!   <NAME>STARBUCKS #12345
//!   <MEMO>TORONTO ON
//!   </STMTTRN>

use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use tally_core::Transaction;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum QfxError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid field pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Parse a QFX file from disk. Non-UTF-8 files are decoded as Latin-1.
pub fn parse_qfx_file(path: impl AsRef<Path>) -> Result<Vec<Transaction>, QfxError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| QfxError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            debug!(path = %path.display(), "file is not UTF-8; decoding as Latin-1");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };
    parse_qfx_text(&text)
}

/// Parse QFX content into purchase transactions, in file order.
pub fn parse_qfx_text(text: &str) -> Result<Vec<Transaction>, QfxError> {
    let block_re = Regex::new(r"(?s)<STMTTRN>(.*?)</STMTTRN>")?;
    let fields = FieldReader::new()?;

    let mut out = Vec::new();
    for caps in block_re.captures_iter(text) {
        let block = &caps[1];
        if fields.get(block, "TRNTYPE") != "DEBIT" {
            continue;
        }

        let id = fields.get(block, "FITID");
        let title = fields.get(block, "NAME");
        let location = fields.get(block, "MEMO");

        if title.is_empty() {
            warn!(id, "skipping transaction without a NAME");
            continue;
        }

        let date = match fields.get(block, "DTPOSTED") {
            "" => None,
            raw => match parse_ofx_date(raw) {
                Some(d) => Some(d),
                None => {
                    warn!(id, raw, "could not parse transaction date; skipping");
                    continue;
                }
            },
        };

        let amount = match fields.get(block, "TRNAMT") {
            "" => 0.0,
            raw => match raw.parse::<f64>() {
                Ok(a) => a,
                Err(_) => {
                    warn!(id, raw, "could not parse transaction amount; skipping");
                    continue;
                }
            },
        };

        out.push(Transaction::new(id, title, location, amount, date));
    }

    Ok(out)
}

/// Pulls `<TAG>value` fields out of one SGML block; values run to the next
/// `<` or end of line.
struct FieldReader {
    tags: Vec<(&'static str, Regex)>,
}

impl FieldReader {
    const TAGS: [&'static str; 6] = ["TRNTYPE", "FITID", "DTPOSTED", "TRNAMT", "NAME", "MEMO"];

    fn new() -> Result<Self, regex::Error> {
        let tags = Self::TAGS
            .iter()
            .map(|tag| Regex::new(&format!("<{tag}>([^<\n]+)")).map(|re| (*tag, re)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { tags })
    }

    fn get<'t>(&self, block: &'t str, tag: &str) -> &'t str {
        self.tags
            .iter()
            .find(|(t, _)| *t == tag)
            .and_then(|(_, re)| re.captures(block))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .unwrap_or("")
    }
}

/// `YYYYMMDDHHMMSS[tz]` → date; only the first eight digits matter.
fn parse_ofx_date(raw: &str) -> Option<NaiveDate> {
    let s = match raw.find('[') {
        Some(i) => &raw[..i],
        None => raw,
    };
    let day = s.trim().get(..8)?;
    NaiveDate::parse_from_str(day, "%Y%m%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"OFXHEADER:100
DATA:OFXSGML
<OFX>
<CREDITCARDMSGSRSV1><CCSTMTTRNRS><CCSTMTRS>
<BANKTRANLIST>
<STMTTRN>
<TRNTYPE>DEBIT
<DTPOSTED>20250711120000[-5:EST]
<TRNAMT>-5.50
<FITID>240000123
<NAME>STARBUCKS #12345
<MEMO>TORONTO ON
</STMTTRN>
<STMTTRN>
<TRNTYPE>CREDIT
<DTPOSTED>20250712120000[-5:EST]
<TRNAMT>250.00
<FITID>240000124
<NAME>PAYMENT - THANK YOU
</STMTTRN>
<STMTTRN>
<TRNTYPE>DEBIT
<DTPOSTED>20250713
<TRNAMT>-12.30
<FITID>240000125
<NAME>PRESTO FARE/PKF123ABC
<MEMO>TORONTO ON
</STMTTRN>
</BANKTRANLIST>
</CCSTMTRS></CCSTMTTRNRS></CREDITCARDMSGSRSV1>
</OFX>
"#;

    #[test]
    fn test_parse_keeps_only_debits() {
        let txns = parse_qfx_text(SAMPLE).unwrap();
        assert_eq!(txns.len(), 2);

        let first = &txns[0];
        assert_eq!(first.id, "240000123");
        assert_eq!(first.title, "STARBUCKS #12345");
        assert_eq!(first.location, "TORONTO ON");
        assert_eq!(first.amount, -5.50);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 7, 11));

        assert_eq!(txns[1].title, "PRESTO FARE/PKF123ABC");
        assert_eq!(txns[1].date, NaiveDate::from_ymd_opt(2025, 7, 13));
    }

    #[test]
    fn test_missing_memo_and_amount_default() {
        let text = "<STMTTRN>\n<TRNTYPE>DEBIT\n<FITID>9\n<NAME>LCBO\n</STMTTRN>";
        let txns = parse_qfx_text(text).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].location, "");
        assert_eq!(txns[0].amount, 0.0);
        assert_eq!(txns[0].date, None);
    }

    #[test]
    fn test_bad_records_are_skipped() {
        let text = "<STMTTRN>\n<TRNTYPE>DEBIT\n<DTPOSTED>2025\n<NAME>A\n</STMTTRN>\
                    <STMTTRN>\n<TRNTYPE>DEBIT\n<TRNAMT>abc\n<NAME>B\n</STMTTRN>\
                    <STMTTRN>\n<TRNTYPE>DEBIT\n<TRNAMT>-1.00\n</STMTTRN>\
                    <STMTTRN>\n<TRNTYPE>DEBIT\n<TRNAMT>-2.00\n<NAME>OK\n</STMTTRN>";
        let txns = parse_qfx_text(text).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].title, "OK");
    }

    #[test]
    fn test_parse_ofx_date_variants() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 31);
        assert_eq!(parse_ofx_date("20250131"), d);
        assert_eq!(parse_ofx_date("20250131093000.000[-5:EST]"), d);
        assert_eq!(parse_ofx_date("202501"), None);
        assert_eq!(parse_ofx_date("20251340"), None);
    }

    #[test]
    fn test_latin1_file_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.qfx");
        let mut bytes = b"<STMTTRN>\n<TRNTYPE>DEBIT\n<TRNAMT>-3.00\n<NAME>CAF".to_vec();
        bytes.push(0xC9); // É in Latin-1
        bytes.extend_from_slice(b" CENTRAL\n</STMTTRN>");
        std::fs::write(&path, bytes).unwrap();

        let txns = parse_qfx_file(&path).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].title, "CAFÉ CENTRAL");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = parse_qfx_file("/definitely/not/here.qfx").unwrap_err();
        assert!(matches!(err, QfxError::Read { .. }));
    }
}
