//! Offline verification of signed audit logs.

use std::io::BufRead;
use std::path::Path;

use subtle::ConstantTimeEq;

use crate::error::AuditError;
use crate::signing::{compute_signature, SignedEntry};

/// How many failing lines are reported with detail; the rest are counted.
pub const MAX_DETAILED_FAILURES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineVerdict {
    Ok,
    InvalidSignature,
    ParseError,
}

#[derive(Debug, Clone)]
pub struct LineFailure {
    /// 1-based line number.
    pub line: usize,
    pub verdict: LineVerdict,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct VerifyReport {
    pub total: usize,
    pub ok: usize,
    pub invalid_signature: usize,
    pub parse_error: usize,
    /// First [`MAX_DETAILED_FAILURES`] failures, in order.
    pub failures: Vec<LineFailure>,
}

impl VerifyReport {
    pub fn all_ok(&self) -> bool {
        self.total == self.ok
    }

    fn record(&mut self, line: usize, verdict: LineVerdict, detail: String) {
        self.total += 1;
        match verdict {
            LineVerdict::Ok => self.ok += 1,
            LineVerdict::InvalidSignature => self.invalid_signature += 1,
            LineVerdict::ParseError => self.parse_error += 1,
        }
        if verdict != LineVerdict::Ok && self.failures.len() < MAX_DETAILED_FAILURES {
            self.failures.push(LineFailure {
                line,
                verdict,
                detail,
            });
        }
    }
}

/// Verify one signed log line against `key`.
pub fn verify_line(key: &[u8], line: &str) -> LineVerdict {
    let envelope: SignedEntry = match serde_json::from_str(line) {
        Ok(e) => e,
        Err(_) => return LineVerdict::ParseError,
    };

    let expected = match compute_signature(
        key,
        &envelope.entry,
        &envelope.timestamp,
        &envelope.key_id,
    ) {
        Ok(sig) => sig,
        Err(_) => return LineVerdict::ParseError,
    };

    let matches: bool = expected
        .as_bytes()
        .ct_eq(envelope.signature.as_bytes())
        .into();
    if matches {
        LineVerdict::Ok
    } else {
        LineVerdict::InvalidSignature
    }
}

/// Verify every line from a reader. Blank lines are skipped.
pub fn verify_lines<R: BufRead>(key: &[u8], reader: R) -> Result<VerifyReport, AuditError> {
    let mut report = VerifyReport::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let verdict = verify_line(key, &line);
        let detail = match verdict {
            LineVerdict::Ok => String::new(),
            LineVerdict::InvalidSignature => "signature mismatch".to_string(),
            LineVerdict::ParseError => "not a signed entry".to_string(),
        };
        report.record(index + 1, verdict, detail);
    }

    Ok(report)
}

/// Verify a signed log file on disk.
pub fn verify_file(key: &[u8], path: &Path) -> Result<VerifyReport, AuditError> {
    let file = std::fs::File::open(path)?;
    verify_lines(key, std::io::BufReader::new(file))
}
