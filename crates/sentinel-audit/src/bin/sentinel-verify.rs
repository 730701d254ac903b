//! Offline audit log verification.
//!
//! Usage: `SENTINEL_SIGNING_KEY=<hex> sentinel-verify <log-file>`
//!
//! Prints one line per failure (first ten in detail) and a summary.
//! Exit code 0 when every line verifies, 1 otherwise.

use std::path::PathBuf;

use sentinel_audit::verify::{verify_file, LineVerdict, MAX_DETAILED_FAILURES};

fn main() -> eyre::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| eyre::eyre!("usage: sentinel-verify <log-file>"))?;

    let hex_key = std::env::var("SENTINEL_SIGNING_KEY")
        .map_err(|_| eyre::eyre!("SENTINEL_SIGNING_KEY must be set"))?;
    let key = hex::decode(hex_key.trim())
        .map_err(|_| eyre::eyre!("SENTINEL_SIGNING_KEY must be hex"))?;

    let report = verify_file(&key, &path)?;

    for failure in &report.failures {
        let verdict = match failure.verdict {
            LineVerdict::Ok => continue,
            LineVerdict::InvalidSignature => "invalid-signature",
            LineVerdict::ParseError => "parse-error",
        };
        println!("line {}: {} ({})", failure.line, verdict, failure.detail);
    }

    let undetailed = (report.invalid_signature + report.parse_error)
        .saturating_sub(MAX_DETAILED_FAILURES);
    if undetailed > 0 {
        println!("... and {undetailed} more failing lines");
    }

    println!(
        "{} lines: {} ok, {} invalid signature, {} parse errors",
        report.total, report.ok, report.invalid_signature, report.parse_error
    );

    if report.all_ok() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
