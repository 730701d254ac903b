//! Audit writers.
//!
//! The trait is infallible from the caller's view: the credential path must
//! never block or fail on a log write, so every failure mode is handled
//! inside the writer (warn and continue, or drop the line).

use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Mutex;

use sentinel_core::time;

use crate::entries::{ApprovalEntry, AuditEntry, BreakGlassEntry, DecisionEntry};
use crate::signing::Signer;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sink for audit entries. Methods return boxed futures for dyn
/// compatibility; synchronous writers complete immediately.
pub trait AuditWriter: Send + Sync {
    fn log(&self, entry: AuditEntry) -> BoxFuture<'_, ()>;

    fn log_decision(&self, entry: DecisionEntry) -> BoxFuture<'_, ()> {
        self.log(entry.into())
    }

    fn log_approval(&self, entry: ApprovalEntry) -> BoxFuture<'_, ()> {
        self.log(entry.into())
    }

    fn log_break_glass(&self, entry: BreakGlassEntry) -> BoxFuture<'_, ()> {
        self.log(entry.into())
    }
}

/// Render one entry as a single JSON line (no trailing LF).
///
/// With a signer, the line is the signed envelope; a signing failure warns
/// on stderr and falls back to the unsigned entry. A marshal failure
/// returns `None` and the line is dropped.
pub(crate) fn encode_line(signer: Option<&Signer>, entry: &AuditEntry) -> Option<String> {
    let value = serde_json::to_value(entry).ok()?;

    let Some(signer) = signer else {
        return serde_json::to_string(&value).ok();
    };

    match signer.sign(value.clone(), time::now_iso8601()) {
        Ok(envelope) => serde_json::to_string(&envelope).ok(),
        Err(e) => {
            eprintln!("sentinel-audit: signing failed, emitting unsigned entry: {e}");
            serde_json::to_string(&value).ok()
        }
    }
}

/// JSON-lines writer: one entry per LF-terminated line. Thread-safe;
/// concurrent writers interleave whole lines only.
pub struct JsonLinesWriter<W: Write + Send> {
    inner: Mutex<W>,
    signer: Option<Signer>,
}

impl<W: Write + Send> JsonLinesWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
            signer: None,
        }
    }

    /// Wrap every entry in an HMAC-signed envelope.
    pub fn signed(inner: W, signer: Signer) -> Self {
        Self {
            inner: Mutex::new(inner),
            signer: Some(signer),
        }
    }

    fn write_line(&self, entry: &AuditEntry) {
        let Some(line) = encode_line(self.signer.as_ref(), entry) else {
            return;
        };

        let Ok(mut w) = self.inner.lock() else {
            return;
        };
        let _ = writeln!(w, "{line}");
        let _ = w.flush();
    }
}

impl<W: Write + Send> AuditWriter for JsonLinesWriter<W> {
    fn log(&self, entry: AuditEntry) -> BoxFuture<'_, ()> {
        self.write_line(&entry);
        Box::pin(std::future::ready(()))
    }
}

/// Discards all entries; satisfies the interface when logging is disabled.
pub struct NoopWriter;

impl AuditWriter for NoopWriter {
    fn log(&self, _entry: AuditEntry) -> BoxFuture<'_, ()> {
        Box::pin(std::future::ready(()))
    }
}
