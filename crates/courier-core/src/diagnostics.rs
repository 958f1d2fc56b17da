//! Diagnostic reporting for recovered decode failures
//!
//! A structured-parse failure never rejects a request on its own; it is
//! reported to a fire-and-forget collaborator and the request carries on
//! with a null payload. The collaborator is injectable so host applications
//! can forward reports to their own error tracker.

use std::sync::OnceLock;

use serde::Serialize;

/// Context handed to the reporter on every structured-parse failure
#[derive(Debug, Clone, Serialize)]
pub struct ParseFailure {
    /// The raw response text that failed to parse
    pub raw_response: String,
    /// Request method, as sent
    pub method: String,
    /// Request URL, after query serialization
    pub url: String,
    /// Status the exchange finished with
    pub status_code: i64,
    /// RFC 3339 report timestamp
    pub timestamp: String,
}

impl ParseFailure {
    pub(crate) fn new(raw_response: &str, method: &str, url: &str, status_code: i64) -> Self {
        Self {
            raw_response: raw_response.to_string(),
            method: method.to_string(),
            url: url.to_string(),
            status_code,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Receiver for decode-failure reports
///
/// Implementations must not assume anything about the calling task and must
/// not block; reports never affect the request outcome.
pub trait DecodeReporter: Send + Sync {
    fn report(&self, failure: &ParseFailure);
}

/// Default reporter: a structured warning on the `tracing` subscriber
struct TracingReporter;

impl DecodeReporter for TracingReporter {
    fn report(&self, failure: &ParseFailure) {
        tracing::warn!(
            method = %failure.method,
            url = %failure.url,
            status_code = failure.status_code,
            raw_response = %failure.raw_response,
            "structured parse failure on response data"
        );
    }
}

static REPORTER: OnceLock<Box<dyn DecodeReporter>> = OnceLock::new();

/// Install a process-wide decode reporter.
///
/// May succeed at most once, and only before the first report is emitted;
/// returns false if a reporter (or the default) is already in place.
pub fn set_decode_reporter(reporter: Box<dyn DecodeReporter>) -> bool {
    REPORTER.set(reporter).is_ok()
}

/// The active process-wide reporter, falling back to the tracing default
pub(crate) fn reporter() -> &'static dyn DecodeReporter {
    REPORTER.get_or_init(|| Box::new(TracingReporter)).as_ref()
}
