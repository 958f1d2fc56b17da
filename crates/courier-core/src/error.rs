//! Error types for the courier request engine
//!
//! Rejections carry the same numeric sentinels the wire-facing API exposes:
//! a real HTTP status for protocol rejections, -1 for network-level failures
//! and -2 for an elapsed request deadline.

use thiserror::Error;

use crate::outcome::{STATUS_NETWORK_ERROR, STATUS_TIMED_OUT};
use crate::response::Body;

/// Main error type for courier request rejections
#[derive(Error, Debug)]
pub enum Error {
    /// The exchange finished with a status outside the configured success set
    #[error("request rejected with status {status_code}")]
    Status {
        /// Decoded response payload, if any
        data: Option<Body>,
        status_code: i64,
    },

    /// The exchange failed below the protocol level (connect, DNS, TLS, ...)
    #[error("network-level request failure (status {status_code})")]
    Network { status_code: i64 },

    /// The caller-configured deadline elapsed before the exchange finished
    #[error("request timed out (status {status_code}, reason: {reason})")]
    Timeout {
        status_code: i64,
        reason: &'static str,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The numeric status or sentinel carried by this rejection
    pub fn status_code(&self) -> i64 {
        match self {
            Error::Status { status_code, .. } => *status_code,
            Error::Network { status_code } => *status_code,
            Error::Timeout { status_code, .. } => *status_code,
        }
    }

    /// Decoded payload attached to the rejection, if any
    pub fn data(&self) -> Option<&Body> {
        match self {
            Error::Status { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    /// True for the -1 network-failure sentinel
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }

    /// True for the -2 timeout sentinel
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

impl Error {
    pub(crate) fn network() -> Self {
        Error::Network {
            status_code: STATUS_NETWORK_ERROR,
        }
    }

    pub(crate) fn timed_out() -> Self {
        Error::Timeout {
            status_code: STATUS_TIMED_OUT,
            reason: "timeout",
        }
    }
}
