//! Terminal outcome classification for finished exchanges
//!
//! Every request produces exactly one [`Outcome`]. Classification is a pure
//! function of the finished exchange's status code, its decoded payload and
//! the configured success set; cancellation and deadline expiry map onto the
//! reserved sentinel codes below.

use crate::error::Error;
use crate::response::Body;
use crate::Result;

/// Status reported when the caller aborts a direct exchange
pub const STATUS_ABORTED: i64 = 0;
/// Sentinel for a network-level failure (connect, DNS, TLS, ...)
pub const STATUS_NETWORK_ERROR: i64 = -1;
/// Sentinel for an elapsed request deadline
pub const STATUS_TIMED_OUT: i64 = -2;

/// Success statuses applied when the caller configures none
pub const DEFAULT_SUCCESS_STATUS_CODES: [i64; 5] = [200, 201, 202, 204, 304];

/// Decoded payload plus the status it arrived with
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Decoded response body, absent for empty bodies and non-completion
    /// channels
    pub data: Option<Body>,
    /// HTTP status code or one of the sentinel values
    pub status_code: i64,
}

impl Payload {
    pub(crate) fn aborted() -> Self {
        Self {
            data: None,
            status_code: STATUS_ABORTED,
        }
    }
}

/// Terminal classification of one request
///
/// Exactly one `Outcome` is produced per request, whichever channel fires
/// first.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Status was a member of the configured success set
    Success(Payload),
    /// Any other finished status, or the -1 network sentinel
    Failure(Payload),
    /// The caller cancelled the exchange before it finished
    Aborted,
    /// The caller-configured deadline elapsed
    TimedOut,
}

impl Outcome {
    /// Map the outcome onto the promise contract: Success and Aborted
    /// resolve, Failure and TimedOut reject. Cancellation is
    /// caller-initiated and deliberately not treated as an error.
    pub fn into_result(self) -> Result<Payload> {
        match self {
            Outcome::Success(payload) => Ok(payload),
            Outcome::Aborted => Ok(Payload::aborted()),
            Outcome::Failure(payload) => {
                if payload.status_code == STATUS_NETWORK_ERROR {
                    Err(Error::network())
                } else {
                    Err(Error::Status {
                        data: payload.data,
                        status_code: payload.status_code,
                    })
                }
            }
            Outcome::TimedOut => Err(Error::timed_out()),
        }
    }
}

/// Classify a finished exchange by exact membership in the success set.
///
/// No range or wildcard matching: 0 and the negative sentinels never
/// classify as success because they are never members of a normalized set.
pub fn classify(status_code: i64, data: Option<Body>, success_status_codes: &[i64]) -> Outcome {
    let payload = Payload { data, status_code };
    if success_status_codes.contains(&status_code) {
        Outcome::Success(payload)
    } else {
        Outcome::Failure(payload)
    }
}
