//! Courier Core - Cancelable request engine unifying two transports
//!
//! This crate lets a caller issue a network request with a single
//! declarative options value and receive one consistent completion,
//! failure or cancellation signal, whether the exchange ran over a direct
//! HTTP call or a script-injection callback (JSONP-style) round trip.
//!
//! # Main Components
//!
//! - **Options Normalization**: merge per-call options over process-wide
//!   defaults, derive headers and serialize GET query data
//! - **Transports**: a direct HTTP transport with abort/error/timeout
//!   channels, and a callback transport with an owned correlation registry
//! - **Response Decoding**: typed values (structured data, markup
//!   document, raw text) with recovered, reported parse failures
//! - **Outcome Classification**: exact success-set membership mapped onto
//!   a resolve/reject promise contract with an attached cancel
//!
//! # Example
//!
//! ```no_run
//! use courier_core::{request, PartialOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let payload = request(
//!         PartialOptions::get("https://api.example.com/items")
//!             .with_data(serde_json::json!({"q": "x"})),
//!     )
//!     .await?;
//!     println!("finished with status {}", payload.status_code);
//!     Ok(())
//! }
//! ```

pub mod defaults;
pub mod diagnostics;
pub mod error;
pub mod future;
pub mod options;
pub mod outcome;
pub mod request;
pub mod response;
pub mod transport;

// Re-export the public surface for convenience
pub use defaults::{configure as configure_defaults, global_defaults, DefaultsStore};
pub use diagnostics::{set_decode_reporter, DecodeReporter, ParseFailure};
pub use error::{Error, Result};
pub use future::FutureValue;
pub use options::{normalize, BeforeSendHook, PartialOptions, RequestOptions};
pub use outcome::{
    classify, Outcome, Payload, DEFAULT_SUCCESS_STATUS_CODES, STATUS_ABORTED,
    STATUS_NETWORK_ERROR, STATUS_TIMED_OUT,
};
pub use request::{request, request_with};
pub use response::{Body, XmlDocument, XmlElement};
pub use transport::callback::{registry as callback_registry, CallbackRegistry, DEFAULT_CALLBACK_KEY};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
