//! The request façade
//!
//! Single entry point: normalize the caller's options over the defaults,
//! pick a transport, and hand back the future value with its cancel
//! operation wired to the in-flight exchange. Stateless across calls apart
//! from reading the defaults store.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::Notify;

use crate::defaults::{global_defaults, DefaultsStore};
use crate::future::{Canceller, FutureValue, Settler};
use crate::options::{normalize, PartialOptions};
use crate::transport::{callback, http};

/// Issue a request described by one declarative options value.
///
/// Merges the process-wide defaults under the given options, routes through
/// the callback transport when `jsonp` is set and the direct HTTP transport
/// otherwise. Must be called within a tokio runtime; the transport drives
/// the exchange on a spawned task.
pub fn request(options: PartialOptions) -> FutureValue {
    request_with(global_defaults(), options)
}

/// Like [`request`], with an explicitly threaded defaults store.
pub fn request_with(defaults: &DefaultsStore, options: PartialOptions) -> FutureValue {
    let normalized = normalize(options, &defaults.snapshot());
    let (settler, rx) = Settler::new();

    if normalized.jsonp {
        let handled = Arc::new(AtomicBool::new(false));
        let name = callback::dispatch(normalized, settler, handled.clone());
        FutureValue::new(rx, Canceller::Callback { handled, name })
    } else {
        let cancel = Arc::new(Notify::new());
        http::dispatch(normalized, settler, cancel.clone());
        FutureValue::new(rx, Canceller::Http(cancel))
    }
}
