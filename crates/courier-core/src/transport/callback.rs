//! Callback (JSONP-style) transport
//!
//! Cross-origin exchanges that deliver their payload by invoking a named
//! callback the URL advertises. The callback names live in an owned
//! registry table rather than loose global bindings; the table is the
//! globally reachable invocation point a remote payload (or an external
//! script executor) delivers into.
//!
//! This transport has no status-code concept and never rejects: a
//! network-level load failure is indistinguishable from a load that simply
//! never invoked the callback, and a dead endpoint leaves the request
//! pending forever.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use regex::Regex;
use serde_json::Value;

use crate::future::Settler;
use crate::options::RequestOptions;
use crate::outcome::{Outcome, Payload};
use crate::response::Body;

/// Query key used when the caller configures none
pub const DEFAULT_CALLBACK_KEY: &str = "callback";

/// Status carried by a resolved callback exchange; the transport itself has
/// no status concept, so the payload reports a plain success.
const CALLBACK_COMPLETED_STATUS: i64 = 200;

/// Owned table of pending callback slots.
///
/// A slot exists from registration until the exchange is handled (payload
/// taken or cancel raced in). [`CallbackRegistry::invoke`] is public so an
/// external script executor can deliver a payload by correlation name.
pub struct CallbackRegistry {
    slots: Mutex<HashMap<String, Option<Value>>>,
    counter: AtomicU64,
    epoch_ms: i64,
}

impl CallbackRegistry {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
            epoch_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Option<Value>>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Process-unique correlation name: load-time timestamp prefix plus a
    /// monotonically increasing counter.
    pub(crate) fn generate_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("cb{}_{}", self.epoch_ms, n)
    }

    pub(crate) fn register(&self, name: &str) {
        self.slots().insert(name.to_string(), None);
    }

    /// Deliver a payload to a registered callback, overwriting any earlier
    /// delivery. Returns false when the name is unknown (cancelled, already
    /// handled, or never registered).
    pub fn invoke(&self, name: &str, value: Value) -> bool {
        match self.slots().get_mut(name) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    /// Discard a slot and whatever value it stored.
    pub(crate) fn remove(&self, name: &str) {
        self.slots().remove(name);
    }

    /// Take the stored value and discard the slot.
    fn take(&self, name: &str) -> Option<Value> {
        self.slots().remove(name).flatten()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.slots().contains_key(name)
    }
}

static REGISTRY: OnceLock<CallbackRegistry> = OnceLock::new();

/// The process-wide callback registry
pub fn registry() -> &'static CallbackRegistry {
    REGISTRY.get_or_init(CallbackRegistry::new)
}

/// Start the exchange; returns the correlation name the cancel handle needs.
pub(crate) fn dispatch(
    options: RequestOptions,
    settler: Arc<Settler>,
    handled: Arc<AtomicBool>,
) -> String {
    let key = options
        .jsonp_callback
        .as_deref()
        .unwrap_or(DEFAULT_CALLBACK_KEY);
    let (url, name) = resolve_callback(&options.url, key, options.jsonp_callback_name.as_deref());
    registry().register(&name);

    let task_name = name.clone();
    tokio::spawn(async move {
        // Script-load analogue. Response and network-level failure are not
        // distinguished on this transport.
        let script = fetch(&url).await;

        if handled.swap(true, Ordering::SeqCst) {
            // cancel raced in while the script was loading
            return;
        }
        if let Some(text) = script {
            if let Some(value) = extract_invocation(&task_name, &text) {
                registry().invoke(&task_name, value);
            }
        }
        let data = registry().take(&task_name);
        settler.settle(Outcome::Success(Payload {
            data: data.map(Body::Json),
            status_code: CALLBACK_COMPLETED_STATUS,
        }));
    });

    name
}

async fn fetch(url: &str) -> Option<String> {
    let response = reqwest::get(url).await.ok()?;
    response.text().await.ok()
}

/// Work the callback key into the URL and decide the callback name.
///
/// A literal `key=?` wildcard is substituted with the chosen name; an
/// explicit `key=name` already in the URL wins over both the generated name
/// and the caller override; otherwise `key=name` is appended with the usual
/// `?`/`&` rule.
fn resolve_callback(url: &str, key: &str, override_name: Option<&str>) -> (String, String) {
    let choose = || {
        override_name
            .map(str::to_string)
            .unwrap_or_else(|| registry().generate_name())
    };

    let wildcard = Regex::new(&format!(r"([?&]{}=)\?(&|#|$)", regex::escape(key)))
        .expect("valid callback pattern");
    if wildcard.is_match(url) {
        let chosen = choose();
        let rewritten = wildcard
            .replace(url, |caps: &regex::Captures<'_>| {
                format!("{}{}{}", &caps[1], chosen, &caps[2])
            })
            .into_owned();
        return (rewritten, chosen);
    }

    let explicit = Regex::new(&format!(r"[?&]{}=([^&#]+)", regex::escape(key)))
        .expect("valid callback pattern");
    if let Some(caps) = explicit.captures(url) {
        return (url.to_string(), caps[1].to_string());
    }

    let chosen = choose();
    let sep = if url.contains('?') { '&' } else { '?' };
    (format!("{url}{sep}{key}={chosen}"), chosen)
}

/// Parse a `name(<json>)` invocation, tolerating surrounding whitespace and
/// a trailing semicolon. Anything else is not an invocation of this
/// callback and delivers nothing.
fn extract_invocation(name: &str, script: &str) -> Option<Value> {
    let script = script.trim();
    let rest = script.strip_prefix(name)?.trim_start();
    let rest = rest.strip_prefix('(')?.trim_end();
    let rest = rest.strip_suffix(';').unwrap_or(rest).trim_end();
    let inner = rest.strip_suffix(')')?;
    serde_json::from_str(inner.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_names_are_unique() {
        let a = registry().generate_name();
        let b = registry().generate_name();
        assert_ne!(a, b);
        assert!(a.starts_with("cb"));
    }

    #[test]
    fn test_slot_lifecycle() {
        let name = registry().generate_name();
        registry().register(&name);
        assert!(registry().contains(&name));
        assert!(registry().invoke(&name, json!({"a": 1})));
        assert_eq!(registry().take(&name), Some(json!({"a": 1})));
        assert!(!registry().contains(&name));
        // a handled slot no longer accepts deliveries
        assert!(!registry().invoke(&name, json!(2)));
    }

    #[test]
    fn test_remove_discards_stored_value() {
        let name = registry().generate_name();
        registry().register(&name);
        registry().invoke(&name, json!(1));
        registry().remove(&name);
        assert_eq!(registry().take(&name), None);
    }

    #[test]
    fn test_wildcard_marker_is_substituted() {
        let (url, name) = resolve_callback("/feed?callback=?", "callback", None);
        assert_eq!(url, format!("/feed?callback={name}"));

        let (url, name) = resolve_callback("/feed?callback=?&page=2", "callback", None);
        assert_eq!(url, format!("/feed?callback={name}&page=2"));
    }

    #[test]
    fn test_wildcard_uses_caller_override() {
        let (url, name) = resolve_callback("/feed?cb=?", "cb", Some("myHandler"));
        assert_eq!(name, "myHandler");
        assert_eq!(url, "/feed?cb=myHandler");
    }

    #[test]
    fn test_explicit_name_in_url_wins() {
        let (url, name) = resolve_callback("/feed?callback=already", "callback", None);
        assert_eq!(url, "/feed?callback=already");
        assert_eq!(name, "already");

        // even over a caller override
        let (_, name) = resolve_callback("/feed?callback=already", "callback", Some("mine"));
        assert_eq!(name, "already");
    }

    #[test]
    fn test_key_is_appended_when_absent() {
        let (url, name) = resolve_callback("/feed", "callback", None);
        assert_eq!(url, format!("/feed?callback={name}"));

        let (url, name) = resolve_callback("/feed?page=2", "callback", None);
        assert_eq!(url, format!("/feed?page=2&callback={name}"));
    }

    #[test]
    fn test_similar_key_names_do_not_match() {
        // "mycallback=?" must not satisfy the "callback" wildcard
        let (url, name) = resolve_callback("/feed?mycallback=?", "callback", None);
        assert_eq!(url, format!("/feed?mycallback=?&callback={name}"));
    }

    #[test]
    fn test_extract_invocation_shapes() {
        assert_eq!(
            extract_invocation("cb1", r#"cb1({"a":1})"#),
            Some(json!({"a": 1}))
        );
        assert_eq!(
            extract_invocation("cb1", " cb1 ( [1,2] ) ; "),
            Some(json!([1, 2]))
        );
        assert_eq!(extract_invocation("cb1", r#"cb1("text");"#), Some(json!("text")));
    }

    #[test]
    fn test_extract_invocation_rejects_foreign_scripts() {
        assert_eq!(extract_invocation("cb1", r#"cb2({"a":1})"#), None);
        assert_eq!(extract_invocation("cb1", "alert(1)"), None);
        assert_eq!(extract_invocation("cb1", "cb1(not json)"), None);
        assert_eq!(extract_invocation("cb1", ""), None);
    }
}
