//! Request options and the options normalizer
//!
//! Callers describe a request with one declarative [`PartialOptions`] value;
//! normalization merges it over the low-priority defaults and produces a
//! fully-populated [`RequestOptions`] with the headers derived, the success
//! set filled in and GET query data serialized into the URL. Normalization
//! never fails.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::outcome::DEFAULT_SUCCESS_STATUS_CODES;

/// Hook invoked with the assembled request builder just before transmission.
///
/// The hook may transform the builder in any way the engine allows, e.g. add
/// custom headers the normalizer doesn't know about.
#[derive(Clone)]
pub struct BeforeSendHook(
    Arc<dyn Fn(reqwest::RequestBuilder, &RequestOptions) -> reqwest::RequestBuilder + Send + Sync>,
);

impl BeforeSendHook {
    pub fn new(
        hook: impl Fn(reqwest::RequestBuilder, &RequestOptions) -> reqwest::RequestBuilder
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self(Arc::new(hook))
    }

    pub(crate) fn call(
        &self,
        builder: reqwest::RequestBuilder,
        options: &RequestOptions,
    ) -> reqwest::RequestBuilder {
        (self.0)(builder, options)
    }
}

impl fmt::Debug for BeforeSendHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BeforeSendHook")
    }
}

/// Caller-supplied request options, all fields optional
///
/// Also the value held by the defaults store; a field present here wins
/// wholesale over the same field in the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartialOptions {
    /// HTTP method name, default GET
    pub method: Option<String>,
    pub url: Option<String>,
    /// Query data for GET requests, request body otherwise
    pub data: Option<Value>,
    pub headers: Option<HashMap<String, String>>,
    /// Sets the `Content-Type` header when present
    pub content_type: Option<String>,
    /// Sets the `Accept` header when present
    pub accept: Option<String>,
    /// Enables the exchange client's cookie jar
    pub credentials: Option<bool>,
    /// Request deadline in milliseconds (direct transport only)
    pub timeout_ms: Option<u64>,
    /// Statuses classified as success, exact membership
    pub success_status_codes: Option<Vec<i64>>,
    #[serde(skip)]
    pub before_send: Option<BeforeSendHook>,
    /// Route through the callback transport
    pub jsonp: Option<bool>,
    /// Callback query key, default "callback"
    pub jsonp_callback: Option<String>,
    /// Explicit callback name, overriding the generated one
    pub jsonp_callback_name: Option<String>,
}

impl PartialOptions {
    /// Options for a plain GET of the given URL
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_before_send(mut self, hook: BeforeSendHook) -> Self {
        self.before_send = Some(hook);
        self
    }

    pub fn with_jsonp(mut self) -> Self {
        self.jsonp = Some(true);
        self
    }

    /// Overlay this value on top of `defaults`: any field present here wins
    /// wholesale, fields absent here are taken from the defaults.
    pub fn merged_over(mut self, defaults: &PartialOptions) -> PartialOptions {
        self.method = self.method.or_else(|| defaults.method.clone());
        self.url = self.url.or_else(|| defaults.url.clone());
        self.data = self.data.or_else(|| defaults.data.clone());
        self.headers = self.headers.or_else(|| defaults.headers.clone());
        self.content_type = self.content_type.or_else(|| defaults.content_type.clone());
        self.accept = self.accept.or_else(|| defaults.accept.clone());
        self.credentials = self.credentials.or(defaults.credentials);
        self.timeout_ms = self.timeout_ms.or(defaults.timeout_ms);
        self.success_status_codes = self
            .success_status_codes
            .or_else(|| defaults.success_status_codes.clone());
        self.before_send = self.before_send.or_else(|| defaults.before_send.clone());
        self.jsonp = self.jsonp.or(defaults.jsonp);
        self.jsonp_callback = self.jsonp_callback.or_else(|| defaults.jsonp_callback.clone());
        self.jsonp_callback_name = self
            .jsonp_callback_name
            .or_else(|| defaults.jsonp_callback_name.clone());
        self
    }
}

/// Fully-populated options, ready for a transport
///
/// Invariants: `headers` is always a mapping and `success_status_codes` is
/// always populated. `content_type`/`accept` have been folded into the
/// header map; GET query data has been consumed by URL serialization.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub url: String,
    /// Request body for non-GET methods
    pub data: Option<Value>,
    pub headers: HashMap<String, String>,
    pub credentials: bool,
    pub timeout: Option<Duration>,
    pub success_status_codes: Vec<i64>,
    pub before_send: Option<BeforeSendHook>,
    pub jsonp: bool,
    pub jsonp_callback: Option<String>,
    pub jsonp_callback_name: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: String::new(),
            data: None,
            headers: HashMap::new(),
            credentials: false,
            timeout: None,
            success_status_codes: DEFAULT_SUCCESS_STATUS_CODES.to_vec(),
            before_send: None,
            jsonp: false,
            jsonp_callback: None,
            jsonp_callback_name: None,
        }
    }
}

/// Merge caller options over the defaults and derive the populated form.
pub fn normalize(options: PartialOptions, defaults: &PartialOptions) -> RequestOptions {
    // Shallow merge: provenance of the header map decides whether an
    // absent content_type strips a defaults-injected Content-Type below.
    let caller_supplied_headers = options.headers.is_some();
    let merged = options.merged_over(defaults);

    let method = parse_method(merged.method.as_deref());
    let mut url = merged.url.unwrap_or_default();
    let mut headers = merged.headers.unwrap_or_default();

    match merged.content_type {
        Some(content_type) => {
            headers.insert("Content-Type".to_string(), content_type);
        }
        None => {
            if !caller_supplied_headers {
                headers.retain(|key, _| !key.eq_ignore_ascii_case("content-type"));
            }
        }
    }
    if let Some(accept) = merged.accept {
        headers.insert("Accept".to_string(), accept);
    }

    let mut data = merged.data;
    if method == Method::GET {
        if let Some(Value::Object(map)) = &data {
            append_query_pairs(&mut url, map);
            data = None;
        }
    }

    RequestOptions {
        method,
        url,
        data,
        headers,
        credentials: merged.credentials.unwrap_or(false),
        timeout: merged.timeout_ms.map(Duration::from_millis),
        success_status_codes: merged
            .success_status_codes
            .unwrap_or_else(|| DEFAULT_SUCCESS_STATUS_CODES.to_vec()),
        before_send: merged.before_send,
        jsonp: merged.jsonp.unwrap_or(false),
        jsonp_callback: merged.jsonp_callback,
        jsonp_callback_name: merged.jsonp_callback_name,
    }
}

/// Parse an HTTP method name; normalization never fails, so anything the
/// engine cannot represent falls back to GET.
fn parse_method(method: Option<&str>) -> Method {
    match method {
        Some(name) => {
            Method::from_bytes(name.to_uppercase().as_bytes()).unwrap_or(Method::GET)
        }
        None => Method::GET,
    }
}

/// Serialize query data onto the URL: one percent-encoded pair per non-null
/// key, appended with `?` if the URL has no query string yet, else `&`.
fn append_query_pairs(url: &mut String, data: &serde_json::Map<String, Value>) {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in data {
        if value.is_null() {
            continue;
        }
        serializer.append_pair(key, &scalar_to_string(value));
        any = true;
    }
    if !any {
        return;
    }
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(&serializer.finish());
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
