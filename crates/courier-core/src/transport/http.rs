//! Direct HTTP transport
//!
//! Drives one engine exchange and funnels its end into exactly one of four
//! terminal channels: completion (decode + classify), abort (resolves with
//! status 0), network error (status -1) and timeout (status -2). The shared
//! settler makes every late event after the first transition a no-op.

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tokio::sync::Notify;

use crate::diagnostics;
use crate::future::Settler;
use crate::options::RequestOptions;
use crate::outcome::{classify, Outcome, Payload, STATUS_NETWORK_ERROR};
use crate::response::{decode, DecodeContext};

/// Open the exchange on a spawned task racing the cancel signal.
pub(crate) fn dispatch(options: RequestOptions, settler: Arc<Settler>, cancel: Arc<Notify>) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.notified() => {
                settler.settle(Outcome::Aborted);
            }
            outcome = drive(&options) => {
                settler.settle(outcome);
            }
        }
    });
}

/// Run the exchange under the caller-configured deadline, if any.
async fn drive(options: &RequestOptions) -> Outcome {
    let exchange = execute(options);
    match options.timeout {
        Some(deadline) => match tokio::time::timeout(deadline, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::TimedOut,
        },
        None => exchange.await,
    }
}

async fn execute(options: &RequestOptions) -> Outcome {
    let client = match build_client(options) {
        Ok(client) => client,
        Err(error) => {
            log::warn!("failed to build exchange client: {error}");
            return network_failure();
        }
    };

    let builder = assemble(&client, options);
    match builder.send().await {
        Ok(response) => {
            let status = i64::from(response.status().as_u16());
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let raw = match response.text().await {
                Ok(text) => text,
                Err(error) => {
                    log::warn!(
                        "response body read failed for {} {}: {error}",
                        options.method,
                        options.url
                    );
                    return network_failure();
                }
            };
            let ctx = DecodeContext {
                method: options.method.as_str(),
                url: &options.url,
                status_code: status,
            };
            let data = decode(&raw, content_type.as_deref(), &ctx, diagnostics::reporter());
            classify(status, data, &options.success_status_codes)
        }
        Err(error) => {
            // The engine enforces its own connect deadlines; fold those into
            // the timeout channel rather than the network one.
            if error.is_timeout() {
                return Outcome::TimedOut;
            }
            log::warn!(
                "network-level failure for {} {}: {error}",
                options.method,
                options.url
            );
            network_failure()
        }
    }
}

/// Per-exchange client; the credentials flag turns on the cookie jar.
fn build_client(options: &RequestOptions) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(options.credentials)
        .build()
}

/// Assemble method, URL, headers and body, then give the before-send hook
/// its chance to transform the builder.
fn assemble(client: &reqwest::Client, options: &RequestOptions) -> reqwest::RequestBuilder {
    let mut builder = client.request(options.method.clone(), &options.url);
    for (key, value) in &options.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    if options.method != reqwest::Method::GET {
        if let Some(body) = &options.data {
            builder = apply_body(builder, body);
        }
    }
    if let Some(hook) = &options.before_send {
        builder = hook.call(builder, options);
    }
    builder
}

/// A string body is sent verbatim; anything else is serialized as JSON
/// text. Neither sets a Content-Type; that stays under the caller's
/// control via the normalized headers.
fn apply_body(builder: reqwest::RequestBuilder, body: &Value) -> reqwest::RequestBuilder {
    match body {
        Value::String(text) => builder.body(text.clone()),
        other => builder.body(other.to_string()),
    }
}

fn network_failure() -> Outcome {
    Outcome::Failure(Payload {
        data: None,
        status_code: STATUS_NETWORK_ERROR,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{BeforeSendHook, PartialOptions};
    use reqwest::Method;
    use serde_json::json;
    use std::collections::HashMap;

    fn options(method: Method, data: Option<Value>) -> RequestOptions {
        RequestOptions {
            method,
            url: "http://localhost/items".to_string(),
            data,
            headers: HashMap::from([("X-Check".to_string(), "1".to_string())]),
            ..RequestOptions::default()
        }
    }

    #[tokio::test]
    async fn test_assemble_applies_method_headers_and_body() {
        let options = options(Method::POST, Some(json!({"a": 1})));
        let client = build_client(&options).unwrap();
        let request = assemble(&client, &options).build().unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().as_str(), "http://localhost/items");
        assert_eq!(request.headers().get("X-Check").unwrap(), "1");
        assert_eq!(
            request.body().and_then(|b| b.as_bytes()),
            Some(br#"{"a":1}"#.as_ref())
        );
    }

    #[tokio::test]
    async fn test_get_requests_never_carry_a_body() {
        let options = options(Method::GET, Some(json!("leftover")));
        let client = build_client(&options).unwrap();
        let request = assemble(&client, &options).build().unwrap();
        assert!(request.body().is_none());
    }

    #[tokio::test]
    async fn test_string_body_is_sent_verbatim() {
        let options = options(Method::PUT, Some(json!("raw text payload")));
        let client = build_client(&options).unwrap();
        let request = assemble(&client, &options).build().unwrap();
        assert_eq!(
            request.body().and_then(|b| b.as_bytes()),
            Some(b"raw text payload".as_ref())
        );
    }

    #[tokio::test]
    async fn test_before_send_hook_can_add_headers() {
        let partial = PartialOptions::get("http://localhost/items").with_before_send(
            BeforeSendHook::new(|builder, _options| builder.header("X-Custom", "hooked")),
        );
        let normalized = crate::options::normalize(partial, &PartialOptions::default());
        let client = build_client(&normalized).unwrap();
        let request = assemble(&client, &normalized).build().unwrap();
        assert_eq!(request.headers().get("X-Custom").unwrap(), "hooked");
    }
}
