//! One HTTP attempt against a provider endpoint.
//!
//! Maps transport failures, non-success statuses and unparseable bodies to
//! [`AttemptError`], pulling any server retry hint out of the response.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::RequestBuilder;
use serde_json::Value;

use crate::resilience::AttemptError;

/// Longest error body kept in an [`AttemptError::Http`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Send `request` and parse the reply as JSON.
pub async fn send_json(request: RequestBuilder) -> Result<Value, AttemptError> {
    let response = request
        .send()
        .await
        .map_err(|e| AttemptError::Transport(e.to_string()))?;

    let status = response.status();
    let header_hint = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after_header);

    let body = response
        .text()
        .await
        .map_err(|e| AttemptError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(AttemptError::Http {
            status: status.as_u16(),
            retry_after: header_hint.or_else(|| retry_delay_from_body(&body)),
            body: truncate(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| AttemptError::Parse(e.to_string()))
}

/// `Retry-After` in its delta-seconds form. HTTP-date values are ignored.
pub fn parse_retry_after_header(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Retry hint embedded in a JSON error body.
///
/// Understands Google-style `error.details[].retryDelay` (`"12s"`) and a
/// numeric `error.retry_after` in seconds.
pub fn retry_delay_from_body(body: &str) -> Option<Duration> {
    let value: Value = serde_json::from_str(body).ok()?;
    // Some gateways wrap the error object in a one-element array.
    let error = match &value {
        Value::Array(items) => items.first()?.get("error")?,
        other => other.get("error")?,
    };

    if let Some(details) = error.get("details").and_then(Value::as_array) {
        let hint = details
            .iter()
            .filter_map(|d| d.get("retryDelay").and_then(Value::as_str))
            .find_map(parse_seconds_suffix);
        if hint.is_some() {
            return hint;
        }
    }

    error
        .get("retry_after")
        .and_then(Value::as_f64)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Parse `"12s"` / `"1.5s"` durations.
fn parse_seconds_suffix(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().strip_suffix('s')?.parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{head}…")
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_header() {
        assert_eq!(
            parse_retry_after_header("17"),
            Some(Duration::from_secs(17))
        );
        assert_eq!(parse_retry_after_header(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(
            parse_retry_after_header("Wed, 21 Oct 2015 07:28:00 GMT"),
            None
        );
    }

    #[test]
    fn test_google_retry_delay() {
        let body = r#"{
            "error": {
                "code": 429,
                "status": "RESOURCE_EXHAUSTED",
                "details": [
                    {"@type": "type.googleapis.com/google.rpc.QuotaFailure"},
                    {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "12s"}
                ]
            }
        }"#;
        assert_eq!(retry_delay_from_body(body), Some(Duration::from_secs(12)));
    }

    #[test]
    fn test_wrapped_error_and_fractional_delay() {
        let body = r#"[{"error": {"details": [{"retryDelay": "1.5s"}]}}]"#;
        assert_eq!(
            retry_delay_from_body(body),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_numeric_retry_after_field() {
        let body = r#"{"error": {"type": "rate_limit_error", "retry_after": 8}}"#;
        assert_eq!(retry_delay_from_body(body), Some(Duration::from_secs(8)));
    }

    #[test]
    fn test_no_hint() {
        assert_eq!(retry_delay_from_body("upstream exploded"), None);
        assert_eq!(retry_delay_from_body(r#"{"error": {"message": "x"}}"#), None);
        assert_eq!(
            retry_delay_from_body(r#"{"error": {"details": [{"retryDelay": "soon"}]}}"#),
            None
        );
    }

    #[test]
    fn test_truncate_long_body() {
        let long = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        let cut = truncate(&long);
        assert_eq!(cut.chars().count(), MAX_ERROR_BODY_CHARS + 1);
        assert_eq!(truncate("short"), "short");
    }

    #[tokio::test]
    async fn test_send_json_success() {
        let (base, server) = canned::serve_once("200 OK", &[], r#"{"ok": true}"#).await;
        let value = send_json(canned::client().post(format!("{base}/v1/x")).json(&1))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(server.await.unwrap().request_line(), "POST /v1/x HTTP/1.1");
    }

    #[tokio::test]
    async fn test_send_json_header_hint_beats_body_hint() {
        let body = r#"{"error": {"details": [{"retryDelay": "30s"}], "retry_after": 3}}"#;
        let (base, _server) =
            canned::serve_once("503 Service Unavailable", &[("Retry-After", "7")], body).await;

        let err = send_json(canned::client().get(&base)).await.unwrap_err();
        match &err {
            AttemptError::Http {
                status,
                retry_after,
                body: kept,
            } => {
                assert_eq!(*status, 503);
                assert_eq!(*retry_after, Some(Duration::from_secs(7)));
                assert!(kept.contains("retryDelay"));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_send_json_details_beat_retry_after_field() {
        let body = r#"{"error": {"details": [{"retryDelay": "30s"}], "retry_after": 3}}"#;
        let (base, _server) = canned::serve_once("429 Too Many Requests", &[], body).await;

        let err = send_json(canned::client().get(&base)).await.unwrap_err();
        assert_eq!(err.suggested_delay(), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_send_json_unauthorized() {
        let (base, _server) =
            canned::serve_once("401 Unauthorized", &[], r#"{"error": "bad key"}"#).await;

        let err = send_json(canned::client().get(&base)).await.unwrap_err();
        assert!(matches!(
            err,
            AttemptError::Http {
                status: 401,
                retry_after: None,
                ..
            }
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_send_json_non_json_body() {
        let (base, _server) = canned::serve_once("200 OK", &[], "<html>gateway</html>").await;

        let err = send_json(canned::client().get(&base)).await.unwrap_err();
        assert!(matches!(err, AttemptError::Parse(_)));
    }

    #[tokio::test]
    async fn test_send_json_connection_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = send_json(canned::client().get(format!("http://{addr}")))
            .await
            .unwrap_err();
        assert!(matches!(err, AttemptError::Transport(_)));
        assert!(err.is_retryable());
    }
}
