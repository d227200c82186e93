//! HTTP plumbing shared by the web adapters.
//!
//! - `FetchClient`: blocking client with per-request retry, backoff and
//!   status classification
//! - `get_json_once`: single async request for fan-out lookups, classified
//!   the same way but never retried
//! - `money_field`: JSON amount (string or number) to cents

use std::thread;
use std::time::Duration;

use serde_json::Value;
use shiprecon_recon::money::parse_money;

use crate::error::FetchError;

pub const USER_AGENT: &str = concat!("shiprecon/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client that handles retry, backoff, and error classification.
///
/// Adapters own their credentials and base URL. They pass a request-building
/// closure to [`FetchClient::request_json`], which runs the retry loop.
pub struct FetchClient {
    http: reqwest::blocking::Client,
    source_name: String,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
}

impl FetchClient {
    pub fn new(source_name: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Setup {
                what: "HTTP client".into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            source_name: source_name.to_string(),
            timeout,
            retries: 3,
            backoff: Duration::from_secs(1),
        })
    }

    /// Retries after the first try on 429, 5xx and network errors.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// First backoff delay; doubles on each retry.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request with retry + exponential backoff and parse the JSON body.
    ///
    /// `build_request` is called once per try and must return a fully
    /// configured request (URL, auth, query, body).
    pub fn request_json(
        &self,
        build_request: impl Fn(&reqwest::blocking::Client) -> reqwest::blocking::RequestBuilder,
    ) -> Result<Value, FetchError> {
        let mut backoff = self.backoff;
        let mut attempt = 0u32;

        loop {
            let last_try = attempt == self.retries;
            match build_request(&self.http).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if status == 429 || status >= 500 {
                        if last_try {
                            return Err(if status == 429 {
                                FetchError::RateLimited {
                                    source_name: self.source_name.clone(),
                                    attempts: attempt + 1,
                                }
                            } else {
                                FetchError::upstream(
                                    &self.source_name,
                                    format!("HTTP {status} after {} tries", attempt + 1),
                                )
                            });
                        }

                        // Respect Retry-After header for 429
                        let wait = if status == 429 {
                            resp.headers()
                                .get("retry-after")
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.parse::<u64>().ok())
                                .map(Duration::from_secs)
                                .unwrap_or(backoff)
                        } else {
                            backoff
                        };
                        tracing::warn!(
                            source = %self.source_name,
                            retry = attempt + 1,
                            of = self.retries,
                            status,
                            wait_ms = wait.as_millis() as u64,
                            "retrying request",
                        );
                        thread::sleep(wait);
                        backoff *= 2;
                        attempt += 1;
                        continue;
                    }

                    let text = resp.text().map_err(|e| {
                        FetchError::upstream(
                            &self.source_name,
                            format!("failed to read response body: {e}"),
                        )
                    })?;
                    let body = parse_body(&self.source_name, &text);
                    if let Some(err) = classify_status(&self.source_name, status, &body) {
                        return Err(err);
                    }
                    return body;
                }
                Err(e) => {
                    // Network/timeout errors: retry
                    if last_try {
                        return Err(FetchError::upstream(
                            &self.source_name,
                            format!("{e} after {} tries", attempt + 1),
                        ));
                    }
                    tracing::warn!(
                        source = %self.source_name,
                        retry = attempt + 1,
                        of = self.retries,
                        error = %e,
                        "retrying request",
                    );
                    thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

/// Parse a response body, tolerating a byte-order mark.
pub(crate) fn parse_body(source_name: &str, text: &str) -> Result<Value, FetchError> {
    let trimmed = text.trim_start_matches('\u{feff}');
    serde_json::from_str(trimmed).map_err(|e| {
        FetchError::upstream(
            source_name,
            format!(
                "failed to parse JSON response: {e} (body: {})",
                trimmed.chars().take(200).collect::<String>(),
            ),
        )
    })
}

/// Error for a non-success status that must not be retried, if any.
///
/// `body` is the parse result of the response; error bodies that are not
/// JSON still produce a status error.
pub(crate) fn classify_status(
    source_name: &str,
    status: u16,
    body: &Result<Value, FetchError>,
) -> Option<FetchError> {
    if (200..300).contains(&status) {
        return None;
    }
    let message = match body {
        Ok(value) => extract_error(value, status),
        Err(_) => format!("HTTP {status}"),
    };
    let source_name = source_name.to_string();
    Some(match status {
        401 | 403 => FetchError::Auth {
            source_name,
            status,
            message,
        },
        400 | 422 => FetchError::Rejected {
            source_name,
            status,
            message,
        },
        _ => FetchError::Upstream {
            message: format!("HTTP {status}: {message}"),
            source_name,
        },
    })
}

/// Best-effort message from a JSON error body.
pub(crate) fn extract_error(body: &Value, status: u16) -> String {
    ["message", "error", "detail"]
        .iter()
        .find_map(|k| body[*k].as_str())
        .or_else(|| body["errors"][0]["message"].as_str())
        .or_else(|| body["errors"][0].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// Async single-shot GET for fan-out lookups. No retry.
pub(crate) async fn get_json_once(
    http: &reqwest::Client,
    source_name: &str,
    url: &str,
    token: &str,
) -> Result<Value, FetchError> {
    let resp = http
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| FetchError::upstream(source_name, e.to_string()))?;
    let status = resp.status().as_u16();
    let text = resp
        .text()
        .await
        .map_err(|e| FetchError::upstream(source_name, format!("failed to read response body: {e}")))?;
    let body = parse_body(source_name, &text);
    if let Some(err) = classify_status(source_name, status, &body) {
        return Err(err);
    }
    body
}

/// Amount in cents from a JSON string (`"$1,234.50"`) or number (`12.5`).
/// Null or missing is 0.
pub(crate) fn money_field(source_name: &str, value: &Value, field: &str) -> Result<i64, FetchError> {
    let text = match value {
        Value::Null => return Ok(0),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(FetchError::upstream(
                source_name,
                format!("{field} is not an amount: {other}"),
            ))
        }
    };
    parse_money(&text)
        .map(|v| v.unwrap_or(0))
        .map_err(|e| FetchError::upstream(source_name, format!("bad {field} {text:?}: {e}")))
}

/// JSON scalar as text: strings verbatim, numbers formatted, else empty.
pub(crate) fn text_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(retries: u32) -> FetchClient {
        FetchClient::new("Test", Duration::from_secs(5))
            .unwrap()
            .with_retries(retries)
            .with_backoff(Duration::ZERO)
    }

    #[test]
    fn test_money_field() {
        assert_eq!(money_field("t", &json!("$1,080.47"), "cost").unwrap(), 108047);
        assert_eq!(money_field("t", &json!(12.5), "cost").unwrap(), 1250);
        assert_eq!(money_field("t", &json!(7), "cost").unwrap(), 700);
        assert_eq!(money_field("t", &Value::Null, "cost").unwrap(), 0);
        assert_eq!(money_field("t", &json!(""), "cost").unwrap(), 0);
        assert!(money_field("t", &json!("abc"), "cost").is_err());
        assert!(money_field("t", &json!([1]), "cost").is_err());
    }

    #[test]
    fn test_extract_error() {
        assert_eq!(extract_error(&json!({"message": "nope"}), 400), "nope");
        assert_eq!(extract_error(&json!({"errors": [{"message": "bad"}]}), 400), "bad");
        assert_eq!(extract_error(&json!({}), 418), "HTTP 418");
    }

    #[test]
    fn test_retries_5xx_then_succeeds() {
        let server = MockServer::start();
        let fail = server.mock(|when, then| {
            when.method(GET).path("/flaky").header("x-try", "1");
            then.status(503);
        });
        let ok = server.mock(|when, then| {
            when.method(GET).path("/flaky").header("x-try", "2");
            then.status(200).json_body(json!({"ok": true}));
        });

        let tries = std::cell::Cell::new(0);
        let url = server.url("/flaky");
        let body = client(2)
            .request_json(|http| {
                tries.set(tries.get() + 1);
                http.get(&url).header("x-try", tries.get().to_string())
            })
            .unwrap();

        fail.assert_hits(1);
        ok.assert_hits(1);
        assert_eq!(body["ok"], true);
    }

    #[test]
    fn test_5xx_exhausts_retries() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/down");
            then.status(500);
        });

        let url = server.url("/down");
        let err = client(2).request_json(|http| http.get(&url)).unwrap_err();
        mock.assert_hits(3);
        assert!(matches!(err, FetchError::Upstream { .. }), "{err}");
    }

    #[test]
    fn test_rate_limited() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/busy");
            then.status(429);
        });

        let url = server.url("/busy");
        let err = client(1).request_json(|http| http.get(&url)).unwrap_err();
        mock.assert_hits(2);
        assert!(matches!(err, FetchError::RateLimited { attempts: 2, .. }));
    }

    #[test]
    fn test_auth_failure_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/secret");
            then.status(401).json_body(json!({"message": "Invalid token"}));
        });

        let url = server.url("/secret");
        let err = client(3).request_json(|http| http.get(&url)).unwrap_err();
        mock.assert_hits(1);
        match err {
            FetchError::Auth { status, message, .. } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid token");
            }
            other => panic!("expected auth error, got {other}"),
        }
    }

    #[test]
    fn test_bad_request_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/bad");
            then.status(400).body("not json");
        });

        let url = server.url("/bad");
        let err = client(3).request_json(|http| http.get(&url)).unwrap_err();
        mock.assert_hits(1);
        assert!(matches!(err, FetchError::Rejected { status: 400, .. }));
    }

    #[test]
    fn test_bom_prefixed_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/bom");
            then.status(200).body("\u{feff}{\"a\": 1}");
        });

        let url = server.url("/bom");
        let body = client(0).request_json(|http| http.get(&url)).unwrap();
        assert_eq!(body["a"], 1);
    }
}
