//! Authenticated, rate-limited, retrying HTTP transport (`spec.md` §4.A).
//!
//! The credential exchange itself (bearer token acquisition, OAuth
//! client-credentials) is out of scope — callers hand this transport an
//! already-resolved `Authorization` header value, and it treats that as an
//! opaque credentialed collaborator, exactly like `registry.rs`'s
//! `reqwest::blocking::Client` in the teacher codebase.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use reconciler_retry::{self as retry, KnownTimingProfile};
use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::Value;

use reconciler_types::RespError;

use crate::concurrency::Limiter;

const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
const PAGE_KEY_FIELD: &str = "nextPageKey";
const TOTAL_COUNT_FIELD: &str = "totalCount";
const PAGE_SIZE_FIELD: &str = "pageSize";

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        if self.body.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str(&self.body)
        }
    }

    /// `Location` header's path tail, with any scheme+host prefix stripped.
    /// Some endpoints (e.g. SLO creation) return the new id only this way.
    pub fn location_id(&self) -> Option<String> {
        let location = self.headers.get("location")?;
        let tail = location.rsplit('/').next()?;
        Some(tail.to_string())
    }

    fn to_resp_error(&self, request_info: &str) -> RespError {
        RespError {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            request_info: request_info.to_string(),
        }
    }
}

/// Pagination envelope fields lifted out of a parsed response body, when the
/// body is a paginated listing response.
#[derive(Debug, Clone, Default)]
pub struct PageEnvelope {
    pub next_page_key: Option<String>,
    pub total_count: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageEnvelope {
    pub fn from_body(body: &Value) -> Self {
        Self {
            next_page_key: body
                .get(PAGE_KEY_FIELD)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            total_count: body.get(TOTAL_COUNT_FIELD).and_then(Value::as_u64),
            page_size: body.get(PAGE_SIZE_FIELD).and_then(Value::as_u64),
        }
    }
}

pub struct Transport {
    client: Client,
    base_url: String,
    auth_header_value: String,
    limiter: Limiter,
}

impl Transport {
    pub fn new(base_url: impl Into<String>, auth_header_value: impl Into<String>, concurrent_requests: i64) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            auth_header_value: auth_header_value.into(),
            limiter: Limiter::new(concurrent_requests),
        }
    }

    pub fn get(&self, path: &str) -> Result<RawResponse, RespError> {
        self.send(Method::GET, path, None)
    }

    pub fn post(&self, path: &str, body: &Value) -> Result<RawResponse, RespError> {
        self.send(Method::POST, path, Some(body))
    }

    pub fn put(&self, path: &str, body: &Value) -> Result<RawResponse, RespError> {
        self.send(Method::PUT, path, Some(body))
    }

    pub fn delete(&self, path: &str) -> Result<RawResponse, RespError> {
        self.send(Method::DELETE, path, None)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url.trim_end_matches('/'), path)
        }
    }

    /// Send a request, retrying on rate-limit (429) and on the documented
    /// known-timing transient patterns. Returns the final response (success or
    /// terminal failure) once retries are exhausted.
    fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<RawResponse, RespError> {
        let request_info = format!("{method} {path}");
        let mut rate_limit_iteration = 0u32;
        let mut known_timing_attempt = 0u32;
        let mut known_timing_profile: Option<KnownTimingProfile> = None;

        loop {
            let _permit = self.limiter.acquire();
            let response = self.send_once(&method, path, body, &request_info)?;

            if response.status == 429 {
                if rate_limit_iteration >= retry::MAX_RATE_LIMIT_ITERATIONS {
                    return Err(response.to_resp_error(&request_info));
                }
                let wait = rate_limit_wait_for(&response, rate_limit_iteration);
                std::thread::sleep(wait);
                rate_limit_iteration += 1;
                continue;
            }

            if !response.is_success() {
                let profile = known_timing_profile.or_else(|| {
                    retry::match_known_timing(&response.body, is_5xx_on_synthetic_or_app_api(path, response.status))
                });
                if let Some(profile) = profile {
                    if known_timing_attempt < profile.max_attempts() {
                        known_timing_profile = Some(profile);
                        known_timing_attempt += 1;
                        std::thread::sleep(profile.delay());
                        continue;
                    }
                }
                return Err(response.to_resp_error(&request_info));
            }

            return Ok(response);
        }
    }

    fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        request_info: &str,
    ) -> Result<RawResponse, RespError> {
        let mut builder = self
            .client
            .request(method.clone(), self.url(path))
            .header("Authorization", &self.auth_header_value)
            .header("Accept", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().map_err(|e| RespError {
            status: 0,
            headers: BTreeMap::new(),
            body: e.to_string(),
            request_info: request_info.to_string(),
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_ascii_lowercase(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body_text = response.text().map_err(|e| RespError {
            status,
            headers: BTreeMap::new(),
            body: e.to_string(),
            request_info: request_info.to_string(),
        })?;

        Ok(RawResponse {
            status,
            headers,
            body: body_text,
        })
    }

    /// Follow `nextPageKey` until exhausted, calling `extract_entries` on each
    /// page's parsed body. `legacy_style` controls whether the page key is
    /// appended to existing query params (legacy) or replaces them (api/v2).
    /// An empty page with a nonzero `totalCount` retries the same key up to 10
    /// times (observed replica-lag behaviour); a final `totalCount` mismatch is
    /// logged by the caller as a warning, not treated as an error here.
    pub fn paginate(
        &self,
        base_path: &str,
        legacy_style: bool,
        extract_entries: impl Fn(&Value) -> Vec<Value>,
    ) -> Result<PaginationResult, RespError> {
        let mut entries = Vec::new();
        let mut page_key: Option<String> = None;
        let mut total_count: Option<u64> = None;
        let mut replica_lag_retries = 0u32;

        loop {
            let path = match &page_key {
                None => base_path.to_string(),
                Some(key) if legacy_style && base_path.contains('?') => format!("{base_path}&nextPageKey={key}"),
                Some(key) if legacy_style => format!("{base_path}?nextPageKey={key}"),
                Some(key) => format!("{}?nextPageKey={key}", base_path.split('?').next().unwrap_or(base_path)),
            };

            let response = self.get(&path)?;
            let body = response.json().map_err(|e| RespError {
                status: response.status,
                headers: response.headers.clone(),
                body: e.to_string(),
                request_info: format!("GET {path}"),
            })?;

            let envelope = PageEnvelope::from_body(&body);
            if total_count.is_none() {
                total_count = envelope.total_count;
            }

            let page_entries = extract_entries(&body);
            if page_entries.is_empty() && envelope.total_count.unwrap_or(0) > 0 && replica_lag_retries < 10 {
                replica_lag_retries += 1;
                std::thread::sleep(std::time::Duration::from_millis(500));
                continue;
            }
            replica_lag_retries = 0;
            entries.extend(page_entries);

            match envelope.next_page_key {
                Some(next) => page_key = Some(next),
                None => break,
            }
        }

        Ok(PaginationResult {
            entries,
            total_count_mismatch: total_count.is_some_and(|tc| tc != 0 && tc as usize != entries.len()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PaginationResult {
    pub entries: Vec<Value>,
    /// True if the reported `totalCount` diverged from the sum of received
    /// entries. The caller should log a warning, not fail (`spec.md` §4.A).
    pub total_count_mismatch: bool,
}

/// Minimum wait used for the header-absent jittered backoff (`spec.md` §4.A).
const RATE_LIMIT_MIN_WAIT: std::time::Duration = std::time::Duration::from_secs(1);

/// When `X-RateLimit-Reset` is present, sleep until that instant (clamped to
/// `[1s, 60s]`). When it's absent, fall back to a randomized backoff window
/// that grows with the retry iteration, per `spec.md` §4.A.
fn rate_limit_wait_for(response: &RawResponse, iteration: u32) -> std::time::Duration {
    let now_micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64;
    let reset = response
        .headers
        .get(RATE_LIMIT_RESET_HEADER)
        .and_then(|v| v.parse::<u64>().ok());
    let _limit_hint = response
        .headers
        .get(RATE_LIMIT_LIMIT_HEADER)
        .and_then(|v| v.parse::<u32>().ok());
    match reset {
        Some(reset) => retry::rate_limit_wait(Some(reset), now_micros),
        None => retry::rate_limit_backoff(RATE_LIMIT_MIN_WAIT, iteration),
    }
}

/// The "long" known-timing profile also covers any 5xx from the synthetic
/// monitors or application-detection APIs, independent of body content.
fn is_5xx_on_synthetic_or_app_api(path: &str, status: u16) -> bool {
    (500..600).contains(&status) && (path.contains("/synthetic") || path.contains("/applications"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use tiny_http::{Response, Server};

    use super::*;

    fn with_server<F>(handler: F) -> (String, thread::JoinHandle<()>)
    where
        F: FnOnce(tiny_http::Request) + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").expect("bind server");
        let addr = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            let request = server.recv().expect("request");
            handler(request);
        });
        (addr, handle)
    }

    fn with_multi_server<F>(handler: F, request_count: usize) -> (String, thread::JoinHandle<()>)
    where
        F: Fn(tiny_http::Request) + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").expect("bind server");
        let addr = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            for _ in 0..request_count {
                let request = server.recv().expect("request");
                handler(request);
            }
        });
        (addr, handle)
    }

    #[test]
    fn get_reaches_a_real_server_and_returns_its_body() {
        let (base_url, handle) = with_server(|req| {
            assert_eq!(req.url(), "/api/v2/dashboards");
            req.respond(Response::from_string(r#"{"dashboards":[]}"#)).expect("respond");
        });
        let transport = Transport::new(base_url, "Bearer test-token", 4);
        let response = transport.get("/api/v2/dashboards").expect("get");
        assert!(response.is_success());
        assert_eq!(response.json().unwrap()["dashboards"], serde_json::json!([]));
        handle.join().expect("server thread");
    }

    #[test]
    fn send_retries_once_on_429_then_succeeds() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_handler = Arc::clone(&seen);
        let (base_url, handle) = with_multi_server(
            move |req| {
                let attempt = seen_handler.fetch_add(1, Ordering::SeqCst);
                if attempt == 0 {
                    let response = Response::from_string("{}")
                        .with_status_code(429)
                        .with_header("x-ratelimit-reset: 0".parse::<tiny_http::Header>().unwrap());
                    req.respond(response).expect("respond 429");
                } else {
                    req.respond(Response::from_string(r#"{"id":"abc"}"#)).expect("respond 200");
                }
            },
            2,
        );

        let transport = Transport::new(base_url, "Bearer test-token", 4);
        let response = transport.get("/api/v2/dashboards/abc").expect("eventually succeeds");
        assert!(response.is_success());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        handle.join().expect("server thread");
    }

    #[test]
    fn paginate_follows_next_page_key_across_pages() {
        let (base_url, handle) = with_multi_server(
            |req| {
                let page = serde_json::json!({
                    "values": [{"id": req.url()}],
                    "nextPageKey": if req.url() == "/api/v2/dashboards" { "page-2" } else { "" },
                });
                req.respond(Response::from_string(page.to_string())).expect("respond");
            },
            2,
        );

        let transport = Transport::new(base_url, "Bearer test-token", 4);
        let result = transport
            .paginate("/api/v2/dashboards", false, |body| {
                body["values"].as_array().cloned().unwrap_or_default()
            })
            .expect("paginate");

        assert_eq!(result.entries.len(), 2);
        handle.join().expect("server thread");
    }

    #[test]
    fn page_envelope_reads_documented_fields() {
        let body = serde_json::json!({
            "nextPageKey": "abc",
            "totalCount": 42,
            "pageSize": 10,
        });
        let envelope = PageEnvelope::from_body(&body);
        assert_eq!(envelope.next_page_key.as_deref(), Some("abc"));
        assert_eq!(envelope.total_count, Some(42));
        assert_eq!(envelope.page_size, Some(10));
    }

    #[test]
    fn empty_next_page_key_is_treated_as_absent() {
        let body = serde_json::json!({ "nextPageKey": "" });
        assert!(PageEnvelope::from_body(&body).next_page_key.is_none());
    }

    #[test]
    fn raw_response_success_range() {
        let ok = RawResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: String::new(),
        };
        assert!(ok.is_success());
        let not_found = RawResponse {
            status: 404,
            headers: BTreeMap::new(),
            body: String::new(),
        };
        assert!(!not_found.is_success());
    }

    #[test]
    fn location_id_strips_scheme_and_host() {
        let mut headers = BTreeMap::new();
        headers.insert("location".to_string(), "https://host/api/v2/slo/abc-123".to_string());
        let response = RawResponse {
            status: 201,
            headers,
            body: String::new(),
        };
        assert_eq!(response.location_id().as_deref(), Some("abc-123"));
    }

    #[test]
    fn is_5xx_on_synthetic_or_app_api_matches_documented_families() {
        assert!(is_5xx_on_synthetic_or_app_api("/api/v2/synthetic/monitors", 503));
        assert!(is_5xx_on_synthetic_or_app_api("/api/v2/applications/web", 500));
        assert!(!is_5xx_on_synthetic_or_app_api("/api/v2/dashboards", 500));
        assert!(!is_5xx_on_synthetic_or_app_api("/api/v2/synthetic/monitors", 404));
    }

    #[test]
    fn rate_limit_wait_for_falls_back_to_jittered_backoff_without_headers() {
        let response = RawResponse {
            status: 429,
            headers: BTreeMap::new(),
            body: String::new(),
        };
        let wait = rate_limit_wait_for(&response, 3);
        assert!(wait >= RATE_LIMIT_MIN_WAIT);
        assert!(wait <= RATE_LIMIT_MIN_WAIT.saturating_mul(2u32.pow(3)));
    }

    #[test]
    fn rate_limit_wait_for_uses_reset_header_when_present() {
        let mut headers = BTreeMap::new();
        headers.insert(RATE_LIMIT_RESET_HEADER.to_string(), "0".to_string());
        let response = RawResponse {
            status: 429,
            headers,
            body: String::new(),
        };
        // Reset in the past clamps to the 1s floor, same as the "absent" default.
        assert_eq!(rate_limit_wait_for(&response, 0), std::time::Duration::from_secs(1));
    }
}
