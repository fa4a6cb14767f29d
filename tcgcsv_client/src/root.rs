use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{ Duration, Instant };

use governor::{ clock::DefaultClock, state::{ InMemoryState, NotKeyed }, Quota, RateLimiter };
use reqwest::{ header::{ HeaderValue, ACCEPT }, Client, StatusCode };
use serde::{ de::DeserializeOwned, Deserialize, Serialize };
use serde_json::Value;
use thiserror::Error;
use tracing::{ debug, info, warn };

/// One Piece Card Game category on the TCGplayer mirror.
pub const ONE_PIECE_CATEGORY_ID: i64 = 68;

#[derive(Clone, Debug)]
pub struct TcgConfig {
    pub base_url: String,
    pub category_id: i64,
    pub rps: u32,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for TcgConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tcgcsv.com/tcgplayer".into(),
            category_id: ONE_PIECE_CATEGORY_ID,
            rps: 5,
            retry_attempts: 3,
            retry_base_delay_ms: 500,
            timeout_secs: 30,
            user_agent: concat!("tcgcsv-client/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum TcgError {
    #[error("http {status}: {body}")] Http {
        status: u16,
        body: String,
    },
    #[error("network error")] Net(#[from] reqwest::Error),
    #[error("invalid json")] Json(#[from] serde_json::Error),
    #[error("upstream reported failure: {0}")] Upstream(String),
}

/// A catalog group (one set release) as listed under a category.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TcgGroup {
    pub group_id: i64,
    pub name: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub is_supplemental: bool,
    #[serde(default)]
    pub published_on: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// Response wrapper shared by every listing endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    errors: Vec<Value>,
    #[serde(default)]
    results: Vec<Value>,
}

/// Rows of one listing that decoded, plus how many were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub rows: Vec<T>,
    pub dropped: usize,
}

fn default_success() -> bool {
    true
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct TcgCsvClient {
    http: Client,
    cfg: Arc<TcgConfig>,
    limiter: Arc<DirectLimiter>,
}

impl TcgCsvClient {
    pub fn new(cfg: TcgConfig) -> Result<Self, TcgError> {
        let http = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()?;
        let rps = NonZeroU32::new(cfg.rps).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(rps));
        Ok(Self {
            http,
            cfg: Arc::new(cfg),
            limiter: Arc::new(limiter),
        })
    }

    pub fn config(&self) -> &TcgConfig {
        &self.cfg
    }

    /// Absolute URL for a path below the configured category.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.category_id,
            path.trim_start_matches('/')
        )
    }

    pub async fn groups(&self) -> Result<Vec<TcgGroup>, TcgError> {
        self.fetch_results("groups").await
    }

    /// Product listing for one group. The row type is left to the caller so the
    /// reconciliation layer can keep its own lenient shapes.
    pub async fn products<T: DeserializeOwned>(&self, group_id: i64) -> Result<Vec<T>, TcgError> {
        self.fetch_results(&format!("{group_id}/products")).await
    }

    pub async fn prices<T: DeserializeOwned>(&self, group_id: i64) -> Result<Vec<T>, TcgError> {
        self.fetch_results(&format!("{group_id}/prices")).await
    }

    pub async fn fetch_results<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, TcgError> {
        let body = self.get_text(path).await?;
        decode_envelope(&body)
    }

    async fn get_text(&self, path: &str) -> Result<String, TcgError> {
        let url = self.endpoint(path);
        let max_attempts = self.cfg.retry_attempts.max(1);
        let mut delay = Duration::from_millis(self.cfg.retry_base_delay_ms.max(1));
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.limiter.until_ready().await;
            let t0 = Instant::now();
            debug!(url=%url, attempt, "tcgcsv request");

            let resp = match
                self.http.get(&url).header(ACCEPT, HeaderValue::from_static("application/json")).send().await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(attempt, url=%url, error=?e, "tcgcsv network error");
                    if attempt >= max_attempts {
                        return Err(TcgError::Net(e));
                    }
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    continue;
                }
            };

            let status = resp.status();
            let body = match resp.text().await {
                Ok(b) => b,
                Err(e) => {
                    warn!(attempt, url=%url, error=?e, "tcgcsv body read error");
                    if attempt >= max_attempts {
                        return Err(TcgError::Net(e));
                    }
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    continue;
                }
            };

            let elapsed = t0.elapsed().as_millis();
            info!(url=%url, status=%status.as_u16(), body_len=body.len(), elapsed_ms=%elapsed, "tcgcsv response");

            if status.is_success() {
                return Ok(body);
            }
            if is_retryable(status) && attempt < max_attempts {
                warn!(status=%status.as_u16(), attempt, "tcgcsv server error, will retry");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                continue;
            }
            let sample_body = body.get(..200).unwrap_or(&body).to_string();
            return Err(TcgError::Http { status: status.as_u16(), body: sample_body });
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Decode a listing body. Accepts the usual `{success, errors, results}` envelope
/// and also a bare JSON array. Rows that do not fit `T` are dropped one by one;
/// only an unreadable body or an upstream failure is an error.
pub fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, TcgError> {
    decode_listing(body).map(|listing| listing.rows)
}

pub fn decode_listing<T: DeserializeOwned>(body: &str) -> Result<Listing<T>, TcgError> {
    let value: Value = serde_json::from_str(body)?;
    let rows = match value {
        Value::Array(rows) => rows,
        other => unwrap_envelope(serde_json::from_value(other)?)?,
    };

    let total = rows.len();
    let rows: Vec<T> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(idx, row)| match serde_json::from_value::<T>(row) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(row = idx, error = %e, "listing row dropped");
                None
            }
        })
        .collect();
    let dropped = total - rows.len();
    if dropped > 0 {
        warn!(dropped, kept = rows.len(), "listing had malformed rows");
    }
    Ok(Listing { rows, dropped })
}

fn unwrap_envelope(env: Envelope) -> Result<Vec<Value>, TcgError> {
    if !env.success {
        let joined = env.errors
            .iter()
            .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(TcgError::Upstream(if joined.is_empty() { "success=false".into() } else { joined }));
    }
    Ok(env.results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_category_and_path() {
        let client = TcgCsvClient::new(TcgConfig {
            base_url: "https://example.test/tcgplayer/".into(),
            ..TcgConfig::default()
        }).unwrap();
        assert_eq!(client.endpoint("groups"), "https://example.test/tcgplayer/68/groups");
        assert_eq!(client.endpoint("/3188/prices"), "https://example.test/tcgplayer/68/3188/prices");
    }

    #[test]
    fn decodes_group_envelope() {
        let body =
            r#"{"totalItems":1,"success":true,"errors":[],"results":[
            {"groupId":3188,"name":"Romance Dawn","abbreviation":"OP01","isSupplemental":false,
             "publishedOn":"2022-12-02T00:00:00","categoryId":68}]}"#;
        let groups: Vec<TcgGroup> = decode_envelope(body).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_id, 3188);
        assert_eq!(groups[0].abbreviation.as_deref(), Some("OP01"));
    }

    #[test]
    fn decodes_bare_array() {
        let rows: Vec<Value> = decode_envelope(r#"[{"productId":1},{"productId":2}]"#).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn malformed_rows_are_dropped_not_fatal() {
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Row {
            product_id: i64,
        }
        let listing: Listing<Row> = decode_listing(
            r#"{"success":true,"results":[{"productId":1},{"productId":null},{"name":"no id"}]}"#
        ).unwrap();
        assert_eq!(listing.rows.len(), 1);
        assert_eq!(listing.rows[0].product_id, 1);
        assert_eq!(listing.dropped, 2);

        let bare: Vec<Row> = decode_envelope(r#"[{"productId":"x"},{"productId":7}]"#).unwrap();
        assert_eq!(bare.len(), 1);
    }

    #[test]
    fn json_error_does_not_repeat_its_cause() {
        let err = decode_envelope::<Value>("{not json").unwrap_err();
        assert_eq!(err.to_string(), "invalid json");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn upstream_failure_is_reported() {
        let err = decode_envelope::<Value>(
            r#"{"success":false,"errors":["group not found"],"results":[]}"#
        ).unwrap_err();
        match err {
            TcgError::Upstream(msg) => assert_eq!(msg, "group not found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn only_server_errors_and_throttling_retry() {
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }
}
