use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, ORIGIN, REFERER};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::TrackerError;
use crate::types::{Profile, RawActivity};

/// Browser user agent; the profile endpoint rejects unknown clients.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Source of activity pages for one account.
#[async_trait]
pub trait ActivityFeedClient: Send + Sync {
    /// One page of `limit` activities starting at `offset`, newest first.
    async fn fetch_page(
        &self,
        user: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<RawActivity>, TrackerError>;
}

/// Pagination bounds.
#[derive(Debug, Clone, Copy)]
pub struct PageOptions {
    pub page_size: u32,
    /// Hard ceiling on the number of activities kept.
    pub max_items: usize,
    pub page_timeout: Duration,
}

impl From<&ApiConfig> for PageOptions {
    fn from(config: &ApiConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            max_items: config.max_items,
            page_timeout: Duration::from_secs(config.page_timeout_secs),
        }
    }
}

/// Fetch every activity page for `user`.
pub async fn fetch_all_activity<C>(
    client: &C,
    user: &str,
    opts: &PageOptions,
) -> Result<Vec<RawActivity>, TrackerError>
where
    C: ActivityFeedClient + ?Sized,
{
    fetch_all_activity_while(client, user, opts, || true).await
}

/// Fetch activity pages sequentially until a short page, a failed page after
/// data was already received, or the item ceiling.
///
/// `still_wanted` is checked before every page and once at the end; when it
/// returns false the pages fetched so far are discarded.
pub async fn fetch_all_activity_while<C, F>(
    client: &C,
    user: &str,
    opts: &PageOptions,
    still_wanted: F,
) -> Result<Vec<RawActivity>, TrackerError>
where
    C: ActivityFeedClient + ?Sized,
    F: Fn() -> bool,
{
    let limit = opts.page_size.max(1);
    let mut all: Vec<RawActivity> = Vec::new();
    let mut offset: u32 = 0;

    loop {
        if !still_wanted() {
            return Err(TrackerError::Superseded);
        }
        debug!(
            "Fetching activities {} - {}",
            offset,
            offset.saturating_add(limit)
        );

        let result = match timeout(opts.page_timeout, client.fetch_page(user, limit, offset)).await
        {
            Ok(result) => result,
            Err(_) => Err(TrackerError::Timeout(opts.page_timeout)),
        };
        let page = match result {
            Ok(page) => page,
            Err(e) if all.is_empty() => {
                return Err(if e.is_not_found() {
                    TrackerError::NoActivityFound
                } else {
                    e
                });
            }
            Err(e) => {
                warn!("Page fetch failed at offset {offset}, stopping pagination: {e}");
                break;
            }
        };

        let count = page.len();
        all.extend(page);

        if count < limit as usize {
            break;
        }
        if all.len() >= opts.max_items {
            warn!("Hit safety limit of {} items, stopping", opts.max_items);
            break;
        }
        let Some(next) = offset.checked_add(limit) else {
            warn!("Offset would overflow after {offset}, stopping");
            break;
        };
        offset = next;
    }

    if !still_wanted() {
        return Err(TrackerError::Superseded);
    }
    if all.is_empty() {
        return Err(TrackerError::NoActivityFound);
    }
    all.truncate(opts.max_items);
    info!("Total activities fetched: {}", all.len());
    Ok(all)
}

/// Decode an activity page body. The body must be a JSON array; each element
/// is decoded leniently so one malformed record cannot fail the page.
pub fn parse_page(body: &[u8]) -> Result<Vec<RawActivity>, TrackerError> {
    let values: Vec<serde_json::Value> = serde_json::from_slice(body)?;
    Ok(values.into_iter().map(RawActivity::from_value).collect())
}

/// Data-API backed feed client.
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    http: reqwest::Client,
    data_api_base: String,
    profile_api_base: String,
    /// Bound on the profile request, which runs outside the pagination loop.
    request_timeout: Duration,
}

impl HttpFeedClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            data_api_base: config.data_api_base.trim_end_matches('/').to_string(),
            profile_api_base: config.profile_api_base.clone(),
            request_timeout: Duration::from_secs(config.page_timeout_secs),
        })
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Public profile for `address`. Callers treat failure as "no profile".
    pub async fn fetch_profile(&self, address: &str) -> Result<Profile, TrackerError> {
        match timeout(self.request_timeout, self.request_profile(address)).await {
            Ok(result) => result,
            Err(_) => Err(TrackerError::Timeout(self.request_timeout)),
        }
    }

    async fn request_profile(&self, address: &str) -> Result<Profile, TrackerError> {
        let resp = self
            .http
            .get(&self.profile_api_base)
            .query(&[("address", address)])
            .header(REFERER, "https://polymarket.com/")
            .header(ORIGIN, "https://polymarket.com")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TrackerError::Http { status });
        }
        let body = resp.bytes().await?;
        let profile: Profile = serde_json::from_slice(&body)?;
        debug!("Fetched profile for {address}");
        Ok(profile)
    }
}

#[async_trait]
impl ActivityFeedClient for HttpFeedClient {
    async fn fetch_page(
        &self,
        user: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<RawActivity>, TrackerError> {
        let resp = self
            .http
            .get(format!("{}/activity", self.data_api_base))
            .query(&[
                ("user", user.to_lowercase()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TrackerError::Http { status });
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.contains("application/json") {
            return Err(TrackerError::Decode(format!(
                "expected JSON, got content-type {content_type:?}"
            )));
        }

        let body = resp.bytes().await?;
        let page = parse_page(&body)?;
        debug!("Offset {offset}: got {} activities", page.len());
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// What the scripted feed does for one request.
    #[derive(Debug, Clone, Copy)]
    enum Step {
        Items(usize),
        Status(u16),
        Hang,
    }

    struct ScriptedFeed {
        steps: Vec<Step>,
        offsets: Mutex<Vec<u32>>,
    }

    impl ScriptedFeed {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps,
                offsets: Mutex::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<u32> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActivityFeedClient for ScriptedFeed {
        async fn fetch_page(
            &self,
            _user: &str,
            _limit: u32,
            offset: u32,
        ) -> Result<Vec<RawActivity>, TrackerError> {
            let call = {
                let mut offsets = self.offsets.lock().unwrap();
                offsets.push(offset);
                offsets.len() - 1
            };
            match self.steps.get(call).copied().unwrap_or(Step::Items(0)) {
                Step::Items(n) => Ok((0..n)
                    .map(|i| RawActivity {
                        market_id: Some(format!("m{}", offset as usize + i)),
                        ..Default::default()
                    })
                    .collect()),
                Step::Status(code) => Err(TrackerError::Http {
                    status: StatusCode::from_u16(code).unwrap(),
                }),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn opts() -> PageOptions {
        PageOptions {
            page_size: 500,
            max_items: 50_000,
            page_timeout: Duration::from_millis(50),
        }
    }

    // ── stop rules ─────────────────────────────────────────────────

    #[tokio::test]
    async fn stops_on_short_page() {
        let feed = ScriptedFeed::new(vec![Step::Items(500), Step::Items(500), Step::Items(120)]);
        let all = fetch_all_activity(&feed, "0xabc", &opts()).await.unwrap();
        assert_eq!(all.len(), 1120);
        assert_eq!(feed.offsets(), vec![0, 500, 1000]);
    }

    #[tokio::test]
    async fn stops_on_empty_page_after_full_pages() {
        let feed = ScriptedFeed::new(vec![Step::Items(500), Step::Items(0)]);
        let all = fetch_all_activity(&feed, "0xabc", &opts()).await.unwrap();
        assert_eq!(all.len(), 500);
        assert_eq!(feed.offsets(), vec![0, 500]);
    }

    #[tokio::test]
    async fn later_error_keeps_partial_results() {
        let feed = ScriptedFeed::new(vec![Step::Items(500), Step::Status(500), Step::Items(500)]);
        let all = fetch_all_activity(&feed, "0xabc", &opts()).await.unwrap();
        assert_eq!(all.len(), 500);
        assert_eq!(feed.offsets(), vec![0, 500]);
    }

    #[tokio::test]
    async fn later_timeout_keeps_partial_results() {
        let feed = ScriptedFeed::new(vec![Step::Items(500), Step::Hang]);
        let all = fetch_all_activity(&feed, "0xabc", &opts()).await.unwrap();
        assert_eq!(all.len(), 500);
    }

    #[tokio::test]
    async fn first_page_failure_is_fatal() {
        let feed = ScriptedFeed::new(vec![Step::Status(502)]);
        let err = fetch_all_activity(&feed, "0xabc", &opts()).await.unwrap_err();
        assert!(matches!(err, TrackerError::Http { status } if status.as_u16() == 502));
    }

    #[tokio::test]
    async fn first_page_timeout_is_fatal() {
        let feed = ScriptedFeed::new(vec![Step::Hang]);
        let err = fetch_all_activity(&feed, "0xabc", &opts()).await.unwrap_err();
        assert!(matches!(err, TrackerError::Timeout(_)));
    }

    #[tokio::test]
    async fn first_page_not_found_or_empty_means_no_activity() {
        let feed = ScriptedFeed::new(vec![Step::Status(404)]);
        let err = fetch_all_activity(&feed, "0xabc", &opts()).await.unwrap_err();
        assert!(matches!(err, TrackerError::NoActivityFound));

        let feed = ScriptedFeed::new(vec![Step::Items(0)]);
        let err = fetch_all_activity(&feed, "0xabc", &opts()).await.unwrap_err();
        assert!(matches!(err, TrackerError::NoActivityFound));
    }

    #[tokio::test]
    async fn ceiling_bounds_fetching() {
        let feed = ScriptedFeed::new(vec![Step::Items(100); 50]);
        let opts = PageOptions {
            page_size: 100,
            max_items: 250,
            ..opts()
        };
        let all = fetch_all_activity(&feed, "0xabc", &opts).await.unwrap();
        assert_eq!(all.len(), 250);
        assert_eq!(feed.offsets(), vec![0, 100, 200]);
    }

    #[tokio::test]
    async fn unwanted_fetch_is_discarded() {
        let feed = ScriptedFeed::new(vec![Step::Items(500), Step::Items(500), Step::Items(10)]);
        let checks = AtomicUsize::new(0);
        // Wanted for the first two checks only.
        let err = fetch_all_activity_while(&feed, "0xabc", &opts(), || {
            checks.fetch_add(1, Ordering::SeqCst) < 2
        })
        .await
        .unwrap_err();
        assert!(matches!(err, TrackerError::Superseded));
        assert_eq!(feed.offsets(), vec![0, 500]);
    }

    // ── page decoding ──────────────────────────────────────────────

    #[test]
    fn malformed_fields_do_not_fail_the_page() {
        let body = br#"[
            {"timestamp":1700000000,"side":"BUY","conditionId":"m1"},
            {"timestamp":1700000001,"title":42,"outcome":1,"size":true,"side":null}
        ]"#;
        let page = parse_page(body).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].condition_id.as_deref(), Some("m1"));

        let second = crate::aggregator::normalize(&page[1]);
        assert_eq!(second.timestamp.timestamp(), 1_700_000_001);
        assert_eq!(second.market_question, crate::types::UNKNOWN_MARKET);
        assert_eq!(second.outcome, None);
        assert_eq!(second.size, None);
        assert_eq!(second.side, crate::types::Side::Unknown);
    }

    #[test]
    fn non_object_elements_count_toward_page_length() {
        let page = parse_page(br#"[{"title":"Will it rain?"}, null, 7, [1, 2]]"#).unwrap();
        assert_eq!(page.len(), 4);
        assert_eq!(page[0].title.as_deref(), Some("Will it rain?"));
        assert!(page[1..].iter().all(|raw| raw.title.is_none() && raw.timestamp.is_none()));
    }

    #[test]
    fn non_array_body_is_a_decode_error() {
        let err = parse_page(br#"{"error":"bad"}"#).unwrap_err();
        assert!(matches!(err, TrackerError::Decode(_)));
    }

    // ── profile ────────────────────────────────────────────────────

    #[tokio::test]
    async fn stalled_profile_request_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // Accept and hold the connection without ever answering.
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = ApiConfig {
            profile_api_base: format!("http://{addr}/api/profile/userData"),
            ..ApiConfig::default()
        };
        let client = HttpFeedClient::new(&config)
            .unwrap()
            .with_request_timeout(Duration::from_millis(100));
        let err = client.fetch_profile("0xabc").await.unwrap_err();
        assert!(matches!(err, TrackerError::Timeout(d) if d == Duration::from_millis(100)));
        server.abort();
    }

    // ── config ─────────────────────────────────────────────────────

    #[test]
    fn page_options_from_config() {
        let config = ApiConfig {
            page_size: 0,
            ..ApiConfig::default()
        };
        let opts = PageOptions::from(&config);
        assert_eq!(opts.page_size, 1);
        assert_eq!(opts.max_items, 50_000);
        assert_eq!(opts.page_timeout, Duration::from_secs(30));
    }
}
