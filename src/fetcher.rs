use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use tracing::{info, warn};

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::parser::{dedupe_records, parse_odds_page};
use crate::types::Snapshot;

#[derive(Debug, Default)]
pub struct FetchStats {
    pub pages: usize,
    pub rows_seen: usize,
    pub rows_skipped: usize,
    pub cells_unpriced: usize,
    /// Records dropped because the same outcome appeared on more than one page.
    pub duplicates_dropped: usize,
    pub records: usize,
    pub matches: usize,
}

/// HTTP side of the odds source: pulls every configured league page and
/// builds one snapshot from them. All pages must succeed.
pub struct OddsFetcher {
    client: reqwest::Client,
    cfg: FetchConfig,
}

impl OddsFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            cfg: cfg.clone(),
        })
    }

    /// Fetch and parse every source page into a snapshot for `date`.
    pub async fn collect(
        &self,
        date: NaiveDate,
        collected_at: DateTime<Utc>,
    ) -> std::result::Result<(Snapshot, FetchStats), FetchError> {
        let mut stats = FetchStats::default();
        let mut records = Vec::new();

        for (i, url) in self.cfg.source_urls.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(self.cfg.retry_delay_ms)).await;
            }
            info!("[FETCH] page {}/{}: {url}", i + 1, self.cfg.source_urls.len());

            let body = self.fetch_page(url).await?;
            let page = parse_odds_page(&body, url, collected_at)?;

            info!(
                "[FETCH] {url}: {} records from {} rows ({} skipped, {} unpriced cells)",
                page.records.len(),
                page.rows_seen,
                page.rows_skipped,
                page.cells_unpriced,
            );
            stats.pages += 1;
            stats.rows_seen += page.rows_seen;
            stats.rows_skipped += page.rows_skipped;
            stats.cells_unpriced += page.cells_unpriced;
            records.extend(page.records);
        }

        let (records, dropped) = dedupe_records(records);
        if dropped > 0 {
            warn!("[FETCH] dropped {dropped} duplicate odds seen on more than one page");
        }
        stats.duplicates_dropped = dropped;

        let snapshot = Snapshot::new(date, records)?;
        stats.records = snapshot.len();
        stats.matches = snapshot.match_count();
        Ok((snapshot, stats))
    }

    /// GET a page, retrying transient failures up to `max_retries` attempts.
    pub async fn fetch_page(&self, url: &str) -> std::result::Result<String, FetchError> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.cfg.max_retries => {
                    warn!("[FETCH] attempt {attempt}/{} failed for {url}: {e}", self.cfg.max_retries);
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(self.cfg.retry_delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<String, FetchError> {
        let classify = |e| FetchError::from_reqwest(url, self.cfg.timeout_secs, e);
        self.client
            .get(url)
            .send()
            .await
            .map_err(classify)?
            .error_for_status()
            .map_err(classify)?
            .text()
            .await
            .map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::LEAGUE_PAGE;
    use axum::{http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn fetch_cfg(urls: Vec<String>) -> FetchConfig {
        FetchConfig {
            source_urls: urls,
            timeout_secs: 1,
            max_retries: 3,
            retry_delay_ms: 10,
            user_agent: "odds-tracker-test".to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn collects_snapshot_across_pages() {
        let base = serve(
            Router::new()
                .route("/epl", get(|| async { LEAGUE_PAGE }))
                .route("/epl-copy", get(|| async { LEAGUE_PAGE })),
        )
        .await;
        let fetcher =
            OddsFetcher::new(&fetch_cfg(vec![format!("{base}/epl"), format!("{base}/epl-copy")])).unwrap();

        let (snapshot, stats) = fetcher.collect(today(), Utc::now()).await.unwrap();
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.duplicates_dropped, 7);
        assert_eq!(snapshot.len(), 7);
        assert_eq!(stats.matches, 2);
        assert_eq!(snapshot.date(), today());
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let base = serve(Router::new().route(
            "/gone",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NOT_FOUND
                }
            }),
        ))
        .await;
        let fetcher = OddsFetcher::new(&fetch_cfg(vec![format!("{base}/gone")])).unwrap();

        let err = fetcher.fetch_page(&format!("{base}/gone")).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_reported() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let base = serve(Router::new().route(
            "/flaky",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::SERVICE_UNAVAILABLE
                }
            }),
        ))
        .await;
        let fetcher = OddsFetcher::new(&fetch_cfg(vec![format!("{base}/flaky")])).unwrap();

        let err = fetcher.fetch_page(&format!("{base}/flaky")).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn slow_pages_time_out() {
        let base = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                LEAGUE_PAGE
            }),
        ))
        .await;
        let mut cfg = fetch_cfg(vec![format!("{base}/slow")]);
        cfg.max_retries = 1;
        let fetcher = OddsFetcher::new(&cfg).unwrap();

        let err = fetcher.fetch_page(&format!("{base}/slow")).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { secs: 1, .. }));
    }

    #[tokio::test]
    async fn one_failing_page_fails_the_whole_collection() {
        let base = serve(Router::new().route("/epl", get(|| async { LEAGUE_PAGE }))).await;
        let mut cfg = fetch_cfg(vec![format!("{base}/epl"), format!("{base}/missing")]);
        cfg.max_retries = 1;
        let fetcher = OddsFetcher::new(&cfg).unwrap();

        let err = fetcher.collect(today(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }
}
