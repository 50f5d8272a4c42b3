// HTTP access to the three upstream sites.
//
// Each site wants its own browser-like headers; the stats API in particular
// rejects requests without the nba.com origin/referer pair. Calls are
// sequential with no retry: a failed request surfaces as an `IngestError`
// and the runner moves on to the next source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::debug;

use crate::error::IngestError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";

/// Which upstream a request targets; selects the header set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Stats,
    Sportsbook,
    Injuries,
}

impl Site {
    fn headers(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Site::Stats => &[
                ("accept", "application/json, text/plain, */*"),
                ("accept-language", "en-US,en;q=0.9"),
                ("origin", "https://www.nba.com"),
                ("referer", "https://www.nba.com/"),
                ("x-nba-stats-origin", "stats"),
                ("x-nba-stats-token", "true"),
            ],
            Site::Sportsbook => &[
                ("accept", "*/*"),
                ("origin", "https://sportsbook.draftkings.com"),
                ("referer", "https://sportsbook.draftkings.com/"),
            ],
            Site::Injuries => &[("accept", "text/html,application/xhtml+xml")],
        }
    }
}

// ---------------------------------------------------------------------------
// Feed trait
// ---------------------------------------------------------------------------

/// Source of raw upstream payloads. The HTTP implementation is used in
/// production; tests substitute canned responses.
#[async_trait]
pub trait Feed: Send + Sync {
    async fn fetch_json(
        &self,
        site: Site,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Value, IngestError>;

    async fn fetch_text(&self, site: Site, url: &str) -> Result<String, IngestError>;
}

// ---------------------------------------------------------------------------
// HttpFeed
// ---------------------------------------------------------------------------

pub struct HttpFeed {
    http: reqwest::Client,
}

impl HttpFeed {
    /// Build a client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(IngestError::Client)?;
        Ok(Self { http })
    }

    async fn get(
        &self,
        site: Site,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<String, IngestError> {
        let mut headers = HeaderMap::new();
        for (name, value) in site.headers() {
            headers.insert(
                HeaderName::from_static(*name),
                HeaderValue::from_static(*value),
            );
        }

        debug!(url, ?site, params = query.len(), "GET");
        let response = self
            .http
            .get(url)
            .headers(headers)
            .query(query)
            .send()
            .await
            .map_err(|source| IngestError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(|source| IngestError::Http {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Feed for HttpFeed {
    async fn fetch_json(
        &self,
        site: Site,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Value, IngestError> {
        let body = self.get(site, url, query).await?;
        serde_json::from_str(&body).map_err(|source| IngestError::Json {
            url: url.to_string(),
            source,
        })
    }

    async fn fetch_text(&self, site: Site, url: &str) -> Result<String, IngestError> {
        self.get(site, url, &[]).await
    }
}
