// Upstream entity feed. The Space Devs launch library is the production
// source; tests substitute `testing::MockFeed`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use launchpad_common::{EntityKind, LaunchpadError, PageParams, RawEntity, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// One bounded page of entities of one kind. Network errors, timeouts and
/// non-2xx responses fail with [`LaunchpadError::Fetch`]. No retrying here.
#[async_trait]
pub trait EntityFeed: Send + Sync {
    async fn fetch_page(&self, kind: EntityKind, page: PageParams) -> Result<Vec<RawEntity>>;
}

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<Value>,
}

pub struct SpaceDevsFeed {
    client: reqwest::Client,
    base_url: String,
}

impl SpaceDevsFeed {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LaunchpadError::Config(format!("feed http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, kind: EntityKind) -> String {
        let path = match kind {
            EntityKind::Event => "2.0.0/event/upcoming/",
            EntityKind::Person => "2.2.0/astronaut/",
            EntityKind::Vehicle => "2.2.0/spacecraft/",
        };
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl EntityFeed for SpaceDevsFeed {
    async fn fetch_page(&self, kind: EntityKind, page: PageParams) -> Result<Vec<RawEntity>> {
        let fetch_err = |reason: String| LaunchpadError::Fetch { kind, reason };

        let url = self.endpoint(kind);
        debug!(%kind, %url, limit = page.limit, offset = page.offset, "Fetching feed page");

        let resp = self
            .client
            .get(&url)
            .query(&[("limit", page.limit), ("offset", page.offset)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fetch_err("request timed out".to_string())
                } else {
                    fetch_err(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(fetch_err(format!("HTTP {status}: {}", body.trim())));
        }

        let page: Page = resp
            .json()
            .await
            .map_err(|e| fetch_err(format!("malformed response: {e}")))?;

        Ok(page
            .results
            .into_iter()
            .filter_map(|item| {
                let raw = normalize(kind, item);
                if raw.is_none() {
                    warn!(%kind, "Skipping feed item without id or name");
                }
                raw
            })
            .collect())
    }
}

/// Map one upstream object to a [`RawEntity`]. Numeric ids become strings; a
/// person's `bio` is their description; events carry their `date`.
pub fn normalize(kind: EntityKind, item: Value) -> Option<RawEntity> {
    let external_id = match item.get("id")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => return None,
    };
    let name = item.get("name")?.as_str()?.to_string();

    let text = |field: &str| {
        item.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let description = match kind {
        EntityKind::Person => text("bio"),
        _ => text("description"),
    };
    let occurs_at = match kind {
        EntityKind::Event => text("date")
            .and_then(|d| DateTime::parse_from_rfc3339(&d).ok())
            .map(|d| d.with_timezone(&Utc)),
        _ => None,
    };

    Some(RawEntity {
        external_id,
        name,
        description,
        occurs_at,
        metadata: item,
    })
}
