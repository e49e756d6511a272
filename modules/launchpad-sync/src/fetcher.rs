use std::time::Duration;

use launchpad_common::{EntityKind, LaunchpadError, PageParams, RawEntity, Result, Shutdown};
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::feed::EntityFeed;

/// Bounded retry with linear backoff: the wait after failed attempt `n` is
/// `n * base_delay`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RetryPolicy {
    #[builder(default = 3)]
    pub max_attempts: u32,
    #[builder(default = Duration::from_secs(15 * 60))]
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Fetch one page, retrying failures per `policy`.
///
/// Fails with [`LaunchpadError::MaxRetriesExceeded`] once every attempt has
/// failed, or [`LaunchpadError::Cancelled`] if shutdown fires during a backoff.
pub async fn fetch_with_retry(
    feed: &dyn EntityFeed,
    kind: EntityKind,
    page: PageParams,
    policy: &RetryPolicy,
    shutdown: &mut Shutdown,
) -> Result<Vec<RawEntity>> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match feed.fetch_page(kind, page).await {
            Ok(entities) => {
                info!(%kind, attempt, count = entities.len(), "Feed page fetched");
                return Ok(entities);
            }
            Err(e) => e,
        };

        if attempt >= max_attempts {
            warn!(%kind, attempts = attempt, error = %err, "Feed fetch failed, giving up");
            return Err(LaunchpadError::MaxRetriesExceeded {
                kind,
                attempts: attempt,
                last_error: err.to_string(),
            });
        }

        let backoff = policy.backoff(attempt);
        warn!(
            %kind,
            attempt,
            backoff_secs = backoff.as_secs(),
            error = %err,
            "Feed fetch failed, backing off"
        );
        if !shutdown.sleep(backoff).await {
            return Err(LaunchpadError::Cancelled);
        }
        attempt += 1;
    }
}
