pub mod enrichment;
pub mod feed;
pub mod fetcher;
pub mod reconciler;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use enrichment::{Enricher, Enrichment};
pub use feed::{EntityFeed, SpaceDevsFeed};
pub use fetcher::{fetch_with_retry, RetryPolicy};
pub use reconciler::{ReconcileReport, Reconciler};
pub use scheduler::{CycleGuard, SyncScheduler, SyncSummary};
