// Merges one upstream batch into the store, enriching only entities that
// are new or still lack their derived fields.

use std::sync::Arc;

use chrono::Utc;
use launchpad_common::{
    fields, EntityKind, EntityRecord, ExistingRecords, LaunchpadError, PageParams, RawEntity,
    Result, Shutdown,
};
use launchpad_store::typed::find_all_as;
use launchpad_store::{Collection, DocumentStore, Update};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use typed_builder::TypedBuilder;

use crate::enrichment::{Enricher, Enrichment};
use crate::feed::EntityFeed;
use crate::fetcher::{fetch_with_retry, RetryPolicy};

const EVENT_PAGE_LIMIT: u32 = 50;
const CRAWL_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub fetched: usize,
    /// Records created by this run.
    pub inserted: usize,
    /// Records whose derived fields were generated by this run.
    pub enriched: usize,
    /// Records left unenriched or unwritten because of an error.
    pub failed: usize,
}

/// What a fetched entity needs, decided against the existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// First sighting: enrich and seed social defaults.
    Create,
    /// Existing but missing or malformed derived fields.
    Enrich,
    /// Refresh upstream fields only.
    Refresh,
}

fn decide(existing: Option<&EntityRecord>) -> Action {
    match existing {
        None => Action::Create,
        Some(record) if !record.is_enriched() => Action::Enrich,
        Some(_) => Action::Refresh,
    }
}

/// Events are a rolling upcoming window; people and vehicles are crawled
/// incrementally past what is already stored.
pub fn page_plan(kind: EntityKind, persisted: usize) -> PageParams {
    match kind {
        EntityKind::Event => PageParams {
            limit: EVENT_PAGE_LIMIT,
            offset: 0,
        },
        EntityKind::Person | EntityKind::Vehicle => PageParams {
            limit: CRAWL_PAGE_LIMIT,
            offset: u32::try_from(persisted).unwrap_or(u32::MAX),
        },
    }
}

/// Field-scoped upsert for one entity. Upstream fields and any fresh derived
/// fields are `$set`; social state is only seeded on insert so concurrent
/// user writes are never overwritten.
fn entity_update(kind: EntityKind, raw: &RawEntity, enrichment: Option<&Enrichment>) -> Update {
    let mut update = Update::new()
        .set(fields::KIND, json!(kind))
        .set(fields::NAME, raw.name.clone())
        .set(fields::DESCRIPTION, raw.description.clone())
        .set(fields::OCCURS_AT, json!(raw.occurs_at))
        .set(fields::METADATA, raw.metadata.clone())
        .set(fields::SYNCED_AT, json!(Utc::now()));

    if let Some(enrichment) = enrichment {
        update = update
            .set(fields::DETAILED_INFO, enrichment.detailed_info.clone())
            .set(fields::KEYWORDS, json!(enrichment.keywords));
    }

    if kind.has_social_state() {
        update = update
            .set_on_insert(fields::INTEREST_COUNT, 0)
            .set_on_insert(fields::INTERESTED_BY, Value::Array(Vec::new()))
            .set_on_insert(fields::COMMENTS, Value::Array(Vec::new()))
            .set_on_insert(fields::THREAD_UUIDS, Value::Array(Vec::new()));
    }
    update
}

#[derive(Clone, TypedBuilder)]
pub struct Reconciler {
    store: Arc<dyn DocumentStore>,
    feed: Arc<dyn EntityFeed>,
    enricher: Enricher,
    #[builder(default)]
    retry: RetryPolicy,
}

impl Reconciler {
    /// Existing records of `kind` keyed by external id.
    pub async fn load_existing(&self, kind: EntityKind) -> Result<ExistingRecords> {
        let records: Vec<EntityRecord> = find_all_as(self.store.as_ref(), Collection::Entities(kind)).await?;
        Ok(records
            .into_iter()
            .map(|r| (r.external_id.clone(), r))
            .collect())
    }

    /// Fetch, diff and persist one kind.
    ///
    /// Fetch failures propagate and leave the store untouched. Per-entity
    /// enrichment or write failures are logged and counted, and the entity
    /// is retried on the next run.
    pub async fn reconcile(&self, kind: EntityKind, shutdown: &mut Shutdown) -> Result<ReconcileReport> {
        let existing = self.load_existing(kind).await?;
        let page = page_plan(kind, existing.len());
        info!(%kind, existing = existing.len(), offset = page.offset, "Reconciling");

        let batch = fetch_with_retry(self.feed.as_ref(), kind, page, &self.retry, shutdown).await?;
        let mut report = ReconcileReport {
            fetched: batch.len(),
            ..Default::default()
        };

        for raw in &batch {
            let action = decide(existing.get(&raw.external_id));

            let mut enrich_failed = false;
            let enrichment = match action {
                Action::Refresh => None,
                Action::Create | Action::Enrich => match self.enricher.enrich(kind, raw, shutdown).await {
                    Ok(enrichment) => Some(enrichment),
                    Err(LaunchpadError::Cancelled) => return Err(LaunchpadError::Cancelled),
                    Err(e) => {
                        warn!(%kind, external_id = %raw.external_id, error = %e, "Enrichment failed, storing upstream fields only");
                        report.failed += 1;
                        enrich_failed = true;
                        None
                    }
                },
            };

            let update = entity_update(kind, raw, enrichment.as_ref());
            match self
                .store
                .upsert(Collection::Entities(kind), fields::EXTERNAL_ID, &raw.external_id, update)
                .await
            {
                Ok(result) => {
                    if result.upserted_id.is_some() {
                        report.inserted += 1;
                    }
                    if enrichment.is_some() {
                        report.enriched += 1;
                    }
                }
                Err(e) => {
                    error!(%kind, external_id = %raw.external_id, error = %e, "Failed to persist entity");
                    if !enrich_failed {
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            %kind,
            fetched = report.fetched,
            inserted = report.inserted,
            enriched = report.enriched,
            failed = report.failed,
            "Reconcile complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{raw_entity, MockFeed, MockGenerator};
    use launchpad_store::MemoryStore;

    fn record(kind: EntityKind, keywords: usize, info: Option<&str>) -> EntityRecord {
        EntityRecord {
            record_id: "r1".into(),
            external_id: "1".into(),
            kind,
            name: "x".into(),
            description: None,
            occurs_at: None,
            metadata: Value::Null,
            synced_at: Utc::now(),
            detailed_info: info.map(str::to_string),
            keywords: vec!["k".into(); keywords],
            interest_count: 0,
            interested_by: vec![],
            comments: vec![],
            thread_uuids: vec![],
        }
    }

    #[test]
    fn decide_enriches_new_and_incomplete_records() {
        assert_eq!(decide(None), Action::Create);
        assert_eq!(decide(Some(&record(EntityKind::Event, 10, None))), Action::Enrich);
        assert_eq!(decide(Some(&record(EntityKind::Event, 9, Some("info")))), Action::Enrich);
        assert_eq!(decide(Some(&record(EntityKind::Event, 10, Some("info")))), Action::Refresh);
    }

    #[test]
    fn page_plan_per_kind() {
        assert_eq!(page_plan(EntityKind::Event, 70), PageParams { limit: 50, offset: 0 });
        assert_eq!(page_plan(EntityKind::Person, 70), PageParams { limit: 100, offset: 70 });
        assert_eq!(page_plan(EntityKind::Vehicle, 0), PageParams { limit: 100, offset: 0 });
    }

    #[test]
    fn social_defaults_only_for_events_and_only_on_insert() {
        let raw = raw_entity("1", "Launch X");
        let event = entity_update(EntityKind::Event, &raw, None);
        assert!(event.ops.iter().any(|op| matches!(op, launchpad_store::UpdateOp::SetOnInsert(p, _) if p == fields::COMMENTS)));
        assert!(!event.ops.iter().any(|op| matches!(op, launchpad_store::UpdateOp::Set(p, _) if p == fields::INTEREST_COUNT)));

        let person = entity_update(EntityKind::Person, &raw, None);
        assert!(!person.ops.iter().any(|op| matches!(op, launchpad_store::UpdateOp::SetOnInsert(..))));
    }

    #[tokio::test]
    async fn people_crawl_continues_from_persisted_count() {
        let store = Arc::new(MemoryStore::new());
        let people: Vec<_> = (1..=3).map(|i| raw_entity(&i.to_string(), &format!("P{i}"))).collect();
        let feed = Arc::new(MockFeed::new().with(EntityKind::Person, people));
        let reconciler = Reconciler::builder()
            .store(store)
            .feed(feed.clone())
            .enricher(Enricher::builder().generator(Arc::new(MockGenerator::new())).build())
            .build();

        let mut shutdown = Shutdown::never();
        reconciler.reconcile(EntityKind::Person, &mut shutdown).await.unwrap();
        reconciler.reconcile(EntityKind::Person, &mut shutdown).await.unwrap();

        let offsets: Vec<u32> = feed.requests().iter().map(|(_, p)| p.offset).collect();
        assert_eq!(offsets, vec![0, 3]);
    }
}
