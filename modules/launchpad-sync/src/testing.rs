// Test doubles for the sync pipeline.
//
// - MockFeed (EntityFeed): in-memory pages per kind, scripted failures
// - MockGenerator (TextGenerator): deterministic narratives and keyword lists

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ai_client::{AiError, TextGenerator};
use async_trait::async_trait;
use launchpad_common::{EntityKind, LaunchpadError, PageParams, RawEntity, Result};

use crate::feed::EntityFeed;

pub fn raw_entity(external_id: &str, name: &str) -> RawEntity {
    RawEntity {
        external_id: external_id.to_string(),
        name: name.to_string(),
        description: Some(format!("{name} upstream description")),
        occurs_at: None,
        metadata: serde_json::json!({ "id": external_id, "name": name }),
    }
}

// ---------------------------------------------------------------------------
// MockFeed
// ---------------------------------------------------------------------------

/// Serves registered entities per kind, honouring `limit` and `offset`.
/// Kinds with nothing registered return an empty page.
#[derive(Default)]
pub struct MockFeed {
    entities: Mutex<HashMap<EntityKind, Vec<RawEntity>>>,
    failures: Mutex<HashMap<EntityKind, u32>>,
    requests: Mutex<Vec<(EntityKind, PageParams)>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, kind: EntityKind, entities: Vec<RawEntity>) -> Self {
        self.set(kind, entities);
        self
    }

    /// Fail the next `times` requests for `kind`.
    pub fn failing(self, kind: EntityKind, times: u32) -> Self {
        self.failures.lock().unwrap().insert(kind, times);
        self
    }

    /// Replace what `kind` serves from now on.
    pub fn set(&self, kind: EntityKind, entities: Vec<RawEntity>) {
        self.entities.lock().unwrap().insert(kind, entities);
    }

    pub fn requests(&self) -> Vec<(EntityKind, PageParams)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, kind: EntityKind) -> usize {
        self.requests.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
    }
}

#[async_trait]
impl EntityFeed for MockFeed {
    async fn fetch_page(&self, kind: EntityKind, page: PageParams) -> Result<Vec<RawEntity>> {
        self.requests.lock().unwrap().push((kind, page));

        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&kind) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(LaunchpadError::Fetch {
                    kind,
                    reason: "MockFeed: scripted failure".into(),
                });
            }
        }

        Ok(self
            .entities
            .lock()
            .unwrap()
            .get(&kind)
            .map(|all| {
                all.iter()
                    .skip(page.offset as usize)
                    .take(page.limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// Answers keyword prompts (recognised by "comma-separated") with as many
/// keywords as the prompt asks for, or with scripted counts when set. Every
/// other prompt gets a fixed narrative.
#[derive(Default)]
pub struct MockGenerator {
    keyword_counts: Mutex<VecDeque<usize>>,
    fail: bool,
    delay: Option<Duration>,
    narrative_calls: AtomicUsize,
    keyword_calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Keyword counts returned by successive keyword calls. Once exhausted,
    /// calls return the requested count.
    pub fn with_keyword_counts(self, counts: Vec<usize>) -> Self {
        *self.keyword_counts.lock().unwrap() = counts.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.narrative_calls() + self.keyword_calls()
    }

    pub fn narrative_calls(&self) -> usize {
        self.narrative_calls.load(Ordering::SeqCst)
    }

    pub fn keyword_calls(&self) -> usize {
        self.keyword_calls.load(Ordering::SeqCst)
    }
}

fn requested_count(prompt: &str) -> usize {
    prompt
        .split_once("exactly ")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(10)
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, AiError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AiError::Network("MockGenerator: scripted failure".into()));
        }

        if !prompt.contains("comma-separated") {
            self.narrative_calls.fetch_add(1, Ordering::SeqCst);
            return Ok("A generated narrative about the entity.".to_string());
        }

        self.keyword_calls.fetch_add(1, Ordering::SeqCst);
        let count = self
            .keyword_counts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| requested_count(prompt));
        Ok((1..=count)
            .map(|i| format!("keyword{i}"))
            .collect::<Vec<_>>()
            .join(", "))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
