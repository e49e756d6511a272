// One-time generation of narrative text and keywords for an entity.

use std::sync::Arc;
use std::time::Duration;

use ai_client::{truncate_to_char_boundary, TextGenerator};
use launchpad_common::{EntityKind, LaunchpadError, RawEntity, Result, Shutdown};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

const MAX_FIELD_BYTES: usize = 4_000;

/// Derived fields produced for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub detailed_info: String,
    pub keywords: Vec<String>,
}

/// How one kind is enriched: what to ask for and how many keywords to expect.
struct Profile {
    /// Keywords requested from the generator.
    requested: usize,
    /// Whether the entity's own name is appended to the generated keywords.
    append_name: bool,
}

fn profile(kind: EntityKind) -> Profile {
    match kind {
        EntityKind::Event | EntityKind::Vehicle => Profile {
            requested: kind.keyword_target(),
            append_name: false,
        },
        EntityKind::Person => Profile {
            requested: kind.keyword_target() - 1,
            append_name: true,
        },
    }
}

fn narrative_prompt(kind: EntityKind, name: &str, description: &str) -> String {
    match kind {
        EntityKind::Event => format!(
            "Write a short, engaging summary of this upcoming space event for website visitors. \
             Explain why it matters and give the key details in plain language, as one paragraph.\n\
             Event: {name}\nDescription: {description}"
        ),
        EntityKind::Person => format!(
            "Write a factual one-paragraph biography of this astronaut covering their background, \
             major achievements and contributions to space exploration.\n\
             Name: {name}\nBio: {description}"
        ),
        EntityKind::Vehicle => format!(
            "Write a concise one-paragraph overview of this spacecraft covering its design, \
             missions and historical significance.\n\
             Name: {name}\nDescription: {description}"
        ),
    }
}

fn keyword_prompt(kind: EntityKind, count: usize, detailed_info: &str) -> String {
    let focus = match kind {
        EntityKind::Event => "the core aspects and unique features of the event",
        EntityKind::Person => "the astronaut's professional achievements and contributions",
        EntityKind::Vehicle => "the spacecraft's features, missions and significance",
    };
    format!(
        "From the text below, pick exactly {count} distinct, specific keywords describing {focus}. \
         Answer with the keywords only, as a single comma-separated list.\n\
         Text: {detailed_info}"
    )
}

/// Split a comma-separated completion into trimmed, non-empty keywords.
pub fn parse_keywords(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Clone, TypedBuilder)]
pub struct Enricher {
    generator: Arc<dyn TextGenerator>,
    /// Ceiling on keyword calls for one entity.
    #[builder(default = 5)]
    max_keyword_attempts: u32,
    #[builder(default = Duration::from_secs(60))]
    timeout: Duration,
}

impl Enricher {
    /// Generate `detailedInfo`, then keywords until the kind's target count is
    /// met. Only the keyword call is repeated.
    pub async fn enrich(
        &self,
        kind: EntityKind,
        raw: &RawEntity,
        shutdown: &Shutdown,
    ) -> Result<Enrichment> {
        let fail = |reason: String| LaunchpadError::Enrichment {
            kind,
            external_id: raw.external_id.clone(),
            reason,
        };

        let description = raw.description.as_deref().unwrap_or("No description available.");
        let description = truncate_to_char_boundary(description, MAX_FIELD_BYTES);
        let detailed_info = self
            .generate(&narrative_prompt(kind, &raw.name, description))
            .await
            .map_err(&fail)?;

        let profile = profile(kind);
        let target = kind.keyword_target();
        let prompt = keyword_prompt(
            kind,
            profile.requested,
            truncate_to_char_boundary(&detailed_info, MAX_FIELD_BYTES),
        );

        let mut last_count = 0;
        for attempt in 1..=self.max_keyword_attempts.max(1) {
            if shutdown.is_triggered() {
                return Err(LaunchpadError::Cancelled);
            }

            let mut keywords = parse_keywords(&self.generate(&prompt).await.map_err(&fail)?);
            if profile.append_name {
                keywords.push(raw.name.clone());
            }

            if keywords.len() == target {
                info!(%kind, external_id = %raw.external_id, attempt, "Entity enriched");
                return Ok(Enrichment {
                    detailed_info,
                    keywords,
                });
            }
            last_count = keywords.len();
            debug!(
                %kind,
                external_id = %raw.external_id,
                attempt,
                got = last_count,
                want = target,
                "Keyword count mismatch, retrying"
            );
        }

        warn!(%kind, external_id = %raw.external_id, got = last_count, want = target, "Keyword retries exhausted");
        Err(fail(format!(
            "expected {target} keywords, last attempt produced {last_count} after {} attempts",
            self.max_keyword_attempts.max(1)
        )))
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<String, String> {
        match tokio::time::timeout(self.timeout, self.generator.generate(prompt)).await {
            Ok(Ok(text)) if text.trim().is_empty() => Err("empty completion".to_string()),
            Ok(Ok(text)) => Ok(text.trim().to_string()),
            Ok(Err(e)) => Err(format!("{} failed: {e}", self.generator.name())),
            Err(_) => Err(format!("timed out after {}s", self.timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGenerator;

    fn raw(name: &str) -> RawEntity {
        RawEntity {
            external_id: "42".into(),
            name: name.into(),
            description: Some("Something happens in orbit".into()),
            occurs_at: None,
            metadata: serde_json::Value::Null,
        }
    }

    fn enricher(generator: Arc<MockGenerator>) -> Enricher {
        Enricher::builder().generator(generator).max_keyword_attempts(3).build()
    }

    #[test]
    fn parse_keywords_trims_and_drops_blanks() {
        assert_eq!(parse_keywords(" a , b,, c ,"), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn event_gets_ten_keywords() {
        let generator = Arc::new(MockGenerator::new());
        let result = enricher(generator.clone())
            .enrich(EntityKind::Event, &raw("Launch X"), &Shutdown::never())
            .await
            .unwrap();
        assert!(!result.detailed_info.is_empty());
        assert_eq!(result.keywords.len(), 10);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn person_keywords_end_with_name() {
        let generator = Arc::new(MockGenerator::new());
        let result = enricher(generator)
            .enrich(EntityKind::Person, &raw("Ada Pilot"), &Shutdown::never())
            .await
            .unwrap();
        assert_eq!(result.keywords.len(), 6);
        assert_eq!(result.keywords.last().map(String::as_str), Some("Ada Pilot"));
    }

    #[tokio::test]
    async fn only_keyword_call_is_retried() {
        let generator = Arc::new(MockGenerator::new().with_keyword_counts(vec![4, 9, 10]));
        let result = enricher(generator.clone())
            .enrich(EntityKind::Vehicle, &raw("Dragon"), &Shutdown::never())
            .await
            .unwrap();
        assert_eq!(result.keywords.len(), 10);
        assert_eq!(generator.narrative_calls(), 1);
        assert_eq!(generator.keyword_calls(), 3);
    }

    #[tokio::test]
    async fn keyword_ceiling_yields_enrichment_error() {
        let generator = Arc::new(MockGenerator::new().with_keyword_counts(vec![3, 3, 3, 3]));
        let err = enricher(generator.clone())
            .enrich(EntityKind::Event, &raw("Launch X"), &Shutdown::never())
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchpadError::Enrichment { .. }));
        assert_eq!(generator.keyword_calls(), 3);
    }

    #[tokio::test]
    async fn generator_failure_is_enrichment_error() {
        let generator = Arc::new(MockGenerator::failing());
        let err = enricher(generator)
            .enrich(EntityKind::Event, &raw("Launch X"), &Shutdown::never())
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchpadError::Enrichment { ref external_id, .. } if external_id == "42"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generator_times_out() {
        let generator = Arc::new(MockGenerator::new().with_delay(Duration::from_secs(120)));
        let enricher = Enricher::builder()
            .generator(generator)
            .timeout(Duration::from_secs(60))
            .build();
        let err = enricher
            .enrich(EntityKind::Event, &raw("Launch X"), &Shutdown::never())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
