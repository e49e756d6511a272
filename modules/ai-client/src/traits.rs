use async_trait::async_trait;

use crate::error::AiError;

// =============================================================================
// TextGenerator Trait
// =============================================================================

/// Single-shot text generation: one prompt in, one completion out.
///
/// Implementations hold no conversational state between calls. Callers that
/// need structure (keyword lists, summaries) parse the returned text
/// themselves.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;

    /// Provider/model label used in logs.
    fn name(&self) -> &str;
}
