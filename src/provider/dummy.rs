use async_trait::async_trait;

use crate::context::DecisionContext;
use crate::provider::{ProviderError, ReasoningProvider};
use crate::reasoning::fallback::synthesize;
use crate::reasoning::prompt::Prompt;

/// Offline provider: answers with the deterministic synthesizer over the
/// prompt's own payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyProvider;

#[async_trait]
impl ReasoningProvider for DummyProvider {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        context: &DecisionContext,
    ) -> Result<String, ProviderError> {
        let payload = &prompt.payload;
        let response = synthesize(context, &payload.scenarios, payload.user_question.as_deref());
        serde_json::to_string(&response).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}
