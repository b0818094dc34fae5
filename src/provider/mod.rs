pub mod dummy;
pub mod openai;

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::Secret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::context::DecisionContext;
use crate::provider::dummy::DummyProvider;
use crate::provider::openai::OpenAiProvider;
use crate::reasoning::prompt::Prompt;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("provider timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("provider rejected the credentials")]
    Auth,
    #[error("provider quota or rate limit exceeded")]
    Quota,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error("provider returned an unreadable response: {0}")]
    InvalidResponse(String),
}

/// Anything that can turn a grounded prompt into raw reply text. Replies are
/// untrusted; the orchestrator validates them.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(
        &self,
        prompt: &Prompt,
        context: &DecisionContext,
    ) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Live,
    #[default]
    Dummy,
}

impl ProviderKind {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Dummy => "dummy",
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Error)]
#[error("unknown provider kind: {0}")]
pub struct ProviderKindParseError(pub String);

impl FromStr for ProviderKind {
    type Err = ProviderKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" | "openai" => Ok(Self::Live),
            "dummy" | "offline" => Ok(Self::Dummy),
            _ => Err(ProviderKindParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<Secret<String>>,
    pub timeout: Duration,
    pub temperature: f64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Dummy,
            model: "gpt-4.1-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            temperature: 0.2,
        }
    }
}

/// Pick the provider once, at construction. A live selection without a key
/// degrades to the dummy.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn ReasoningProvider>, ProviderError> {
    match (settings.kind, settings.api_key.clone()) {
        (ProviderKind::Live, Some(api_key)) => Ok(Arc::new(OpenAiProvider::new(
            settings.clone(),
            api_key,
        )?)),
        (ProviderKind::Live, None) => {
            warn!("live provider selected but no API key is configured; using the dummy provider");
            Ok(Arc::new(DummyProvider))
        }
        (ProviderKind::Dummy, _) => Ok(Arc::new(DummyProvider)),
    }
}
