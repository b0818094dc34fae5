use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::DecisionContext;
use crate::provider::{ProviderError, ProviderSettings, ReasoningProvider};
use crate::reasoning::prompt::Prompt;

const CONNECT_TIMEOUT_SECS: u64 = 6;

/// OpenAI-compatible chat completions client.
pub struct OpenAiProvider {
    client: Client,
    settings: ProviderSettings,
    api_key: Secret<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(settings: ProviderSettings, api_key: Secret<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(concat!("staffing-oracle/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self {
            client,
            settings,
            api_key,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    fn request_body<'a>(&'a self, prompt: &'a Prompt) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let preview: String = body.chars().take(180).collect();
    match status.as_u16() {
        401 | 403 => ProviderError::Auth,
        429 => ProviderError::Quota,
        500..=599 => ProviderError::Unavailable(format!("{status}: {preview}")),
        _ => ProviderError::InvalidResponse(format!("unexpected status {status}: {preview}")),
    }
}

fn extract_content(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(content)
}

#[async_trait]
impl ReasoningProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        context: &DecisionContext,
    ) -> Result<String, ProviderError> {
        debug!(
            model = %self.settings.model,
            mode = context.decision_mode().as_slug(),
            "calling chat completions"
        );
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        secs: self.settings.timeout.as_secs(),
                    }
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        extract_content(&body)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use secrecy::Secret;

    use super::{extract_content, status_error, OpenAiProvider};
    use crate::context::DecisionContext;
    use crate::provider::{ProviderError, ProviderSettings};
    use crate::reasoning::prompt::build_prompt;

    #[test]
    fn maps_http_failures() {
        assert_eq!(status_error(StatusCode::UNAUTHORIZED, ""), ProviderError::Auth);
        assert_eq!(status_error(StatusCode::FORBIDDEN, ""), ProviderError::Auth);
        assert_eq!(status_error(StatusCode::TOO_MANY_REQUESTS, ""), ProviderError::Quota);
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "upstream"),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "bad"),
            ProviderError::InvalidResponse(_)
        ));
    }

    #[test]
    fn extracts_first_choice_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"a\":1}"}}]}"#;
        assert_eq!(extract_content(body).expect("content"), "{\"a\":1}");
        assert_eq!(
            extract_content(r#"{"choices":[]}"#),
            Err(ProviderError::EmptyResponse)
        );
        assert_eq!(
            extract_content(r#"{"choices":[{"message":{"content":"  "}}]}"#),
            Err(ProviderError::EmptyResponse)
        );
        assert!(matches!(
            extract_content("<html>"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn request_asks_for_a_json_object() {
        let settings = ProviderSettings {
            base_url: "http://localhost:9999/v1/".to_string(),
            ..ProviderSettings::default()
        };
        let provider =
            OpenAiProvider::new(settings, Secret::new("sk-test".to_string())).expect("provider");
        assert_eq!(
            provider.completions_url(),
            "http://localhost:9999/v1/chat/completions"
        );
        let prompt = build_prompt(&DecisionContext::default(), &[], None);
        let body = serde_json::to_value(provider.request_body(&prompt)).expect("json");
        assert_eq!(body["model"], "gpt-4.1-mini");
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
    }
}
