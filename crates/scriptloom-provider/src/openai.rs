use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use scriptloom_schema::config::WriterConfig;

use crate::prompt::{render_user_prompt, SYSTEM_PROMPT};
use crate::{DraftProvider, DraftRequest, DraftResponse};

/// Chat-completions writer for any OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiDraftProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiDraftProvider {
    pub fn from_config(config: &WriterConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_base: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl DraftProvider for OpenAiDraftProvider {
    async fn draft(&self, request: DraftRequest) -> Result<DraftResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let payload = ApiRequest {
            model: self.model.clone(),
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ApiMessage {
                    role: "user",
                    content: render_user_prompt(&request),
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let parsed: ApiResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("writer response contained no choices"))?;

        Ok(DraftResponse { text })
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/models", self.api_base);
        self.client
            .get(url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_content_parses() {
        let raw = r#"{"choices": [{"message": {"role": "assistant", "content": "旁白：开场。"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("旁白：开场。")
        );
    }

    #[test]
    fn response_without_choices_is_detectable() {
        let raw = r#"{"choices": []}"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.choices.is_empty());
    }

    #[test]
    fn provider_strips_trailing_slash_from_base() {
        let config = WriterConfig {
            provider: "openai".into(),
            api_key: "sk-test".into(),
            base_url: "https://api.example.com/v1/".into(),
            ..WriterConfig::default()
        };
        let provider = OpenAiDraftProvider::from_config(&config);
        assert_eq!(provider.api_base, "https://api.example.com/v1");
    }
}
