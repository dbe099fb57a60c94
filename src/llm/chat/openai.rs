use async_trait::async_trait;
use log::info;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;

use super::{ChatClient, CompletionResponse, GenerationRequest, http_client};
use crate::llm::LlmConfig;

pub struct OpenAIChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

impl OpenAIChatClient {
    pub fn new(
        http: reqwest::Client,
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string()),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "OpenAI API key is required".to_string())?;
        Ok(Self::new(
            http_client(config)?,
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
        ))
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn generate(
        &self,
        request: &GenerationRequest
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        let mut messages = vec![OpenAIMessage {
            role: "system",
            content: &request.system_instruction,
        }];
        messages.extend(request.user_turns.iter().map(|turn| OpenAIMessage {
            role: "user",
            content: turn,
        }));

        let payload = OpenAIChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        info!("OpenAIChatClient::generate() → model={} url={}", self.model, self.base_url);
        let resp = self.http
            .post(self.base_url.trim_end_matches('/'))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        let data = resp.json::<OpenAIResponse>().await?;
        let text = data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(CompletionResponse { response: text })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
