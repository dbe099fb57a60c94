use async_trait::async_trait;
use std::error::Error as StdError;
use serde::{Deserialize, Serialize};
use log::info;

use super::{ChatClient, CompletionResponse, GenerationRequest, http_client};
use crate::llm::LlmConfig;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GoogleResponse {
    /// Text of the first candidate, parts concatenated. Empty when the model
    /// produced nothing (e.g. a safety block).
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}

pub struct GeminiChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(
        http: reqwest::Client,
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "Google API key is required for GeminiChatClient".to_string())?;
        Ok(Self::new(
            http_client(config)?,
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
        ))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn generate(
        &self,
        request: &GenerationRequest
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        let payload = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: request.system_instruction.clone() }],
            },
            contents: request.user_turns
                .iter()
                .map(|turn| GeminiContent {
                    role: Some("user"),
                    parts: vec![GeminiPart { text: turn.clone() }],
                })
                .collect(),
            generation_config: GenerationConfig {
                max_output_tokens: request.max_output_tokens,
                temperature: request.temperature,
            },
        };

        info!(
            "GeminiChatClient::generate() → model={} turns={}",
            self.model,
            request.user_turns.len()
        );
        let resp = self.http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        let data = resp.json::<GoogleResponse>().await?;
        Ok(CompletionResponse { response: data.text() })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::test_support::spawn_provider;
    use crate::llm::LlmType;
    use serde_json::json;

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_instruction: "Use only the KB.".into(),
            user_turns: vec!["Hola".into(), "¿Precios?".into()],
            max_output_tokens: 600,
            temperature: 0.2,
        }
    }

    #[test]
    fn from_config_requires_key() {
        let config = LlmConfig { llm_type: LlmType::Gemini, ..LlmConfig::default() };
        assert!(GeminiChatClient::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn sends_instruction_turns_and_parameters() {
        let (base_url, seen) = spawn_provider(
            "/v1beta/models/gemini-2.5-flash:generateContent",
            json!({
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": "Hola, " }, { "text": "¿en qué ayudo?" }] } }]
            })
        ).await;
        let client = GeminiChatClient::new(reqwest::Client::new(), "key".into(), None, Some(base_url));

        let resp = client.generate(&request()).await.unwrap();
        assert_eq!(resp.response, "Hola, ¿en qué ayudo?");

        let seen = seen.lock().await;
        let (_, body) = &seen[0];
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Use only the KB.");
        assert_eq!(body["contents"].as_array().unwrap().len(), 2);
        assert_eq!(body["contents"][1]["role"], "user");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "¿Precios?");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 600);
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn missing_candidates_yield_empty_text() {
        let (base_url, _) = spawn_provider(
            "/v1beta/models/gemini-2.5-flash:generateContent",
            json!({ "promptFeedback": { "blockReason": "SAFETY" } })
        ).await;
        let client = GeminiChatClient::new(reqwest::Client::new(), "key".into(), None, Some(base_url));
        let resp = client.generate(&request()).await.unwrap();
        assert!(resp.response.is_empty());
    }
}
