use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use std::error::Error as StdError;
use super::{ ChatClient, CompletionResponse, GenerationRequest, http_client };
use crate::llm::LlmConfig;
use log::info;

/// Local Ollama server; the only provider that runs without an API key.
#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<OllamaMessage>,
}

impl OllamaClient {
    pub fn new(http: HttpClient, base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3.1".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http,
            base_url: url,
            completion_model: model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        if config.llm_type != crate::llm::LlmType::Ollama {
            return Err("Invalid config type for OllamaClient".into());
        }

        Ok(Self::new(http_client(config)?, config.base_url.clone(), config.completion_model.clone()))
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn generate(
        &self,
        request: &GenerationRequest
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let mut messages = vec![OllamaMessage {
            role: "system".into(),
            content: request.system_instruction.clone(),
        }];
        messages.extend(request.user_turns.iter().map(|turn| OllamaMessage {
            role: "user".into(),
            content: turn.clone(),
        }));
        let req = ChatRequest {
            model: &self.completion_model,
            messages,
            stream: false,
            options: ChatOptions {
                num_predict: request.max_output_tokens,
                temperature: request.temperature,
            },
        };
        info!("OllamaClient::generate() → model={} url={}", self.completion_model, url);
        let resp = self.http.post(&url).json(&req).send().await?.error_for_status()?;
        let data = resp.json::<ChatResponse>().await?;
        Ok(CompletionResponse {
            response: data.message.map(|m| m.content).unwrap_or_default(),
        })
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
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

    #[test]
    fn rejects_foreign_config() {
        let config = LlmConfig { llm_type: LlmType::Gemini, ..LlmConfig::default() };
        assert!(OllamaClient::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn posts_non_streaming_chat() {
        let (base_url, seen) = spawn_provider(
            "/api/chat",
            json!({ "message": { "role": "assistant", "content": "Hola." }, "done": true })
        ).await;
        let client = OllamaClient::new(HttpClient::new(), Some(base_url), Some("llama3.1".into()));
        let request = GenerationRequest {
            system_instruction: "rules".into(),
            user_turns: vec!["Hola".into()],
            max_output_tokens: 600,
            temperature: 0.2,
        };

        assert_eq!(client.generate(&request).await.unwrap().response, "Hola.");
        let seen = seen.lock().await;
        let (_, body) = &seen[0];
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 600);
        assert_eq!(body["messages"][1]["content"], "Hola");
    }
}
