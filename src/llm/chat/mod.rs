pub mod ollama;
pub mod openai;
pub mod gemini;

use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error as StdError;
use std::sync::Arc;
use super::{ LlmConfig, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use self::gemini::GeminiChatClient;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

/// One generation call: the system instruction plus the user turns, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub user_turns: Vec<String>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Gemini => {
            let specific_client = GeminiChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

pub(crate) fn http_client(
    config: &LlmConfig
) -> Result<reqwest::Client, Box<dyn StdError + Send + Sync>> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{ routing::post, Router, Json };
    use serde_json::Value as JsonValue;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Serves `reply` on every POST and records the request bodies it saw.
    pub async fn spawn_provider(
        route: &'static str,
        reply: JsonValue
    ) -> (String, Arc<Mutex<Vec<(String, JsonValue)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let app = Router::new().route(
            route,
            post(move |uri: axum::http::Uri, Json(body): Json<JsonValue>| {
                let seen = seen_clone.clone();
                let reply = reply.clone();
                async move {
                    seen.lock().await.push((uri.to_string(), body));
                    Json(reply)
                }
            })
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }
}
