use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::{LlmError, LlmProvider};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Chat-completion provider over OpenAI's API. Gemini support (selected
/// via `LLM_PROVIDER=gemini`) reuses this same request/response handling
/// pointed at Google's OpenAI-compatible endpoint, since both chat
/// surfaces speak the same wire shape.
pub struct RemoteProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl RemoteProvider {
    pub fn openai(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: OPENAI_CHAT_URL.to_string(),
            api_key,
            model,
        }
    }

    pub fn gemini(api_key: String, model: String, api_version: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!(
                "https://generativelanguage.googleapis.com/{api_version}/openai/chat/completions"
            ),
            api_key,
            model,
        }
    }
}

impl LlmProvider for RemoteProvider {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            let request = ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage { role: "user", content: prompt }],
                temperature: 0.3,
            };

            let response = self
                .http
                .post(&self.base_url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| LlmError::Http(e.to_string()))?;

            if response.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(LlmError::Auth("invalid API key".to_string()));
            }
            if !response.status().is_success() {
                return Err(LlmError::Http(format!("status {}", response.status())));
            }

            let body: ChatResponse = response
                .json()
                .await
                .map_err(|e| LlmError::Parse(e.to_string()))?;

            body.choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| LlmError::Parse("empty choices in chat response".to_string()))
        })
    }
}
