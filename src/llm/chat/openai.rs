use async_trait::async_trait;
use log::debug;
use reqwest::{Client as HttpClient, header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION}};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{check_status, ChatClient, CompletionResponse};
use crate::llm::{BackendError, LlmConfig, LlmType};
use crate::models::chat::ChatMessage;

/// OpenAI-compatible chat completions backend.
pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let chat_model = model.unwrap_or_else(|| "gpt-4o-mini".to_string());
        let api_url = base_url.unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| BackendError::Config(format!("Invalid API key format: {}", e)))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
            timeout,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, BackendError> {
        if config.llm_type != LlmType::OpenAI {
            return Err(BackendError::Config("Invalid config type for OpenAIChatClient".into()));
        }
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| BackendError::Config("OpenAI API key is required".to_string()))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.timeout,
        )
    }

    /// `GET /models` on the same API root as the completions endpoint.
    fn models_url(&self) -> String {
        let root = self.base_url.trim_end_matches('/');
        let root = root.strip_suffix("/chat/completions").unwrap_or(root);
        format!("{}/models", root)
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage]
    ) -> Result<CompletionResponse, BackendError> {
        let req = OpenAIChatRequest {
            model: &self.model,
            messages,
            temperature: 0.7,
            max_tokens: Some(500),
            stream: false,
        };
        debug!("OpenAI chat request to {} with {} messages", self.base_url, messages.len());

        let resp = self.http.post(&self.base_url).json(&req).timeout(self.timeout).send().await?;
        let data = check_status(resp).await?.json::<OpenAIResponse>().await?;
        let response = data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::Malformed("no choices in completion response".into()))?;

        Ok(CompletionResponse { response })
    }

    async fn list_models(&self, timeout: Duration) -> Result<Vec<String>, BackendError> {
        let url = self.models_url();
        debug!("OpenAI model listing from {}", url);
        let resp = self.http.get(&url).timeout(timeout).send().await?;
        let data = check_status(resp).await?.json::<ModelList>().await?;
        Ok(data.data.into_iter().map(|m| m.id).collect())
    }

    fn name(&self) -> &'static str {
        "openai"
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
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAIChatClient {
        OpenAIChatClient::new(
            "sk-test".into(),
            Some("gpt-test".into()),
            Some(format!("{}/v1/chat/completions", server.uri())),
            Duration::from_secs(5),
        ).unwrap()
    }

    #[tokio::test]
    async fn sends_bearer_key_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-test",
                "stream": false,
                "messages": [{ "role": "user", "content": "Hello" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Hey" } }]
            })))
            .expect(1)
            .mount(&server).await;

        let reply = client_for(&server).complete(&[ChatMessage::user("Hello")]).await.unwrap();
        assert_eq!(reply.response, "Hey");
    }

    #[tokio::test]
    async fn empty_choices_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server).await;

        let err = client_for(&server).complete(&[ChatMessage::user("Hello")]).await.unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn unauthorized_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server).await;

        let err = client_for(&server).complete(&[ChatMessage::user("Hello")]).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 401, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn model_listing_queries_api_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{ "id": "gpt-test", "object": "model" }, { "id": "gpt-4o-mini", "object": "model" }]
            })))
            .expect(1)
            .mount(&server).await;

        let models = client_for(&server).list_models(Duration::from_secs(1)).await.unwrap();
        assert_eq!(models, vec!["gpt-test", "gpt-4o-mini"]);
    }

    #[tokio::test]
    async fn model_listing_fails_without_endpoint() {
        let server = MockServer::start().await;
        let err = client_for(&server).list_models(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 404, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn model_listing_fails_when_unreachable() {
        let client = OpenAIChatClient::new(
            "sk-test".into(),
            None,
            Some("http://127.0.0.1:9/v1/chat/completions".into()),
            Duration::from_secs(2),
        ).unwrap();
        let err = client.list_models(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, BackendError::Network(_) | BackendError::Timeout(_)), "got {err:?}");
    }

    #[test]
    fn models_url_shares_completions_root() {
        let client = OpenAIChatClient::new(
            "sk-test".into(),
            None,
            Some("https://api.example.com/v1/chat/completions".into()),
            Duration::from_secs(1),
        ).unwrap();
        assert_eq!(client.models_url(), "https://api.example.com/v1/models");
    }
}
