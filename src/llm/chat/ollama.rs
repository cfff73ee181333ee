use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use std::time::Duration;
use super::{ check_status, ChatClient, CompletionResponse };
use crate::llm::{ BackendError, LlmConfig, LlmType };
use crate::models::chat::ChatMessage;
use log::debug;

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>, timeout: Duration) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3.2".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url.trim_end_matches('/').to_string(),
            completion_model: model,
            timeout,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, BackendError> {
        if config.llm_type != LlmType::Ollama {
            return Err(BackendError::Config("Invalid config type for OllamaClient".into()));
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone(), config.timeout))
    }

    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        let url = format!("{}/api/chat", self.base_url);
        let req = ChatRequest {
            model: &self.completion_model,
            messages,
            stream: false,
        };
        debug!("Ollama chat request to {} with {} messages", url, messages.len());
        let resp = self.http.post(&url).json(&req).timeout(self.timeout).send().await?;
        let data = check_status(resp).await?.json::<ChatResponse>().await?;
        Ok(data.message.content)
    }

    pub async fn tags(&self, timeout: Duration) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self.http.get(&url).timeout(timeout).send().await?;
        let data = check_status(resp).await?.json::<TagsResponse>().await?;
        Ok(data.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(
        &self,
        messages: &[ChatMessage]
    ) -> Result<CompletionResponse, BackendError> {
        let response = self.chat(messages).await?;
        Ok(CompletionResponse { response })
    }

    async fn list_models(&self, timeout: Duration) -> Result<Vec<String>, BackendError> {
        self.tags(timeout).await
    }

    fn name(&self) -> &'static str {
        "ollama"
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
