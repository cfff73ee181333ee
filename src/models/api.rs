use serde::{ Serialize, Deserialize };
use super::chat::{ ConversationSummary, Turn };

#[derive(Deserialize, Debug)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PingResponse {
    pub status: String,
    pub who: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    pub api: String,
    pub ollama: BackendHealth,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BackendHealth {
    pub status: String,
    pub models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConversationList {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConversationCreated {
    pub conversation_id: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConversationHistory {
    pub conversation_id: String,
    pub messages: Vec<Turn>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub detail: String,
}
