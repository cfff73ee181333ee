use crate::agent::{ AIAgent, AgentError, BackendStatus };
use crate::history::StoreError;
use crate::models::api::{
    BackendHealth,
    ChatRequest,
    ChatResponse,
    ConversationCreated,
    ConversationHistory,
    ConversationList,
    ErrorResponse,
    HealthResponse,
    MessageResponse,
    PingResponse,
};
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ rejection::JsonRejection, State, Path },
    response::{ Html, IntoResponse, Response },
    http::StatusCode,
};
use thiserror::Error as ThisError;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Clone)]
struct AppState {
    agent: Arc<AIAgent>,
}

#[derive(Debug, ThisError)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorResponse { detail: self.to_string() })).into_response()
    }
}

pub fn router(agent: Arc<AIAgent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/conversations", get(list_conversations_handler).post(create_conversation_handler))
        .route(
            "/conversations/{id}",
            get(get_conversation_handler).delete(delete_conversation_handler)
        )
        .layer(cors)
        .with_state(AppState { agent })
}

pub async fn start_http_server(
    addr: &str,
    agent: Arc<AIAgent>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(agent);
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
        e
    })?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn ping_handler() -> Json<PingResponse> {
    Json(PingResponse {
        status: "pong".into(),
        who: "Alter Lab".into(),
    })
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let ollama = match state.agent.backend_status().await {
        BackendStatus::Online { models } => BackendHealth {
            status: "online".into(),
            models,
            error: None,
        },
        BackendStatus::Offline { reason } => BackendHealth {
            status: "offline".into(),
            models: Vec::new(),
            error: Some(reason),
        },
    };
    Json(HealthResponse { api: "online".into(), ollama })
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let conversation_id = match req.conversation_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => state.agent.history_store().create_conversation().await?,
    };

    let response = state.agent.generate(&req.message, &conversation_id).await?;
    Ok(Json(ChatResponse { response, conversation_id }))
}

async fn list_conversations_handler(
    State(state): State<AppState>,
) -> Result<Json<ConversationList>, ApiError> {
    let conversations = state.agent.history_store().list_conversations().await?;
    Ok(Json(ConversationList { conversations }))
}

async fn create_conversation_handler(
    State(state): State<AppState>,
) -> Result<Json<ConversationCreated>, ApiError> {
    let conversation_id = state.agent.history_store().create_conversation().await?;
    info!("Created conversation {}", conversation_id);
    Ok(Json(ConversationCreated { conversation_id }))
}

async fn get_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationHistory>, ApiError> {
    let messages = state.agent.history_store().get_turns(&id).await?;
    if messages.is_empty() {
        return Err(ApiError::NotFound("Conversation not found".into()));
    }
    Ok(Json(ConversationHistory { conversation_id: id, messages }))
}

async fn delete_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.agent.history_store().delete_conversation(&id).await? {
        return Err(ApiError::NotFound("Conversation not found".into()));
    }
    info!("Deleted conversation {}", id);
    Ok(Json(MessageResponse { message: format!("Conversation {} deleted", id) }))
}
