use crate::cli::Args;
use crate::history::{ initialize_history_store, HistoryStore, StoreError };
use crate::llm::{ parse_llm_type, BackendError, LlmConfig, LlmType };
use crate::llm::chat::{ ChatClient, new_client as new_chat_client };
use crate::llm::embedding::{
    EmbeddingClient,
    EmbeddingOutcome,
    new_client as new_embedding_client,
    try_embed,
};
use crate::models::chat::{ ChatMessage, Turn };

use log::{ debug, error, info, warn };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;

pub const SYSTEM_PROMPT: &str = "You are a helpful and friendly AI assistant";
pub const DEFAULT_CONTEXT_TURNS: usize = 10;

#[derive(Debug, ThisError)]
pub enum AgentError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reachability of the primary backend as seen by the status probe.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendStatus {
    Online {
        models: Vec<String>,
    },
    Offline {
        reason: String,
    },
}

/// Turns a user message into a reply: builds the bounded context, walks the
/// backend list in order and records the exchange.
#[derive(Clone)]
pub struct AIAgent {
    history_store: Arc<dyn HistoryStore>,
    backends: Vec<Arc<dyn ChatClient>>,
    embedding_client: Arc<dyn EmbeddingClient>,
    context_turns: usize,
    health_timeout: Duration,
}

impl AIAgent {
    pub async fn new(args: Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let history_store = initialize_history_store(&args).await?;
        let backends = Self::initialize_llm_clients(&args)?;
        let embedding_client = new_embedding_client(args.embedding_dimension);
        info!(
            "Embedding client configured: random placeholder, Dimension={}",
            args.embedding_dimension
        );

        Ok(
            Self::with_components(history_store, backends, embedding_client)
                .context_turns(args.context_turns)
                .health_timeout(Duration::from_secs(args.health_timeout_secs))
        )
    }

    pub fn with_components(
        history_store: Arc<dyn HistoryStore>,
        backends: Vec<Arc<dyn ChatClient>>,
        embedding_client: Arc<dyn EmbeddingClient>
    ) -> Self {
        Self {
            history_store,
            backends,
            embedding_client,
            context_turns: DEFAULT_CONTEXT_TURNS,
            health_timeout: Duration::from_secs(5),
        }
    }

    pub fn context_turns(mut self, context_turns: usize) -> Self {
        self.context_turns = context_turns;
        self
    }

    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    fn initialize_llm_clients(
        args: &Args
    ) -> Result<Vec<Arc<dyn ChatClient>>, Box<dyn Error + Send + Sync>> {
        let chat_llm_type = parse_llm_type(&args.chat_llm_type)?;
        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: chat_llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
            timeout: Duration::from_secs(args.chat_timeout_secs),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            args.chat_llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().unwrap_or_default()
        );
        let mut backends = vec![chat_client];

        let fallback_llm_type = parse_llm_type(&args.fallback_llm_type)?;
        let fallback_api_key = Some(args.fallback_api_key.clone()).filter(|k| !k.trim().is_empty());
        if fallback_api_key.is_none() && fallback_llm_type != LlmType::Ollama {
            info!("Fallback client disabled: no FALLBACK_API_KEY set");
            return Ok(backends);
        }
        let fallback_config = LlmConfig {
            llm_type: fallback_llm_type,
            base_url: args.fallback_base_url.clone(),
            api_key: fallback_api_key,
            completion_model: args.fallback_model.clone(),
            timeout: Duration::from_secs(args.fallback_timeout_secs),
        };
        let fallback_client = new_chat_client(&fallback_config)?;
        info!(
            "Fallback client configured: Type={}, Model={}, BaseURL={}",
            args.fallback_llm_type,
            fallback_client.get_model(),
            fallback_client.get_base_url().unwrap_or_default()
        );
        backends.push(fallback_client);

        Ok(backends)
    }

    pub fn history_store(&self) -> &Arc<dyn HistoryStore> {
        &self.history_store
    }

    /// Generates and stores the reply to `user_message` within
    /// `conversation_id`. Backend failures never surface as errors: they
    /// become the reply text. Only persistence faults are returned.
    pub async fn generate(
        &self,
        user_message: &str,
        conversation_id: &str
    ) -> Result<String, AgentError> {
        let history = self.history_store.get_turns(conversation_id).await?;
        let messages = build_messages(&history, user_message, self.context_turns);
        debug!(
            "Conversation {}: {} stored turns, sending {} messages",
            conversation_id,
            history.len(),
            messages.len()
        );

        let reply = self.complete_with_fallback(&messages).await;

        self.history_store.save_turn(conversation_id, user_message, &reply).await?;

        match try_embed(self.embedding_client.as_ref(), user_message).await {
            EmbeddingOutcome::Computed(vector) => {
                debug!("Embedded message for {} ({} dims)", conversation_id, vector.len());
            }
            EmbeddingOutcome::Unavailable(reason) => {
                debug!("No embedding for {}: {}", conversation_id, reason);
            }
        }

        Ok(reply)
    }

    async fn complete_with_fallback(&self, messages: &[ChatMessage]) -> String {
        let mut failures: Vec<(&'static str, BackendError)> = Vec::new();

        for backend in &self.backends {
            match backend.complete(messages).await {
                Ok(resp) => {
                    if !failures.is_empty() {
                        info!("Reply produced by fallback backend {}", backend.name());
                    }
                    return resp.response;
                }
                Err(e) => {
                    warn!("Backend {} failed: {}", backend.name(), e);
                    failures.push((backend.name(), e));
                }
            }
        }

        error!("All chat backends failed; replying with error text");
        backend_failure_reply(&failures)
    }

    /// Probes the primary backend.
    pub async fn backend_status(&self) -> BackendStatus {
        let Some(primary) = self.backends.first() else {
            return BackendStatus::Offline { reason: "no chat backend configured".into() };
        };
        match primary.list_models(self.health_timeout).await {
            Ok(models) => BackendStatus::Online { models },
            Err(e) => {
                debug!("Status probe of {} failed: {}", primary.name(), e);
                BackendStatus::Offline { reason: e.to_string() }
            }
        }
    }
}

/// System instruction, then the last `context_turns` turns oldest-first as
/// user/assistant pairs, then the new user message.
pub fn build_messages(history: &[Turn], user_message: &str, context_turns: usize) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(context_turns);
    let window = &history[start..];

    let mut messages = Vec::with_capacity(window.len() * 2 + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    for turn in window {
        messages.push(ChatMessage::user(turn.user_message.clone()));
        messages.push(ChatMessage::assistant(turn.bot_response.clone()));
    }
    messages.push(ChatMessage::user(user_message));
    messages
}

fn backend_failure_reply(failures: &[(&'static str, BackendError)]) -> String {
    if failures.is_empty() {
        return "Sorry, no language model backend is configured, so I can't answer right now.".to_string();
    }
    let details = failures
        .iter()
        .map(|(name, e)| format!("{}: {}", name, e))
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "Sorry, I couldn't reach a language model to answer that ({}). Please check that Ollama is running and try again.",
        details
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::SqliteHistoryStore;
    use crate::llm::chat::CompletionResponse;
    use crate::llm::chat::openai::OpenAIChatClient;
    use crate::llm::embedding::{ EmbeddingResponse, RandomEmbeddingClient };
    use crate::models::chat::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Backend double recording every message list it receives.
    struct ScriptedBackend {
        name: &'static str,
        reply: Result<String, String>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedBackend {
        fn ok(name: &'static str, reply: &str) -> Arc<Self> {
            Arc::new(Self { name, reply: Ok(reply.into()), calls: Mutex::new(Vec::new()) })
        }

        fn failing(name: &'static str, reason: &str) -> Arc<Self> {
            Arc::new(Self { name, reply: Err(reason.into()), calls: Mutex::new(Vec::new()) })
        }

        fn calls(&self) -> Vec<Vec<ChatMessage>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedBackend {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse, BackendError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            match &self.reply {
                Ok(text) => Ok(CompletionResponse { response: text.clone() }),
                Err(reason) => Err(BackendError::Network(reason.clone())),
            }
        }

        async fn list_models(&self, _timeout: Duration) -> Result<Vec<String>, BackendError> {
            match &self.reply {
                Ok(_) => Ok(vec![self.get_model()]),
                Err(reason) => Err(BackendError::Network(reason.clone())),
            }
        }

        fn name(&self) -> &'static str {
            self.name
        }

        fn get_model(&self) -> String {
            "scripted".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    fn as_backend(backend: &Arc<ScriptedBackend>) -> Arc<dyn ChatClient> {
        backend.clone()
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingClient for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<EmbeddingResponse, Box<dyn Error + Send + Sync>> {
            Err("embedding backend down".into())
        }
    }

    async fn agent_with(
        backends: Vec<Arc<dyn ChatClient>>
    ) -> (TempDir, AIAgent) {
        let dir = TempDir::new().unwrap();
        let store = SqliteHistoryStore::new(dir.path().join("agent.db"));
        store.init_schema().await.unwrap();
        let agent = AIAgent::with_components(
            Arc::new(store),
            backends,
            Arc::new(RandomEmbeddingClient::default())
        );
        (dir, agent)
    }

    fn turn(i: usize) -> Turn {
        Turn {
            user_message: format!("q{}", i),
            bot_response: format!("a{}", i),
            timestamp: String::new(),
        }
    }

    #[test]
    fn messages_start_with_system_and_end_with_user() {
        let messages = build_messages(&[], "Hello", 10);
        assert_eq!(messages, vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user("Hello")]);
    }

    #[test]
    fn context_keeps_only_most_recent_turns_oldest_first() {
        let history: Vec<Turn> = (0..11).map(turn).collect();
        let messages = build_messages(&history, "next", 10);

        assert_eq!(messages.len(), 1 + 10 * 2 + 1);
        assert_eq!(messages[1], ChatMessage::user("q1"));
        assert_eq!(messages[2], ChatMessage::assistant("a1"));
        assert_eq!(messages[19], ChatMessage::user("q10"));
        assert_eq!(messages[20], ChatMessage::assistant("a10"));
        assert_eq!(messages[21], ChatMessage::user("next"));
    }

    #[test]
    fn roles_alternate_after_system() {
        let history: Vec<Turn> = (0..3).map(turn).collect();
        let roles: Vec<Role> = build_messages(&history, "x", 10).iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![
            Role::System,
            Role::User, Role::Assistant,
            Role::User, Role::Assistant,
            Role::User, Role::Assistant,
            Role::User,
        ]);
    }

    #[tokio::test]
    async fn primary_reply_is_returned_and_saved() {
        let primary = ScriptedBackend::ok("primary", "Hi!");
        let (_dir, agent) = agent_with(vec![as_backend(&primary)]).await;

        let reply = agent.generate("Hello", "c1").await.unwrap();
        assert_eq!(reply, "Hi!");

        let turns = agent.history_store().get_turns("c1").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].user_message, "Hello");
        assert_eq!(turns[0].bot_response, "Hi!");
    }

    #[tokio::test]
    async fn fallback_gets_same_messages_when_primary_fails() {
        let primary = ScriptedBackend::failing("primary", "connection refused");
        let fallback = ScriptedBackend::ok("fallback", "from the cloud");
        let (_dir, agent) = agent_with(vec![as_backend(&primary), as_backend(&fallback)]).await;

        let reply = agent.generate("Hello", "c1").await.unwrap();
        assert_eq!(reply, "from the cloud");
        assert_eq!(primary.calls(), fallback.calls());
    }

    #[tokio::test]
    async fn fallback_is_not_called_when_primary_succeeds() {
        let primary = ScriptedBackend::ok("primary", "local");
        let fallback = ScriptedBackend::ok("fallback", "cloud");
        let (_dir, agent) = agent_with(vec![as_backend(&primary), as_backend(&fallback)]).await;

        agent.generate("Hello", "c1").await.unwrap();
        assert!(fallback.calls().is_empty());
    }

    #[tokio::test]
    async fn total_failure_becomes_persisted_reply() {
        let primary = ScriptedBackend::failing("ollama", "connection refused");
        let (_dir, agent) = agent_with(vec![as_backend(&primary)]).await;

        let reply = agent.generate("Hello", "c1").await.unwrap();
        assert!(reply.contains("connection refused"), "reply: {reply}");
        assert!(reply.contains("ollama"), "reply: {reply}");

        let turns = agent.history_store().get_turns("c1").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].bot_response, reply);
    }

    #[tokio::test]
    async fn failure_reply_is_deterministic() {
        let (_dir, agent) = agent_with(vec![as_backend(&ScriptedBackend::failing("ollama", "down"))]).await;
        let first = agent.generate("a", "c1").await.unwrap();
        let second = agent.generate("b", "c2").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn twelfth_request_sees_last_ten_turns() {
        let primary = ScriptedBackend::ok("primary", "ok");
        let (_dir, agent) = agent_with(vec![as_backend(&primary)]).await;

        for i in 0..11 {
            agent.generate(&format!("m{}", i), "c1").await.unwrap();
        }
        agent.generate("m11", "c1").await.unwrap();

        let last_call = primary.calls().pop().unwrap();
        let user_messages: Vec<_> = last_call
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .collect();
        let expected: Vec<String> = (1..=11).map(|i| format!("m{}", i)).collect();
        assert_eq!(user_messages, expected);
        assert_eq!(agent.history_store().get_turns("c1").await.unwrap().len(), 12);
    }

    #[tokio::test]
    async fn embedding_failure_does_not_change_reply() {
        let dir = TempDir::new().unwrap();
        let store = SqliteHistoryStore::new(dir.path().join("agent.db"));
        store.init_schema().await.unwrap();
        let agent = AIAgent::with_components(
            Arc::new(store),
            vec![as_backend(&ScriptedBackend::ok("primary", "fine"))],
            Arc::new(BrokenEmbedder)
        );

        assert_eq!(agent.generate("Hello", "c1").await.unwrap(), "fine");
    }

    #[tokio::test]
    async fn status_uses_primary_model_listing() {
        let (_dir, agent) = agent_with(vec![as_backend(&ScriptedBackend::ok("primary", "ok"))]).await;
        assert_eq!(agent.backend_status().await, BackendStatus::Online { models: vec!["scripted".into()] });
    }

    #[tokio::test]
    async fn unreachable_openai_primary_is_offline() {
        let primary: Arc<dyn ChatClient> = Arc::new(
            OpenAIChatClient::new(
                "sk-test".into(),
                None,
                Some("http://127.0.0.1:9/v1/chat/completions".into()),
                Duration::from_secs(2)
            ).unwrap()
        );
        let (_dir, agent) = agent_with(vec![primary]).await;
        let agent = agent.health_timeout(Duration::from_secs(1));
        assert!(matches!(agent.backend_status().await, BackendStatus::Offline { .. }));
    }

    #[tokio::test]
    async fn no_backends_means_offline_and_error_reply() {
        let (_dir, agent) = agent_with(Vec::new()).await;
        assert!(matches!(agent.backend_status().await, BackendStatus::Offline { .. }));
        let reply = agent.generate("Hello", "c1").await.unwrap();
        assert!(reply.contains("no language model backend"));
    }
}
