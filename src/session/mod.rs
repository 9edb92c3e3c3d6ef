//! Session module - conversation state and turn-taking
//!
//! A [`ConversationSession`] owns one linear history, the bound
//! [`RequestPipeline`] (if any) and the current persona selection. It is a
//! cheap handle: clones share the same state.
//!
//! # Turn lifecycle
//!
//! ```text
//! submit_turn(text)
//!   ├─ no pipeline          -> Err(NotConfigured)
//!   ├─ turn already running -> Err(SessionBusy)
//!   └─ append user message, return TurnStream
//!        ├─ all chunks ok   -> append assistant message (chunks concatenated)
//!        ├─ chunk error     -> yield Generation, nothing appended
//!        └─ dropped early   -> nothing appended, session free again
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//!
//! let session = ConversationSession::new();
//! session.configure(pipeline, personas).await?;
//!
//! let mut turn = session.submit_turn("What changed in 2.0?").await?;
//! while let Some(chunk) = turn.next().await {
//!     print!("{}", chunk?);
//! }
//! ```

pub mod types;

pub use types::{Message, Role};

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{GascError, Result};
use crate::persona::Persona;
use crate::pipeline::RequestPipeline;
use crate::providers::ChunkStream;

#[derive(Default)]
struct SessionState {
    history: Vec<Message>,
    pipeline: Option<RequestPipeline>,
    personas: Vec<Persona>,
}

/// Per-user conversation state.
///
/// Uses `Arc<RwLock>` internally; clone it to share between tasks. At most
/// one turn runs at a time.
#[derive(Clone)]
pub struct ConversationSession {
    id: String,
    state: Arc<RwLock<SessionState>>,
    turn: Arc<Mutex<()>>,
    history_window: Option<usize>,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    /// Create an unconfigured session with an empty history.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            state: Arc::new(RwLock::new(SessionState::default())),
            turn: Arc::new(Mutex::new(())),
            history_window: None,
        }
    }

    /// Replay only the most recent `window` messages on each turn.
    ///
    /// `None` (the default) replays the full history.
    pub fn with_history_window(mut self, window: Option<usize>) -> Self {
        self.history_window = window;
        self
    }

    /// Identifier used to correlate log lines.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Install a pipeline and persona selection. History is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`GascError::SessionBusy`] while a turn is streaming.
    ///
    /// # Example
    /// ```no_run
    /// use std::sync::Arc;
    /// use gascai::providers::OpenAiCompatModel;
    /// use gascai::{ConversationSession, Provider, RequestPipeline, SystemPrompt};
    ///
    /// # async fn run() -> gascai::Result<()> {
    /// let model = OpenAiCompatModel::new(reqwest::Client::new(), Provider::Groq, "gsk-...", "gemma2-9b-it");
    /// let session = ConversationSession::new();
    /// session
    ///     .configure(RequestPipeline::new(SystemPrompt::new("You are GascAI"), Arc::new(model)), Vec::new())
    ///     .await?;
    /// assert!(session.is_ready().await);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn configure(&self, pipeline: RequestPipeline, personas: Vec<Persona>) -> Result<()> {
        let _turn = self.turn.try_lock().map_err(|_| GascError::SessionBusy)?;
        let mut state = self.state.write().await;
        info!(
            session = %self.id,
            model = %pipeline.model_name(),
            personas = personas.len(),
            "Session configured"
        );
        state.pipeline = Some(pipeline);
        state.personas = personas;
        Ok(())
    }

    /// Clear the history. The pipeline stays bound.
    ///
    /// # Errors
    ///
    /// Returns [`GascError::SessionBusy`] while a turn is streaming.
    pub async fn reset_history(&self) -> Result<()> {
        let _turn = self.turn.try_lock().map_err(|_| GascError::SessionBusy)?;
        let mut state = self.state.write().await;
        debug!(session = %self.id, cleared = state.history.len(), "History reset");
        state.history.clear();
        Ok(())
    }

    /// Snapshot of the history, oldest first.
    pub async fn history(&self) -> Vec<Message> {
        self.state.read().await.history.clone()
    }

    pub async fn is_ready(&self) -> bool {
        self.state.read().await.pipeline.is_some()
    }

    pub async fn personas(&self) -> Vec<Persona> {
        self.state.read().await.personas.clone()
    }

    pub async fn pipeline(&self) -> Option<RequestPipeline> {
        self.state.read().await.pipeline.clone()
    }

    /// Whether a turn is currently streaming.
    pub fn is_busy(&self) -> bool {
        self.turn.try_lock().is_err()
    }

    /// Start a turn.
    ///
    /// The user message is appended immediately; the assistant message is
    /// appended once the returned stream has been driven to completion.
    /// A stream that fails or is dropped early leaves only the user message.
    ///
    /// # Errors
    ///
    /// - [`GascError::SessionBusy`] if another turn is still streaming
    /// - [`GascError::NotConfigured`] if no pipeline is installed
    ///
    /// Failures while streaming surface as [`GascError::Generation`] items.
    ///
    /// # Example
    /// ```no_run
    /// # async fn run(session: gascai::ConversationSession) -> gascai::Result<()> {
    /// let reply = session.submit_turn("What changed in 2.0?").await?.collect_text().await?;
    /// assert_eq!(session.history().await.last().map(|m| m.content.as_str()), Some(reply.as_str()));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit_turn(&self, user_text: &str) -> Result<TurnStream> {
        let guard = self
            .turn
            .clone()
            .try_lock_owned()
            .map_err(|_| GascError::SessionBusy)?;

        let chunks = {
            let mut state = self.state.write().await;
            let pipeline = state.pipeline.clone().ok_or(GascError::NotConfigured)?;
            let replay = window(&state.history, self.history_window);
            let chunks = pipeline.stream(replay, user_text);
            debug!(
                session = %self.id,
                replayed = replay.len(),
                total = state.history.len(),
                "Submitting turn"
            );
            state.history.push(Message::user(user_text));
            chunks
        };

        let state = self.state.clone();
        let session_id = self.id.clone();
        let inner: ChunkStream = Box::pin(async_stream::stream! {
            let _guard = guard;
            let mut chunks = chunks;
            let mut reply = String::new();

            while let Some(item) = chunks.next().await {
                match item {
                    Ok(chunk) => {
                        reply.push_str(&chunk);
                        yield Ok(chunk);
                    }
                    Err(e) => {
                        warn!(session = %session_id, error = %e, "Turn failed, partial reply discarded");
                        yield Err(match e {
                            GascError::Generation(_) => e,
                            other => GascError::Generation(other.to_string()),
                        });
                        return;
                    }
                }
            }

            debug!(session = %session_id, chars = reply.len(), "Turn complete");
            state.write().await.history.push(Message::assistant(reply));
        });

        Ok(TurnStream { inner })
    }
}

/// Most recent `size` messages, in order.
fn window(history: &[Message], size: Option<usize>) -> &[Message] {
    match size {
        Some(n) => &history[history.len().saturating_sub(n)..],
        None => history,
    }
}

/// Reply chunks of one turn, in production order.
///
/// Holds the session's turn slot until finished or dropped.
pub struct TurnStream {
    inner: ChunkStream,
}

impl TurnStream {
    /// Drain the stream into the full reply text.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(chunk) = self.next().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }
}

impl Stream for TurnStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::SystemPrompt;
    use crate::providers::testing::ScriptedModel;
    use crate::providers::{ChatMessage, ChatModel};
    use std::sync::Mutex as StdMutex;

    fn pipeline(model: ScriptedModel) -> RequestPipeline {
        RequestPipeline::new(SystemPrompt::new("sys"), Arc::new(model) as Arc<dyn ChatModel>)
    }

    async fn ready(model: ScriptedModel) -> ConversationSession {
        let session = ConversationSession::new();
        session.configure(pipeline(model), Vec::new()).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_unconfigured_session() {
        let session = ConversationSession::new();
        assert!(!session.is_ready().await);
        let err = session.submit_turn("hello").await.err().unwrap();
        assert!(matches!(err, GascError::NotConfigured));
        assert!(session.history().await.is_empty());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_turns_alternate() {
        let session = ready(ScriptedModel::replying(&["Sure", ", here", " it is"])).await;

        for i in 0..3 {
            let reply = session
                .submit_turn(&format!("question {}", i))
                .await
                .unwrap()
                .collect_text()
                .await
                .unwrap();
            assert_eq!(reply, "Sure, here it is");
        }

        let history = session.history().await;
        assert_eq!(history.len(), 6);
        for (i, message) in history.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(message.role, expected);
        }
        assert_eq!(history[4].content, "question 2");
        assert_eq!(history[5].content, "Sure, here it is");
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_user_message_only() {
        let session = ready(ScriptedModel::failing_after(&["partial", "never"], 1)).await;

        let mut turn = session.submit_turn("explain").await.unwrap();
        assert_eq!(turn.next().await.unwrap().unwrap(), "partial");
        let err = turn.next().await.unwrap().unwrap_err();
        assert!(matches!(err, GascError::Generation(ref m) if m.contains("connection reset")));
        assert!(turn.next().await.is_none());
        drop(turn);

        let history = session.history().await;
        assert_eq!(history, vec![Message::user("explain")]);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_second_turn_while_streaming_is_busy() {
        let session = ready(ScriptedModel::replying(&["a", "b"])).await;

        let mut first = session.submit_turn("one").await.unwrap();
        assert!(session.is_busy());
        assert!(matches!(
            session.submit_turn("two").await.err().unwrap(),
            GascError::SessionBusy
        ));
        assert!(matches!(
            session.reset_history().await.unwrap_err(),
            GascError::SessionBusy
        ));

        while first.next().await.is_some() {}
        drop(first);
        assert!(!session.is_busy());
        assert_eq!(session.history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_turn_appends_nothing() {
        let session = ready(ScriptedModel::replying(&["a", "b", "c"])).await;

        let mut turn = session.submit_turn("first").await.unwrap();
        assert_eq!(turn.next().await.unwrap().unwrap(), "a");
        drop(turn);

        assert!(!session.is_busy());
        assert_eq!(session.history().await, vec![Message::user("first")]);

        let reply = session.submit_turn("again").await.unwrap().collect_text().await.unwrap();
        assert_eq!(reply, "abc");
    }

    #[tokio::test]
    async fn test_reset_keeps_pipeline() {
        let session = ready(ScriptedModel::replying(&["ok"])).await;
        session.submit_turn("q").await.unwrap().collect_text().await.unwrap();
        assert_eq!(session.history().await.len(), 2);

        session.reset_history().await.unwrap();
        assert!(session.history().await.is_empty());
        assert!(session.is_ready().await);

        session.submit_turn("q2").await.unwrap().collect_text().await.unwrap();
        assert_eq!(session.history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_configure_preserves_history() {
        let session = ready(ScriptedModel::replying(&["first model"])).await;
        session.submit_turn("q").await.unwrap().collect_text().await.unwrap();

        let personas = vec![Persona::new("Tutor", "Teach.", &[])];
        session
            .configure(pipeline(ScriptedModel::replying(&["second model"])), personas)
            .await
            .unwrap();

        assert_eq!(session.history().await.len(), 2);
        assert_eq!(session.personas().await[0].name, "Tutor");
        let reply = session.submit_turn("q").await.unwrap().collect_text().await.unwrap();
        assert_eq!(reply, "second model");
    }

    #[tokio::test]
    async fn test_full_history_replayed() {
        let model = ScriptedModel::replying(&["r"]);
        let requests: Arc<StdMutex<Vec<Vec<ChatMessage>>>> = model.requests.clone();
        let session = ready(model).await;

        for q in ["q1", "q2", "q3"] {
            session.submit_turn(q).await.unwrap().collect_text().await.unwrap();
        }

        let sent = requests.lock().unwrap();
        let last: Vec<&str> = sent[2].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(last, vec!["sys", "q1", "r", "q2", "r", "q3"]);
    }

    #[tokio::test]
    async fn test_history_window_replays_most_recent() {
        let model = ScriptedModel::replying(&["r"]);
        let requests = model.requests.clone();
        let session = ConversationSession::new().with_history_window(Some(2));
        session.configure(pipeline(model), Vec::new()).await.unwrap();

        for q in ["q1", "q2", "q3"] {
            session.submit_turn(q).await.unwrap().collect_text().await.unwrap();
        }

        let sent = requests.lock().unwrap();
        let last: Vec<&str> = sent[2].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(last, vec!["sys", "q2", "r", "q3"]);
        // The stored history itself is never truncated
        drop(sent);
        assert_eq!(session.history().await.len(), 6);
    }

    #[test]
    fn test_window() {
        let history = vec![Message::user("a"), Message::assistant("b"), Message::user("c")];
        assert_eq!(window(&history, None).len(), 3);
        assert_eq!(window(&history, Some(2))[0].content, "b");
        assert_eq!(window(&history, Some(10)).len(), 3);
        assert!(window(&history, Some(0)).is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let a = ready(ScriptedModel::replying(&["x"])).await;
        let b = ready(ScriptedModel::replying(&["y"])).await;
        let _turn = a.submit_turn("busy").await.unwrap();

        assert!(b.submit_turn("free").await.is_ok());
        assert_ne!(a.id(), b.id());
    }
}
