//! Per-chat send orchestration.
//!
//! [`ChatController`] owns what used to be page-level globals: the current
//! chat id, the single-flight `streaming` flag, the active progress panel, and
//! the visible transcript. A turn runs the event stream to a terminal state,
//! falls back to one non-streaming request on failure, and always finalizes.

use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;
use tracing::{debug, info, warn};

use super::lock_unpoisoned;
use super::progress::{DetailKind, ProgressPanel, DEFAULT_TICK_INTERVAL};
use super::stream::{decode_block, DispatchOutcome, EventFramer, StreamDispatcher};
use super::transcript::{Bubble, Transcript};
use super::turn::TurnState;
use crate::api::{ApiError, ChatBackend, ChatReply, ChatRequest, SessionSummary};
use crate::ui::renderer::Renderer;
use crate::ui::view::ChatView;

pub const ENDED_EARLY_NOTICE: &str = "The response ended before it was complete.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Verbose detail rendering; also gates fallback `tool_calls` entries.
    pub show_tool_details: bool,
    pub tick_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            show_tool_details: true,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Per-request overrides sent along with every message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOverrides {
    pub model: Option<String>,
    /// Sent only while no chat id is known, since the server applies it to new chats.
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The message was empty after trimming.
    Empty,
    /// Another turn is still in flight.
    InFlight,
}

/// How a call to [`ChatController::send`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Rejected(RejectReason),
    /// The stream reached `done`.
    Completed,
    /// The stream failed and the non-streaming request succeeded.
    FellBack,
    /// Both the stream and the fallback failed.
    Failed,
    /// The stream ended without `done`.
    Aborted,
}

/// Why the streaming attempt of a turn was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    Transport(ApiError),
    /// The server sent an `error` event.
    Protocol(String),
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::Transport(err) => write!(f, "transport error: {err}"),
            TurnError::Protocol(message) => write!(f, "server error event: {message}"),
        }
    }
}

impl StdError for TurnError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TurnError::Transport(err) => Some(err),
            TurnError::Protocol(_) => None,
        }
    }
}

/// Errors from session operations that are not part of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A turn is in flight; the transcript cannot be replaced.
    Busy,
    Api(ApiError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Busy => write!(f, "a reply is still streaming"),
            SessionError::Api(err) => write!(f, "{}", err.summary()),
        }
    }
}

impl StdError for SessionError {}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        SessionError::Api(err)
    }
}

#[derive(Debug, Default)]
struct SessionState {
    chat_id: Option<String>,
    streaming: bool,
    active_progress: Option<ProgressPanel>,
    last_progress: Option<ProgressPanel>,
    transcript: Transcript,
}

pub struct ChatController {
    backend: Arc<dyn ChatBackend>,
    view: Arc<dyn ChatView>,
    renderer: Renderer,
    settings: ControllerSettings,
    overrides: RequestOverrides,
    session: Mutex<SessionState>,
}

impl ChatController {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        view: Arc<dyn ChatView>,
        renderer: Renderer,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            backend,
            view,
            renderer,
            settings,
            overrides: RequestOverrides::default(),
            session: Mutex::new(SessionState::default()),
        }
    }

    pub fn with_overrides(mut self, overrides: RequestOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Start with an existing chat id, as when continuing a chat from the CLI.
    pub fn with_chat_id(self, chat_id: Option<String>) -> Self {
        lock_unpoisoned(&self.session).chat_id = chat_id;
        self
    }

    pub fn chat_id(&self) -> Option<String> {
        lock_unpoisoned(&self.session).chat_id.clone()
    }

    pub fn is_streaming(&self) -> bool {
        lock_unpoisoned(&self.session).streaming
    }

    pub fn transcript(&self) -> Transcript {
        lock_unpoisoned(&self.session).transcript.clone()
    }

    /// Panel of the turn currently in flight.
    pub fn active_progress(&self) -> Option<ProgressPanel> {
        lock_unpoisoned(&self.session).active_progress.clone()
    }

    /// Panel of the most recent turn, finished or not.
    pub fn last_progress(&self) -> Option<ProgressPanel> {
        lock_unpoisoned(&self.session).last_progress.clone()
    }

    /// Send one user message and drive the turn to a terminal state.
    ///
    /// Concurrent calls while a turn is in flight are rejected, not queued.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Rejected(RejectReason::Empty);
        }

        let (chat_id, progress, user_bubble) = {
            let mut session = lock_unpoisoned(&self.session);
            if session.streaming {
                debug!("rejecting send while a turn is in flight");
                return SendOutcome::Rejected(RejectReason::InFlight);
            }
            session.streaming = true;
            let bubble = Bubble::user(text);
            session.transcript.push(bubble.clone());
            let progress =
                ProgressPanel::start(self.settings.show_tool_details, self.settings.tick_interval);
            session.active_progress = Some(progress.clone());
            session.last_progress = Some(progress.clone());
            (session.chat_id.clone(), progress, bubble)
        };

        self.view.input_locked(true);
        self.view.bubble_added(&user_bubble);
        self.view.progress_started(progress.subscribe());

        let mut turn = TurnState::new(chat_id, self.renderer, progress);
        let outcome = match self.stream_turn(text, &mut turn).await {
            Ok(()) if turn.is_completed() => SendOutcome::Completed,
            Ok(()) => {
                self.abort_turn(&mut turn);
                SendOutcome::Aborted
            }
            Err(err) => {
                warn!(error = %err, "streaming failed, retrying without streaming");
                self.fallback(text, &mut turn).await
            }
        };

        self.finish_turn(&turn).await;
        info!(?outcome, chat_id = ?turn.chat_id, "turn finished");
        outcome
    }

    /// Read the stream until `done` or end of input. The turn is completed
    /// only in the first case.
    async fn stream_turn(&self, text: &str, turn: &mut TurnState) -> Result<(), TurnError> {
        let request = self.request(text, turn);
        let mut body = self
            .backend
            .open_stream(&request)
            .await
            .map_err(TurnError::Transport)?;

        let mut framer = EventFramer::new();
        let mut dispatcher = StreamDispatcher::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(TurnError::Transport)?;
            framer.push(&chunk);
            while let Some(block) = framer.next_block() {
                if self.dispatch_block(&block, &mut dispatcher, turn)? {
                    return Ok(());
                }
            }
        }

        if let Some(block) = framer.finish() {
            self.dispatch_block(&block, &mut dispatcher, turn)?;
        }
        Ok(())
    }

    /// Returns `Ok(true)` once `done` has been handled.
    fn dispatch_block(
        &self,
        block: &str,
        dispatcher: &mut StreamDispatcher,
        turn: &mut TurnState,
    ) -> Result<bool, TurnError> {
        let Some(event) = decode_block(block) else {
            return Ok(false);
        };
        match self.with_transcript(|transcript| dispatcher.dispatch(event, turn, transcript)) {
            DispatchOutcome::Done => Ok(true),
            DispatchOutcome::Failed(message) => Err(TurnError::Protocol(message)),
            DispatchOutcome::Continue | DispatchOutcome::Ignored => Ok(false),
        }
    }

    fn request(&self, text: &str, turn: &TurnState) -> ChatRequest {
        let system_prompt = match turn.chat_id {
            None => self.overrides.system_prompt.clone(),
            Some(_) => None,
        };
        ChatRequest {
            system_prompt,
            model: self.overrides.model.clone(),
            ..ChatRequest::new(text, turn.chat_id.clone())
        }
    }

    async fn fallback(&self, text: &str, turn: &mut TurnState) -> SendOutcome {
        let request = self.request(text, turn);
        match self.backend.send_chat(&request).await {
            Ok(reply) => {
                self.apply_reply(reply, turn);
                SendOutcome::FellBack
            }
            Err(err) => {
                warn!(error = %err, "fallback request failed");
                let summary = err.summary();
                turn.progress.fail(summary.clone());
                self.with_transcript(|transcript| {
                    transcript.push(Bubble::assistant_notice(format!("Error: {summary}")));
                });
                SendOutcome::Failed
            }
        }
    }

    fn apply_reply(&self, reply: ChatReply, turn: &mut TurnState) {
        turn.adopt_chat_id(&reply.chat_id);
        if self.settings.show_tool_details {
            for call in reply.tool_calls.unwrap_or_default() {
                turn.progress.add_entry(
                    DetailKind::ToolResult,
                    json!({
                        "name": call.name,
                        "arguments": call.arguments,
                        "output": call.output,
                    }),
                );
            }
        }
        turn.message.discard_unattached();
        turn.message.append(&reply.reply);
        self.with_transcript(|transcript| turn.complete(transcript));
    }

    fn abort_turn(&self, turn: &mut TurnState) {
        warn!("stream ended without a done event");
        turn.progress.fail(ENDED_EARLY_NOTICE);
        self.with_transcript(|transcript| {
            if turn.message.is_empty() {
                transcript.push(Bubble::assistant_notice(ENDED_EARLY_NOTICE));
            } else {
                turn.message.attach(transcript);
                turn.message.finalize(transcript);
            }
        });
    }

    async fn finish_turn(&self, turn: &TurnState) {
        turn.progress.stop_ticker().await;
        {
            let mut session = lock_unpoisoned(&self.session);
            session.streaming = false;
            session.active_progress = None;
            if turn.chat_id.is_some() {
                session.chat_id.clone_from(&turn.chat_id);
            }
        }
        self.view.input_locked(false);

        if let Err(err) = self.refresh_sessions().await {
            warn!(error = %err, "could not refresh the session list");
        }
    }

    /// Fetch the session list and hand it to the view.
    pub async fn refresh_sessions(&self) -> Result<Vec<SessionSummary>, ApiError> {
        let sessions = self.backend.list_sessions().await?;
        self.view.sessions_refreshed(&sessions);
        Ok(sessions)
    }

    /// Replace the transcript with the server's history for `chat_id`.
    pub async fn open_chat(&self, chat_id: &str) -> Result<usize, SessionError> {
        if self.is_streaming() {
            return Err(SessionError::Busy);
        }
        let history = self.backend.chat_history(chat_id).await?;

        let bubbles = {
            let mut session = lock_unpoisoned(&self.session);
            if session.streaming {
                return Err(SessionError::Busy);
            }
            session
                .transcript
                .replace_with_history(&history.messages, &self.renderer);
            session.chat_id = Some(history.chat_id.unwrap_or_else(|| chat_id.to_string()));
            session.last_progress = None;
            session.transcript.iter().cloned().collect::<Vec<_>>()
        };
        self.view.transcript_reset(&bubbles);
        Ok(bubbles.len())
    }

    /// Forget the current chat; the next send starts a new one.
    pub fn new_chat(&self) -> Result<(), SessionError> {
        {
            let mut session = lock_unpoisoned(&self.session);
            if session.streaming {
                return Err(SessionError::Busy);
            }
            session.chat_id = None;
            session.last_progress = None;
            session.transcript.clear();
        }
        self.view.transcript_reset(&[]);
        Ok(())
    }

    /// Run `change` against the transcript and forward any new bubbles and
    /// updated bubbles to the view once the lock is released.
    fn with_transcript<T>(&self, change: impl FnOnce(&mut Transcript) -> T) -> T {
        let (result, added) = {
            let mut session = lock_unpoisoned(&self.session);
            let before = session.transcript.len();
            let result = change(&mut session.transcript);
            let added: Vec<Bubble> = session.transcript.iter().skip(before).cloned().collect();
            (result, added)
        };
        for bubble in &added {
            self.view.bubble_added(bubble);
        }
        result
    }
}

impl fmt::Debug for ChatController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatController")
            .field("renderer", &self.renderer.kind())
            .field("settings", &self.settings)
            .field("overrides", &self.overrides)
            .field("session", &*lock_unpoisoned(&self.session))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatHistory, HistoryMessage, ToolCallRecord};
    use crate::core::progress::ProgressStatus;
    use crate::core::transcript::Role;
    use crate::ui::renderer::RendererKind;
    use crate::utils::test_utils::{RecordingView, ScriptedBackend, ScriptedStream, ViewEvent};
    use std::sync::Arc;

    fn controller(backend: &Arc<ScriptedBackend>, view: &Arc<RecordingView>) -> ChatController {
        ChatController::new(
            backend.clone(),
            view.clone(),
            Renderer::from_kind(RendererKind::Fallback),
            ControllerSettings {
                show_tool_details: true,
                tick_interval: Duration::from_millis(20),
            },
        )
    }

    fn reply(chat_id: &str, text: &str) -> ChatReply {
        ChatReply {
            chat_id: chat_id.into(),
            reply: text.into(),
            tool_calls: None,
        }
    }

    #[tokio::test]
    async fn streamed_turn_records_details_then_reply() {
        let backend = Arc::new(ScriptedBackend::new());
        let (stream, gate) = ScriptedStream::gated_after(
            2,
            [
                "event: tool_start\ndata: {\"name\":\"search\"}\n\n",
                "event: tool_result\ndata: {\"name\":\"search\",\"output\":\"3 hits\"}\n\n",
                "data: Here \n\nda",
                "ta: are the results.\n\n",
                "event: done\ndata: chat-42\n\n",
            ],
        );
        backend.push_stream(stream);
        backend.set_sessions(vec![SessionSummary {
            chat_id: "chat-42".into(),
            title: "find things".into(),
        }]);
        let view = Arc::new(RecordingView::new());
        let controller = Arc::new(controller(&backend, &view));

        let turn = tokio::spawn({
            let controller = controller.clone();
            async move { controller.send("find things").await }
        });

        // Both detail entries land while the reply text is still held back.
        let mut updates = loop {
            if let Some(progress) = controller.active_progress() {
                break progress.subscribe();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        let midway = updates
            .wait_for(|snapshot| snapshot.entries.len() == 2)
            .await
            .expect("detail entries")
            .clone();
        let kinds: Vec<DetailKind> = midway.entries.iter().map(|entry| entry.kind).collect();
        assert_eq!(kinds, vec![DetailKind::ToolStart, DetailKind::ToolResult]);
        assert_eq!(midway.status, ProgressStatus::Running);
        assert_eq!(controller.transcript().len(), 1);
        assert!(!view
            .events()
            .iter()
            .any(|event| matches!(event, ViewEvent::BubbleAdded(Role::Assistant, _))));

        gate.notify_one();
        let outcome = turn.await.expect("turn task");
        assert_eq!(outcome, SendOutcome::Completed);
        assert_eq!(controller.chat_id().as_deref(), Some("chat-42"));
        assert!(!controller.is_streaming());
        assert!(controller.active_progress().is_none());

        let transcript = controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.get(0).map(|b| b.role), Some(Role::User));
        let reply = transcript.get(1).expect("assistant bubble");
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text, "Here are the results.");

        let progress = controller.last_progress().expect("progress");
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.status, ProgressStatus::Completed);
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[0].kind, DetailKind::ToolStart);
        assert_eq!(snapshot.entries[1].kind, DetailKind::ToolResult);
        assert!(!progress.ticker_running());
        let published = view.progress_receivers();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].borrow().status, ProgressStatus::Completed);

        assert_eq!(backend.stream_calls(), 1);
        assert_eq!(backend.chat_calls(), 0);
        assert_eq!(backend.session_calls(), 1);
        assert_eq!(
            view.events(),
            vec![
                ViewEvent::InputLocked(true),
                ViewEvent::BubbleAdded(Role::User, "find things".into()),
                ViewEvent::ProgressStarted,
                ViewEvent::BubbleAdded(Role::Assistant, "Here are the results.".into()),
                ViewEvent::InputLocked(false),
                ViewEvent::SessionsRefreshed(1),
            ]
        );
    }

    #[tokio::test]
    async fn network_failure_falls_back_exactly_once() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(ScriptedStream::open_error(ApiError::Network(
            "connection refused".into(),
        )));
        backend.push_reply(Ok(reply("chat-7", "Plain *reply* text")));
        let view = Arc::new(RecordingView::new());
        let controller = controller(&backend, &view);

        assert_eq!(controller.send("hello").await, SendOutcome::FellBack);
        assert_eq!(backend.stream_calls(), 1);
        assert_eq!(backend.chat_calls(), 1);
        assert_eq!(
            backend.chat_requests(),
            vec![ChatRequest::new("hello", None)]
        );
        assert_eq!(
            controller.transcript().last().map(|b| b.text.clone()).as_deref(),
            Some("Plain *reply* text")
        );
        assert_eq!(controller.chat_id().as_deref(), Some("chat-7"));
        let snapshot = controller.last_progress().expect("progress").snapshot();
        assert_eq!(snapshot.status, ProgressStatus::Completed);
        assert!(!controller.is_streaming());
    }

    #[tokio::test]
    async fn error_event_discards_partial_text_and_falls_back() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(ScriptedStream::chunks([
            "data: partial\n\nevent: error\ndata: model overloaded\n\ndata: never\n\n",
        ]));
        backend.push_reply(Ok(ChatReply {
            chat_id: "chat-9".into(),
            reply: "full answer".into(),
            tool_calls: Some(vec![ToolCallRecord {
                name: "clock".into(),
                arguments: json!({}),
                output: json!("12:00"),
            }]),
        }));
        let view = Arc::new(RecordingView::new());
        let controller = controller(&backend, &view);

        assert_eq!(controller.send("time?").await, SendOutcome::FellBack);
        let transcript = controller.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.get(1).map(|b| b.text.as_str()), Some("full answer"));

        let entries = controller.last_progress().expect("progress").snapshot().entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, DetailKind::ToolResult);
        assert_eq!(entries[0].payload["output"], json!("12:00"));
    }

    #[tokio::test]
    async fn failure_mid_stream_uses_current_chat_id() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(ScriptedStream::chunks_then_error(
            ["data: Hel"],
            ApiError::Network("connection reset".into()),
        ));
        backend.push_reply(Ok(reply("existing", "Hello")));
        let view = Arc::new(RecordingView::new());
        let controller = controller(&backend, &view).with_chat_id(Some("existing".into()));

        assert_eq!(controller.send("hi").await, SendOutcome::FellBack);
        assert_eq!(backend.chat_requests()[0].chat_id.as_deref(), Some("existing"));
        assert_eq!(
            controller.transcript().last().map(|b| b.text.clone()).as_deref(),
            Some("Hello")
        );
    }

    #[tokio::test]
    async fn double_failure_appends_error_bubble_and_fails_panel() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(ScriptedStream::open_error(ApiError::Status {
            status: 502,
            body: String::new(),
        }));
        backend.push_reply(Err(ApiError::Status {
            status: 500,
            body: r#"{"detail":"agent crashed"}"#.into(),
        }));
        let view = Arc::new(RecordingView::new());
        let controller = controller(&backend, &view);

        assert_eq!(controller.send("hello").await, SendOutcome::Failed);
        assert_eq!(backend.chat_calls(), 1);

        let last = controller.transcript().last().cloned().expect("error bubble");
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.text, "Error: Server error 500: agent crashed");

        let snapshot = controller.last_progress().expect("progress").snapshot();
        assert_eq!(snapshot.status, ProgressStatus::Failed);
        assert_eq!(
            snapshot.failure.as_deref(),
            Some("Server error 500: agent crashed")
        );
        assert!(!controller.is_streaming());
        assert_eq!(view.events().last(), Some(&ViewEvent::SessionsRefreshed(0)));
    }

    #[tokio::test]
    async fn send_is_rejected_while_a_turn_is_in_flight() {
        let backend = Arc::new(ScriptedBackend::new());
        let (stream, gate) = ScriptedStream::gated([
            "data: first\n\n",
            "event: done\ndata: chat-1\n\n",
        ]);
        backend.push_stream(stream);
        let view = Arc::new(RecordingView::new());
        let controller = Arc::new(controller(&backend, &view));

        let running = tokio::spawn({
            let controller = controller.clone();
            async move { controller.send("first").await }
        });
        while !controller.is_streaming() {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            controller.send("hello").await,
            SendOutcome::Rejected(RejectReason::InFlight)
        );
        assert!(controller.active_progress().is_some());
        assert!(controller.new_chat().is_err());

        gate.notify_one();
        assert_eq!(running.await.expect("join"), SendOutcome::Completed);
        assert_eq!(backend.stream_calls(), 1);
        assert_eq!(controller.transcript().len(), 2);
    }

    #[tokio::test]
    async fn overrides_ride_along_and_system_prompt_only_starts_a_chat() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(ScriptedStream::chunks(["data: hi\n\nevent: done\ndata: chat-5\n\n"]));
        backend.push_stream(ScriptedStream::open_error(ApiError::MissingBody));
        backend.push_reply(Ok(reply("chat-5", "again")));
        let view = Arc::new(RecordingView::new());
        let controller = controller(&backend, &view).with_overrides(RequestOverrides {
            model: Some("gpt-5-mini".into()),
            system_prompt: Some("Answer tersely.".into()),
        });

        assert_eq!(controller.send("first").await, SendOutcome::Completed);
        assert_eq!(controller.send("second").await, SendOutcome::FellBack);

        let follow_up = ChatRequest {
            model: Some("gpt-5-mini".into()),
            ..ChatRequest::new("second", Some("chat-5".into()))
        };
        assert_eq!(
            backend.stream_requests(),
            vec![
                ChatRequest {
                    model: Some("gpt-5-mini".into()),
                    system_prompt: Some("Answer tersely.".into()),
                    ..ChatRequest::new("first", None)
                },
                follow_up.clone(),
            ]
        );
        assert_eq!(backend.chat_requests(), vec![follow_up]);
    }

    #[tokio::test]
    async fn empty_messages_are_rejected_without_side_effects() {
        let backend = Arc::new(ScriptedBackend::new());
        let view = Arc::new(RecordingView::new());
        let controller = controller(&backend, &view);

        assert_eq!(
            controller.send("   \n").await,
            SendOutcome::Rejected(RejectReason::Empty)
        );
        assert_eq!(backend.stream_calls(), 0);
        assert!(view.events().is_empty());
    }

    #[tokio::test]
    async fn events_after_done_are_not_dispatched() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(ScriptedStream::chunks([
            "data: answer\n\nevent: done\ndata: abc123\n\ndata: trailing\n\nevent: status\ndata: {}\n\n",
        ]));
        let view = Arc::new(RecordingView::new());
        let controller = controller(&backend, &view);

        assert_eq!(controller.send("q").await, SendOutcome::Completed);
        assert_eq!(controller.chat_id().as_deref(), Some("abc123"));
        assert_eq!(
            controller.transcript().last().map(|b| b.text.clone()).as_deref(),
            Some("answer")
        );
        assert!(controller
            .last_progress()
            .expect("progress")
            .snapshot()
            .entries
            .is_empty());
    }

    #[tokio::test]
    async fn end_of_stream_without_done_keeps_partial_text() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(ScriptedStream::chunks(["data: partial answer"]));
        let view = Arc::new(RecordingView::new());
        let controller = controller(&backend, &view);

        assert_eq!(controller.send("q").await, SendOutcome::Aborted);
        assert_eq!(backend.chat_calls(), 0);
        assert_eq!(
            controller.transcript().last().map(|b| b.text.clone()).as_deref(),
            Some("partial answer")
        );
        let snapshot = controller.last_progress().expect("progress").snapshot();
        assert_eq!(snapshot.status, ProgressStatus::Failed);
        assert!(!controller.is_streaming());
    }

    #[tokio::test]
    async fn empty_stream_reports_early_end() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_stream(ScriptedStream::chunks(Vec::<&str>::new()));
        let view = Arc::new(RecordingView::new());
        let controller = controller(&backend, &view);

        assert_eq!(controller.send("q").await, SendOutcome::Aborted);
        assert_eq!(
            controller.transcript().last().map(|b| b.text.clone()).as_deref(),
            Some(ENDED_EARLY_NOTICE)
        );
    }

    #[tokio::test]
    async fn open_chat_replaces_transcript_with_history() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.insert_history(
            "chat-3",
            ChatHistory {
                chat_id: Some("chat-3".into()),
                messages: vec![
                    HistoryMessage {
                        role: "system".into(),
                        content: "prompt".into(),
                    },
                    HistoryMessage {
                        role: "user".into(),
                        content: "hi".into(),
                    },
                    HistoryMessage {
                        role: "assistant".into(),
                        content: "hello".into(),
                    },
                ],
            },
        );
        let view = Arc::new(RecordingView::new());
        let controller = controller(&backend, &view);

        assert_eq!(controller.open_chat("chat-3").await, Ok(2));
        assert_eq!(controller.chat_id().as_deref(), Some("chat-3"));
        assert_eq!(view.events(), vec![ViewEvent::TranscriptReset(2)]);

        let missing = controller.open_chat("nope").await;
        assert!(matches!(missing, Err(SessionError::Api(ApiError::Status { status: 404, .. }))));
        assert_eq!(controller.chat_id().as_deref(), Some("chat-3"));

        controller.new_chat().expect("new chat");
        assert_eq!(controller.chat_id(), None);
        assert!(controller.transcript().is_empty());
    }

    #[tokio::test]
    async fn session_refresh_failure_does_not_fail_the_turn() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.fail_sessions(ApiError::Network("down".into()));
        backend.push_stream(ScriptedStream::chunks(["data: ok\n\nevent: done\ndata: c\n\n"]));
        let view = Arc::new(RecordingView::new());
        let controller = controller(&backend, &view);

        assert_eq!(controller.send("q").await, SendOutcome::Completed);
        assert_eq!(backend.session_calls(), 1);
        assert_eq!(view.events().last(), Some(&ViewEvent::InputLocked(false)));
    }
}
