use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::{watch, Notify};

use crate::api::{
    ApiError, ByteStream, ChatBackend, ChatHistory, ChatReply, ChatRequest, SessionSummary,
};
use crate::core::lock_unpoisoned;
use crate::core::progress::ProgressSnapshot;
use crate::core::transcript::{Bubble, Role};
use crate::ui::view::ChatView;

/// One canned response to `open_stream`.
pub struct ScriptedStream {
    open: Result<(), ApiError>,
    chunks: Vec<Result<Vec<u8>, ApiError>>,
    gate: Option<Arc<Notify>>,
    /// Chunks delivered before the gate is awaited.
    gate_after: usize,
}

impl ScriptedStream {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            open: Ok(()),
            chunks: chunks
                .into_iter()
                .map(|chunk| Ok(chunk.as_ref().to_vec()))
                .collect(),
            gate: None,
            gate_after: 0,
        }
    }

    pub fn chunks_then_error<I, S>(chunks: I, error: ApiError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut script = Self::chunks(chunks);
        script.chunks.push(Err(error));
        script
    }

    pub fn open_error(error: ApiError) -> Self {
        Self {
            open: Err(error),
            chunks: Vec::new(),
            gate: None,
            gate_after: 0,
        }
    }

    /// A stream that yields nothing until the returned gate is notified.
    pub fn gated<I, S>(chunks: I) -> (Self, Arc<Notify>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self::gated_after(0, chunks)
    }

    /// Deliver the first `delivered` chunks, then hold the rest until the
    /// returned gate is notified.
    pub fn gated_after<I, S>(delivered: usize, chunks: I) -> (Self, Arc<Notify>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let gate = Arc::new(Notify::new());
        let mut script = Self::chunks(chunks);
        script.gate = Some(gate.clone());
        script.gate_after = delivered;
        (script, gate)
    }

    fn into_stream(mut self) -> Result<ByteStream, ApiError> {
        self.open?;
        let held = self.chunks.split_off(self.gate_after.min(self.chunks.len()));
        let gate = self.gate;
        let wait = stream::once(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
        })
        .filter_map(|()| futures_util::future::ready(None::<Result<Vec<u8>, ApiError>>));
        Ok(Box::pin(
            stream::iter(self.chunks)
                .chain(wait)
                .chain(stream::iter(held)),
        ))
    }
}

/// In-memory [`ChatBackend`] that replays scripted responses and counts calls.
#[derive(Default)]
pub struct ScriptedBackend {
    streams: Mutex<VecDeque<ScriptedStream>>,
    replies: Mutex<VecDeque<Result<ChatReply, ApiError>>>,
    sessions: Mutex<Vec<SessionSummary>>,
    session_error: Mutex<Option<ApiError>>,
    histories: Mutex<HashMap<String, ChatHistory>>,
    stream_requests: Mutex<Vec<ChatRequest>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    session_calls: AtomicUsize,
}

impl Default for ScriptedStream {
    fn default() -> Self {
        Self::open_error(ApiError::Network("no scripted stream".into()))
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stream(&self, script: ScriptedStream) {
        lock_unpoisoned(&self.streams).push_back(script);
    }

    pub fn push_reply(&self, reply: Result<ChatReply, ApiError>) {
        lock_unpoisoned(&self.replies).push_back(reply);
    }

    pub fn set_sessions(&self, sessions: Vec<SessionSummary>) {
        *lock_unpoisoned(&self.sessions) = sessions;
    }

    pub fn fail_sessions(&self, error: ApiError) {
        *lock_unpoisoned(&self.session_error) = Some(error);
    }

    pub fn insert_history(&self, chat_id: &str, history: ChatHistory) {
        lock_unpoisoned(&self.histories).insert(chat_id.to_string(), history);
    }

    pub fn stream_calls(&self) -> usize {
        lock_unpoisoned(&self.stream_requests).len()
    }

    pub fn chat_calls(&self) -> usize {
        lock_unpoisoned(&self.chat_requests).len()
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn stream_requests(&self) -> Vec<ChatRequest> {
        lock_unpoisoned(&self.stream_requests).clone()
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        lock_unpoisoned(&self.chat_requests).clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ApiError> {
        lock_unpoisoned(&self.stream_requests).push(request.clone());
        let script = lock_unpoisoned(&self.streams).pop_front().unwrap_or_default();
        script.into_stream()
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        lock_unpoisoned(&self.chat_requests).push(request.clone());
        lock_unpoisoned(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network("no scripted reply".into())))
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ApiError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock_unpoisoned(&self.session_error).clone() {
            return Err(error);
        }
        Ok(lock_unpoisoned(&self.sessions).clone())
    }

    async fn chat_history(&self, chat_id: &str) -> Result<ChatHistory, ApiError> {
        lock_unpoisoned(&self.histories)
            .get(chat_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                body: r#"{"detail":"Chat not found"}"#.into(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    InputLocked(bool),
    ProgressStarted,
    BubbleAdded(Role, String),
    TranscriptReset(usize),
    SessionsRefreshed(usize),
}

/// [`ChatView`] that records every notification in order.
#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
    progress: Mutex<Vec<watch::Receiver<ProgressSnapshot>>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        lock_unpoisoned(&self.events).clone()
    }

    /// Receivers handed to the view, one per started turn.
    pub fn progress_receivers(&self) -> Vec<watch::Receiver<ProgressSnapshot>> {
        lock_unpoisoned(&self.progress).clone()
    }

    fn record(&self, event: ViewEvent) {
        lock_unpoisoned(&self.events).push(event);
    }
}

impl ChatView for RecordingView {
    fn input_locked(&self, locked: bool) {
        self.record(ViewEvent::InputLocked(locked));
    }

    fn progress_started(&self, updates: watch::Receiver<ProgressSnapshot>) {
        lock_unpoisoned(&self.progress).push(updates);
        self.record(ViewEvent::ProgressStarted);
    }

    fn bubble_added(&self, bubble: &Bubble) {
        self.record(ViewEvent::BubbleAdded(bubble.role, bubble.text.clone()));
    }

    fn transcript_reset(&self, bubbles: &[Bubble]) {
        self.record(ViewEvent::TranscriptReset(bubbles.len()));
    }

    fn sessions_refreshed(&self, sessions: &[SessionSummary]) {
        self.record(ViewEvent::SessionsRefreshed(sessions.len()));
    }
}
