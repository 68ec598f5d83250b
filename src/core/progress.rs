//! Per-turn progress panel: elapsed-time summary plus a log of tool and
//! reasoning sub-events.
//!
//! [`ProgressState`] is the plain state machine (`running` → `completed` |
//! `failed`). [`ProgressPanel`] shares it with a periodic ticker task and
//! publishes [`ProgressSnapshot`]s over a watch channel. Every publish
//! happens under the state lock, so a tick racing with completion can never
//! overwrite the final summary.

use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::lock_unpoisoned;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailKind {
    ToolStart,
    ToolResult,
    Reasoning,
    Status,
}

impl DetailKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DetailKind::ToolStart => "tool_start",
            DetailKind::ToolResult => "tool_result",
            DetailKind::Reasoning => "reasoning",
            DetailKind::Status => "status",
        }
    }
}

/// One structured sub-event shown inside the panel.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailEntry {
    pub kind: DetailKind,
    pub payload: Value,
    pub collapsed: bool,
}

impl DetailEntry {
    pub fn new(kind: DetailKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            collapsed: true,
        }
    }

    pub fn title(&self) -> String {
        match self.kind {
            DetailKind::ToolStart => format!("Calling {}", self.tool_name()),
            DetailKind::ToolResult => format!("{} finished", self.tool_name()),
            DetailKind::Reasoning => "Reasoning".to_string(),
            DetailKind::Status => ["message", "status", "text"]
                .iter()
                .find_map(|key| self.payload.get(*key).and_then(Value::as_str))
                .filter(|text| !text.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| "Status update".to_string()),
        }
    }

    /// Expanded body text. Tool arguments and outputs only appear when
    /// `verbose` is set; reasoning is always shown.
    pub fn body(&self, verbose: bool) -> Option<String> {
        match self.kind {
            DetailKind::ToolStart if verbose => {
                self.payload.get("arguments").map(pretty_arguments)
            }
            DetailKind::ToolResult if verbose => match self.payload.get("output")? {
                Value::Null => None,
                Value::String(text) => Some(text.clone()),
                other => Some(pretty_json(other)),
            },
            DetailKind::Reasoning => reasoning_text(&self.payload),
            _ => None,
        }
    }

    fn tool_name(&self) -> &str {
        self.payload
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or("tool")
    }
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Arguments may arrive as an object or as a JSON-encoded string.
fn pretty_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .map(|parsed| pretty_json(&parsed))
            .unwrap_or_else(|_| raw.clone()),
        other => pretty_json(other),
    }
}

/// Join the `summary` and `content` fragment arrays of a reasoning payload.
/// The payload may carry them directly or nested under `reasoning`.
fn reasoning_text(payload: &Value) -> Option<String> {
    let source = payload
        .get("reasoning")
        .filter(|nested| nested.is_object())
        .unwrap_or(payload);

    let sections: Vec<String> = ["summary", "content"]
        .iter()
        .filter_map(|key| source.get(*key).and_then(Value::as_array))
        .map(|fragments| {
            fragments
                .iter()
                .filter_map(|fragment| match fragment {
                    Value::String(text) => Some(text.as_str()),
                    Value::Object(map) => map.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .filter(|text| !text.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|section| !section.is_empty())
        .collect();

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let whole = elapsed.as_secs();
        format!("{}m {:02}s", whole / 60, whole % 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Running,
    Completed,
    Failed,
}

/// Immutable view of the panel, published on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub status: ProgressStatus,
    pub elapsed: Duration,
    pub summary: String,
    pub collapsed: bool,
    pub verbose: bool,
    pub entries: Vec<DetailEntry>,
    pub failure: Option<String>,
}

impl ProgressSnapshot {
    pub fn is_finished(&self) -> bool {
        self.status != ProgressStatus::Running
    }
}

#[derive(Debug, Clone)]
pub struct ProgressState {
    started: Instant,
    elapsed: Duration,
    status: ProgressStatus,
    collapsed: bool,
    verbose: bool,
    entries: Vec<DetailEntry>,
    failure: Option<String>,
}

impl ProgressState {
    pub fn new(started: Instant, verbose: bool) -> Self {
        Self {
            started,
            elapsed: Duration::ZERO,
            status: ProgressStatus::Running,
            collapsed: true,
            verbose,
            entries: Vec::new(),
            failure: None,
        }
    }

    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status != ProgressStatus::Running
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn entries(&self) -> &[DetailEntry] {
        &self.entries
    }

    /// Refresh elapsed time. Returns `false` once the panel has finished.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.is_finished() {
            return false;
        }
        self.elapsed = now.saturating_duration_since(self.started);
        true
    }

    pub fn complete(&mut self, now: Instant) -> bool {
        self.finish(now, ProgressStatus::Completed, None)
    }

    pub fn fail(&mut self, now: Instant, message: impl Into<String>) -> bool {
        self.finish(now, ProgressStatus::Failed, Some(message.into()))
    }

    fn finish(&mut self, now: Instant, status: ProgressStatus, failure: Option<String>) -> bool {
        if !self.tick(now) {
            return false;
        }
        self.status = status;
        self.failure = failure;
        true
    }

    /// Entries are accepted in every state, including after completion.
    pub fn add_entry(&mut self, kind: DetailKind, payload: Value) {
        self.entries.push(DetailEntry::new(kind, payload));
    }

    /// Toggle the aggregate details container; returns the new collapsed flag.
    pub fn toggle_collapsed(&mut self) -> bool {
        self.collapsed = !self.collapsed;
        self.collapsed
    }

    pub fn toggle_entry(&mut self, index: usize) -> Option<bool> {
        let entry = self.entries.get_mut(index)?;
        entry.collapsed = !entry.collapsed;
        Some(entry.collapsed)
    }

    pub fn summary(&self) -> String {
        let elapsed = format_elapsed(self.elapsed);
        let tool_calls = self
            .entries
            .iter()
            .filter(|entry| entry.kind == DetailKind::ToolStart)
            .count();

        match self.status {
            ProgressStatus::Running => match self.entries.last() {
                Some(latest) => format!("Working · {elapsed} · {}", latest.title()),
                None => format!("Working · {elapsed}"),
            },
            ProgressStatus::Completed => match tool_calls {
                0 => format!("Completed in {elapsed}"),
                1 => format!("Completed in {elapsed} · 1 tool call"),
                n => format!("Completed in {elapsed} · {n} tool calls"),
            },
            ProgressStatus::Failed => match self.failure.as_deref() {
                Some(reason) if !reason.is_empty() => format!("Failed after {elapsed}: {reason}"),
                _ => format!("Failed after {elapsed}"),
            },
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status,
            elapsed: self.elapsed,
            summary: self.summary(),
            collapsed: self.collapsed,
            verbose: self.verbose,
            entries: self.entries.clone(),
            failure: self.failure.clone(),
        }
    }
}

struct PanelShared {
    state: Mutex<ProgressState>,
    updates: watch::Sender<ProgressSnapshot>,
    stop: CancellationToken,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl PanelShared {
    fn update<T>(&self, change: impl FnOnce(&mut ProgressState) -> T) -> T {
        let mut state = lock_unpoisoned(&self.state);
        let result = change(&mut state);
        self.updates.send_replace(state.snapshot());
        result
    }
}

/// Shared handle to one turn's progress panel.
#[derive(Clone)]
pub struct ProgressPanel {
    shared: Arc<PanelShared>,
}

impl std::fmt::Debug for ProgressPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressPanel")
            .field("state", &*lock_unpoisoned(&self.shared.state))
            .finish()
    }
}

impl ProgressPanel {
    /// Create a panel without a ticker. Elapsed time still updates on
    /// completion and on explicit [`tick`](Self::tick) calls.
    pub fn new(verbose: bool) -> Self {
        let state = ProgressState::new(Instant::now(), verbose);
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            shared: Arc::new(PanelShared {
                state: Mutex::new(state),
                updates,
                stop: CancellationToken::new(),
                ticker: Mutex::new(None),
            }),
        }
    }

    /// Create a panel and spawn its ticker on the current tokio runtime.
    pub fn start(verbose: bool, period: Duration) -> Self {
        let panel = Self::new(verbose);
        let period = period.max(Duration::from_millis(10));
        let handle = tokio::spawn(run_ticker(
            Arc::downgrade(&panel.shared),
            panel.shared.stop.clone(),
            period,
        ));
        *lock_unpoisoned(&panel.shared.ticker) = Some(handle);
        panel
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.shared.updates.subscribe()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        lock_unpoisoned(&self.shared.state).snapshot()
    }

    pub fn is_finished(&self) -> bool {
        lock_unpoisoned(&self.shared.state).is_finished()
    }

    pub fn tick(&self) -> bool {
        self.shared.update(|state| state.tick(Instant::now()))
    }

    pub fn add_entry(&self, kind: DetailKind, payload: Value) {
        self.shared.update(|state| state.add_entry(kind, payload));
    }

    /// Latch the panel as completed. No-op (returns `false`) once finished.
    pub fn complete(&self) -> bool {
        let changed = self.shared.update(|state| state.complete(Instant::now()));
        self.shared.stop.cancel();
        changed
    }

    /// Latch the panel as failed. No-op (returns `false`) once finished.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let changed = self
            .shared
            .update(|state| state.fail(Instant::now(), message));
        self.shared.stop.cancel();
        changed
    }

    pub fn toggle_collapsed(&self) -> bool {
        self.shared.update(ProgressState::toggle_collapsed)
    }

    pub fn toggle_entry(&self, index: usize) -> Option<bool> {
        self.shared.update(|state| state.toggle_entry(index))
    }

    /// Stop the ticker and wait for it to exit.
    pub async fn stop_ticker(&self) {
        self.shared.stop.cancel();
        let handle = lock_unpoisoned(&self.shared.ticker).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    #[cfg(test)]
    pub(crate) fn ticker_running(&self) -> bool {
        lock_unpoisoned(&self.shared.ticker)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

async fn run_ticker(shared: Weak<PanelShared>, stop: CancellationToken, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                if !shared.update(|state| state.tick(Instant::now())) {
                    break;
                }
            }
        }
    }
}
