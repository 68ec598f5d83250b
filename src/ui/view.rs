use std::io::{IsTerminal, Write};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::api::SessionSummary;
use crate::core::lock_unpoisoned;
use crate::core::progress::ProgressSnapshot;
use crate::core::transcript::{Bubble, Role};
use crate::utils::logging::TranscriptLog;

/// Presentation sink for a [`ChatController`](crate::core::controller::ChatController).
///
/// Calls arrive from the task driving the turn and never while the
/// controller holds its session lock.
pub trait ChatView: Send + Sync {
    fn input_locked(&self, _locked: bool) {}

    /// A turn started; `updates` yields every progress change until it finishes.
    fn progress_started(&self, updates: watch::Receiver<ProgressSnapshot>);

    /// A bubble became visible.
    fn bubble_added(&self, bubble: &Bubble);

    /// The whole transcript was replaced (new chat, or history loaded).
    fn transcript_reset(&self, bubbles: &[Bubble]);

    fn sessions_refreshed(&self, _sessions: &[SessionSummary]) {}
}

/// What the terminal prints for assistant bubbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Source markdown.
    #[default]
    Text,
    /// Renderer output.
    Html,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Html => "html",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "markdown" => Some(OutputFormat::Text),
            "html" => Some(OutputFormat::Html),
            _ => None,
        }
    }
}

/// Render the panel as terminal lines: the summary, then the entries when
/// the details container is expanded.
pub fn format_panel(snapshot: &ProgressSnapshot) -> String {
    let mut out = snapshot.summary.clone();
    if snapshot.entries.is_empty() {
        return out;
    }
    if snapshot.collapsed {
        let count = snapshot.entries.len();
        let noun = if count == 1 { "detail" } else { "details" };
        out.push_str(&format!(" ({count} {noun}, /details to show)"));
        return out;
    }
    for (index, entry) in snapshot.entries.iter().enumerate() {
        let marker = if entry.collapsed { '▸' } else { '▾' };
        out.push_str(&format!("\n  {}. {marker} {}", index + 1, entry.title()));
        if entry.collapsed {
            continue;
        }
        if let Some(body) = entry.body(snapshot.verbose) {
            for line in body.lines() {
                out.push_str("\n       ");
                out.push_str(line);
            }
        }
    }
    out
}

/// Line-oriented view: replies on stdout, progress on stderr.
pub struct TerminalView {
    output: OutputFormat,
    echo_user: bool,
    log: Mutex<TranscriptLog>,
    sessions: Mutex<Vec<SessionSummary>>,
    progress_task: Mutex<Option<JoinHandle<()>>>,
}

impl TerminalView {
    pub fn new(output: OutputFormat, log: TranscriptLog) -> Self {
        Self {
            output,
            echo_user: false,
            log: Mutex::new(log),
            sessions: Mutex::new(Vec::new()),
            progress_task: Mutex::new(None),
        }
    }

    /// Also print user bubbles as they are sent, for when the input is not
    /// typed on the same terminal.
    pub fn with_user_echo(mut self, echo: bool) -> Self {
        self.echo_user = echo;
        self
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, TranscriptLog> {
        lock_unpoisoned(&self.log)
    }

    /// Session list from the most recent refresh.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        lock_unpoisoned(&self.sessions).clone()
    }

    /// Wait until the progress printer of the last turn has written its
    /// final summary.
    pub async fn settle(&self) {
        let task = lock_unpoisoned(&self.progress_task).take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn format_bubble(&self, bubble: &Bubble) -> String {
        let body = match self.output {
            OutputFormat::Text => bubble.text.as_str(),
            OutputFormat::Html => bubble.rendered.as_str(),
        };
        match bubble.role {
            Role::User => format!("you> {body}"),
            Role::Assistant => body.to_string(),
        }
    }
}

impl ChatView for TerminalView {
    fn progress_started(&self, mut updates: watch::Receiver<ProgressSnapshot>) {
        let live = std::io::stderr().is_terminal();
        let task = tokio::spawn(async move {
            loop {
                let snapshot = updates.borrow_and_update().clone();
                print_progress(&snapshot, live);
                if snapshot.is_finished() || updates.changed().await.is_err() {
                    break;
                }
            }
        });
        if let Some(previous) = lock_unpoisoned(&self.progress_task).replace(task) {
            previous.abort();
        }
    }

    fn bubble_added(&self, bubble: &Bubble) {
        if let Err(err) = self.log().log_bubble(bubble) {
            warn!(error = %err, "could not write to the transcript log");
        }
        if bubble.role == Role::User && !self.echo_user {
            return;
        }
        println!("{}\n", self.format_bubble(bubble));
    }

    fn transcript_reset(&self, bubbles: &[Bubble]) {
        if bubbles.is_empty() {
            println!("-- new chat --\n");
            return;
        }
        for bubble in bubbles {
            let text = self.format_bubble(bubble);
            println!("{text}\n");
        }
    }

    fn sessions_refreshed(&self, sessions: &[SessionSummary]) {
        *lock_unpoisoned(&self.sessions) = sessions.to_vec();
    }
}

/// Live terminals get an in-place status line; the final panel is always printed.
fn print_progress(snapshot: &ProgressSnapshot, live: bool) {
    let mut stderr = std::io::stderr().lock();
    if snapshot.is_finished() {
        if live {
            let _ = write!(stderr, "\r\x1b[2K");
        }
        let _ = writeln!(stderr, "{}", format_panel(snapshot));
    } else if live {
        let _ = write!(stderr, "\r\x1b[2K{}", snapshot.summary);
        let _ = stderr.flush();
    }
}

/// Text listing of the session list, numbered from 1, with a placeholder when empty.
pub fn format_sessions(sessions: &[SessionSummary], current: Option<&str>) -> String {
    if sessions.is_empty() {
        return "No conversations yet.".to_string();
    }
    sessions
        .iter()
        .enumerate()
        .map(|(index, session)| {
            let marker = if Some(session.chat_id.as_str()) == current {
                '*'
            } else {
                ' '
            };
            let title = if session.title.trim().is_empty() {
                "New chat"
            } else {
                session.title.as_str()
            };
            format!("{marker} {}. {}  {title}", index + 1, session.chat_id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turn `/open` input into a chat id: an exact id wins, then a listing number.
pub fn resolve_session(sessions: &[SessionSummary], reference: &str) -> String {
    let reference = reference.trim();
    if sessions.iter().any(|session| session.chat_id == reference) {
        return reference.to_string();
    }
    reference
        .parse::<usize>()
        .ok()
        .and_then(|number| number.checked_sub(1))
        .and_then(|index| sessions.get(index))
        .map_or_else(|| reference.to_string(), |session| session.chat_id.clone())
}
