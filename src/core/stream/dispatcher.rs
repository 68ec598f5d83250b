use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::decoder::WireEvent;
use crate::core::progress::DetailKind;
use crate::core::transcript::Transcript;
use crate::core::turn::TurnState;

pub const GENERIC_STREAM_ERROR: &str = "The server reported an error while generating a reply.";

/// Event names after lower-casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Error,
    Detail(DetailKind),
    /// Deprecated `tools` snapshot event; accepted and ignored.
    LegacyTools,
    Done,
    /// `message` and any name not listed above.
    Text,
}

impl EventKind {
    pub fn classify(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "error" => EventKind::Error,
            "status" => EventKind::Detail(DetailKind::Status),
            "tool_start" => EventKind::Detail(DetailKind::ToolStart),
            "tool_result" => EventKind::Detail(DetailKind::ToolResult),
            "reasoning" => EventKind::Detail(DetailKind::Reasoning),
            "tools" => EventKind::LegacyTools,
            "done" => EventKind::Done,
            _ => EventKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Keep reading.
    Continue,
    /// `done` was handled; stop reading.
    Done,
    /// The server sent an `error` event; stop reading.
    Failed(String),
    /// The stream already terminated; the event was dropped.
    Ignored,
}

/// Applies decoded events to a turn, strictly in arrival order.
#[derive(Debug, Default)]
pub struct StreamDispatcher {
    terminated: bool,
}

impl StreamDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(
        &mut self,
        event: WireEvent,
        turn: &mut TurnState,
        transcript: &mut Transcript,
    ) -> DispatchOutcome {
        if self.terminated {
            warn!(event = %event.name, "dropping event received after the stream terminated");
            return DispatchOutcome::Ignored;
        }

        match EventKind::classify(&event.name) {
            EventKind::Error => {
                self.terminated = true;
                let message = event.data.trim();
                if message.is_empty() {
                    DispatchOutcome::Failed(GENERIC_STREAM_ERROR.to_string())
                } else {
                    DispatchOutcome::Failed(message.to_string())
                }
            }
            EventKind::Detail(kind) => {
                match parse_detail_payload(&event.data) {
                    Ok(payload) => turn.progress.add_entry(kind, payload),
                    Err(err) => {
                        warn!(event = kind.as_str(), error = %err, "dropping malformed structured event");
                    }
                }
                DispatchOutcome::Continue
            }
            EventKind::LegacyTools => {
                debug!("ignoring legacy tools event");
                DispatchOutcome::Continue
            }
            EventKind::Done => {
                self.terminated = true;
                turn.adopt_chat_id(&event.data);
                turn.complete(transcript);
                DispatchOutcome::Done
            }
            EventKind::Text => {
                if !event.data.is_empty() {
                    turn.message.append(&event.data);
                }
                DispatchOutcome::Continue
            }
        }
    }
}

fn parse_detail_payload(data: &str) -> Result<Value, serde_json::Error> {
    if data.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::{ProgressPanel, ProgressStatus};
    use crate::ui::renderer::{Renderer, RendererKind};
    use serde_json::json;

    fn turn() -> TurnState {
        TurnState::new(
            Some("local-placeholder".into()),
            Renderer::from_kind(RendererKind::Fallback),
            ProgressPanel::new(true),
        )
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(EventKind::classify("DONE"), EventKind::Done);
        assert_eq!(
            EventKind::classify("Tool_Start"),
            EventKind::Detail(DetailKind::ToolStart)
        );
        assert_eq!(EventKind::classify("message"), EventKind::Text);
        assert_eq!(EventKind::classify("delta"), EventKind::Text);
    }

    #[test]
    fn text_events_accumulate_without_touching_the_transcript() {
        let mut dispatcher = StreamDispatcher::new();
        let mut turn = turn();
        let mut transcript = Transcript::new();

        for chunk in ["Here ", "are ", "results."] {
            let outcome = dispatcher.dispatch(WireEvent::message(chunk), &mut turn, &mut transcript);
            assert_eq!(outcome, DispatchOutcome::Continue);
        }
        dispatcher.dispatch(WireEvent::new("custom", "!"), &mut turn, &mut transcript);
        dispatcher.dispatch(WireEvent::new("custom", ""), &mut turn, &mut transcript);

        assert_eq!(turn.message.text(), "Here are results.!");
        assert!(transcript.is_empty());
        assert!(turn.progress.snapshot().entries.is_empty());
    }

    #[test]
    fn structured_events_become_detail_entries() {
        let mut dispatcher = StreamDispatcher::new();
        let mut turn = turn();
        let mut transcript = Transcript::new();

        dispatcher.dispatch(
            WireEvent::new("tool_start", r#"{"name":"search","arguments":{"q":"x"}}"#),
            &mut turn,
            &mut transcript,
        );
        dispatcher.dispatch(WireEvent::new("status", ""), &mut turn, &mut transcript);
        dispatcher.dispatch(WireEvent::new("reasoning", "{not json"), &mut turn, &mut transcript);
        dispatcher.dispatch(WireEvent::new("tools", "[]"), &mut turn, &mut transcript);

        let entries = turn.progress.snapshot().entries;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, DetailKind::ToolStart);
        assert_eq!(entries[0].payload["name"], json!("search"));
        assert_eq!(entries[1].kind, DetailKind::Status);
        assert_eq!(entries[1].payload, json!({}));
        assert!(turn.message.is_empty());
    }

    #[test]
    fn detail_entries_precede_rendered_text() {
        let mut dispatcher = StreamDispatcher::new();
        let mut turn = turn();
        let mut transcript = Transcript::new();
        let events = [
            WireEvent::new("tool_start", r#"{"name":"search"}"#),
            WireEvent::new("tool_result", r#"{"name":"search","output":"3 hits"}"#),
            WireEvent::message("Here "),
            WireEvent::message("are the results."),
            WireEvent::new("done", "chat-42"),
        ];

        let mut trace = Vec::new();
        for event in events {
            dispatcher.dispatch(event, &mut turn, &mut transcript);
            trace.push((
                turn.progress.snapshot().entries.len(),
                turn.message.rendered().to_string(),
            ));
        }

        assert_eq!(trace[1], (2, String::new()));
        assert_eq!(trace[2], (2, "Here ".to_string()));
        assert_eq!(transcript.last().map(|b| b.text.as_str()), Some("Here are the results."));
        assert_eq!(turn.chat_id.as_deref(), Some("chat-42"));
    }

    #[test]
    fn error_event_terminates_with_message_or_default() {
        let mut dispatcher = StreamDispatcher::new();
        let mut turn = turn();
        let mut transcript = Transcript::new();
        assert_eq!(
            dispatcher.dispatch(WireEvent::new("error", "rate limited"), &mut turn, &mut transcript),
            DispatchOutcome::Failed("rate limited".into())
        );
        assert_eq!(
            dispatcher.dispatch(WireEvent::message("late"), &mut turn, &mut transcript),
            DispatchOutcome::Ignored
        );
        assert!(turn.message.is_empty());

        let mut dispatcher = StreamDispatcher::new();
        assert_eq!(
            dispatcher.dispatch(WireEvent::new("ERROR", "  "), &mut turn, &mut transcript),
            DispatchOutcome::Failed(GENERIC_STREAM_ERROR.into())
        );
    }

    #[test]
    fn done_sets_chat_id_attaches_and_stops_dispatch() {
        let mut dispatcher = StreamDispatcher::new();
        let mut turn = turn();
        let mut transcript = Transcript::new();

        dispatcher.dispatch(WireEvent::message("final answer"), &mut turn, &mut transcript);
        let outcome = dispatcher.dispatch(WireEvent::new("done", "abc123"), &mut turn, &mut transcript);
        assert_eq!(outcome, DispatchOutcome::Done);
        assert_eq!(turn.chat_id.as_deref(), Some("abc123"));
        assert!(turn.is_completed());
        assert_eq!(turn.progress.snapshot().status, ProgressStatus::Completed);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.last().map(|b| b.text.as_str()), Some("final answer"));

        let after = dispatcher.dispatch(WireEvent::message(" extra"), &mut turn, &mut transcript);
        assert_eq!(after, DispatchOutcome::Ignored);
        assert_eq!(turn.message.text(), "final answer");
    }

    #[test]
    fn done_without_data_keeps_existing_chat_id() {
        let mut dispatcher = StreamDispatcher::new();
        let mut turn = turn();
        let mut transcript = Transcript::new();
        dispatcher.dispatch(WireEvent::new("done", ""), &mut turn, &mut transcript);
        assert_eq!(turn.chat_id.as_deref(), Some("local-placeholder"));
    }
}
