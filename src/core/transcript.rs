use serde::{Deserialize, Serialize};

use crate::api::HistoryMessage;
use crate::ui::renderer::{escape_html, Renderer};

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => ROLE_USER,
            Role::Assistant => ROLE_ASSISTANT,
        }
    }

    pub fn from_api_role(role: &str) -> Option<Self> {
        match role {
            ROLE_USER => Some(Role::User),
            ROLE_ASSISTANT => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One visible chat bubble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub role: Role,
    /// Source text as typed or streamed.
    pub text: String,
    /// HTML produced by the active renderer.
    pub rendered: String,
}

impl Bubble {
    pub fn user(text: impl Into<String>) -> Self {
        let text = text.into();
        let rendered = escape_html(&text);
        Self {
            role: Role::User,
            text,
            rendered,
        }
    }

    pub fn assistant(text: impl Into<String>, rendered: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            rendered: rendered.into(),
        }
    }

    /// A plain assistant bubble for failures; the text is escaped, never rendered.
    pub fn assistant_notice(text: impl Into<String>) -> Self {
        let text = text.into();
        let rendered = escape_html(&text);
        Self {
            role: Role::Assistant,
            text,
            rendered,
        }
    }
}

/// The ordered list of bubbles the user can see.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    bubbles: Vec<Bubble>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bubble and return its index.
    pub fn push(&mut self, bubble: Bubble) -> usize {
        self.bubbles.push(bubble);
        self.bubbles.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Bubble> {
        self.bubbles.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Bubble> {
        self.bubbles.get_mut(index)
    }

    pub fn last(&self) -> Option<&Bubble> {
        self.bubbles.last()
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bubble> {
        self.bubbles.iter()
    }

    pub fn clear(&mut self) {
        self.bubbles.clear();
    }

    /// Rebuild the transcript from server history, skipping roles that are
    /// never shown (system prompts, tool plumbing).
    pub fn replace_with_history(&mut self, messages: &[HistoryMessage], renderer: &Renderer) {
        self.bubbles = messages
            .iter()
            .filter_map(|message| match Role::from_api_role(&message.role)? {
                Role::User => Some(Bubble::user(message.content.clone())),
                Role::Assistant => Some(Bubble::assistant(
                    message.content.clone(),
                    renderer.render(&message.content),
                )),
            })
            .collect();
    }
}
