use super::message_buffer::AssistantMessageBuffer;
use super::progress::ProgressPanel;
use super::transcript::Transcript;
use crate::ui::renderer::Renderer;

/// Mutable state of one in-flight turn, threaded through the send routine.
#[derive(Debug)]
pub struct TurnState {
    /// Chat id the turn was sent with; replaced by the server's id on completion.
    pub chat_id: Option<String>,
    pub message: AssistantMessageBuffer,
    pub progress: ProgressPanel,
    completed: bool,
}

impl TurnState {
    pub fn new(chat_id: Option<String>, renderer: Renderer, progress: ProgressPanel) -> Self {
        Self {
            chat_id,
            message: AssistantMessageBuffer::new(renderer),
            progress,
            completed: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Adopt a server-assigned chat id; blank ids are ignored.
    pub fn adopt_chat_id(&mut self, chat_id: &str) {
        let chat_id = chat_id.trim();
        if !chat_id.is_empty() {
            self.chat_id = Some(chat_id.to_string());
        }
    }

    /// Completion path shared by the `done` event and a successful fallback:
    /// latch progress, make the reply visible, and render it one final time.
    pub fn complete(&mut self, transcript: &mut Transcript) {
        self.progress.complete();
        self.message.attach(transcript);
        self.message.finalize(transcript);
        self.completed = true;
    }
}
