use super::transcript::{Bubble, Transcript};
use crate::ui::renderer::Renderer;

/// Accumulates streamed text for one assistant reply.
///
/// The buffer starts detached: it re-renders on every append but nothing is
/// pushed to the [`Transcript`] until [`attach`](Self::attach), so a reply
/// that is still streaming never shows up half-finished.
#[derive(Debug, Clone)]
pub struct AssistantMessageBuffer {
    text: String,
    rendered: String,
    renderer: Renderer,
    slot: Option<usize>,
}

impl AssistantMessageBuffer {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            text: String::new(),
            rendered: String::new(),
            renderer,
            slot: None,
        }
    }

    /// Append a delta and re-render the whole accumulated text, since
    /// constructs like an open code fence change how earlier text renders.
    pub fn append(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.text.push_str(chunk);
        self.rendered = self.renderer.render(&self.text);
    }

    /// Make the bubble visible. Returns `true` only on the first call.
    pub fn attach(&mut self, transcript: &mut Transcript) -> bool {
        if self.slot.is_some() {
            return false;
        }
        let index = transcript.push(Bubble::assistant(
            self.text.clone(),
            self.rendered.clone(),
        ));
        self.slot = Some(index);
        true
    }

    /// Render one last time and sync the attached bubble with it.
    pub fn finalize(&mut self, transcript: &mut Transcript) {
        self.rendered = self.renderer.render(&self.text);
        if let Some(bubble) = self.slot.and_then(|index| transcript.get_mut(index)) {
            bubble.text.clone_from(&self.text);
            bubble.rendered.clone_from(&self.rendered);
        }
    }

    /// Drop partial text from a stream that is being replaced. Has no effect
    /// once the bubble is attached.
    pub fn discard_unattached(&mut self) {
        if self.slot.is_none() {
            self.text.clear();
            self.rendered.clear();
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
