//! Non-interactive "say" command

use std::error::Error;

use super::ClientContext;
use crate::core::controller::{RejectReason, RequestOverrides, SendOutcome};

pub async fn run_say(
    context: &ClientContext,
    prompt: Vec<String>,
    chat_id: Option<String>,
    overrides: RequestOverrides,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: bluechat say <prompt>");
        std::process::exit(1);
    }

    let view = context.view(false)?;
    let controller = context
        .controller(view.clone())
        .with_chat_id(chat_id)
        .with_overrides(overrides);

    let outcome = controller.send(&prompt).await;
    view.settle().await;
    if let Some(chat_id) = controller.chat_id() {
        eprintln!("chat: {chat_id}");
    }

    match outcome {
        SendOutcome::Completed | SendOutcome::FellBack => Ok(()),
        SendOutcome::Aborted => Err("the reply ended before it was complete".into()),
        SendOutcome::Failed => Err("the message could not be delivered".into()),
        SendOutcome::Rejected(RejectReason::Empty) => Err("nothing to send".into()),
        SendOutcome::Rejected(RejectReason::InFlight) => Err("a reply is already streaming".into()),
    }
}
