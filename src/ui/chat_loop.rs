//! Line-oriented interactive chat.
//!
//! Input is read while a turn streams; a message typed before the reply
//! finishes is rejected instead of queued.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use crate::api::HttpBackend;
use crate::cli::server::format_tools;
use crate::commands::{process_input, Command, CommandResult, HELP_TEXT};
use crate::core::controller::{ChatController, RejectReason, SendOutcome};
use crate::ui::view::{format_panel, format_sessions, resolve_session, TerminalView};

pub async fn run_chat(
    controller: Arc<ChatController>,
    view: Arc<TerminalView>,
    backend: Arc<HttpBackend>,
) -> Result<(), Box<dyn Error>> {
    println!(
        "bluechat · {} · /help for commands, /quit to exit\n",
        backend.base_url()
    );
    if let Err(err) = controller.refresh_sessions().await {
        eprintln!("⚠️  {}", err.summary());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<SendOutcome>();
    let mut in_flight = false;
    let mut input_closed = false;

    loop {
        tokio::select! {
            line = lines.next_line(), if !input_closed => {
                let Some(line) = line? else {
                    input_closed = true;
                    if !in_flight {
                        break;
                    }
                    continue;
                };
                match process_input(&line) {
                    CommandResult::Ignore => {}
                    CommandResult::Usage(message) => eprintln!("{message}"),
                    CommandResult::ProcessAsMessage(text) => {
                        if in_flight {
                            report(SendOutcome::Rejected(RejectReason::InFlight));
                            continue;
                        }
                        in_flight = true;
                        let controller = controller.clone();
                        let done_tx = done_tx.clone();
                        tokio::spawn(async move {
                            let outcome = controller.send(&text).await;
                            let _ = done_tx.send(outcome);
                        });
                    }
                    CommandResult::Execute(Command::Quit) => break,
                    CommandResult::Execute(command) => {
                        execute(command, &controller, &view, &backend).await;
                    }
                }
            }
            Some(outcome) = done_rx.recv() => {
                in_flight = false;
                view.settle().await;
                report(outcome);
                if input_closed {
                    break;
                }
            }
        }
    }

    if in_flight {
        if let Some(outcome) = done_rx.recv().await {
            view.settle().await;
            report(outcome);
        }
    }
    Ok(())
}

fn report(outcome: SendOutcome) {
    match outcome {
        SendOutcome::Rejected(RejectReason::InFlight) => {
            eprintln!("⏳ Still waiting for the current reply; message not sent.")
        }
        SendOutcome::Failed => eprintln!("❌ The message could not be delivered."),
        SendOutcome::Rejected(RejectReason::Empty)
        | SendOutcome::Completed
        | SendOutcome::FellBack
        | SendOutcome::Aborted => {}
    }
}

async fn execute(
    command: Command,
    controller: &ChatController,
    view: &TerminalView,
    backend: &HttpBackend,
) {
    match command {
        Command::New => {
            if let Err(err) = controller.new_chat() {
                eprintln!("⚠️  {err}");
            }
        }
        Command::Sessions => match controller.refresh_sessions().await {
            Ok(sessions) => println!(
                "{}\n",
                format_sessions(&sessions, controller.chat_id().as_deref())
            ),
            Err(err) => eprintln!("⚠️  {}", err.summary()),
        },
        Command::Open(reference) => {
            let chat_id = resolve_session(&view.sessions(), &reference);
            match controller.open_chat(&chat_id).await {
                Ok(count) => eprintln!("Opened {chat_id} ({count} messages)"),
                Err(err) => eprintln!("⚠️  {err}"),
            }
        }
        Command::Tools => match backend.list_tools().await {
            Ok(tools) => println!("{}\n", format_tools(&tools)),
            Err(err) => eprintln!("⚠️  {}", err.summary()),
        },
        Command::Details => match controller.last_progress() {
            Some(progress) => {
                progress.toggle_collapsed();
                eprintln!("{}", format_panel(&progress.snapshot()));
            }
            None => eprintln!("No reply details yet."),
        },
        Command::Detail(number) => match controller.last_progress() {
            Some(progress) => match progress.toggle_entry(number - 1) {
                Some(_) => eprintln!("{}", format_panel(&progress.snapshot())),
                None => eprintln!("No detail entry {number}."),
            },
            None => eprintln!("No reply details yet."),
        },
        Command::Log(file) => {
            let result = match file {
                Some(file) => view.log().set_log_file(PathBuf::from(file)),
                None => view.log().toggle(),
            };
            match result {
                Ok(message) => eprintln!("{message}"),
                Err(err) => {
                    warn!(error = %err, "log command failed");
                    eprintln!("Error: {err}");
                }
            }
        }
        Command::Help => {
            let logging = view.log().status_string();
            println!("{HELP_TEXT}\n\nLogging: {logging}\n");
        }
        Command::Quit => {}
    }
}
