//! Slash commands understood by the interactive loop.

pub const HELP_TEXT: &str = "\
Commands:
  /new              Start a new chat
  /sessions         List conversations
  /open <id|n>      Load a conversation by id or /sessions number
  /tools            List tools and whether they are active
  /details          Show or hide the details of the last reply
  /detail <n>       Expand or collapse one detail entry
  /log <filename>   Enable logging to specified file
  /log              Toggle logging pause/resume
  /help             Show this help
  /quit             Exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    Sessions,
    Open(String),
    Tools,
    Details,
    /// One-based entry number as typed.
    Detail(usize),
    Log(Option<String>),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Ignore,
    Execute(Command),
    /// A recognised command with bad arguments, or an unknown one.
    Usage(String),
    ProcessAsMessage(String),
}

pub fn process_input(input: &str) -> CommandResult {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return CommandResult::Ignore;
    }
    // `//text` sends a message that starts with a slash.
    if let Some(escaped) = trimmed.strip_prefix("//") {
        return CommandResult::ProcessAsMessage(format!("/{escaped}"));
    }
    let Some(body) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(trimmed.to_string());
    };

    let parts: Vec<&str> = body.split_whitespace().collect();
    let Some((name, args)) = parts.split_first() else {
        return CommandResult::Usage("Type /help for a list of commands".to_string());
    };

    let command = match (name.to_ascii_lowercase().as_str(), args) {
        ("new", []) => Command::New,
        ("sessions", []) => Command::Sessions,
        ("open", [chat_id]) => Command::Open((*chat_id).to_string()),
        ("open", _) => {
            return CommandResult::Usage("Usage: /open <chat id or number>".to_string())
        }
        ("tools", []) => Command::Tools,
        ("details", []) => Command::Details,
        ("detail", [number]) => match number.parse::<usize>() {
            Ok(number) if number > 0 => Command::Detail(number),
            _ => return CommandResult::Usage("Usage: /detail <number>".to_string()),
        },
        ("detail", _) => return CommandResult::Usage("Usage: /detail <number>".to_string()),
        ("log", []) => Command::Log(None),
        ("log", [file]) => Command::Log(Some((*file).to_string())),
        ("log", _) => {
            return CommandResult::Usage(
                "Usage: /log [filename] - Enable logging to file, or /log to toggle pause/resume"
                    .to_string(),
            )
        }
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        (other, _) => {
            return CommandResult::Usage(format!(
                "Unknown command /{other}. Type /help for a list of commands"
            ))
        }
    };
    CommandResult::Execute(command)
}
