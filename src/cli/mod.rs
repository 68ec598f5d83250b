//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, resolves configuration, and
//! dispatches to the interactive loop or a one-shot command.

pub mod say;
pub mod server;


use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::api::HttpBackend;
use crate::cli::say::run_say;
use crate::cli::server::GenerationOverrides;
use crate::core::config::{Config, ConfigKey, SERVER_URL_ENV_VAR};
use crate::core::controller::{ChatController, RequestOverrides};
use crate::ui::chat_loop::run_chat;
use crate::ui::renderer::Renderer;
use crate::ui::view::TerminalView;
use crate::utils::logging::{init_tracing, TranscriptLog};

#[derive(Parser, Debug)]
#[command(name = "bluechat")]
#[command(version, about = "A terminal client for BlueGPT chat servers")]
#[command(
    long_about = "bluechat talks to a BlueGPT server: it streams replies, shows tool calls and \
reasoning as they happen, and falls back to a plain request when streaming fails.\n\n\
Environment Variables:\n\
  BLUECHAT_SERVER_URL   Server base URL (overridden by --server)\n\
  BLUECHAT_LOG          Diagnostic log filter, e.g. bluechat=debug (falls back to RUST_LOG)\n\n\
Commands inside the chat:\n\
  /help             Show all commands\n\
  /log <filename>   Enable logging to specified file\n\
  /log              Toggle logging pause/resume"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server base URL
    #[arg(short = 's', long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Enable logging of the conversation to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// Send one message and print the reply
    Say {
        /// Continue an existing chat
        #[arg(long, value_name = "CHAT_ID")]
        chat: Option<String>,
        /// Use this model instead of the server's current one
        #[arg(long, value_name = "MODEL")]
        model: Option<String>,
        /// System prompt for a new chat
        #[arg(long = "system", value_name = "PROMPT")]
        system_prompt: Option<String>,
        /// The message to send
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Check that the server is reachable
    Health,
    /// List sample prompts
    Samples,
    /// Show the current model, or switch to NAME
    Model { name: Option<String> },
    /// Show or change generation settings
    Generation {
        #[arg(long, value_name = "EFFORT")]
        reasoning_effort: Option<String>,
        #[arg(long, value_name = "VERBOSITY")]
        text_verbosity: Option<String>,
        #[arg(long, value_name = "TOKENS")]
        max_output_tokens: Option<u32>,
    },
    /// List tools, or enable/disable one
    Tools {
        #[command(subcommand)]
        action: Option<ToolsAction>,
    },
    /// List conversations on the server
    Sessions,
    /// Print the messages of a conversation
    History { chat_id: String },
    /// Show or edit the configuration file
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ToolsAction {
    Enable { name: String },
    Disable { name: String },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print effective settings
    Show,
    /// Set a configuration value
    Set {
        key: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        value: Vec<String>,
    },
    /// Remove a configuration value
    Unset { key: String },
}

/// Settings shared by every command after flags, environment, and file are merged.
pub struct ClientContext {
    pub config: Config,
    pub server_url: String,
    pub log_file: Option<PathBuf>,
}

impl ClientContext {
    pub fn resolve(config: Config, args: &Args) -> Self {
        let server_url = config.resolve_server_url(
            args.server.as_deref(),
            std::env::var(SERVER_URL_ENV_VAR).ok(),
        );
        Self {
            config,
            server_url,
            log_file: args.log.clone(),
        }
    }

    pub fn backend(&self) -> HttpBackend {
        HttpBackend::new(self.server_url.clone())
    }

    /// `echo_user` prints user messages too, for input that is not typed
    /// on this terminal.
    pub fn view(&self, echo_user: bool) -> Result<Arc<TerminalView>, Box<dyn Error>> {
        let log = TranscriptLog::new(self.log_file.clone())?;
        let view = TerminalView::new(self.config.output_format(), log).with_user_echo(echo_user);
        Ok(Arc::new(view))
    }

    pub fn controller(&self, view: Arc<TerminalView>) -> ChatController {
        ChatController::new(
            Arc::new(self.backend()),
            view,
            Renderer::from_kind(self.config.renderer_kind()),
            self.config.controller_settings(),
        )
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main(Args::parse()))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let command = args.command.as_ref().map_or(&Commands::Chat, |command| command);
    if let Commands::Config { action } = command {
        return run_config(action.as_ref());
    }

    let context = ClientContext::resolve(Config::load()?, &args);
    let backend = context.backend();

    match command {
        Commands::Chat => {
            let view = context.view(!std::io::stdin().is_terminal())?;
            let controller = Arc::new(context.controller(view.clone()));
            run_chat(controller, view, Arc::new(backend)).await
        }
        Commands::Say {
            chat,
            model,
            system_prompt,
            prompt,
        } => {
            let overrides = RequestOverrides {
                model: model.clone(),
                system_prompt: system_prompt.clone(),
            };
            run_say(&context, prompt.clone(), chat.clone(), overrides).await
        }
        Commands::Health => server::run_health(&backend).await,
        Commands::Samples => server::run_samples(&backend).await,
        Commands::Model { name } => server::run_model(&backend, name.clone()).await,
        Commands::Generation {
            reasoning_effort,
            text_verbosity,
            max_output_tokens,
        } => {
            let overrides = GenerationOverrides {
                reasoning_effort: reasoning_effort.clone(),
                text_verbosity: text_verbosity.clone(),
                max_output_tokens: *max_output_tokens,
            };
            server::run_generation(&backend, overrides).await
        }
        Commands::Tools { action } => match action {
            None => server::run_tools(&backend).await,
            Some(ToolsAction::Enable { name }) => {
                server::run_tool_toggle(&backend, name, true).await
            }
            Some(ToolsAction::Disable { name }) => {
                server::run_tool_toggle(&backend, name, false).await
            }
        },
        Commands::Sessions => server::run_sessions(&backend).await,
        Commands::History { chat_id } => server::run_history(&backend, chat_id).await,
        Commands::Config { .. } => Ok(()),
    }
}

fn run_config(action: Option<&ConfigAction>) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    match action.unwrap_or(&ConfigAction::Show) {
        ConfigAction::Show => {
            println!("Current configuration:");
            println!("{}", config.describe());
        }
        ConfigAction::Set { key, value } => {
            let key = ConfigKey::parse(key)?;
            config.set(key, &value.join(" "))?;
            config.save()?;
            let (value, _) = config.display_value(key);
            println!("✅ Set {} to: {value}", key.as_str());
        }
        ConfigAction::Unset { key } => {
            let key = ConfigKey::parse(key)?;
            config.unset(key);
            config.save()?;
            println!("✅ Unset {}", key.as_str());
        }
    }
    Ok(())
}
