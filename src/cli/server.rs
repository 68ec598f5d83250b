//! One-shot subcommands that query or change backend settings.

use std::error::Error;

use crate::api::{
    ChatBackend, ChatHistory, GenerationSettings, GenerationState, HttpBackend, ModelSettings,
    Sample, ToolInfo,
};
use crate::core::transcript::Role;
use crate::ui::view::format_sessions;

/// Generation flags from the command line; `None` keeps the server value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOverrides {
    pub reasoning_effort: Option<String>,
    pub text_verbosity: Option<String>,
    pub max_output_tokens: Option<u32>,
}

impl GenerationOverrides {
    pub fn is_empty(&self) -> bool {
        self.reasoning_effort.is_none()
            && self.text_verbosity.is_none()
            && self.max_output_tokens.is_none()
    }

    /// The update endpoint takes all three fields, so unset flags are filled
    /// from the current settings.
    pub fn apply(&self, current: &GenerationSettings) -> GenerationSettings {
        GenerationSettings {
            reasoning_effort: self
                .reasoning_effort
                .clone()
                .unwrap_or_else(|| current.reasoning_effort.clone()),
            text_verbosity: self
                .text_verbosity
                .clone()
                .unwrap_or_else(|| current.text_verbosity.clone()),
            max_output_tokens: self.max_output_tokens.unwrap_or(current.max_output_tokens),
        }
    }
}

pub async fn run_health(backend: &HttpBackend) -> Result<(), Box<dyn Error>> {
    let status = backend.health().await.map_err(|err| err.summary())?;
    let label = status
        .get("status")
        .and_then(|value| value.as_str())
        .unwrap_or("ok");
    println!("{} is {label}", backend.base_url());
    Ok(())
}

pub async fn run_samples(backend: &HttpBackend) -> Result<(), Box<dyn Error>> {
    let samples = backend.samples().await.map_err(|err| err.summary())?;
    println!("{}", format_samples(&samples));
    Ok(())
}

pub async fn run_model(backend: &HttpBackend, name: Option<String>) -> Result<(), Box<dyn Error>> {
    let settings = match name {
        Some(name) => {
            let updated = backend.set_model(&name).await.map_err(|err| err.summary())?;
            println!("✅ Model set to {}", updated.model);
            updated
        }
        None => backend.model().await.map_err(|err| err.summary())?,
    };
    println!("{}", format_model(&settings));
    Ok(())
}

pub async fn run_generation(
    backend: &HttpBackend,
    overrides: GenerationOverrides,
) -> Result<(), Box<dyn Error>> {
    let state = backend.generation().await.map_err(|err| err.summary())?;
    if overrides.is_empty() {
        println!("{}", format_generation(&state));
        return Ok(());
    }
    let updated = backend
        .set_generation(&overrides.apply(&state.current))
        .await
        .map_err(|err| err.summary())?;
    println!("✅ Generation settings updated");
    println!(
        "{}",
        format_generation(&GenerationState {
            current: updated,
            defaults: state.defaults,
        })
    );
    Ok(())
}

pub async fn run_tools(backend: &HttpBackend) -> Result<(), Box<dyn Error>> {
    let tools = backend.list_tools().await.map_err(|err| err.summary())?;
    println!("{}", format_tools(&tools));
    Ok(())
}

pub async fn run_tool_toggle(
    backend: &HttpBackend,
    name: &str,
    active: bool,
) -> Result<(), Box<dyn Error>> {
    let response = backend
        .set_tool_active(name, active)
        .await
        .map_err(|err| err.summary())?;
    let state = if response.active { "enabled" } else { "disabled" };
    println!("✅ {} {state}", response.name);
    Ok(())
}

pub async fn run_sessions(backend: &HttpBackend) -> Result<(), Box<dyn Error>> {
    let sessions = backend.list_sessions().await.map_err(|err| err.summary())?;
    println!("{}", format_sessions(&sessions, None));
    Ok(())
}

pub async fn run_history(backend: &HttpBackend, chat_id: &str) -> Result<(), Box<dyn Error>> {
    let history = backend
        .chat_history(chat_id)
        .await
        .map_err(|err| err.summary())?;
    println!("{}", format_history(&history));
    Ok(())
}

pub fn format_model(settings: &ModelSettings) -> String {
    let mut lines = vec![format!("Current model: {}", settings.model)];
    if let Some(effort) = &settings.reasoning_effort {
        lines.push(format!("Reasoning effort: {effort}"));
    }
    if !settings.available.is_empty() {
        lines.push("Available:".to_string());
        for model in &settings.available {
            let marker = if *model == settings.model { '*' } else { ' ' };
            match settings.reasoning_options.get(model) {
                Some(options) if !options.is_empty() => {
                    lines.push(format!("{marker} {model} (reasoning: {})", options.join(", ")))
                }
                _ => lines.push(format!("{marker} {model}")),
            }
        }
    }
    lines.join("\n")
}

pub fn format_generation(state: &GenerationState) -> String {
    let current = &state.current;
    let default_note = |value: String, default: Option<String>| match default {
        Some(default) if default != value => format!("{value} (default {default})"),
        _ => value,
    };
    let defaults = state.defaults.as_ref();
    [
        format!(
            "reasoning_effort: {}",
            default_note(
                current.reasoning_effort.clone(),
                defaults.map(|d| d.reasoning_effort.clone())
            )
        ),
        format!(
            "text_verbosity: {}",
            default_note(
                current.text_verbosity.clone(),
                defaults.map(|d| d.text_verbosity.clone())
            )
        ),
        format!(
            "max_output_tokens: {}",
            default_note(
                current.max_output_tokens.to_string(),
                defaults.map(|d| d.max_output_tokens.to_string())
            )
        ),
    ]
    .join("\n")
}

pub fn format_tools(tools: &[ToolInfo]) -> String {
    if tools.is_empty() {
        return "No tools registered.".to_string();
    }
    tools
        .iter()
        .map(|tool| {
            let state = if tool.active { "on " } else { "off" };
            if tool.source.is_empty() {
                format!("[{state}] {}", tool.name)
            } else {
                format!("[{state}] {} ({})", tool.name, tool.source)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_samples(samples: &[Sample]) -> String {
    if samples.is_empty() {
        return "No sample prompts.".to_string();
    }
    samples
        .iter()
        .map(|sample| {
            let mut block = format!("• {}", sample.title);
            if !sample.description.is_empty() {
                block.push_str(&format!(" - {}", sample.description));
            }
            block.push_str(&format!("\n    {}", sample.prompt));
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_history(history: &ChatHistory) -> String {
    let lines: Vec<String> = history
        .messages
        .iter()
        .filter_map(|message| {
            let prefix = match Role::from_api_role(&message.role)? {
                Role::User => "you>",
                Role::Assistant => "assistant>",
            };
            Some(format!("{prefix} {}", message.content))
        })
        .collect();
    if lines.is_empty() {
        "No messages.".to_string()
    } else {
        lines.join("\n\n")
    }
}
