use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_subscriber::EnvFilter;

use crate::core::transcript::{Bubble, Role};

pub const LOG_ENV_VAR: &str = "BLUECHAT_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

/// Pick the tracing filter directive: `BLUECHAT_LOG`, then `RUST_LOG`, then `warn`.
pub fn log_directive(bluechat_log: Option<String>, rust_log: Option<String>) -> String {
    bluechat_log
        .filter(|value| !value.trim().is_empty())
        .or_else(|| rust_log.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

/// Install the global subscriber. Diagnostics go to stderr so replies on
/// stdout can be piped. Calling this twice is harmless.
pub fn init_tracing() {
    let directive = log_directive(
        std::env::var(LOG_ENV_VAR).ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Optional plain-text log of the conversation.
#[derive(Debug, Default)]
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl TranscriptLog {
    /// Start logging immediately when a path is given.
    pub fn new(log_file: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut log = TranscriptLog::default();
        if let Some(path) = log_file {
            log.set_log_file(path)?;
        }
        Ok(log)
    }

    pub fn set_log_file(&mut self, path: PathBuf) -> Result<String, Box<dyn std::error::Error>> {
        test_file_access(&path)?;
        let message = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(message)
    }

    /// Pause or resume logging to the current file.
    pub fn toggle(&mut self) -> Result<String, Box<dyn std::error::Error>> {
        let Some(path) = self.file_path.clone() else {
            return Err("No log file specified. Use /log <filename> to enable logging first.".into());
        };
        if self.is_active {
            let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            self.write_block(&format!("## Logging paused at {stamp}"))?;
            self.is_active = false;
            Ok(format!("Logging paused (file: {})", path.display()))
        } else {
            self.is_active = true;
            Ok(format!("Logging resumed to: {}", path.display()))
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Append one bubble. User text is quoted with `> ` like a chat transcript.
    pub fn log_bubble(&self, bubble: &Bubble) -> Result<(), Box<dyn std::error::Error>> {
        if !self.is_active {
            return Ok(());
        }
        let content = match bubble.role {
            Role::User => bubble
                .text
                .lines()
                .map(|line| format!("> {line}"))
                .collect::<Vec<_>>()
                .join("\n"),
            Role::Assistant => bubble.text.clone(),
        };
        self.write_block(&content)
    }

    pub fn status_string(&self) -> String {
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", file_name(path)),
            (Some(path), false) => format!("paused ({})", file_name(path)),
        }
    }

    fn write_block(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

fn test_file_access(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.flush()?;
    Ok(())
}
