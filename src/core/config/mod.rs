//! Client configuration stored as TOML in the platform config directory.

pub mod data;
pub mod io;

pub use data::{Config, ConfigKey, DEFAULT_SERVER_URL, SERVER_URL_ENV_VAR};
pub use io::ConfigError;
