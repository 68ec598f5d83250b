//! bluechat is a terminal client for BlueGPT chat servers.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] defines the HTTP payloads and the [`api::ChatBackend`] seam,
//!   with a reqwest implementation.
//! - [`core`] owns the streaming pipeline (framing, decoding, dispatch), the
//!   per-turn state machine, the progress panel, and the chat controller.
//! - [`ui`] renders markdown and presents turns in the terminal.
//! - [`commands`] parses slash commands for the interactive loop.
//!
//! The binary routes through [`cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
