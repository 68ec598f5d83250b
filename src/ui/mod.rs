//! Presentation layer.
//!
//! - [`renderer`] and [`fallback_markdown`]: markdown to HTML, chosen once at startup.
//! - [`view`]: the [`view::ChatView`] sink the controller reports to, and the
//!   terminal implementation.
//! - [`chat_loop`]: the interactive loop that feeds user input to
//!   [`crate::core::controller::ChatController`].

pub mod chat_loop;
pub mod fallback_markdown;
pub mod renderer;
pub mod view;
