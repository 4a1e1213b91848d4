//! Terminal chat against a running relay.
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: the turn list and the streaming submission
//! - [`commands`]: slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer, TYPING_INDICATOR};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, TOKEN_ENV};
pub use session::{ActiveTurn, ChatSession, SubmitOutcome};
