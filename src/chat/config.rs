//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration the terminal client runs with.

use std::env;

use arrrg_derive::CommandLine;

use crate::client::DEFAULT_RELAY_URL;

/// Environment variable consulted for the relay token when none is given.
pub const TOKEN_ENV: &str = "AUTH_TOKEN";

/// Command-line arguments for the messagegpt-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Relay to talk to.
    #[arrrg(optional, "Relay URL (default: http://localhost:3001/)", "URL")]
    pub url: Option<String>,

    /// Bearer token for the relay.
    #[arrrg(optional, "Bearer token for the relay (default: $AUTH_TOKEN)", "TOKEN")]
    pub token: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Base URL of the relay.
    pub url: String,

    /// Bearer token presented to the relay.
    pub token: Option<String>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            url: DEFAULT_RELAY_URL.to_string(),
            token: None,
            use_color: true,
        }
    }

    /// Sets the relay URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Resolve `args`, falling back to `lookup` for the token.
    pub fn from_args_with(args: ChatArgs, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let token = args
            .token
            .or_else(|| lookup(TOKEN_ENV))
            .filter(|token| !token.trim().is_empty());
        ChatConfig {
            url: args.url.unwrap_or_else(|| DEFAULT_RELAY_URL.to_string()),
            token,
            use_color: !args.no_color,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        Self::from_args_with(args, |key| env::var(key).ok())
    }
}
