//! A streaming chat relay.
//!
//! The server half ([`server`], [`relay`], [`upstream`]) accepts a conversation,
//! forwards it to an OpenAI-compatible completion provider and relays the reply
//! token by token as server-sent events. The client half ([`sse`], [`client`],
//! [`chat`]) decodes that stream and drives an interactive terminal chat.

// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod history;
pub mod observability;
pub mod relay;
pub mod render;
pub mod server;
pub mod sse;
pub mod types;
pub mod upstream;

// Re-exports
pub use client::{ChatTransport, DeltaStream, RelayClient};
pub use error::{Error, GENERIC_FAILURE, Result};
pub use relay::FrameStream;
pub use sse::{Frame, decode, decode_with};
pub use types::*;
pub use upstream::{ChunkStream, CompletionProvider, OpenAi};
