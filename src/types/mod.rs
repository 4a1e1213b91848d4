// Public modules
pub mod chat_request;
pub mod chat_turn;
pub mod completion;
pub mod role_message;

// Re-exports
pub use chat_request::{ChatReply, ChatRequest, ErrorBody};
pub use chat_turn::{ChatTurn, GREETING};
pub use completion::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, ChunkChoice, ChunkDelta,
    CompletionChoice, CompletionMessage, ProviderError, ProviderErrorResponse,
};
pub use role_message::{Role, RoleMessage};
