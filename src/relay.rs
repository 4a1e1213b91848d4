//! The streaming relay.
//!
//! A validated chat request is forwarded to the upstream provider and every
//! increment carrying text is re-framed as one outbound SSE frame. The frame
//! stream always ends with exactly one terminal frame: `event: done` on natural
//! completion or `event: error` when the provider fails after streaming began.

use std::pin::Pin;
use std::time::Instant;

use futures::Stream;
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::observability::{
    RELAY_FRAMES, RELAY_INVALID_REQUESTS, RELAY_REQUESTS, RELAY_STREAM_DURATION,
    RELAY_UPSTREAM_ERRORS,
};
use crate::sse::Frame;
use crate::types::{ChatCompletionChunk, ChatReply, ChatRequest, RoleMessage};
use crate::upstream::CompletionProvider;

/// Outbound frames of one relayed conversation.
pub type FrameStream = Pin<Box<dyn Stream<Item = Frame> + Send>>;

fn validate(request: ChatRequest) -> Result<Vec<RoleMessage>> {
    RELAY_REQUESTS.click();
    request.into_messages().inspect_err(|err| {
        RELAY_INVALID_REQUESTS.click();
        tracing::warn!(error = %err, "rejected chat request");
    })
}

/// Validate `request` and open an upstream stream for it.
///
/// Fails with `InvalidRequest` before contacting the provider when the request
/// carries no usable input, and with `UpstreamFailure` when the provider could
/// not be reached. In both cases nothing has been sent to the client yet.
pub async fn open(provider: &dyn CompletionProvider, request: ChatRequest) -> Result<FrameStream> {
    let messages = validate(request)?;
    let message_count = messages.len();
    let chunks = provider.stream(messages).await.inspect_err(|err| {
        RELAY_UPSTREAM_ERRORS.click();
        tracing::error!(error = %err, "failed to open upstream stream");
    })?;
    tracing::debug!(message_count, "upstream stream opened");
    Ok(Box::pin(frames(chunks)))
}

enum RelayState<S> {
    Streaming {
        chunks: S,
        started: Instant,
        frames: u64,
    },
    Finished,
}

/// Re-frame upstream increments as outbound frames.
///
/// Increments without text are dropped; everything else maps one to one, in
/// order. The stream ends after the terminal frame.
pub fn frames<S>(chunks: S) -> impl Stream<Item = Frame> + Send
where
    S: Stream<Item = Result<ChatCompletionChunk>> + Send + Unpin,
{
    let state = RelayState::Streaming {
        chunks,
        started: Instant::now(),
        frames: 0,
    };
    stream::unfold(state, |state| async move {
        let RelayState::Streaming {
            mut chunks,
            started,
            mut frames,
        } = state
        else {
            return None;
        };
        loop {
            match chunks.next().await {
                Some(Ok(chunk)) => {
                    let Some(text) = chunk.delta_text() else {
                        continue;
                    };
                    let frame = Frame::delta(text);
                    frames += 1;
                    RELAY_FRAMES.click();
                    let state = RelayState::Streaming {
                        chunks,
                        started,
                        frames,
                    };
                    return Some((frame, state));
                }
                Some(Err(err)) => {
                    RELAY_UPSTREAM_ERRORS.click();
                    tracing::error!(error = %err, frames, "upstream failed mid-stream");
                    return Some((Frame::error(), RelayState::Finished));
                }
                None => {
                    let elapsed = started.elapsed();
                    RELAY_STREAM_DURATION.add(elapsed.as_secs_f64());
                    tracing::info!(frames, elapsed_ms = elapsed.as_millis() as u64, "stream complete");
                    return Some((Frame::done(), RelayState::Finished));
                }
            }
        }
    })
}

/// Validate `request` and return the complete reply in one piece.
pub async fn complete(provider: &dyn CompletionProvider, request: ChatRequest) -> Result<ChatReply> {
    let messages = validate(request)?;
    let reply = provider.complete(messages).await.inspect_err(|err| {
        RELAY_UPSTREAM_ERRORS.click();
        tracing::error!(error = %err, "upstream completion failed");
    })?;
    Ok(ChatReply { reply })
}
