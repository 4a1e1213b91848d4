//! Server-Sent Events framing and the client-side stream decoder.
//!
//! Frames are blocks of `field: value` lines terminated by a blank line. The
//! same framing is used in three places: the relay writes frames to the
//! browser, the decoder reads them back into text deltas, and the upstream
//! client reads the provider's own event stream.

use std::error;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;

use crate::error::{Error, GENERIC_FAILURE, Result};
use crate::observability::{DECODER_DELTAS, SSE_FRAMES};

/// Payload that marks the end of a stream.
pub const DONE: &str = "[DONE]";

/// Event name of the terminal success frame.
pub const EVENT_DONE: &str = "done";

/// Event name of the terminal failure frame.
pub const EVENT_ERROR: &str = "error";

/// Separator between frames.
const FRAME_DELIMITER: &str = "\n\n";

/// One server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// The `event:` field, if present.
    pub event: Option<String>,
    /// The `data:` field, if present. Multiple data lines are joined by `\n`.
    pub data: Option<String>,
}

impl Frame {
    /// A frame carrying only data.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: Some(data.into()),
        }
    }

    /// A frame carrying one text delta, JSON encoded.
    pub fn delta(text: &str) -> Self {
        Self::data(Value::String(text.to_string()).to_string())
    }

    /// The terminal success frame: `event: done` + `data: [DONE]`.
    pub fn done() -> Self {
        Self {
            event: Some(EVENT_DONE.to_string()),
            data: Some(DONE.to_string()),
        }
    }

    /// The terminal failure frame: `event: error` + a JSON string sentinel.
    pub fn error() -> Self {
        Self {
            event: Some(EVENT_ERROR.to_string()),
            data: Some(Value::String(GENERIC_FAILURE.to_string()).to_string()),
        }
    }

    /// True for the frames that end a stream.
    pub fn is_terminal(&self) -> bool {
        self.is_done() || self.is_error()
    }

    /// True for the success sentinel, with or without the `done` event name.
    pub fn is_done(&self) -> bool {
        self.event.as_deref() == Some(EVENT_DONE) || self.data.as_deref() == Some(DONE)
    }

    /// True for the failure frame.
    pub fn is_error(&self) -> bool {
        self.event.as_deref() == Some(EVENT_ERROR)
    }

    /// Serialize the frame, including the trailing blank line.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        if let Some(event) = &self.event {
            out.push_str("event: ");
            out.push_str(event);
            out.push('\n');
        }
        if let Some(data) = &self.data {
            for line in data.split('\n') {
                out.push_str("data: ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('\n');
        out
    }
}

/// Parse the text of one frame (without its delimiter).
///
/// Unknown fields and `:` comment lines are ignored. Values are trimmed.
pub fn parse_frame(text: &str) -> Frame {
    let mut frame = Frame::default();
    for line in text.trim().lines() {
        if let Some(event) = line.strip_prefix("event:") {
            frame.event = Some(event.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            match &mut frame.data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(data);
                }
                None => frame.data = Some(data.to_string()),
            }
        }
    }
    frame
}

/// Accumulates raw bytes and hands out complete frames.
///
/// UTF-8 sequences split across reads are held back until the rest arrives.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    text: String,
    partial: Vec<u8>,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        self.partial.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.partial) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(Error::encoding(
                    format!("Invalid UTF-8 in stream: {e}"),
                    Some(Box::new(e)),
                ));
            }
        };
        let rest = self.partial.split_off(valid);
        // The first `valid` bytes were just checked.
        let text = String::from_utf8(std::mem::replace(&mut self.partial, rest))
            .map_err(|e| Error::encoding(format!("Invalid UTF-8 in stream: {e}"), None))?;
        self.text.push_str(&text);
        Ok(())
    }

    /// Remove and return the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<String> {
        let end = self.text.find(FRAME_DELIMITER)?;
        let rest = self.text.split_off(end + FRAME_DELIMITER.len());
        let mut frame = std::mem::replace(&mut self.text, rest);
        frame.truncate(end);
        Some(frame)
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.partial.is_empty()
    }
}

/// Split a byte stream into frames.
///
/// Blank frames are skipped. A trailing partial frame at end of input is
/// discarded. The stream ends after the first read error.
pub fn frames<S, E>(byte_stream: S) -> impl Stream<Item = Result<Frame>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: error::Error + Send + Sync + 'static,
{
    stream::unfold(
        (byte_stream, FrameBuffer::new(), false),
        |(mut byte_stream, mut buffer, failed)| async move {
            if failed {
                return None;
            }
            loop {
                if let Some(text) = buffer.next_frame() {
                    if text.trim().is_empty() {
                        continue;
                    }
                    SSE_FRAMES.click();
                    return Some((Ok(parse_frame(&text)), (byte_stream, buffer, false)));
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        if let Err(err) = buffer.push(&bytes) {
                            return Some((Err(err), (byte_stream, buffer, true)));
                        }
                    }
                    Some(Err(e)) => {
                        let err =
                            Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)));
                        return Some((Err(err), (byte_stream, buffer, true)));
                    }
                    None => return None,
                }
            }
        },
    )
}

/// What a single frame means to the decoder.
#[derive(Debug, PartialEq)]
enum Step {
    Delta(String),
    Skip,
    Done,
    Failed(String),
}

fn interpret(frame: &Frame) -> Step {
    if frame.is_error() {
        let detail = frame
            .data
            .as_deref()
            .map(|data| match serde_json::from_str::<Value>(data) {
                Ok(Value::String(s)) => s,
                _ => data.to_string(),
            })
            .unwrap_or_default();
        return Step::Failed(detail);
    }
    if frame.is_done() {
        return Step::Done;
    }
    let Some(payload) = frame.data.as_deref() else {
        return Step::Skip;
    };
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::String(text)) if !text.is_empty() => Step::Delta(text),
        Ok(value) if is_truthy(&value) => Step::Delta(value.to_string()),
        Ok(_) => Step::Skip,
        Err(_) if payload.is_empty() => Step::Skip,
        Err(_) => Step::Delta(payload.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Decode a relayed byte stream into text deltas, in arrival order.
///
/// Decoding stops at `[DONE]` (nothing after it is read), at an `event: error`
/// frame (yielded as [`Error::UpstreamFailure`]), at the first read error, or
/// quietly at end of input.
pub fn decode<S, E>(byte_stream: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: error::Error + Send + Sync + 'static,
{
    let frames = Box::pin(frames(byte_stream));
    stream::unfold((frames, false), |(mut frames, finished)| async move {
        if finished {
            return None;
        }
        loop {
            let frame = match frames.next().await? {
                Ok(frame) => frame,
                Err(err) => return Some((Err(err), (frames, true))),
            };
            match interpret(&frame) {
                Step::Delta(text) => {
                    DECODER_DELTAS.click();
                    return Some((Ok(text), (frames, false)));
                }
                Step::Skip => continue,
                Step::Done => return None,
                Step::Failed(detail) => {
                    let err = Error::upstream(detail, None, None);
                    return Some((Err(err), (frames, true)));
                }
            }
        }
    })
}

/// Decode a relayed byte stream, invoking `on_delta` for every delta.
///
/// Returns once the stream has terminated; the first error is returned after
/// every delta before it was delivered.
pub async fn decode_with<S, E, F>(byte_stream: S, mut on_delta: F) -> Result<()>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: error::Error + Send + Sync + 'static,
    F: FnMut(String),
{
    let mut deltas = Box::pin(decode(byte_stream));
    while let Some(delta) = deltas.next().await {
        on_delta(delta?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;

    fn chunked(chunks: &[&[u8]]) -> impl Stream<Item = std::result::Result<Bytes, io::Error>> + Unpin {
        let owned: Vec<_> = chunks.iter().map(|c| Ok(Bytes::copy_from_slice(c))).collect();
        stream::iter(owned)
    }

    async fn collect(chunks: &[&[u8]]) -> Vec<Result<String>> {
        decode(chunked(chunks)).collect().await
    }

    fn texts(results: Vec<Result<String>>) -> Vec<String> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn parse_data_frame() {
        let frame = parse_frame("data: \"Hi\"");
        assert_eq!(frame, Frame::data("\"Hi\""));
    }

    #[test]
    fn parse_event_frame() {
        let frame = parse_frame("event: done\ndata: [DONE]");
        assert_eq!(frame, Frame::done());
        assert!(frame.is_terminal());
    }

    #[test]
    fn parse_ignores_comments() {
        let frame = parse_frame(": keep-alive\nid: 7\ndata:x");
        assert_eq!(frame, Frame::data("x"));
    }

    #[test]
    fn encode_frames() {
        assert_eq!(Frame::delta("Hi").encode(), "data: \"Hi\"\n\n");
        assert_eq!(Frame::done().encode(), "event: done\ndata: [DONE]\n\n");
        assert_eq!(
            Frame::error().encode(),
            format!("event: error\ndata: \"{GENERIC_FAILURE}\"\n\n")
        );
    }

    #[test]
    fn delta_escapes_newlines() {
        let encoded = Frame::delta("line one\n\nline two").encode();
        assert_eq!(encoded.matches("\n\n").count(), 1);
        assert!(encoded.ends_with("\n\n"));
    }

    #[test]
    fn buffer_holds_split_utf8() {
        let mut buffer = FrameBuffer::new();
        let bytes = "data: \"café\"\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xc3).unwrap() + 1;
        buffer.push(&bytes[..split]).unwrap();
        assert!(buffer.next_frame().is_none());
        buffer.push(&bytes[split..]).unwrap();
        assert_eq!(buffer.next_frame().as_deref(), Some("data: \"café\""));
        assert!(buffer.is_empty());
    }

    #[test]
    fn buffer_rejects_invalid_utf8() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(&[b'd', 0xff, b'a']).is_err());
    }

    #[tokio::test]
    async fn decode_preserves_order() {
        let deltas = texts(collect(&[b"data: \"a\"\n\ndata: \"b\"\n\ndata: \"c\"\n\n"]).await);
        assert_eq!(deltas, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn decode_stops_at_done() {
        let deltas =
            texts(collect(&[b"data: \"Hello\"\n\ndata: [DONE]\n\ndata: \"never\"\n\n"]).await);
        assert_eq!(deltas, vec!["Hello"]);
    }

    #[tokio::test]
    async fn decode_stops_at_done_event() {
        let deltas = texts(
            collect(&[b"data: \"Hello\"\n\nevent: done\ndata: [DONE]\n\ndata: \"never\"\n\n"])
                .await,
        );
        assert_eq!(deltas, vec!["Hello"]);
    }

    #[tokio::test]
    async fn decode_raw_fallback() {
        let deltas = texts(collect(&[b"data: Hello\n\n"]).await);
        assert_eq!(deltas, vec!["Hello"]);
    }

    #[tokio::test]
    async fn decode_ignores_event_lines() {
        let deltas = texts(collect(&[b"event: ping\n\nevent: message\n\ndata: \"x\"\n\n"]).await);
        assert_eq!(deltas, vec!["x"]);
    }

    #[tokio::test]
    async fn decode_skips_falsy_values() {
        let deltas = texts(
            collect(&[b"data: \"\"\n\ndata: null\n\ndata: 0\n\ndata: false\n\ndata: 42\n\n"]).await,
        );
        assert_eq!(deltas, vec!["42"]);
    }

    #[tokio::test]
    async fn decode_frames_split_across_reads() {
        let deltas = texts(collect(&[b"da", b"ta: \"He", b"llo\"\n", b"\ndata: \" world\"\n\n"]).await);
        assert_eq!(deltas, vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn decode_ends_quietly_without_done() {
        let deltas = texts(collect(&[b"data: \"partial\"\n\ndata: \"cut"]).await);
        assert_eq!(deltas, vec!["partial"]);
    }

    #[tokio::test]
    async fn decode_surfaces_error_frame() {
        let results = collect(&[b"data: \"Hi\"\n\n", Frame::error().encode().as_bytes(), b"data: \"x\"\n\n"]).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_deref().unwrap(), "Hi");
        let err = results[1].as_ref().unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains(GENERIC_FAILURE));
    }

    #[tokio::test]
    async fn decode_stops_after_read_error() {
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"data: \"one\"\n\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data: \"two\"\n\n")),
        ]);
        let results: Vec<_> = decode(chunks).collect().await;
        assert_eq!(results.len(), 2);
        assert!(matches!(results[1], Err(Error::Streaming { .. })));
    }

    #[tokio::test]
    async fn decode_is_repeatable() {
        let bytes: &[&[u8]] = &[b"data: \"x\"\n\nevent: ping\n\ndata: y\n\n", b"data: [DONE]\n\n"];
        let first = texts(collect(bytes).await);
        let second = texts(collect(bytes).await);
        assert_eq!(first, vec!["x", "y"]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn decode_with_callback() {
        let mut seen = Vec::new();
        decode_with(chunked(&[b"data: \"a\"\n\ndata: \"b\"\n\ndata: [DONE]\n\n"]), |delta| {
            seen.push(delta)
        })
        .await
        .unwrap();
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn decode_with_reports_error_after_deltas() {
        let mut seen = Vec::new();
        let frame = Frame::error().encode();
        let result = decode_with(
            chunked(&[b"data: \"partial\"\n\n", frame.as_bytes()]),
            |delta| seen.push(delta),
        )
        .await;
        assert_eq!(seen, vec!["partial"]);
        assert!(result.unwrap_err().is_upstream());
    }
}
