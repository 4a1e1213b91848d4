//! Chat session management.
//!
//! A [`ChatSession`] owns the turn list, the loading flag and the input kept
//! for resubmission. Each submission streams the relay's reply into the newest
//! turn through an [`ActiveTurn`].

use futures::StreamExt;

use crate::client::ChatTransport;
use crate::error::GENERIC_FAILURE;
use crate::history::build_messages;
use crate::render::Renderer;
use crate::types::ChatTurn;

/// How a call to [`ChatSession::submit`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was sent: the input was blank or a submission was in flight.
    Ignored,
    /// The reply streamed to completion.
    Completed,
    /// The user stopped the reply; the partial text is kept.
    Interrupted,
    /// The stream could not be opened or broke; the input is kept.
    Failed,
}

/// Exclusive handle on the turn a submission is streaming into.
///
/// Dropping the handle, in any way, ends the submission and clears the
/// session's loading flag.
pub struct ActiveTurn<'a> {
    turn: &'a mut ChatTurn,
    loading: &'a mut bool,
}

impl ActiveTurn<'_> {
    /// Append a delta to the reply.
    pub fn append(&mut self, delta: &str) {
        self.turn.ai.push_str(delta);
    }

    /// The reply accumulated so far.
    pub fn text(&self) -> &str {
        &self.turn.ai
    }

    /// End the submission keeping the reply as is.
    pub fn finish(self) {}

    /// End the submission with the generic failure text appended.
    pub fn fail(self) {
        if !self.turn.ai.is_empty() {
            self.turn.ai.push('\n');
        }
        self.turn.ai.push_str(GENERIC_FAILURE);
    }
}

impl Drop for ActiveTurn<'_> {
    fn drop(&mut self) {
        *self.loading = false;
    }
}

/// An interactive conversation with the relay.
#[derive(Debug, Clone)]
pub struct ChatSession {
    turns: Vec<ChatTurn>,
    loading: bool,
    input: Option<String>,
}

impl ChatSession {
    /// Creates a session holding only the greeting.
    pub fn new() -> Self {
        Self {
            turns: vec![ChatTurn::greeting()],
            loading: false,
            input: None,
        }
    }

    /// The turns so far, oldest first.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// True while a submission is streaming.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Input kept after a failed submission, ready to be sent again.
    pub fn retained_input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    /// Resets the conversation to the greeting.
    pub fn clear(&mut self) {
        self.turns = vec![ChatTurn::greeting()];
        self.input = None;
    }

    fn begin(&mut self, text: &str) -> ActiveTurn<'_> {
        self.turns.push(ChatTurn::new(text));
        self.loading = true;
        let index = self.turns.len() - 1;
        ActiveTurn {
            turn: &mut self.turns[index],
            loading: &mut self.loading,
        }
    }

    /// Sends `input` with the recent history and streams the reply.
    ///
    /// Blank input, or input arriving while another submission is in flight,
    /// is ignored. On failure the generic failure text is appended to the new
    /// turn and `input` is retained; on success the retained input is cleared.
    pub async fn submit(
        &mut self,
        transport: &dyn ChatTransport,
        input: &str,
        renderer: &mut dyn Renderer,
    ) -> SubmitOutcome {
        let text = input.trim();
        if self.loading || text.is_empty() {
            return SubmitOutcome::Ignored;
        }

        let messages = build_messages(&self.turns, text);
        tracing::debug!(messages = messages.len(), "submitting chat turn");
        let mut active = self.begin(text);
        renderer.start_typing();

        let outcome = match transport.stream_chat(messages).await {
            Ok(mut deltas) => loop {
                if renderer.should_interrupt() {
                    renderer.print_interrupted();
                    active.finish();
                    break SubmitOutcome::Interrupted;
                }
                match deltas.next().await {
                    Some(Ok(delta)) => {
                        renderer.print_text(&delta);
                        active.append(&delta);
                    }
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "reply stream failed");
                        renderer.print_error(GENERIC_FAILURE);
                        active.fail();
                        break SubmitOutcome::Failed;
                    }
                    None => {
                        renderer.finish_response();
                        active.finish();
                        break SubmitOutcome::Completed;
                    }
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "could not open reply stream");
                renderer.print_error(GENERIC_FAILURE);
                active.fail();
                SubmitOutcome::Failed
            }
        };

        self.input = match outcome {
            SubmitOutcome::Failed => Some(input.to_string()),
            _ => None,
        };
        outcome
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
