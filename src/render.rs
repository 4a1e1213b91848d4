//! Output rendering for the terminal chat.
//!
//! The session reports what happens during a submission through the
//! [`Renderer`] trait; [`PlainTextRenderer`] writes it to stdout with optional
//! ANSI styling.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// ANSI escape code for dim text (used for the typing indicator).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for the typing indicator).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for speaker labels).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI sequence that returns to column zero and clears the line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// Shown while the reply has not started yet.
pub const TYPING_INDICATOR: &str = "AI is typing...";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Recording renderers in tests
pub trait Renderer: Send {
    /// Called when a submission starts waiting for the reply.
    fn start_typing(&mut self) {}

    /// Called when the first delta arrives or the submission ends without one.
    fn stop_typing(&mut self) {}

    /// Print a chunk of reply text.
    ///
    /// This is called incrementally as deltas are decoded from the relay.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a reply is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    typing: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            typing: false,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Prints a speaker label such as `AI: ` before a reply.
    pub fn print_label(&mut self, label: &str) {
        if self.use_color {
            print!("{ANSI_CYAN}{label}:{ANSI_RESET} ");
        } else {
            print!("{label}: ");
        }
        self.flush();
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_typing(&mut self) {
        if self.use_color {
            print!("{ANSI_DIM}{ANSI_ITALIC}{TYPING_INDICATOR}{ANSI_RESET}");
        } else {
            print!("{TYPING_INDICATOR}");
        }
        self.typing = true;
        self.flush();
    }

    fn stop_typing(&mut self) {
        if !self.typing {
            return;
        }
        if self.use_color {
            print!("{ANSI_CLEAR_LINE}");
        } else {
            print!("\r{}\r", " ".repeat(TYPING_INDICATOR.len()));
        }
        self.typing = false;
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        self.stop_typing();
        print!("{text}");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.stop_typing();
        if self.use_color {
            eprintln!("{ANSI_RED}{error}{ANSI_RESET}");
        } else {
            eprintln!("{error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.stop_typing();
        println!("{info}");
        self.flush();
    }

    fn finish_response(&mut self) {
        self.stop_typing();
        println!();
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.stop_typing();
        println!("\n[interrupted]");
        self.flush();
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
