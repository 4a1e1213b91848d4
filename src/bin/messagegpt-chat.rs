//! Interactive terminal chat against a messagegpt relay.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a relay on localhost:3001
//! messagegpt-chat
//!
//! # Talk to a relay elsewhere, presenting a bearer token
//! messagegpt-chat --url https://relay.example.com/ --token s3cret
//!
//! # Disable colors (useful for piping output)
//! messagegpt-chat --no-color
//! ```
//!
//! # Commands
//!
//! - `/help` - Show available commands
//! - `/clear` - Start over from the greeting
//! - `/history` - Show the conversation so far
//! - `/quit` - Exit the application

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use messagegpt::RelayClient;
use messagegpt::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, SubmitOutcome,
    help_text, parse_command,
};
use messagegpt::types::ChatTurn;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("messagegpt-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    let client = RelayClient::new(&config.url)?.with_token(config.token.clone());
    let mut session = ChatSession::new();
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut renderer =
        PlainTextRenderer::with_color(config.use_color).with_interrupt(interrupted.clone());
    let mut rl = DefaultEditor::new()?;

    // Ctrl-C while streaming stops the reply instead of the process.
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("MessageGPT (relay: {})", client.base_url());
    println!("Type /help for commands, /quit to exit\n");
    print_turn(&mut renderer, &session.turns()[0]);

    loop {
        interrupted.store(false, Ordering::Relaxed);

        let readline = match session.retained_input() {
            Some(retained) => rl.readline_with_initial("You: ", (retained, "")),
            None => rl.readline("You: "),
        };

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.trim());

                if let Some(cmd) = parse_command(&line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            session.clear();
                            renderer.print_info("Conversation cleared.");
                            print_turn(&mut renderer, &session.turns()[0]);
                        }
                        ChatCommand::History => {
                            for turn in session.turns() {
                                print_turn(&mut renderer, turn);
                            }
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                renderer.print_label("AI");
                if session.submit(&client, &line, &mut renderer).await == SubmitOutcome::Failed {
                    renderer.print_info("Press Enter to send your message again.");
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

fn print_turn(renderer: &mut PlainTextRenderer, turn: &ChatTurn) {
    if !turn.user.is_empty() {
        renderer.print_label("You");
        renderer.print_info(&turn.user);
    }
    if !turn.ai.is_empty() {
        renderer.print_label("AI");
        renderer.print_info(&turn.ai);
    }
}
