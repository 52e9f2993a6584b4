use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Editor;
use rustyline::{Context, Helper};
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use parley_core::{
    ClientConfig, ConnectionState, Conversation, ConversationEvent, Message, MessageOrigin,
};
use parley_gateway::HttpChatGateway;
use parley_infrastructure::FileSessionStore;
use parley_transport::WebSocketTransport;

const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: vec![
                "/join".to_string(),
                "/leave".to_string(),
                "/quit".to_string(),
            ],
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

fn render_message(message: &Message) {
    match message.origin {
        // The REPL already echoes what the user typed.
        MessageOrigin::LocalUser => {}
        MessageOrigin::RemotePeer => {
            println!("{}", format!("[{}]", message.sender).bright_magenta());
            for line in message.content.lines() {
                println!("{}", line.bright_white());
            }
        }
        MessageOrigin::Assistant => {
            if message.transient {
                println!("{}", message.content.bright_black());
            } else {
                for line in message.content.lines() {
                    println!("{}", line.bright_blue());
                }
            }
        }
        MessageOrigin::System => {
            println!("{}", message.content.yellow());
        }
    }
}

fn render_event(event: ConversationEvent) {
    match event {
        ConversationEvent::StateChanged(state) => match state {
            ConnectionState::Connected => println!("{}", "Joined the room.".bright_green()),
            ConnectionState::Idle => {}
            ConnectionState::Connecting | ConnectionState::Disconnecting => {}
        },
        ConversationEvent::MessageAppended(message) => render_message(&message),
        ConversationEvent::MessageReplaced { message, .. } => render_message(&message),
        ConversationEvent::LogCleared => println!("{}", "Left the room.".bright_black()),
        ConversationEvent::ErrorRaised(message) => println!("{}", message.red()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    // ===== Backend wiring =====
    let config = ClientConfig::load();
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
    let gateway = Arc::new(HttpChatGateway::new(&config.backend_url));
    let transport = Arc::new(WebSocketTransport::new(inbound_tx));
    let store = Arc::new(
        FileSessionStore::new().context("could not resolve a platform config directory")?,
    );
    let conversation = Conversation::new(config, gateway, transport, store, inbound_rx);

    // Print conversation updates as they happen.
    let mut events = conversation.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => render_event(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    eprintln!("{}", format!("Skipped {skipped} updates").bright_black());
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("{}", "=== Parley ===".bright_magenta().bold());
    println!(
        "{}",
        "Type '/join <room> <name>' to join a room, '/leave' to leave, '/quit' to exit."
            .bright_black()
    );
    println!();

    // Rejoin the room from the previous run, if one was recorded.
    if let Err(err) = conversation.restore().await {
        println!("{}", format!("Could not restore the previous session: {err}").yellow());
    }

    // ===== Main REPL Loop =====
    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                if trimmed == "/quit" || trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                if let Some(rest) = trimmed.strip_prefix("/join") {
                    let parts: Vec<&str> = rest.split_whitespace().collect();
                    match parts.as_slice() {
                        [room, name] => {
                            // Failures surface through the event printer.
                            let _ = conversation.connect(room, name).await;
                        }
                        _ => println!("{}", "Usage: /join <room> <name>".yellow()),
                    }
                    continue;
                }

                if trimmed == "/leave" {
                    conversation.disconnect().await;
                    continue;
                }

                if trimmed.starts_with('/') {
                    println!("{}", "Unknown command".bright_black());
                    continue;
                }

                println!("{}", format!("> {trimmed}").green());
                if conversation.send_message(trimmed).await.is_err() {
                    println!("{}", "Join a room first: /join <room> <name>".yellow());
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type '/quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {err:?}").red());
                break;
            }
        }
    }

    conversation.shutdown().await;
    printer.abort();

    Ok(())
}
