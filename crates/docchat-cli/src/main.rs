//! `docchat`: chat with uploaded documents from the terminal.

mod render;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use docchat_core::event_bus::{BroadcastEvent, EventBus};
use docchat_core::stream::{EventStream, MemoryStream};
use docchat_core::{ApiClient, ClientConfig, ConversationController};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;

use render::{TerminalRenderer, UpdatePrinter};

/// Chunk size used when replaying a captured body, so frames straddle reads.
const REPLAY_CHUNK: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "docchat")]
#[command(about = "Chat with your documents from the terminal", long_about = None)]
struct Cli {
    /// Base URL of the chat API
    #[arg(long, env = "DOCCHAT_URL")]
    url: Option<String>,

    /// Directory for per-session wire logs
    #[arg(long, env = "DOCCHAT_LOG_DIR")]
    log_dir: Option<String>,

    /// Give up on an answer when no bytes arrive for this many seconds
    #[arg(long, value_name = "SECS", env = "DOCCHAT_READ_TIMEOUT")]
    read_timeout: Option<u64>,

    /// Upload a document before chatting (repeatable)
    #[arg(long = "upload", value_name = "FILE")]
    uploads: Vec<PathBuf>,

    /// Send a single message, print the answer and exit
    #[arg(short, long)]
    message: Option<String>,

    /// Decode a captured response body and print its events as JSON lines
    #[arg(long, value_name = "FILE", conflicts_with_all = ["message", "uploads"])]
    replay: Option<PathBuf>,
}

type Controller = ConversationController<ApiClient, TerminalRenderer>;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Some(path) = &cli.replay {
        return match replay(path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log::error!("Failed to replay {}: {}", path.display(), e);
                ExitCode::FAILURE
            }
        };
    }

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.url {
        config = config.base_url(url);
    }
    if let Some(dir) = cli.log_dir {
        config = config.log_dir(dir);
    }
    if let Some(secs) = cli.read_timeout.filter(|s| *s > 0) {
        config = config.read_timeout(Duration::from_secs(secs));
    }
    log::info!("Using chat API at {}", config.base_url);

    let bus = Arc::new(EventBus::new());
    let mut updates = bus.subscribe();
    let mut printer = UpdatePrinter::default();
    let mut controller =
        ConversationController::new(ApiClient::new(config), TerminalRenderer, bus);

    let started = controller.start_new_chat();
    drain(&mut updates, &mut printer);
    if started.is_err() {
        return ExitCode::FAILURE;
    }

    for path in &cli.uploads {
        let _ = controller.upload_document(path);
        drain(&mut updates, &mut printer);
    }

    if let Some(message) = cli.message {
        controller.send_message(&message);
        stream_answer(&mut controller, &mut updates, &mut printer);
        return match controller.current_error() {
            Some(_) => ExitCode::FAILURE,
            None => ExitCode::SUCCESS,
        };
    }

    repl(&mut controller, &mut updates, &mut printer);
    ExitCode::SUCCESS
}

fn repl(
    controller: &mut Controller,
    updates: &mut Receiver<BroadcastEvent>,
    printer: &mut UpdatePrinter,
) {
    println!("Commands: /upload <file>, /new, /chart, /quit");
    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::error!("Failed to read input: {}", e);
                break;
            }
        }

        let input = line.trim();
        match input.split_once(' ').unwrap_or((input, "")) {
            ("/quit", _) | ("/exit", _) => break,
            ("/new", _) => {
                let _ = controller.start_new_chat();
            }
            ("/upload", "") => println!("usage: /upload <file>"),
            ("/upload", path) => {
                let _ = controller.upload_document(Path::new(path.trim()));
            }
            ("/chart", _) => {
                if controller.current_chart().is_none() {
                    println!("No chart to show.");
                } else if controller.is_chart_collapsed() {
                    controller.toggle_chart_collapse();
                } else {
                    controller.close_chart();
                }
            }
            _ => {
                controller.send_message(line.trim_end_matches(['\n', '\r']));
                stream_answer(controller, updates, printer);
                continue;
            }
        }
        drain(updates, printer);
    }
}

/// Pump the active turn, printing updates as they arrive.
fn stream_answer(
    controller: &mut Controller,
    updates: &mut Receiver<BroadcastEvent>,
    printer: &mut UpdatePrinter,
) {
    drain(updates, printer);
    while controller.pump() {
        drain(updates, printer);
    }
    drain(updates, printer);
}

fn drain(updates: &mut Receiver<BroadcastEvent>, printer: &mut UpdatePrinter) {
    loop {
        match updates.try_recv() {
            Ok(event) => printer.print(&event),
            Err(TryRecvError::Lagged(n)) => log::warn!("Skipped {} updates", n),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

/// Run a captured response body through the decoder.
fn replay(path: &Path) -> io::Result<()> {
    let body = fs::read(path)?;
    let chunks: Vec<Vec<u8>> = body.chunks(REPLAY_CHUNK).map(<[u8]>::to_vec).collect();
    let mut out = io::stdout().lock();
    for event in EventStream::new(MemoryStream::new(chunks)) {
        let line = serde_json::to_string(&event).map_err(io::Error::other)?;
        writeln!(out, "{}", line)?;
    }
    Ok(())
}
