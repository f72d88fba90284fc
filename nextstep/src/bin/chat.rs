/*
nextstep-chat - terminal chat client.
Keeps the conversation in a local history file and talks to the server's chat endpoint.
*/

use anyhow::Result;
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use nextstep::chat::{ChatSession, ChatStore, FileStorage, HttpChatBackend, Message, Notice, Role, SendOutcome};

const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
const DEFAULT_HISTORY_DIR: &str = "data/chat";

#[derive(Parser, Debug)]
#[command(name = "nextstep-chat", about = "Chat with NextStep AI from the terminal")]
struct Args {
    /// Path to config.toml (reads the [chat] section)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server root URL, overrides chat.server_url
    #[arg(long)]
    server_url: Option<String>,

    /// Directory holding the chat history, overrides chat.history_dir
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let chat_cfg = load_chat_config(args.config.as_deref()).await;

    let server_url = args
        .server_url
        .or_else(|| chat_cfg.as_ref().and_then(|c| c.server_url.clone()))
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    let history_dir = args
        .history_dir
        .or_else(|| chat_cfg.as_ref().and_then(|c| c.history_dir.clone()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_DIR));
    info!(server = %server_url, history = ?history_dir, "chat client starting");

    let backend = HttpChatBackend::new(&server_url, args.timeout)?;
    let session = ChatSession::new(backend, ChatStore::new(FileStorage::new(history_dir)));

    print_history(&session.messages());
    println!("(type /clear to reset, /history to reprint, /quit to exit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                print_notice(session.clear());
                print_history(&session.messages());
            }
            "/history" => print_history(&session.messages()),
            _ => match session.send(&line).await {
                SendOutcome::Ignored => {}
                SendOutcome::Busy => println!("(still waiting for the previous reply)"),
                SendOutcome::Replied(reply) => print_message(&Message::assistant(reply)),
                SendOutcome::Failed(notice) => {
                    print_notice(notice);
                    if let Some(last) = session.messages().last() {
                        print_message(last);
                    }
                }
            },
        }
    }

    Ok(())
}

async fn load_chat_config(path: Option<&std::path::Path>) -> Option<common::ChatConfig> {
    let default_path = PathBuf::from("config.default.toml");
    let override_path = path.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("config.toml"));
    match Config::load_with_defaults(Some(&default_path), Some(&override_path)).await {
        Ok(cfg) => cfg.chat,
        Err(e) => {
            debug!("no usable configuration, using defaults: {:#}", e);
            None
        }
    }
}

fn print_history(messages: &[Message]) {
    for m in messages {
        print_message(m);
    }
}

fn print_message(message: &Message) {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "NextStep AI",
    };
    println!("{}> {}", who, message.content);
}

fn print_notice(notice: Notice) {
    let marker = if notice.is_error() { "!" } else { "*" };
    println!("{} {}: {}", marker, notice.title(), notice.description());
}
