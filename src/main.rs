use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

mod app;
mod chat;
mod config;
mod decode;
mod error;
mod exchange;
mod handler;
mod message;
mod prefs;
mod storage;
mod store;
mod transcribe;
mod tui;
mod ui;

use app::App;
use config::Config;
use prefs::Preferences;
use storage::FileStorage;
use transcribe::TranscriptionClient;

#[derive(Parser)]
#[command(name = "charla")]
#[command(about = "Terminal chat client with streaming replies and local history")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe and summarize a YouTube video
    Transcribe {
        /// Video URL
        url: String,
        /// ASR model to use (defaults to the saved preference)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// List saved conversations
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Some(Commands::Transcribe { url, model }) => transcribe_once(&config, &url, model).await,
        Some(Commands::History) => list_history(&config),
        None => run_tui(config).await,
    }
}

async fn run_tui(config: Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel();
    let mut app = App::new(&config, chat_tx)?;
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(frame, &mut app))?;

        tokio::select! {
            Some(event) = events.next() => {
                handler::handle_event(&mut app, event).await?;
            }
            Some(chat_event) = chat_rx.recv() => {
                handler::handle_chat_event(&mut app, chat_event);
            }
        }
    }

    tui::restore()?;
    Ok(())
}

async fn transcribe_once(config: &Config, url: &str, model: Option<String>) -> Result<()> {
    let storage = FileStorage::new(config.data_dir()?);
    let prefs = Preferences::load(&storage);
    let model = model.unwrap_or(prefs.asr_model);

    let client = TranscriptionClient::new(&config.transcribe_base_url);
    let result = client
        .youtube_to_text(url, &model)
        .await
        .map_err(|e| anyhow::anyhow!("transcription failed: {e}"))?;

    println!("Summary:\n{}\n", result.summary);
    println!("Transcript:\n{}", result.original_text);
    Ok(())
}

fn list_history(config: &Config) -> Result<()> {
    let storage = FileStorage::new(config.data_dir()?);
    let keys = store::conversation_keys(&storage);

    if keys.is_empty() {
        println!("No saved conversations.");
        return Ok(());
    }

    let mut conversation = store::ConversationStore::new();
    for key in keys {
        let count = conversation.load(&storage, &key).len();
        println!("{key}  ({count} messages)");
    }
    Ok(())
}
