use ratatui::widgets::ListState;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chat::ChatClient;
use crate::chat::ChatEvent;
use crate::config::Config;
use crate::error::ChatError;
use crate::exchange::Exchange;
use crate::prefs::Preferences;
use crate::storage::FileStorage;
use crate::store::{self, ConversationStore};
use crate::transcribe::{Transcription, TranscriptionClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Transcribe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Injected capabilities
    pub storage: FileStorage,
    pub store: ConversationStore,
    pub prefs: Preferences,
    pub exchange: Exchange,
    pub chat_client: ChatClient,
    pub transcription_client: TranscriptionClient,
    pub chat_tx: mpsc::UnboundedSender<ChatEvent>,

    // Active conversation
    pub conversation_key: String,

    // Chat input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Chat view state
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub animation_frame: usize,

    // History drawer
    pub show_history: bool,
    pub history_keys: Vec<String>,
    pub history_state: ListState,

    // Transcribe screen
    pub url_input: String,
    pub url_cursor: usize,
    pub transcribe_loading: bool,
    pub transcribe_error: bool,
    pub transcription: Option<Transcription>,
    pub transcribe_scroll: u16,
    pub transcribe_task: Option<JoinHandle<Result<Transcription, ChatError>>>,
}

impl App {
    pub fn new(config: &Config, chat_tx: mpsc::UnboundedSender<ChatEvent>) -> anyhow::Result<Self> {
        let storage = FileStorage::new(config.data_dir()?);
        let prefs = Preferences::load(&storage);

        Ok(Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Editing,

            storage,
            store: ConversationStore::new(),
            prefs,
            exchange: Exchange::new(),
            chat_client: ChatClient::new(&config.chat_base_url),
            transcription_client: TranscriptionClient::new(&config.transcribe_base_url),
            chat_tx,

            conversation_key: store::new_conversation_key(),

            input: String::new(),
            cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,

            show_history: false,
            history_keys: Vec::new(),
            history_state: ListState::default(),

            url_input: String::new(),
            url_cursor: 0,
            transcribe_loading: false,
            transcribe_error: false,
            transcription: None,
            transcribe_scroll: 0,
            transcribe_task: None,
        })
    }

    /// Submit the current input as a new chat turn. Ignored while a turn is
    /// already in flight or when the trimmed input is empty. The input buffer
    /// clears as soon as the turn is accepted, so anything typed while the
    /// reply streams belongs to the next message.
    pub fn submit_chat(&mut self) {
        if self.exchange.is_busy() || self.input.trim().is_empty() {
            return;
        }

        let key = self.conversation_key.clone();
        match self.exchange.begin(
            &mut self.storage,
            &mut self.store,
            &key,
            &self.input,
            self.prefs.dev_mode,
        ) {
            Ok(outbound) => {
                self.input.clear();
                self.cursor = 0;
                self.chat_client.spawn_stream(
                    self.exchange.turn(),
                    outbound,
                    self.prefs.model.clone(),
                    self.chat_tx.clone(),
                );
                self.scroll_chat_to_bottom();
            }
            Err(err) => self.exchange.on_fail(&err),
        }
    }

    /// Kick off a transcription request on the transcribe screen.
    pub fn submit_transcription(&mut self) {
        if self.transcribe_task.is_some() || self.url_input.trim().is_empty() {
            return;
        }

        self.transcribe_loading = true;
        self.transcribe_error = false;
        self.transcription = None;
        self.transcribe_scroll = 0;

        let client = self.transcription_client.clone();
        let url = self.url_input.trim().to_string();
        let model = self.prefs.asr_model.clone();
        self.transcribe_task = Some(tokio::spawn(async move {
            client.youtube_to_text(&url, &model).await
        }));
    }

    /// Pick up a finished transcription task, if any. Called on every tick so
    /// the loading indicator clears no matter how the task ended.
    pub async fn poll_transcription(&mut self) {
        let finished = self
            .transcribe_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        if let Some(task) = self.transcribe_task.take() {
            self.transcribe_loading = false;
            match task.await {
                Ok(Ok(result)) => self.transcription = Some(result),
                Ok(Err(_)) | Err(_) => self.transcribe_error = true,
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.exchange.is_busy() || self.transcribe_loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn open_history(&mut self) {
        self.history_keys = store::conversation_keys(&self.storage);
        self.history_keys.reverse(); // newest first
        self.history_state
            .select((!self.history_keys.is_empty()).then_some(0));
        self.show_history = true;
    }

    pub fn close_history(&mut self) {
        self.show_history = false;
    }

    pub fn history_nav_down(&mut self) {
        let len = self.history_keys.len();
        if len > 0 {
            let i = self.history_state.selected().unwrap_or(0);
            self.history_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn history_nav_up(&mut self) {
        let i = self.history_state.selected().unwrap_or(0);
        self.history_state.select(Some(i.saturating_sub(1)));
    }

    /// Switch to the conversation selected in the history drawer.
    pub fn open_selected_conversation(&mut self) {
        if self.exchange.is_busy() {
            return;
        }
        if let Some(i) = self.history_state.selected() {
            if let Some(key) = self.history_keys.get(i).cloned() {
                self.store.load(&self.storage, &key);
                self.conversation_key = key;
                self.show_history = false;
                self.scroll_chat_to_bottom();
            }
        }
    }

    /// Start an empty conversation under a fresh key. Nothing is persisted
    /// until the first message is appended.
    pub fn new_conversation(&mut self) {
        if self.exchange.is_busy() {
            return;
        }
        self.conversation_key = store::new_conversation_key();
        self.store = ConversationStore::new();
        self.chat_scroll = 0;
    }

    /// Clear the active conversation and drop its persisted entry.
    pub fn reset_conversation(&mut self) {
        if self.exchange.is_busy() {
            return;
        }
        let key = self.conversation_key.clone();
        // The in-memory list clears regardless; a leftover file is
        // overwritten by the next append.
        let _ = self.store.reset(&mut self.storage, &key);
        self.chat_scroll = 0;
    }

    /// Scroll the chat view so the latest message (and the thinking
    /// indicator) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };
        let spacing = self.prefs.font_size.message_spacing();

        let mut total_lines: u16 = 0;
        for msg in self.store.messages() {
            total_lines += 1; // role line
            for line in msg.content.lines() {
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1 + spacing; // gap after message
        }

        if self.exchange.is_busy() {
            total_lines += 2; // "AI:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}
