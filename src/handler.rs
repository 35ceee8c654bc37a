use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, InputMode, Screen};
use crate::chat::ChatEvent;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_transcription().await;
        }
    }
    Ok(())
}

/// Apply one event from the stream worker to the active exchange. The worker
/// guarantees a terminal `Done` or `Failed`, so the busy state always clears.
/// A worker whose turn has ended (its exchange failed locally and a new one
/// may already be running) keeps sending until it notices; those leftovers
/// carry an old turn id and are dropped here.
pub fn handle_chat_event(app: &mut App, event: ChatEvent) {
    if event.turn() != app.exchange.turn() {
        return;
    }

    let key = app.conversation_key.clone();
    match event {
        ChatEvent::Delta { text, .. } => {
            if let Err(err) = app
                .exchange
                .on_delta(&mut app.storage, &mut app.store, &key, &text)
            {
                app.exchange.on_fail(&err);
            } else {
                app.scroll_chat_to_bottom();
            }
        }
        ChatEvent::Done { .. } => {
            if app.exchange.is_busy() {
                app.exchange.on_done();
                app.scroll_chat_to_bottom();
            }
        }
        ChatEvent::Failed { error, .. } => {
            if app.exchange.is_busy() {
                app.exchange.on_fail(&error);
            }
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_history {
        handle_history_drawer(app, key);
        return;
    }

    match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Normal) => handle_chat_normal(app, key),
        (Screen::Chat, InputMode::Editing) => handle_chat_editing(app, key),
        (Screen::Transcribe, InputMode::Normal) => handle_transcribe_normal(app, key),
        (Screen::Transcribe, InputMode::Editing) => handle_transcribe_editing(app, key),
    }
}

fn handle_history_drawer(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('h') => app.close_history(),
        KeyCode::Char('j') | KeyCode::Down => app.history_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.history_nav_up(),
        KeyCode::Enter => app.open_selected_conversation(),
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('t') => {
            app.screen = Screen::Transcribe;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('h') => app.open_history(),
        KeyCode::Char('n') => app.new_conversation(),
        KeyCode::Char('R') => app.reset_conversation(),
        KeyCode::Char('m') => {
            let _ = app.prefs.cycle_model(&mut app.storage);
        }
        KeyCode::Char('d') => {
            let on = !app.prefs.dev_mode;
            let _ = app.prefs.set_dev_mode(&mut app.storage, on);
        }
        KeyCode::Char('z') => {
            let next = app.prefs.font_size.next();
            let _ = app.prefs.set_font_size(&mut app.storage, next);
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.chat_scroll = app.chat_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.chat_scroll = app.chat_scroll.saturating_sub(1);
        }
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.submit_chat(),
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => app.cursor = app.cursor.saturating_sub(1),
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => app.cursor = 0,
        KeyCode::End => app.cursor = app.input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn handle_transcribe_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('c') | KeyCode::Esc => {
            app.screen = Screen::Chat;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('a') => {
            let options = crate::prefs::ASR_MODEL_OPTIONS;
            let idx = options
                .iter()
                .position(|m| *m == app.prefs.asr_model)
                .unwrap_or(0);
            let next = options[(idx + 1) % options.len()];
            let _ = app.prefs.set_asr_model(&mut app.storage, next);
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.transcribe_scroll = app.transcribe_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.transcribe_scroll = app.transcribe_scroll.saturating_sub(1);
        }
        _ => {}
    }
}

fn handle_transcribe_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.submit_transcription(),
        KeyCode::Backspace => {
            if app.url_cursor > 0 {
                app.url_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.url_input, app.url_cursor);
                app.url_input.remove(byte_pos);
            }
        }
        KeyCode::Left => app.url_cursor = app.url_cursor.saturating_sub(1),
        KeyCode::Right => {
            let char_count = app.url_input.chars().count();
            app.url_cursor = (app.url_cursor + 1).min(char_count);
        }
        KeyCode::Home => app.url_cursor = 0,
        KeyCode::End => app.url_cursor = app.url_input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.url_input, app.url_cursor);
            app.url_input.insert(byte_pos, c);
            app.url_cursor += 1;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::message::Message;
    use tokio::sync::mpsc;

    fn test_app(dir: &std::path::Path) -> App {
        let config = Config {
            chat_base_url: "http://localhost:3000".to_string(),
            transcribe_base_url: "http://localhost:5000".to_string(),
            data_dir: Some(dir.to_path_buf()),
        };
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(&config, tx).unwrap()
    }

    #[tokio::test]
    async fn typing_updates_the_input_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());

        for c in "héllo".chars() {
            handle_key(&mut app, KeyEvent::from(KeyCode::Char(c)));
        }
        handle_key(&mut app, KeyEvent::from(KeyCode::Backspace));

        assert_eq!(app.input, "héll");
        assert_eq!(app.cursor, 4);
    }

    fn delta(turn: u64, text: &str) -> ChatEvent {
        ChatEvent::Delta {
            turn,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn stream_events_drive_the_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());

        app.input = "hi".to_string();
        app.submit_chat();
        assert!(app.exchange.is_busy());
        assert!(app.input.is_empty());

        let turn = app.exchange.turn();
        handle_chat_event(&mut app, delta(turn, "He"));
        handle_chat_event(&mut app, delta(turn, "llo!"));
        handle_chat_event(&mut app, ChatEvent::Done { turn });

        assert!(!app.exchange.is_busy());
        assert_eq!(
            app.store.messages(),
            &[Message::user("hi"), Message::assistant("Hello!")]
        );
    }

    #[tokio::test]
    async fn failed_stream_clears_busy_and_keeps_partial() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());

        app.input = "hi".to_string();
        app.submit_chat();
        let turn = app.exchange.turn();
        handle_chat_event(&mut app, delta(turn, "Hel"));
        handle_chat_event(
            &mut app,
            ChatEvent::Failed {
                turn,
                error: crate::error::ChatError::Transport("reset".into()),
            },
        );

        assert!(!app.exchange.is_busy());
        assert!(app.exchange.last_error().is_some());
        assert_eq!(
            app.store.messages(),
            &[Message::user("hi"), Message::assistant("Hel")]
        );
    }

    #[tokio::test]
    async fn events_from_a_superseded_turn_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());

        // First turn dies locally while its worker is still running.
        app.input = "first".to_string();
        app.submit_chat();
        let old_turn = app.exchange.turn();
        handle_chat_event(
            &mut app,
            ChatEvent::Failed {
                turn: old_turn,
                error: crate::error::ChatError::Storage("disk full".into()),
            },
        );
        assert!(!app.exchange.is_busy());

        // Second turn starts; the dead worker's leftovers then arrive.
        app.input = "second".to_string();
        app.submit_chat();
        let turn = app.exchange.turn();
        handle_chat_event(
            &mut app,
            ChatEvent::Delta {
                turn: old_turn,
                text: "old reply".to_string(),
            },
        );
        handle_chat_event(&mut app, ChatEvent::Done { turn: old_turn });

        // The live turn is untouched and finishes with its own reply.
        assert!(app.exchange.is_busy());
        assert_eq!(
            app.store.messages(),
            &[Message::user("first"), Message::user("second")]
        );

        handle_chat_event(&mut app, delta(turn, "fresh reply"));
        handle_chat_event(&mut app, ChatEvent::Done { turn });
        assert_eq!(
            app.store.messages(),
            &[
                Message::user("first"),
                Message::user("second"),
                Message::assistant("fresh reply"),
            ]
        );
    }

    #[tokio::test]
    async fn text_typed_while_streaming_survives_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());

        app.input = "hi".to_string();
        app.submit_chat();
        let turn = app.exchange.turn();

        for c in "next".chars() {
            handle_key(&mut app, KeyEvent::from(KeyCode::Char(c)));
        }
        handle_chat_event(&mut app, delta(turn, "Hello!"));
        handle_chat_event(&mut app, ChatEvent::Done { turn });

        assert_eq!(app.input, "next");
        assert_eq!(app.cursor, 4);
    }

    #[tokio::test]
    async fn submit_while_streaming_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());

        app.input = "first".to_string();
        app.submit_chat();
        app.input = "second".to_string();
        app.submit_chat();

        assert_eq!(app.store.messages(), &[Message::user("first")]);
    }
}
