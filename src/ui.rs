use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};

use crate::app::{App, InputMode, Screen};
use crate::message::Role;

/// Wrap text to fit within a given width, breaking on word boundaries.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len == 0 {
            current_line = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current_line.push(' ');
            current_line.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(current_line);
            current_line = word.to_string();
            current_len = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

pub fn render(frame: &mut Frame, app: &mut App) {
    match app.screen {
        Screen::Chat => render_chat(frame, app),
        Screen::Transcribe => render_transcribe(frame, app),
    }

    if app.show_history {
        render_history_drawer(frame, app);
    }
}

fn render_chat(frame: &mut Frame, app: &mut App) {
    let [status_area, chat_area, input_area, help_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_status_line(frame, app, status_area);
    render_messages(frame, app, chat_area);
    render_input(frame, app, input_area);

    let help = if app.input_mode == InputMode::Editing {
        "Enter send · Esc normal mode"
    } else {
        "i edit · h history · n new · R reset · m model · d dev · z size · t transcribe · q quit"
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        help_area,
    );
}

fn render_status_line(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " charla ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " {} · {} · {}",
            app.prefs.model,
            app.prefs.font_size.as_str(),
            if app.prefs.dev_mode { "dev" } else { "chat" },
        )),
    ];

    if let Some(err) = app.exchange.last_error() {
        spans.push(Span::styled(
            format!("  {err}"),
            Style::default().fg(Color::Red),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_messages(frame: &mut Frame, app: &mut App, area: Rect) {
    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    app.chat_width = inner_width as u16;
    app.chat_height = area.height.saturating_sub(2);

    let spacing = app.prefs.font_size.message_spacing();
    let mut lines: Vec<Line> = Vec::new();

    for msg in app.store.messages() {
        let (prefix, style) = match msg.role {
            Role::User => ("You:", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            _ => ("AI:", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        };
        lines.push(Line::from(Span::styled(prefix, style)));

        for content_line in msg.content.lines() {
            for wrapped in wrap_text_to_width(content_line, inner_width) {
                lines.push(Line::from(wrapped));
            }
        }

        for _ in 0..=spacing {
            lines.push(Line::default());
        }
    }

    if app.exchange.is_busy() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
        let dots = ".".repeat(app.animation_frame + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{dots}"),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let max_scroll = (lines.len() as u16).saturating_sub(app.chat_height);
    app.chat_scroll = app.chat_scroll.min(max_scroll);

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Conversation"))
        .scroll((app.chat_scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let busy = app.exchange.is_busy();
    let style = if busy {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    let title = if busy { "Message (waiting for reply)" } else { "Message" };

    let paragraph = Paragraph::new(app.input.as_str())
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(paragraph, area);

    if app.input_mode == InputMode::Editing && !busy {
        let x = area.x + 1 + (app.cursor as u16).min(area.width.saturating_sub(3));
        frame.set_cursor(x, area.y + 1);
    }
}

fn render_history_drawer(frame: &mut Frame, app: &mut App) {
    let full = frame.area();
    let area = Rect {
        x: full.x,
        y: full.y,
        width: full.width.min(34),
        height: full.height,
    };

    let items: Vec<ListItem> = if app.history_keys.is_empty() {
        vec![ListItem::new("No saved conversations")]
    } else {
        app.history_keys
            .iter()
            .map(|key| ListItem::new(key.as_str()))
            .collect()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("History (Enter open · Esc close)"),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut app.history_state);
}

fn render_transcribe(frame: &mut Frame, app: &mut App) {
    let [url_area, status_area, body_area, help_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let paragraph = Paragraph::new(app.url_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("YouTube URL ({})", app.prefs.asr_model)),
    );
    frame.render_widget(paragraph, url_area);

    if app.input_mode == InputMode::Editing && !app.transcribe_loading {
        let x = url_area.x + 1 + (app.url_cursor as u16).min(url_area.width.saturating_sub(3));
        frame.set_cursor(x, url_area.y + 1);
    }

    if app.transcribe_loading {
        let dots = ".".repeat(app.animation_frame + 1);
        frame.render_widget(
            Paragraph::new(format!("Transcribing{dots}"))
                .style(Style::default().fg(Color::DarkGray)),
            status_area,
        );
    } else if app.transcribe_error {
        frame.render_widget(
            Paragraph::new("An error occurred.").style(Style::default().fg(Color::Red)),
            status_area,
        );
    }

    if let Some(t) = &app.transcription {
        let inner_width = body_area.width.saturating_sub(2).max(1) as usize;
        let mut lines: Vec<Line> = Vec::new();

        lines.push(Line::from(Span::styled(
            "Summary",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
        for content_line in t.summary.lines() {
            for wrapped in wrap_text_to_width(content_line, inner_width) {
                lines.push(Line::from(wrapped));
            }
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Transcript",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        for content_line in t.original_text.lines() {
            for wrapped in wrap_text_to_width(content_line, inner_width) {
                lines.push(Line::from(wrapped));
            }
        }

        let max_scroll = (lines.len() as u16).saturating_sub(body_area.height.saturating_sub(2));
        app.transcribe_scroll = app.transcribe_scroll.min(max_scroll);

        frame.render_widget(
            Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title("Result"))
                .scroll((app.transcribe_scroll, 0)),
            body_area,
        );
    } else {
        frame.render_widget(
            Block::default().borders(Borders::ALL).title("Result"),
            body_area,
        );
    }

    let help = if app.input_mode == InputMode::Editing {
        "Enter transcribe · Esc normal mode"
    } else {
        "i edit · a asr model · j/k scroll · c chat · q quit"
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        help_area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_respects_word_boundaries() {
        let lines = wrap_text_to_width("the quick brown fox", 9);
        assert_eq!(lines, vec!["the quick", "brown fox"]);
    }

    #[test]
    fn wrapping_zero_width_returns_input() {
        assert_eq!(wrap_text_to_width("abc", 0), vec!["abc"]);
    }

    #[test]
    fn wrapping_empty_input_yields_one_blank_line() {
        assert_eq!(wrap_text_to_width("", 10), vec![String::new()]);
    }
}
