//! The message list.
//!
//! Lines are wrapped here rather than by `Paragraph` so the row count handed
//! to the scroll anchor is exactly what ends up on screen.

use crate::app::App;
use murmur::inline::{EmbedAction, InlineEmbed, LinkTarget, Segment};
use murmur::messages::Message;
use murmur::scroll::Viewport;
use murmur::util::strip_control_chars;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

/// Maximum scroll offset ratatui can express.
const MAX_SCROLL: usize = u16::MAX as usize;

pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;

    let lines = build_lines(app, inner_width);
    let transition = app.sync_layout(lines.len(), inner_height);
    tracing::trace!(?transition, rows = lines.len(), "Message layout");

    let title = match app.active() {
        Some(chat) => {
            let more = if chat.has_more() { " ↑" } else { "" };
            format!(" {} ({}/{}){} ", chat.title(), app.active_chat + 1, app.chats.len(), more)
        }
        None => " No chats ".to_string(),
    };

    let offset = app.viewport.view_offset().min(MAX_SCROLL) as u16;
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .scroll((offset, 0));
    f.render_widget(paragraph, area);
}

/// Every row of the active chat at `width` columns.
pub(super) fn build_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let Some(chat) = app.active() else {
        return vec![Line::from("No messages")];
    };
    let selected = app.selected_index();
    let mut lines = Vec::new();

    for (index, message) in chat.visible().iter().enumerate() {
        let is_selected = selected == Some(index);
        lines.push(header_line(message, is_selected));

        let runs: Vec<(String, Style)> = app
            .inline
            .segments(&message.text)
            .into_iter()
            .map(|segment| match segment {
                Segment::Text(text) => (strip_control_chars(&text).into_owned(), Style::default()),
                Segment::Link { url, target } => {
                    (strip_control_chars(&url).into_owned(), link_style(target))
                }
            })
            .collect();
        lines.extend(wrap_runs(&runs, width));

        if is_selected && app.inline.message_id() == Some(message.id.as_str()) {
            for embed in app.inline.embeds() {
                lines.push(embed_line(embed));
            }
        }
        lines.push(Line::from(""));
    }
    lines
}

fn header_line(message: &Message, selected: bool) -> Line<'static> {
    let time = chrono::DateTime::from_timestamp_millis(message.timestamp)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_default();
    let marker = if selected { "▶ " } else { "  " };
    let name_style = if selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    Line::from(vec![
        Span::raw(marker),
        Span::styled(strip_control_chars(&message.sender).into_owned(), name_style),
        Span::styled(format!("  {}", time), Style::default().fg(Color::DarkGray)),
    ])
}

fn link_style(target: LinkTarget) -> Style {
    match target {
        LinkTarget::Direct => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::UNDERLINED),
        LinkTarget::ConfirmFirst => Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::UNDERLINED),
    }
}

fn embed_line(embed: &InlineEmbed) -> Line<'static> {
    let label = match embed.action {
        EmbedAction::OpenViewer => "[image]",
        EmbedAction::NativePlayback => "[video ▶]",
    };
    let detail = match &embed.media.local_ref {
        Some(local) => format!(" {} ({} bytes)", local.url(), local.len()),
        None => String::new(),
    };
    Line::from(vec![
        Span::styled(format!("  {} ", label), Style::default().fg(Color::Green)),
        Span::raw(embed.media.source_url.to_string()),
        Span::styled(detail, Style::default().fg(Color::DarkGray)),
    ])
}

/// Hard-wraps styled runs to `width` columns. Newlines start a new row and
/// an empty body still takes one row.
pub(super) fn wrap_runs(runs: &[(String, Style)], width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0;

    for (text, style) in runs {
        let mut chunk = String::new();
        for c in text.chars() {
            if c == '\n' {
                flush(&mut current, &mut chunk, *style);
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
                continue;
            }
            let w = UnicodeWidthChar::width(c).unwrap_or(0);
            if used + w > width && used > 0 {
                flush(&mut current, &mut chunk, *style);
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
            }
            chunk.push(c);
            used += w;
        }
        flush(&mut current, &mut chunk, *style);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

fn flush(spans: &mut Vec<Span<'static>>, chunk: &mut String, style: Style) {
    if !chunk.is_empty() {
        spans.push(Span::styled(std::mem::take(chunk), style));
    }
}
