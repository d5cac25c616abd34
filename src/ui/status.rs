use crate::app::App;
use murmur::scroll::Viewport;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    // Transient messages win over hints
    let text: &str = match &app.status_message {
        Some((msg, _)) => msg.as_ref(),
        None if app.pending_link.is_some() => "(y) open once  (t) trust domain  (n/Esc) cancel",
        None if app.picker.open => "Type to search | ↑/↓ move | ENTER pick | ESC back",
        None if at_history_top(app) => "Top of loaded history | k/↑ loads older messages",
        None => "[n/p]select [o]pen [v]preview [g]ifs [Tab]chat [?]help [q]uit",
    };

    let paragraph = Paragraph::new(text)
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(paragraph, area);
}

fn at_history_top(app: &App) -> bool {
    app.viewport.view_offset() == 0 && app.active().is_some_and(|chat| chat.has_more())
}
