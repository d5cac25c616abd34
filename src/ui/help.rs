//! Help overlay listing the key bindings.

use ratatui::{
    layout::Constraint,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Row, Table},
    Frame,
};

use super::render::centered_rect;

const BINDINGS: &[(&str, &str)] = &[
    ("j / k, ↓ / ↑", "Scroll one line"),
    ("PgDn / PgUp", "Scroll one page"),
    ("Ctrl+d / Ctrl+u", "Scroll half a page"),
    ("Home / End", "Oldest loaded / newest"),
    ("n / p", "Select next / previous message"),
    ("Tab / Shift+Tab", "Next / previous chat"),
    ("o / Enter", "Open the selected message's link"),
    ("v", "Preview the selected message's link"),
    ("g", "GIF picker"),
    ("?", "Toggle this help"),
    ("q", "Quit"),
    ("", ""),
    ("Picker: type", "Search (debounced)"),
    ("Picker: ↑ / ↓", "Move"),
    ("Picker: Enter", "Open category / send GIF"),
    ("Picker: Esc", "Clear query, then close"),
    ("", ""),
    ("Dialog: y / t / n", "Open once / trust domain / cancel"),
];

pub fn render(f: &mut Frame) {
    let overlay = centered_rect(70, 70, f.area());
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }

    f.render_widget(Clear, overlay);

    let rows: Vec<Row> = BINDINGS
        .iter()
        .map(|(key, action)| Row::new(vec![key.to_string(), action.to_string()]))
        .collect();

    let table = Table::new(rows, [Constraint::Length(20), Constraint::Min(20)])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Help (? to close) "),
        )
        .header(
            Row::new(vec!["Key", "Action"])
                .style(
                    Style::default()
                        .add_modifier(Modifier::BOLD)
                        .add_modifier(Modifier::UNDERLINED),
                )
                .bottom_margin(1),
        );

    f.render_widget(table, overlay);
}
