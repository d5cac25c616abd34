//! Render dispatch for the TUI.

use crate::app::{App, PendingLink};
use murmur::trust::LinkRisk;
use murmur::util::truncate_to_width;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::{chat, help, picker, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 40;
pub(super) const MIN_HEIGHT: u16 = 8;

pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();

    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    chat::render(f, app, chunks[0]);
    status::render(f, app, chunks[1]);

    if app.picker.open {
        picker::render(f, app);
    }

    if app.show_help {
        help::render(f);
    }

    if let Some(ref pending) = app.pending_link {
        render_confirm_overlay(f, pending);
    }
}

/// The link confirmation dialog, centered.
fn render_confirm_overlay(f: &mut Frame, pending: &PendingLink) {
    let area = f.area();

    let width = 60u16.min(area.width.saturating_sub(4));
    let height = 9u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let overlay = Rect::new(x, y, width, height);

    if overlay.width < 10 || overlay.height < 5 {
        return;
    }

    let (heading, trust_hint) = match pending.risk {
        LinkRisk::UntrustedDomain => ("This link leaves the trusted domains.", "(t) Trust domain  "),
        LinkRisk::FlaggedUnsafe => ("This link points at a local or private address.", ""),
    };
    let url = truncate_to_width(pending.url.as_str(), width.saturating_sub(4) as usize);
    let text = format!(
        "{}\n\n{}\n\n(y) Open once  {}(n/Esc) Cancel",
        heading, url, trust_hint
    );

    f.render_widget(Clear, overlay);

    let border = match pending.risk {
        LinkRisk::UntrustedDomain => Color::Yellow,
        LinkRisk::FlaggedUnsafe => Color::Red,
    };
    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(" Open link? "),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, overlay);
}

/// Create a centered rectangle with the given percentage of the parent area.
pub(super) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = (u32::from(area.width) * u32::from(percent_x) / 100) as u16;
    let height = (u32::from(area.height) * u32::from(percent_y) / 100) as u16;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
