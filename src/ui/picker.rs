//! GIF picker overlay: a query line over either the category grid or the
//! paged search results.

use crate::app::App;
use murmur::feed::FeedView;
use murmur::util::{strip_control_chars, truncate_to_width};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};

use super::render::centered_rect;

pub fn render(f: &mut Frame, app: &mut App) {
    let overlay = centered_rect(70, 70, f.area());
    if overlay.width < 20 || overlay.height < 8 {
        return;
    }
    f.render_widget(Clear, overlay);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(picker_title(app));
    let inner = block.inner(overlay);
    f.render_widget(block, overlay);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let query = Paragraph::new(Line::from(vec![
        Span::styled("Search: ", Style::default().fg(Color::DarkGray)),
        Span::raw(format!("{}_", app.picker.query)),
    ]));
    f.render_widget(query, chunks[0]);

    render_list(f, app, chunks[1]);
}

fn picker_title(app: &App) -> String {
    let state = app.feed.state();
    let loading = if state.loading { " (loading...)" } else { "" };
    match state.view {
        FeedView::Categories => format!(" Categories{} ", loading),
        FeedView::Results => format!(
            " Results {}/{} (page {}/{}){} ",
            state.visible_results().len(),
            state.all_results.len(),
            state.page,
            state.max_page(),
            loading
        ),
    }
}

fn render_list(f: &mut Frame, app: &mut App, area: Rect) {
    let rows = area.height as usize;
    if rows == 0 {
        return;
    }

    // Keep the cursor on screen
    let picker = &mut app.picker;
    if picker.selected < picker.scroll {
        picker.scroll = picker.selected;
    } else if picker.selected >= picker.scroll + rows {
        picker.scroll = picker.selected + 1 - rows;
    }
    let first = picker.scroll;

    let change = app.feed.on_viewport(first, rows);
    if change.loaded_more {
        // New page appended below; draw it on the next frame
        app.needs_redraw = true;
    }

    let state = app.feed.state();
    let width = area.width.saturating_sub(2) as usize;
    let items: Vec<ListItem> = match state.view {
        FeedView::Categories if state.categories.is_empty() => {
            vec![ListItem::new(empty_text(state.loading))]
        }
        FeedView::Categories => state
            .categories
            .iter()
            .enumerate()
            .skip(first)
            .take(rows)
            .map(|(i, category)| {
                let name = strip_control_chars(&category.name);
                ListItem::new(Line::from(Span::styled(
                    truncate_to_width(&name, width).into_owned(),
                    row_style(i == app.picker.selected),
                )))
            })
            .collect(),
        FeedView::Results if state.visible_results().is_empty() => {
            vec![ListItem::new(empty_text(state.loading))]
        }
        FeedView::Results => state
            .visible_results()
            .iter()
            .enumerate()
            .skip(first)
            .take(rows)
            .map(|(i, item)| {
                // Unrevealed rows stay placeholders until scrolled near
                let text = if app.feed.is_revealed(i) {
                    let dims = match (item.width, item.height) {
                        (Some(w), Some(h)) => format!("  {}x{}", w, h),
                        _ => String::new(),
                    };
                    let url = strip_control_chars(&item.preview);
                    format!(
                        "{}{}",
                        truncate_to_width(&url, width.saturating_sub(dims.len())),
                        dims
                    )
                } else {
                    "...".to_string()
                };
                ListItem::new(Line::from(Span::styled(
                    text,
                    row_style(i == app.picker.selected),
                )))
            })
            .collect(),
    };

    f.render_widget(List::new(items), area);
}

fn empty_text(loading: bool) -> &'static str {
    if loading {
        "Loading..."
    } else {
        "No results"
    }
}

fn row_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .bg(Color::DarkGray)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}
