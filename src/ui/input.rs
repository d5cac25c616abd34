//! Keyboard input handling.
//!
//! Overlays capture every key while shown, in the order they are drawn on
//! top: help, the link dialog, then the picker.

use crate::app::{App, AppEvent};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use murmur::feed::FeedView;
use murmur::scroll::Viewport;
use murmur::trust::ConfirmChoice;
use murmur::util::MAX_SEARCH_QUERY_LENGTH;
use tokio::sync::mpsc;

use super::events::{open_selected_link, preview_selected_link, resolve_pending_link};
use super::Action;

pub(super) async fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Ok(Action::Quit);
    }

    if app.show_help {
        if matches!(code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
            app.show_help = false;
        }
        return Ok(Action::Continue);
    }

    if app.pending_link.is_some() {
        handle_confirm_input(app, code, event_tx);
        return Ok(Action::Continue);
    }

    if app.picker.open {
        handle_picker_input(app, code, modifiers);
        return Ok(Action::Continue);
    }

    Ok(handle_chat_input(app, code, modifiers, event_tx))
}

fn handle_confirm_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    let choice = match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => ConfirmChoice::ProceedOnce,
        KeyCode::Char('t') | KeyCode::Char('T') => ConfirmChoice::TrustDomainPermanently,
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => ConfirmChoice::Cancel,
        _ => return,
    };
    resolve_pending_link(app, event_tx, choice);
}

fn handle_chat_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    let page = app.viewport.view_extent().max(1) as isize;
    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char('j') | KeyCode::Down => app.scroll_messages(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_messages(-1),
        KeyCode::PageDown => app.scroll_messages(page),
        KeyCode::PageUp => app.scroll_messages(-page),
        KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_messages(page / 2)
        }
        KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_messages(-(page / 2))
        }
        KeyCode::Home => app.scroll_messages(isize::MIN),
        KeyCode::End => app.scroll_messages(isize::MAX),
        KeyCode::Char('n') => app.move_selection(1),
        KeyCode::Char('p') => app.move_selection(-1),
        KeyCode::Tab => app.switch_chat(1),
        KeyCode::BackTab => app.switch_chat(-1),
        KeyCode::Char('o') | KeyCode::Enter => open_selected_link(app, event_tx),
        KeyCode::Char('v') => preview_selected_link(app, event_tx),
        KeyCode::Char('g') => app.open_picker(),
        _ => {}
    }
    Action::Continue
}

fn handle_picker_input(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    match code {
        KeyCode::Esc => {
            if app.picker.query.is_empty() {
                app.close_picker();
            } else {
                app.picker.query.clear();
                app.picker.selected = 0;
                app.picker.scroll = 0;
                app.feed.back_to_categories();
            }
        }
        KeyCode::Up => app.picker.selected = app.picker.selected.saturating_sub(1),
        KeyCode::Down => {
            let len = app.feed.state().visible_len();
            if app.picker.selected + 1 < len {
                app.picker.selected += 1;
            }
        }
        KeyCode::Enter => pick_selected(app),
        KeyCode::Backspace => {
            let mut query = app.picker.query.clone();
            if query.pop().is_some() {
                app.set_picker_query(query);
            }
        }
        KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => {
            if app.picker.query.len() + c.len_utf8() > MAX_SEARCH_QUERY_LENGTH {
                app.set_status(format!(
                    "Search query too long (max {} chars)",
                    MAX_SEARCH_QUERY_LENGTH
                ));
                return;
            }
            let mut query = app.picker.query.clone();
            query.push(c);
            app.set_picker_query(query);
        }
        _ => {}
    }
}

/// Enter in the picker: opens a category, or sends the highlighted GIF.
fn pick_selected(app: &mut App) {
    let state = app.feed.state();
    match state.view {
        FeedView::Categories => {
            let Some(name) = state.categories.get(app.picker.selected).map(|c| c.name.clone())
            else {
                return;
            };
            app.picker.query = name.clone();
            app.picker.selected = 0;
            app.picker.scroll = 0;
            app.feed.select_category(&name);
        }
        FeedView::Results => {
            let Some(item) = state.visible_results().get(app.picker.selected).cloned() else {
                return;
            };
            if app.send_media(&item).is_some() {
                app.selected_message = None;
                app.close_picker();
                app.set_status("GIF sent");
            }
        }
    }
}
