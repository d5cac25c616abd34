//! Main event loop for the TUI.
//!
//! Multiplexes terminal input, background task results, picker events and a
//! periodic tick.

use crate::app::{App, AppEvent};
use anyhow::Result;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use murmur::feed::FeedEvent;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use super::events::handle_app_event;
use super::input::handle_input;
use super::render::render;

/// Result of handling a key press event.
pub enum Action {
    /// Continue the event loop and process more events.
    Continue,
    /// Exit the application and restore the terminal.
    Quit,
}

/// Runs the TUI application event loop.
///
/// Uses `tokio::select!` over, in priority order:
/// - **Signals**: SIGTERM / SIGINT end the loop
/// - **Terminal input**: key presses from crossterm's async event stream
/// - **Background tasks**: embed resolution, previews, link opening
/// - **Picker**: debounce timers and provider results from the `PaginatedFeed`
/// - **Periodic tick**: 250ms timer for status expiry and history paging
///
/// # Panic Safety
///
/// Installs a panic hook that restores terminal state before unwinding.
pub async fn run(
    app: &mut App,
    event_tx: mpsc::Sender<AppEvent>,
    mut event_rx: mpsc::Receiver<AppEvent>,
) -> Result<()> {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    // The feed keeps its sender; the loop owns the receiving end.
    let mut feed_rx = match app.feed.take_events() {
        Some(rx) => rx,
        None => anyhow::bail!("Picker events already taken"),
    };

    let mut terminal = setup_terminal()?;
    let mut event_stream = crossterm::event::EventStream::new();
    let mut tick_interval = tokio::time::interval(Duration::from_millis(250));

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    super::events::refresh_embeds(app, &event_tx);

    loop {
        if app.needs_redraw {
            terminal.draw(|f| render(f, app))?;
            app.needs_redraw = false;
            // Selection may have moved during layout (chat switch, new message)
            super::events::refresh_embeds(app, &event_tx);
        }

        if app.clear_expired_status() {
            app.needs_redraw = true;
        }

        // Drain finished background work before reading more input
        while let Ok(event) = event_rx.try_recv() {
            app.needs_redraw = true;
            handle_app_event(app, event);
        }

        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                break;
            }

            _ = sigint_fut => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                break;
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => {
                        app.needs_redraw = true;
                        match handle_input(app, key.code, key.modifiers, &event_tx).await {
                            Ok(Action::Quit) => break,
                            Ok(Action::Continue) => {}
                            Err(e) => app.set_status(format!("Error: {}", e)),
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => app.needs_redraw = true,
                    _ => {}
                }
            }

            Some(event) = event_rx.recv() => {
                app.needs_redraw = true;
                handle_app_event(app, event);
            }

            Some(event) = feed_rx.recv() => {
                handle_feed_event(app, event).await;
            }

            _ = tick_interval.tick() => {
                handle_tick(app);
            }
        }
    }

    app.inline.unmount();
    restore_terminal(terminal)?;
    Ok(())
}

async fn handle_feed_event(app: &mut App, event: FeedEvent) {
    let was_loading = app.feed.state().loading;
    app.feed.handle_event(event).await;
    if app.feed.state().loading != was_loading || app.picker.open {
        app.needs_redraw = true;
    }
    // Results may have shrunk under the cursor
    let len = app.feed.state().visible_len();
    if app.picker.selected >= len {
        app.picker.selected = len.saturating_sub(1);
    }
}

/// History requested at the top of the list arrives on the next tick, the
/// way a page read from the local store would.
fn handle_tick(app: &mut App) {
    let added = app.apply_history();
    if added > 0 {
        tracing::debug!(added, "Applied older history");
        app.needs_redraw = true;
    }
}

/// Set up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal state.
fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
