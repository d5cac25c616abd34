//! Background task results and the work that produces them.

use crate::app::{embed_source, App, AppEvent};
use murmur::content::LinkPreview;
use murmur::trust::{ConfirmChoice, GateOutcome, LinkAssessment, LinkRisk};
use murmur::util::{strip_control_chars, truncate_to_width};
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

use super::helpers::spawn_task;

/// Longest preview summary shown in the status bar.
const PREVIEW_SUMMARY_WIDTH: usize = 120;

pub(super) fn handle_app_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::EmbedsResolved(batch) => {
            let message_id = batch.message_id.clone();
            let count = batch.embeds.len();
            if app.inline.complete(batch) {
                tracing::debug!(message_id = %message_id, count, "Embeds installed");
            }
        }
        AppEvent::PreviewLoaded { summary } => app.set_status(summary),
        AppEvent::LinkHandled { url, result } => match result {
            Ok(GateOutcome::Opened) => app.set_status(format!("Opened {}", url)),
            Ok(GateOutcome::OpenedAndTrusted) => {
                app.set_status(format!("Opened {} and trusted its domain", url))
            }
            Ok(GateOutcome::Cancelled) => app.set_status("Cancelled"),
            Ok(GateOutcome::Rejected) => app.set_status("Link rejected"),
            Err(e) => app.set_status(format!("Error: {}", e)),
        },
        AppEvent::TaskPanicked { task, error } => {
            app.set_status(format!("Internal error in {}: {}", task, error));
        }
    }
}

/// Starts embed resolution for the selected message if it changed.
///
/// Switching messages releases the previous message's embeds immediately;
/// a batch still resolving for it is dropped when it arrives.
pub(super) fn refresh_embeds(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some((id, text)) = app
        .selected()
        .map(|m| (m.id.clone(), embed_source(m).into_owned()))
    else {
        app.inline.unmount();
        return;
    };
    let Some(ticket) = app.inline.begin(&id, &text) else {
        return;
    };
    let resolver = Arc::clone(app.inline.resolver());
    spawn_task("embeds", event_tx, async move {
        AppEvent::EmbedsResolved(ticket.resolve(&resolver).await)
    });
}

/// First link in the selected message.
fn selected_link(app: &App) -> Option<String> {
    let message = app.selected()?;
    murmur::inline::extract_urls(&embed_source(message))
        .into_iter()
        .next()
}

/// Runs the selected message's first link through the gate. Trusted links
/// open straight away; anything else raises the confirmation dialog.
pub(super) fn open_selected_link(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(raw) = selected_link(app) else {
        app.set_status("No link in this message");
        return;
    };
    match app.gate.assess(&raw) {
        LinkAssessment::Open(url) => {
            spawn_choice(app, event_tx, url, LinkRisk::UntrustedDomain, ConfirmChoice::ProceedOnce)
        }
        LinkAssessment::Confirm { url, risk } => {
            app.pending_link = Some(crate::app::PendingLink { url, risk });
        }
        LinkAssessment::Reject { reason } => {
            tracing::info!(url = %raw, reason = %reason, "Link rejected");
            app.set_status(format!("Link rejected: {}", reason));
        }
    }
}

/// Carries out the answer to the confirmation dialog.
pub(super) fn resolve_pending_link(
    app: &mut App,
    event_tx: &mpsc::Sender<AppEvent>,
    choice: ConfirmChoice,
) {
    let Some(pending) = app.pending_link.take() else {
        return;
    };
    if choice == ConfirmChoice::Cancel {
        app.set_status("Cancelled");
        return;
    }
    spawn_choice(app, event_tx, pending.url, pending.risk, choice);
}

fn spawn_choice(
    app: &App,
    event_tx: &mpsc::Sender<AppEvent>,
    url: Url,
    risk: LinkRisk,
    choice: ConfirmChoice,
) {
    let gate = Arc::clone(&app.gate);
    spawn_task("open_link", event_tx, async move {
        let result = gate
            .apply_choice(&url, risk, choice)
            .await
            .map_err(|e| e.to_string());
        AppEvent::LinkHandled {
            url: url.to_string(),
            result,
        }
    });
}

/// Fetches a preview of the selected message's first link into the status bar.
pub(super) fn preview_selected_link(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(raw) = selected_link(app) else {
        app.set_status("No link in this message");
        return;
    };
    let Ok(url) = Url::parse(&raw) else {
        app.set_status("Invalid link");
        return;
    };
    app.set_status(format!("Previewing {}...", url.host_str().unwrap_or("link")));
    let resolver = Arc::clone(app.inline.resolver());
    spawn_task("preview", event_tx, async move {
        let summary = summarize_preview(&resolver.preview(&url).await);
        AppEvent::PreviewLoaded { summary }
    });
}

/// One status-bar line for a preview. Remote text is stripped of control
/// sequences.
pub(super) fn summarize_preview(preview: &LinkPreview) -> String {
    let line = match preview {
        LinkPreview::Media(media) => {
            let size = media
                .local_ref
                .as_ref()
                .map(|r| format!(" ({} bytes)", r.len()))
                .unwrap_or_default();
            format!("{:?}: {}{}", media.kind, media.source_url, size)
        }
        LinkPreview::Page(page) => {
            let title = page.title.as_deref().unwrap_or("(untitled)");
            match page.description.as_deref() {
                Some(desc) => format!("{} - {}", title, desc),
                None => title.to_string(),
            }
        }
        LinkPreview::HostOnly { host, .. } => host.clone(),
    };
    let clean = strip_control_chars(&line);
    truncate_to_width(&clean, PREVIEW_SUMMARY_WIDTH).into_owned()
}
