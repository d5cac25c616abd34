//! Chat transcripts: the message source the viewer reads from.
//!
//! A transcript is a JSON document with every chat and its full history.
//! [`ChatHistory`] exposes a window over one chat that starts with the newest
//! page and grows toward older messages on request, the way a client pages
//! history out of its local store.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::scroll::HistoryLoader;

/// Transcripts larger than this are refused.
const MAX_TRANSCRIPT_SIZE: u64 = 32 * 1024 * 1024; // 32MB

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("Failed to read transcript: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse transcript: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Transcript too large: {size} bytes (max {limit})")]
    TooLarge { size: u64, limit: u64 },
}

/// An attachment carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub sender: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Chat {
    pub fn display_name(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub chats: Vec<Chat>,
}

impl Transcript {
    /// Reads a transcript and sorts every chat oldest first.
    pub fn load(path: &Path) -> Result<Self, TranscriptError> {
        let size = std::fs::metadata(path)?.len();
        if size > MAX_TRANSCRIPT_SIZE {
            return Err(TranscriptError::TooLarge {
                size,
                limit: MAX_TRANSCRIPT_SIZE,
            });
        }
        let raw = std::fs::read_to_string(path)?;
        let transcript = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.display(),
            chats = transcript.chats.len(),
            "Transcript loaded"
        );
        Ok(transcript)
    }

    pub fn from_json(raw: &str) -> Result<Self, TranscriptError> {
        let mut transcript: Self = serde_json::from_str(raw)?;
        for chat in &mut transcript.chats {
            chat.messages.sort_by_key(|m| m.timestamp);
        }
        Ok(transcript)
    }
}

/// Paged window over one chat's history.
///
/// Starts with the newest `page_size` messages. Older pages are requested
/// through [`HistoryLoader::load_older`] and arrive on the next
/// [`apply_pending`](Self::apply_pending), so there is a window in which a
/// load is in flight.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    chat: Chat,
    loaded_from: usize,
    page_size: usize,
    pending: bool,
}

impl ChatHistory {
    pub fn new(chat: Chat, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let loaded_from = chat.messages.len().saturating_sub(page_size);
        Self {
            chat,
            loaded_from,
            page_size,
            pending: false,
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat.id
    }

    pub fn title(&self) -> &str {
        self.chat.display_name()
    }

    /// Loaded messages, oldest first.
    pub fn visible(&self) -> &[Message] {
        &self.chat.messages[self.loaded_from..]
    }

    /// Id of the oldest loaded message.
    pub fn leading_id(&self) -> Option<&str> {
        self.visible().first().map(|m| m.id.as_str())
    }

    pub fn has_more(&self) -> bool {
        self.loaded_from > 0
    }

    /// Adds a message that just arrived.
    pub fn push_live(&mut self, message: Message) {
        self.chat.messages.push(message);
    }

    /// Completes an outstanding older-history request. Returns how many
    /// messages were added at the top.
    pub fn apply_pending(&mut self) -> usize {
        if !self.pending {
            return 0;
        }
        self.pending = false;
        let new_from = self.loaded_from.saturating_sub(self.page_size);
        let added = self.loaded_from - new_from;
        self.loaded_from = new_from;
        tracing::debug!(chat = %self.chat.id, added, "Older history loaded");
        added
    }
}

impl HistoryLoader for ChatHistory {
    fn is_loading(&self) -> bool {
        self.pending
    }

    fn load_older(&mut self) {
        if self.has_more() {
            self.pending = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(n: usize) -> Chat {
        Chat {
            id: "c1".into(),
            title: String::new(),
            messages: (0..n)
                .map(|i| Message {
                    id: format!("m{i}"),
                    timestamp: i as i64,
                    sender: "alice".into(),
                    text: format!("message {i}"),
                    media: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_window_starts_at_newest_page() {
        let history = ChatHistory::new(chat(70), 30);
        assert_eq!(history.visible().len(), 30);
        assert_eq!(history.leading_id(), Some("m40"));
        assert!(history.has_more());
        assert_eq!(history.title(), "c1");
    }

    #[test]
    fn test_paging_older_history() {
        let mut history = ChatHistory::new(chat(70), 30);
        history.load_older();
        assert!(history.is_loading());
        assert_eq!(history.visible().len(), 30);

        assert_eq!(history.apply_pending(), 30);
        assert_eq!(history.leading_id(), Some("m10"));

        history.load_older();
        assert_eq!(history.apply_pending(), 10);
        assert!(!history.has_more());

        // Nothing older left
        history.load_older();
        assert!(!history.is_loading());
        assert_eq!(history.apply_pending(), 0);
    }

    #[test]
    fn test_push_live_keeps_leading() {
        let mut history = ChatHistory::new(chat(5), 30);
        history.push_live(Message {
            id: "new".into(),
            timestamp: 99,
            sender: "bob".into(),
            text: "hi".into(),
            media: None,
        });
        assert_eq!(history.visible().len(), 6);
        assert_eq!(history.leading_id(), Some("m0"));
    }

    #[test]
    fn test_transcript_sorted_on_load() {
        let raw = r#"{"chats":[{"id":"c","messages":[
            {"id":"b","timestamp":2,"sender":"x","text":"second"},
            {"id":"a","timestamp":1,"sender":"x"}
        ]}]}"#;
        let t = Transcript::from_json(raw).unwrap();
        let ids: Vec<_> = t.chats[0].messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(t.chats[0].messages[0].text, "");
    }

    #[test]
    fn test_malformed_transcript() {
        assert!(matches!(
            Transcript::from_json("{\"chats\": 3}"),
            Err(TranscriptError::Parse(_))
        ));
    }
}
