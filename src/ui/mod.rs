//! Terminal user interface for the `view` subcommand.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background task spawning and results
//! - `render` - Layout and the link confirmation dialog
//! - `chat` - Message list with inline embeds
//! - `picker` - GIF picker overlay
//! - `status` - Status bar
//! - `help` - Key binding overlay

mod chat;
mod events;
mod help;
mod helpers;
mod input;
mod loop_runner;
mod picker;
mod render;
mod status;

pub use loop_runner::{run, Action};
