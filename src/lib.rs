//! # chatgpt-md-export
//!
//! A CLI tool that turns a ChatGPT data export (`conversations.json`) into one
//! Markdown file per conversation, ready to drop into an Obsidian vault.
//!
//! ## What it does
//!
//! Every conversation in the export is a tree of messages linked by parent
//! ids. The tool rebuilds that tree, walks it depth-first from its root and
//! writes each message under a role heading. System messages carry their
//! metadata as a folded `[!abstract]` callout with key-sorted JSON, and code
//! blocks cut off mid-message are closed so each file stays valid Markdown.
//!
//! The same input always produces byte-identical files.
//!
//! ## Usage
//!
//! ```sh
//! chatgpt-md-export -i ~/Downloads/export/conversations.json -o ~/vault/ChatGPT
//!
//! # Times in UTC, plain dates instead of daily-note links
//! chatgpt-md-export -i conversations.json -o out --utc --plain-dates
//! ```
//!
//! Preferences can be persisted in `~/.config/chatgpt-md-export/config.toml`.
//!
//! ## Known limitations
//!
//! Only the subtree under the first root of a conversation is rendered, and
//! only a trailing unterminated code fence is repaired.

pub mod driver;
pub mod graph;
pub mod importer;
pub mod parallel;
pub mod renderer;
#[cfg(feature = "sequential")]
pub mod sequential;
pub mod sink;
pub mod utils;

pub use driver::{ExportedDocument, RenderContext, Zone, convert};
pub use graph::{ConversationGraph, MessageNode, build_graph};
pub use importer::{Conversation, Role, load_conversations};
pub use renderer::{DateStyle, format_block, format_metadata, render_document};
pub use utils::{ExportConfig, ExportStats, sanitize_title};
