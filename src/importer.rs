//! Type definitions for the ChatGPT data export (`conversations.json`).
//!
//! The export is a JSON array of conversation records. Each record carries a
//! `mapping` from message id to a node record; node records point at their
//! parent by id, so the messages form a tree (in practice a forest whose
//! first root is a `client-created-root` entry with a null `message`).
//!
//! ```json
//! {
//!   "title": "Rust lifetimes",
//!   "create_time": 1700000000.123,
//!   "id": "6569…",
//!   "mapping": {
//!     "aaa1": { "id": "aaa1", "message": null, "parent": null, "children": ["aaa2"] },
//!     "aaa2": {
//!       "id": "aaa2",
//!       "message": {
//!         "author": { "role": "user" },
//!         "content": { "content_type": "text", "parts": ["Hello"] },
//!         "metadata": {}
//!       },
//!       "parent": "aaa1",
//!       "children": []
//!     }
//!   }
//! }
//! ```
//!
//! Every field is optional at every level. Missing or null values fall back
//! to the documented default instead of failing the whole file, and unknown
//! fields are ignored.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use eyre::{Context, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Free-form message metadata, kept verbatim.
pub type Metadata = serde_json::Map<String, Value>;

/// Decode a field that may carry the wrong JSON type. Anything that does not
/// fit `T` is treated like a missing field, so one odd record cannot fail the
/// whole file.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Author role of a message.
///
/// Any role string other than the four known ones decodes as `Unknown`, and
/// so does a role of any other JSON type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Assistant,
    Tool,
    User,
    #[default]
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// Message payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<Role>,
}

/// Message body. `parts` is a list of strings for plain chat turns and may
/// hold objects for multimodal turns (images, audio pointers).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Option<Vec<Value>>,
}

/// The `message` object embedded in a mapping entry. `metadata` that is not
/// a JSON object counts as empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: Option<Metadata>,
}

impl RawMessage {
    /// Author role, `Unknown` when absent at any level.
    pub fn role(&self) -> Role {
        self.author
            .as_ref()
            .and_then(|a| a.role)
            .unwrap_or_default()
    }

    /// First content part. Empty when there are no parts or the first part
    /// is not a string.
    pub fn text(&self) -> &str {
        self.content
            .as_ref()
            .and_then(|c| c.parts.as_deref())
            .and_then(|parts| parts.first())
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn metadata(&self) -> Metadata {
        self.metadata.clone().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Mapping entries
// ---------------------------------------------------------------------------

/// One value of the `mapping` object.
///
/// The export also lists `children`, which is ignored: the tree is rebuilt
/// from `parent` pointers alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MappingNode {
    #[serde(default)]
    pub message: Option<RawMessage>,
    #[serde(default)]
    pub parent: Option<String>,
}

/// Message id → node record, in the order the entries appear in the file.
/// Null entries are kept as `None` so callers can skip them explicitly.
pub type Mapping = IndexMap<String, Option<MappingNode>>;

// ---------------------------------------------------------------------------
// Conversation record
// ---------------------------------------------------------------------------

/// One exported chat session. A `title` or `create_time` of the wrong type
/// is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Conversation {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    /// Seconds since the Unix epoch, usually fractional.
    #[serde(default, deserialize_with = "lenient")]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// `None` when the record has no mapping at all, which is distinct from
    /// an empty mapping.
    #[serde(default)]
    pub mapping: Option<Mapping>,
}

impl Conversation {
    /// Best available identifier for log lines and fallback titles.
    pub fn display_id(&self) -> &str {
        self.id
            .as_deref()
            .or(self.conversation_id.as_deref())
            .unwrap_or("unknown")
    }
}

/// Read and decode a whole `conversations.json` export.
pub fn load_conversations(path: &Path) -> Result<Vec<Conversation>> {
    let file = File::open(path)
        .wrap_err_with(|| format!("Failed to open input: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .wrap_err_with(|| format!("Failed to parse conversations: {}", path.display()))
}
