use crate::graph::ConversationGraph;
use crate::importer::{Metadata, Role};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Placed before every rendered block.
pub const SEPARATOR: &str = "\n---\n\n";

const CALLOUT_HEADER: &str = "[!abstract]- metadata";

/// How the creation time under the title is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateStyle {
    /// `_([[2024-01-31]] 14:05:09)_`, linking the day to an Obsidian daily note.
    #[default]
    Links,
    /// `_(2024-01-31 14:05:09)_`
    Plain,
}

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "⚙️ system",
        Role::Assistant => "🤖 assistant",
        Role::Tool => "🛠️ tool",
        Role::User => "👤 user",
        Role::Unknown => "unknown",
    }
}

fn role_header(role: Role) -> String {
    format!("## {}", role_label(role))
}

pub fn format_timestamp(created: NaiveDateTime, style: DateStyle) -> String {
    let pattern = match style {
        DateStyle::Links => "_([[%Y-%m-%d]] %H:%M:%S)_",
        DateStyle::Plain => "_(%Y-%m-%d %H:%M:%S)_",
    };
    created.format(pattern).to_string()
}

/// Copy of `value` with object keys sorted at every depth.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn pretty_json(value: &Value) -> String {
    let mut buf = Vec::new();
    let written = {
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut ser).is_ok()
    };
    if !written {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| value.to_string())
}

/// Render metadata as a folded Obsidian callout holding sorted, pretty JSON.
/// Every line is blockquoted. `None` for empty metadata.
pub fn format_metadata(metadata: &Metadata) -> Option<String> {
    if metadata.is_empty() {
        return None;
    }

    let json = pretty_json(&sorted(&Value::Object(metadata.clone())));
    let callout = format!("{CALLOUT_HEADER}\n\n```json\n{json}\n```\n");

    let mut quoted = String::with_capacity(callout.len() + 64);
    for line in callout.lines() {
        quoted.push_str("> ");
        quoted.push_str(line);
        quoted.push('\n');
    }
    Some(quoted)
}

/// Render one message. `None` when the message has nothing to show.
///
/// System messages lead with their metadata callout and use a bare role
/// header; every other role shows text only, under `## label:`.
pub fn format_block(role: Role, text: &str, metadata: &Metadata) -> Option<String> {
    let header = role_header(role);

    if role == Role::System {
        return match (format_metadata(metadata), text.is_empty()) {
            (Some(meta), false) => Some(format!("{meta}\n{header}\n\n{text}\n")),
            (Some(meta), true) => Some(format!("{meta}\n{header}\n")),
            (None, false) => Some(format!("{header}\n\n{text}\n")),
            (None, true) => None,
        };
    }

    if text.is_empty() {
        None
    } else {
        Some(format!("{header}:\n\n{text}\n"))
    }
}

/// Linearize a conversation graph into one Markdown document.
///
/// The title header and timestamp line are always written. Rendering walks
/// the first root's subtree in pre-order; messages in other components are
/// not rendered. Without any root the header is returned as is.
pub fn render_document(
    title: &str,
    created: NaiveDateTime,
    graph: &ConversationGraph,
    style: DateStyle,
) -> String {
    let mut markdown = format!("# {}\n\n{}\n", title, format_timestamp(created, style));

    let Some(root) = graph.first_root() else {
        return markdown;
    };

    for (_, node) in graph.preorder(root) {
        let Some(node) = node.filter(|n| !n.is_data_less()) else {
            continue;
        };
        if let Some(block) = format_block(node.role, &node.text, &node.metadata) {
            markdown.push_str(SEPARATOR);
            markdown.push_str(&block);
        }
    }

    markdown.push('\n');
    markdown
}
