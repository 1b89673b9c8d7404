use crate::driver::{RenderContext, Zone};
use crate::renderer::DateStyle;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Configuration required to run the export process.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub input: PathBuf,
    pub target_dir: PathBuf,
    pub zone: Zone,
    pub date_style: DateStyle,
    pub workers: usize,
    pub quiet: bool,
}

impl ExportConfig {
    pub fn render_context(&self, now: DateTime<Utc>) -> RenderContext {
        RenderContext {
            now,
            zone: self.zone,
            date_style: self.date_style,
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub written: usize,
    /// Records without a message mapping.
    pub skipped: usize,
}

const UNTITLED: &str = "Untitled Conversation";

/// Make a conversation title safe to use as a file name and heading.
///
/// `&` becomes `and`, anything that is not a word character, whitespace or
/// `-` is dropped, surrounding quotes are trimmed and double spaces are
/// collapsed once.
pub fn sanitize_title(title: &str) -> String {
    static UNSAFE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

    let replaced = title.replace('&', "and");
    UNSAFE_RE
        .replace_all(&replaced, "")
        .trim_matches('"')
        .replace("  ", " ")
}

/// Pick a unique file stem for `title` within this run.
///
/// Blank titles fall back to a generic name. Repeats get ` (2)`, ` (3)`, …;
/// comparison ignores case so exports survive case-insensitive filesystems.
pub fn allocate_stem(title: &str, registry: &mut HashSet<String>) -> String {
    let base = if title.trim().is_empty() {
        UNTITLED
    } else {
        title
    };

    let mut candidate = base.to_string();
    let mut n = 1usize;
    while !registry.insert(candidate.to_lowercase()) {
        n += 1;
        candidate = format!("{} ({})", base, n);
    }
    candidate
}
