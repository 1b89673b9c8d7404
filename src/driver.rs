use crate::graph::build_graph;
use crate::importer::Conversation;
use crate::renderer::{DateStyle, render_document};
use crate::sink::Sink;
use crate::utils::{allocate_stem, sanitize_title};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use eyre::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Zone the creation time is shown in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Zone {
    #[default]
    Local,
    Utc,
}

/// Everything rendering needs besides the record itself. `now` stands in
/// for records without a creation time; it is captured once per run.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    pub now: DateTime<Utc>,
    pub zone: Zone,
    pub date_style: DateStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub title: String,
    pub markdown: String,
}

/// A record that will be rendered, with its output stem already claimed.
#[derive(Debug)]
pub struct Job {
    pub stem: String,
    pub conversation: Conversation,
}

/// Sanitized title, or `Untitled Conversation-<id>` when the record has none.
pub fn title_for(conversation: &Conversation) -> String {
    match conversation.title.as_deref() {
        Some(title) => sanitize_title(title),
        None => sanitize_title(&format!(
            "Untitled Conversation-{}",
            conversation.display_id()
        )),
    }
}

/// Epoch seconds rounded to the nearest microsecond, so a value a hair
/// below a whole second shows as the next second.
fn epoch_to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    let micros = (seconds * 1e6).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64)
}

/// Creation time as wall-clock time in the configured zone.
pub fn created_at(conversation: &Conversation, ctx: &RenderContext) -> NaiveDateTime {
    let utc = conversation
        .create_time
        .and_then(epoch_to_utc)
        .unwrap_or(ctx.now);
    match ctx.zone {
        Zone::Utc => utc.naive_utc(),
        Zone::Local => utc.with_timezone(&Local).naive_local(),
    }
}

/// Render one record. `None` when it has no message mapping.
pub fn convert(conversation: &Conversation, ctx: &RenderContext) -> Option<ExportedDocument> {
    let graph = build_graph(conversation)?;
    let title = title_for(conversation);
    let created = created_at(conversation, ctx);
    let markdown = render_document(&title, created, &graph, ctx.date_style);
    Some(ExportedDocument { title, markdown })
}

/// Claim output stems in input order so that name collisions resolve the same
/// way on every run, whatever order workers finish in. Records without a
/// mapping are dropped here and counted.
pub fn plan(conversations: Vec<Conversation>) -> (Vec<Job>, usize) {
    let mut registry = HashSet::new();
    let mut jobs = Vec::with_capacity(conversations.len());
    let mut skipped = 0usize;

    for conversation in conversations {
        if conversation.mapping.is_none() {
            warn!(id = conversation.display_id(), "no message mapping, skipping");
            skipped += 1;
            continue;
        }
        let stem = allocate_stem(&title_for(&conversation), &mut registry);
        jobs.push(Job { stem, conversation });
    }

    (jobs, skipped)
}

/// Render a planned record and hand it to the sink.
pub fn export_job<S: Sink + ?Sized>(
    job: &Job,
    ctx: &RenderContext,
    sink: &S,
) -> Result<Option<PathBuf>> {
    let Some(document) = convert(&job.conversation, ctx) else {
        return Ok(None);
    };
    let path = sink
        .persist(&job.stem, &document.markdown)
        .wrap_err_with(|| {
            format!(
                "Failed to export conversation {}",
                job.conversation.display_id()
            )
        })?;
    debug!(path = %path.display(), "written");
    Ok(Some(path))
}
