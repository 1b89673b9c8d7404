use crate::driver::{self, RenderContext};
use crate::importer::{Conversation, load_conversations};
use crate::sink::{DirectorySink, Sink};
use crate::utils::{ExportConfig, ExportStats};
use chrono::Utc;
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// The main entry point for the sequential export logic.
pub fn execute(config: &ExportConfig) -> Result<ExportStats> {
    info!(
        input = %config.input.display(),
        target = %config.target_dir.display(),
        "exporting"
    );
    let conversations = load_conversations(&config.input)?;
    let sink = DirectorySink::create(&config.target_dir)?;
    let ctx = config.render_context(Utc::now());
    export(conversations, &ctx, &sink, config.quiet)
}

/// Render and persist records one at a time, in input order, behind a
/// progress bar. Stops at the first sink failure.
pub fn export<S: Sink>(
    conversations: Vec<Conversation>,
    ctx: &RenderContext,
    sink: &S,
    quiet: bool,
) -> Result<ExportStats> {
    let (jobs, skipped) = driver::plan(conversations);

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(jobs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)",
            )
            .wrap_err("Invalid progress bar template")?
            .progress_chars("=>-"),
        );
        bar
    };

    let mut count_written = 0usize;
    for job in &jobs {
        // Keep log lines from tearing the bar.
        if pb.suspend(|| driver::export_job(job, ctx, sink))?.is_some() {
            count_written += 1;
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    Ok(ExportStats {
        written: count_written,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Zone;
    use crate::renderer::DateStyle;
    use chrono::DateTime;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn writes_in_input_order_with_collision_suffixes() {
        let tmp = TempDir::new().unwrap();
        let sink = DirectorySink::create(tmp.path()).unwrap();
        let ctx = RenderContext {
            now: DateTime::from_timestamp(0, 0).unwrap(),
            zone: Zone::Utc,
            date_style: DateStyle::Links,
        };
        let input: Vec<Conversation> = serde_json::from_value(json!([
            { "title": "Dup", "mapping": { "a": { "message": { "content": { "parts": ["one"] } } } } },
            { "title": "Dup", "mapping": { "a": { "message": { "content": { "parts": ["two"] } } } } }
        ]))
        .unwrap();

        let stats = export(input, &ctx, &sink, true).unwrap();
        assert_eq!(stats.written, 2);

        let first = std::fs::read_to_string(tmp.path().join("Dup.md")).unwrap();
        let second = std::fs::read_to_string(tmp.path().join("Dup (2).md")).unwrap();
        assert!(first.contains("## unknown:\n\none"));
        assert!(second.contains("## unknown:\n\ntwo"));
    }
}
