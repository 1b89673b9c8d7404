use crate::driver::{self, Job, RenderContext};
use crate::importer::{Conversation, load_conversations};
use crate::sink::{DirectorySink, Sink};
use crate::utils::{ExportConfig, ExportStats};
use chrono::Utc;
use crossbeam_channel::{SendTimeoutError, bounded};
use eyre::{Context, Result, eyre};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

pub fn execute(config: &ExportConfig) -> Result<ExportStats> {
    info!(
        input = %config.input.display(),
        target = %config.target_dir.display(),
        "exporting"
    );
    let conversations = load_conversations(&config.input)?;
    let sink = DirectorySink::create(&config.target_dir)?;
    let ctx = config.render_context(Utc::now());
    export(conversations, &ctx, &sink, config.workers)
}

/// Render every record on a pool of `workers` threads and persist through
/// `sink`. The first failure stops the pool and is returned.
pub fn export<S: Sink>(
    conversations: Vec<Conversation>,
    ctx: &RenderContext,
    sink: &S,
    workers: usize,
) -> Result<ExportStats> {
    let (jobs, skipped) = driver::plan(conversations);

    let (tx, rx) = bounded::<Job>(64);
    let count_written = AtomicUsize::new(0);
    let should_stop = AtomicBool::new(false);
    let n_workers = workers.max(1);

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..n_workers)
            .map(|_| {
                let rx = rx.clone();
                let (count_written, should_stop) = (&count_written, &should_stop);

                s.spawn(move || -> Result<()> {
                    while let Ok(job) = rx.recv() {
                        if should_stop.load(Ordering::Relaxed) {
                            break;
                        }
                        match driver::export_job(&job, ctx, sink) {
                            Ok(Some(_)) => {
                                count_written.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(None) => {}
                            Err(e) => {
                                should_stop.store(true, Ordering::Relaxed);
                                return Err(e);
                            }
                        }
                    }
                    Ok(())
                })
            })
            .collect();

        drop(rx);

        'outer: for job in jobs {
            let mut pending = job;
            loop {
                if should_stop.load(Ordering::Relaxed) {
                    break 'outer;
                }
                match tx.send_timeout(pending, Duration::from_millis(50)) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Disconnected(_)) => break 'outer,
                    Err(SendTimeoutError::Timeout(j)) => {
                        pending = j;
                    }
                }
            }
        }

        drop(tx);

        let mut first_error = None;
        for handle in handles {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(eyre!("Export worker panicked")));
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    })
    .wrap_err("Export pipeline failed")?;

    Ok(ExportStats {
        written: count_written.load(Ordering::Relaxed),
        skipped,
    })
}
