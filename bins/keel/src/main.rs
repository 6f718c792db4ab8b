use anyhow::{Context, anyhow};
use keel_config::KeelConfig;
use keel_engine::{Editor, Processor, ProcessorStats};
use keel_params::{NoteId, Patch};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

const ARPEGGIO: [u8; 4] = [60, 64, 67, 72];

/// Counters the worker threads update for the reporting loop.
#[derive(Default)]
struct Telemetry {
    commits: AtomicU64,
    blocks: AtomicU64,
    adoptions: AtomicU64,
    revision: AtomicU64,
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            KeelConfig::load(&path).with_context(|| format!("loading config from {path}"))?
        }
        None => KeelConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let (editor, processor) =
        keel_engine::from_config(&config, Patch::default()).context("building engine")?;

    info!(
        capacity = config.capacity,
        block_period_us = config.block_period_us,
        edit_period_us = config.edit_period_us,
        run_for_ms = config.run_for_ms,
        "keel starting"
    );

    let stop = AtomicBool::new(false);
    let telemetry = Telemetry::default();

    let stats = thread::scope(|s| -> anyhow::Result<ProcessorStats> {
        let editor = s.spawn(|| run_editor(editor, config.edit_period(), &stop, &telemetry));
        let processor =
            s.spawn(|| run_processor(processor, config.block_period(), &stop, &telemetry));

        report_until(config.run_for(), config.report_every(), &telemetry);
        stop.store(true, Ordering::Relaxed);

        editor.join().map_err(|_| anyhow!("editor thread panicked"))?;
        processor
            .join()
            .map_err(|_| anyhow!("processor thread panicked"))
    })?;

    info!(
        blocks = stats.blocks,
        adoptions = stats.adoptions,
        last_revision = stats.last_revision,
        notes_released = stats.notes_released,
        notes_retriggered = stats.notes_retriggered,
        commits = telemetry.commits.load(Ordering::Relaxed),
        "keel stopped"
    );
    Ok(())
}

/// Walks an arpeggio and sweeps the cutoff, committing once per period.
fn run_editor(mut editor: Editor, period: Duration, stop: &AtomicBool, telemetry: &Telemetry) {
    let mut step = 0usize;
    while !stop.load(Ordering::Relaxed) {
        let note = NoteId(ARPEGGIO[step % ARPEGGIO.len()]);
        if !editor.press(note) {
            editor.release(note);
        }
        let sweep = (step % 100) as f32 / 100.0;
        editor.set_cutoff(
            Patch::MIN_CUTOFF_HZ + sweep * (Patch::MAX_CUTOFF_HZ - Patch::MIN_CUTOFF_HZ),
        );

        let revision = editor.commit();
        telemetry.commits.store(revision, Ordering::Relaxed);
        step += 1;
        thread::sleep(period);
    }
}

/// Runs blocks on a fixed cadence. Overruns restart the schedule instead of
/// bursting to catch up.
fn run_processor(
    mut processor: Processor,
    period: Duration,
    stop: &AtomicBool,
    telemetry: &Telemetry,
) -> ProcessorStats {
    let mut next = Instant::now();
    while !stop.load(Ordering::Relaxed) {
        let report = processor.process_block();
        let stats = processor.stats();
        telemetry.blocks.store(stats.blocks, Ordering::Relaxed);
        telemetry.adoptions.store(stats.adoptions, Ordering::Relaxed);
        telemetry.revision.store(report.revision, Ordering::Relaxed);

        next += period;
        match next.checked_duration_since(Instant::now()) {
            Some(wait) => thread::sleep(wait),
            None => next = Instant::now(),
        }
    }
    processor.stats()
}

fn report_until(run_for: Duration, every: Duration, telemetry: &Telemetry) {
    let start = Instant::now();
    loop {
        let remaining = run_for.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(every.min(remaining));

        let commits = telemetry.commits.load(Ordering::Relaxed);
        let revision = telemetry.revision.load(Ordering::Relaxed);
        info!(
            blocks = telemetry.blocks.load(Ordering::Relaxed),
            adoptions = telemetry.adoptions.load(Ordering::Relaxed),
            commits,
            revision,
            behind = commits.saturating_sub(revision),
            "engine running"
        );
    }
}
