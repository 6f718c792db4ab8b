use keel_params::{NoteId, Patch};
use std::time::Instant;

// ─── Statistics ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    pub count: usize,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub stddev: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BenchResult {
    pub name: String,
    pub unit: String,
    pub stats: Stats,
}

/// Sorts `samples` in place and summarises them. `None` for an empty slice.
pub fn compute_stats(samples: &mut [u64]) -> Option<Stats> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_unstable();

    let count = samples.len();
    let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / count as f64;
    let variance = samples
        .iter()
        .map(|&x| (x as f64 - mean).powi(2))
        .sum::<f64>()
        / count as f64;

    Some(Stats {
        count,
        min: samples[0],
        max: samples[count - 1],
        mean,
        stddev: variance.sqrt(),
        p50: percentile(samples, 50.0),
        p90: percentile(samples, 90.0),
        p99: percentile(samples, 99.0),
        p999: percentile(samples, 99.9),
    })
}

/// Nearest-rank percentile of an already sorted, non-empty slice.
pub fn percentile(sorted: &[u64], pct: f64) -> u64 {
    let rank = (pct / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

// ─── Measurement Harness ────────────────────────────────────────────────────

/// Times `f` in batches of `batch_size` calls and records the per-call
/// average of each batch, so clock overhead is amortised away.
pub fn measure_batched<F: FnMut()>(
    name: &str,
    batches: usize,
    batch_size: usize,
    warmup_batches: usize,
    mut f: F,
) -> BenchResult {
    let batch_size = batch_size.max(1);
    for _ in 0..warmup_batches * batch_size {
        f();
    }

    let mut samples = Vec::with_capacity(batches.max(1));
    for _ in 0..batches.max(1) {
        let start = Instant::now();
        for _ in 0..batch_size {
            f();
        }
        let per_call = start.elapsed().as_nanos().div_ceil(batch_size as u128);
        samples.push(per_call as u64);
    }

    BenchResult {
        name: name.to_string(),
        unit: "ns/op".to_string(),
        // Non-empty: at least one batch is always timed.
        stats: compute_stats(&mut samples).unwrap_or_default(),
    }
}

// ─── Payloads ───────────────────────────────────────────────────────────────

/// A patch with a three-note chord held, so copies touch the whole value.
pub fn make_test_patch(revision: u64) -> Patch {
    let mut patch = Patch {
        revision,
        ..Patch::default()
    };
    for n in [60, 64, 67] {
        patch.held.press(NoteId(n));
    }
    patch
}

// ─── Display ────────────────────────────────────────────────────────────────

pub fn format_ns(ns: f64) -> String {
    if ns >= 1_000_000.0 {
        format!("{:.1} ms", ns / 1_000_000.0)
    } else if ns >= 1_000.0 {
        format!("{:.1} us", ns / 1_000.0)
    } else {
        format!("{ns:.0} ns")
    }
}

pub fn section_header(title: &str) {
    println!("\n{}", "─".repeat(90));
    println!("  {title}");
    println!("{}\n", "─".repeat(90));
}

pub fn print_table_header() {
    println!(
        "  {:<34} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}  unit",
        "Benchmark", "min", "p50", "p90", "p99", "p99.9", "max",
    );
    println!("  {}", "─".repeat(96));
}

pub fn print_result_row(r: &BenchResult) {
    println!(
        "  {:<34} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}  {}",
        r.name,
        r.stats.min,
        r.stats.p50,
        r.stats.p90,
        r.stats.p99,
        r.stats.p999,
        r.stats.max,
        r.unit,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_uses_nearest_rank() {
        let sorted: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&sorted, 50.0), 50);
        assert_eq!(percentile(&sorted, 99.0), 99);
        assert_eq!(percentile(&sorted, 100.0), 100);
        assert_eq!(percentile(&sorted, 0.0), 1);
        assert_eq!(percentile(&[7], 99.9), 7);
    }

    #[test]
    fn stats_sort_and_summarise() {
        let mut samples = vec![5, 1, 3, 2, 4];
        let stats = compute_stats(&mut samples).unwrap();
        assert_eq!(samples, [1, 2, 3, 4, 5]);
        assert_eq!((stats.min, stats.max, stats.p50), (1, 5, 3));
        assert_eq!(stats.mean, 3.0);
        assert!((stats.stddev - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn empty_samples_have_no_stats() {
        assert!(compute_stats(&mut []).is_none());
    }

    #[test]
    fn batched_measurement_records_every_batch() {
        let mut calls = 0u64;
        let r = measure_batched("noop", 10, 100, 1, || calls += 1);
        assert_eq!(calls, 1_100);
        assert_eq!(r.stats.count, 10);
    }
}
