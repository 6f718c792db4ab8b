use std::hint::black_box;
use std::mem::{align_of, size_of};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use keel_latest::{Exchange, ExchangeConfig, bridge};
use keel_params::{NoteSet, Patch};
use keel_perf::*;

const CAPACITIES: [usize; 4] = [2, 3, 5, 16];
/// Two slots are only sound when publish and acquire never overlap, so the
/// concurrent runs start at three.
const CROSS_THREAD_CAPACITIES: [usize; 3] = [3, 5, 16];
const BATCHES: usize = 1_000;
const BATCH_SIZE: usize = 10_000;
const WARMUP_BATCHES: usize = 100;

/// Publishes per cross-thread run.
const CROSS_THREAD_PUBLISHES: u64 = 500_000;

/// What the consumer saw while a producer published flat out.
#[derive(Debug, Clone, serde::Serialize)]
struct CrossThreadRun {
    capacity: usize,
    acquires: usize,
    distinct_revisions: u64,
    acquire_ns: Option<Stats>,
    revisions_behind: Option<Stats>,
}

fn main() {
    print_banner();
    section_memory_layout();

    let mut results = Vec::new();
    section_clock(&mut results);
    section_single_thread(&mut results);
    let cross_thread = section_cross_thread();

    save_results(&results, &cross_thread);
}

fn print_banner() {
    let bar = "═".repeat(90);
    println!("\n{bar}");
    println!("  KEEL PERFORMANCE REPORT");
    println!("  batched single-thread latency + cross-thread staleness");
    println!("{bar}\n");

    let ncpu = std::thread::available_parallelism().map_or(0, |n| n.get());
    println!("  CPUs:    {ncpu}");
    println!("  Arch:    {}", std::env::consts::ARCH);
    println!("  OS:      {}", std::env::consts::OS);
}

fn section_memory_layout() {
    section_header("MEMORY LAYOUT");

    println!("  {:<26} {:>8} {:>8}", "Type", "Size", "Align");
    println!("  {}", "─".repeat(46));
    let types: &[(&str, usize, usize)] = &[
        ("Patch", size_of::<Patch>(), align_of::<Patch>()),
        ("NoteSet", size_of::<NoteSet>(), align_of::<NoteSet>()),
        (
            "Exchange<Patch>",
            size_of::<Exchange<Patch>>(),
            align_of::<Exchange<Patch>>(),
        ),
    ];
    for &(name, size, align) in types {
        println!("  {name:<26} {size:>6} B {align:>6} B");
    }

    println!("\n  Each slot and each cursor sits on its own 64-byte line; a publish");
    println!("  copies one Patch and stores two cursors.");
}

fn section_clock(results: &mut Vec<BenchResult>) {
    section_header("CLOCK CALIBRATION");
    print_table_header();

    let r = measure_batched("Instant::now()", BATCHES, BATCH_SIZE, WARMUP_BATCHES, || {
        black_box(Instant::now());
    });
    print_result_row(&r);
    println!("\n  * Measurement floor: ~{} ns", r.stats.p50);
    println!("  * Timings below are averaged over {BATCH_SIZE} ops per batch");
    results.push(r);
}

fn section_single_thread(results: &mut Vec<BenchResult>) {
    section_header("SINGLE-THREAD OPERATIONS");
    print_table_header();

    let patch = make_test_patch(1);
    for capacity in CAPACITIES {
        let Ok(exchange) = Exchange::new(capacity, make_test_patch(0)) else {
            continue;
        };
        let (mut publisher, mut subscriber) = exchange.split();

        let r = measure_batched(
            &format!("publish (cap {capacity})"),
            BATCHES,
            BATCH_SIZE,
            WARMUP_BATCHES,
            || publisher.publish(black_box(patch)),
        );
        print_result_row(&r);
        results.push(r);

        let r = measure_batched(
            &format!("acquire_latest idle (cap {capacity})"),
            BATCHES,
            BATCH_SIZE,
            WARMUP_BATCHES,
            || {
                black_box(subscriber.acquire_latest().revision);
            },
        );
        print_result_row(&r);
        results.push(r);

        let r = measure_batched(
            &format!("round trip (cap {capacity})"),
            BATCHES,
            BATCH_SIZE,
            WARMUP_BATCHES,
            || {
                publisher.publish(black_box(patch));
                black_box(subscriber.acquire_latest().revision);
            },
        );
        print_result_row(&r);
        results.push(r);
    }

    let (mut producer, mut consumer) = bridge::owned(ExchangeConfig::default(), make_test_patch(0));
    let r = measure_batched("bridge push + adopt", BATCHES, BATCH_SIZE, WARMUP_BATCHES, || {
        producer.revision += 1;
        producer.push();
        if consumer.has_update() {
            black_box(consumer.adopt().revision);
        }
    });
    print_result_row(&r);
    results.push(r);
}

fn section_cross_thread() -> Vec<CrossThreadRun> {
    section_header("CROSS-THREAD STALENESS");
    println!(
        "  {:<10} {:>10} {:>10} {:>12} {:>12} {:>14} {:>14}",
        "capacity", "acquires", "distinct", "acq p50", "acq p99", "behind p50", "behind p99"
    );
    println!("  {}", "─".repeat(88));

    let mut runs = Vec::new();
    for capacity in CROSS_THREAD_CAPACITIES {
        let run = cross_thread_run(capacity);
        let acq = run.acquire_ns.clone().unwrap_or_default();
        let behind = run.revisions_behind.clone().unwrap_or_default();
        println!(
            "  {:<10} {:>10} {:>10} {:>12} {:>12} {:>14} {:>14}",
            capacity,
            run.acquires,
            run.distinct_revisions,
            format_ns(acq.p50 as f64),
            format_ns(acq.p99 as f64),
            behind.p50,
            behind.p99,
        );
        runs.push(run);
    }

    println!("\n  behind = revisions published but not yet visible at acquire time.");
    runs
}

fn cross_thread_run(capacity: usize) -> CrossThreadRun {
    let empty = CrossThreadRun {
        capacity,
        acquires: 0,
        distinct_revisions: 0,
        acquire_ns: None,
        revisions_behind: None,
    };
    let Ok(exchange) = Exchange::new(capacity, make_test_patch(0)) else {
        return empty;
    };
    let (mut publisher, mut subscriber) = exchange.split();

    let published = Arc::new(AtomicU64::new(0));
    let done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(2));

    let consumer = {
        let (published, done, barrier) = (published.clone(), done.clone(), barrier.clone());
        std::thread::spawn(move || {
            let mut acquire_ns = Vec::with_capacity(1 << 20);
            let mut behind = Vec::with_capacity(1 << 20);
            let mut distinct = 0u64;
            let mut last = 0u64;

            barrier.wait();
            while !done.load(Ordering::Acquire) && acquire_ns.len() < (1 << 20) {
                let start = Instant::now();
                let revision = subscriber.acquire_latest().revision;
                let elapsed = start.elapsed().as_nanos() as u64;
                let head = published.load(Ordering::Acquire);

                acquire_ns.push(elapsed);
                behind.push(head.saturating_sub(revision));
                if revision != last {
                    distinct += 1;
                    last = revision;
                }
            }
            (acquire_ns, behind, distinct)
        })
    };

    barrier.wait();
    let mut patch = make_test_patch(0);
    for revision in 1..=CROSS_THREAD_PUBLISHES {
        patch.revision = revision;
        publisher.publish(patch);
        published.store(revision, Ordering::Release);
    }
    done.store(true, Ordering::Release);

    let Ok((mut acquire_ns, mut behind, distinct_revisions)) = consumer.join() else {
        eprintln!("  [consumer thread panicked at capacity {capacity}]");
        return empty;
    };

    CrossThreadRun {
        capacity,
        acquires: acquire_ns.len(),
        distinct_revisions,
        acquire_ns: compute_stats(&mut acquire_ns),
        revisions_behind: compute_stats(&mut behind),
    }
}

fn save_results(results: &[BenchResult], cross_thread: &[CrossThreadRun]) {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());

    let results_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/results");
    let json_path = format!("{results_dir}/{timestamp}_report.json");

    let output = serde_json::json!({
        "report_type": "exchange",
        "timestamp": timestamp,
        "patch_bytes": size_of::<Patch>(),
        "single_thread": results,
        "cross_thread": cross_thread,
    });

    let written = std::fs::create_dir_all(results_dir)
        .map_err(|e| e.to_string())
        .and_then(|()| serde_json::to_string_pretty(&output).map_err(|e| e.to_string()))
        .and_then(|json| std::fs::write(&json_path, json).map_err(|e| e.to_string()));

    let bar = "═".repeat(90);
    match written {
        Ok(()) => {
            println!("\n{bar}");
            println!("  Results saved to: {json_path}");
            println!("{bar}\n");
        }
        Err(e) => eprintln!("\n  [failed to save results: {e}]\n"),
    }
}
