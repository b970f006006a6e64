use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use trade_ledger::clock::monotonic_ns;
use trade_ledger::frame::Event;
use trade_ledger::histogram::LatencyHistogram;
use trade_ledger::reader::EventLogReader;
use trade_ledger::ring::{Consumer, Producer, SpscRing};
use trade_ledger::tailer::LogTailer;
use trade_ledger::validator::TradeValidator;

/// Ring slots between the producer and consumer threads.
const RING_SIZE: usize = 4096;
/// Events between periodic latency summaries.
const SUMMARY_INTERVAL: u64 = 10_000;
/// How long the producer parks waiting for log growth.
const TAIL_WAIT_MS: u64 = 100;
/// Monitor reporting period.
const MONITOR_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(about = "Tail-follow an event log, validate events, and measure latency")]
struct Args {
    /// Event log path to follow
    #[arg(default_value = "../data/event_log.bin")]
    log_path: PathBuf,

    /// Logging verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Reads frames off the log and pushes them into the ring, spinning with a
/// yield while the ring is full and parking in the tailer at EOF.
fn producer_loop(
    log_path: &Path,
    mut ring: Producer<Event, RING_SIZE>,
    running: &AtomicBool,
    events_read: &AtomicU64,
) -> Result<()> {
    let mut reader =
        EventLogReader::open(log_path).with_context(|| format!("open {log_path:?}"))?;
    let mut tailer =
        LogTailer::init(log_path).with_context(|| format!("watch {log_path:?}"))?;
    info!(
        native_notifications = tailer.is_native(),
        "tail-following started"
    );

    while running.load(Ordering::Acquire) {
        match reader.read_next()? {
            Some(event) => {
                let mut item = event;
                loop {
                    match ring.try_push(item) {
                        Ok(()) => break,
                        Err(back) => {
                            if !running.load(Ordering::Acquire) {
                                return Ok(());
                            }
                            item = back;
                            thread::yield_now();
                        }
                    }
                }
                events_read.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                if !reader.remap_if_grown()? {
                    tailer.wait_for_modification(TAIL_WAIT_MS)?;
                    reader.remap_if_grown()?;
                }
            }
        }
    }
    info!("producer shutting down");
    Ok(())
}

/// Pops events, validates them under a monotonic stopwatch, and reports the
/// latency distribution every [`SUMMARY_INTERVAL`] events. Keeps draining
/// until the ring is empty after shutdown is requested.
fn consumer_loop(
    mut ring: Consumer<Event, RING_SIZE>,
    running: &AtomicBool,
    events_processed: &AtomicU64,
) {
    let mut validator = TradeValidator::new();
    let mut histogram = LatencyHistogram::new();
    let mut processed = 0u64;

    loop {
        match ring.try_pop() {
            Some(event) => {
                let start = monotonic_ns();
                validator.process(&event);
                histogram.record(monotonic_ns() - start);

                processed += 1;
                events_processed.fetch_add(1, Ordering::Relaxed);
                if processed % SUMMARY_INTERVAL == 0 {
                    info!("{}", histogram.summary());
                    histogram.clear();
                }
            }
            None => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                thread::yield_now();
            }
        }
    }

    info!("{}", validator.summary());
    if histogram.count() > 0 {
        info!("{}", histogram.summary());
    }
    info!("consumer shutting down");
}

/// Prints totals and per-interval rates every five seconds.
fn monitor_loop(running: &AtomicBool, events_read: &AtomicU64, events_processed: &AtomicU64) {
    let mut last_read = 0u64;
    let mut last_processed = 0u64;

    while running.load(Ordering::Acquire) {
        thread::sleep(MONITOR_PERIOD);

        let read = events_read.load(Ordering::Relaxed);
        let processed = events_processed.load(Ordering::Relaxed);
        info!(
            read,
            read_rate = (read - last_read) / MONITOR_PERIOD.as_secs(),
            processed,
            process_rate = (processed - last_processed) / MONITOR_PERIOD.as_secs(),
            "progress"
        );
        last_read = read;
        last_processed = processed;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level)
        .with_context(|| format!("invalid log level: {}", args.log_level))?;
    fmt().with_env_filter(filter).init();

    info!(log_path = %args.log_path.display(), "event processor starting");

    let running = Arc::new(AtomicBool::new(true));
    let ctrlc_flag = running.clone();
    ctrlc::set_handler(move || {
        ctrlc_flag.store(false, Ordering::Release);
    })
    .context("install signal handler")?;

    let events_read = Arc::new(AtomicU64::new(0));
    let events_processed = Arc::new(AtomicU64::new(0));

    let (producer, consumer) = SpscRing::<Event, RING_SIZE>::new().split();

    let producer_handle = {
        let log_path = args.log_path.clone();
        let running = running.clone();
        let events_read = events_read.clone();
        thread::spawn(move || {
            let result = producer_loop(&log_path, producer, &running, &events_read);
            if let Err(e) = &result {
                error!("producer failed: {e:#}");
                running.store(false, Ordering::Release);
            }
            result
        })
    };

    let consumer_handle = {
        let running = running.clone();
        let events_processed = events_processed.clone();
        thread::spawn(move || consumer_loop(consumer, &running, &events_processed))
    };

    let monitor_handle = {
        let running = running.clone();
        let events_read = events_read.clone();
        let events_processed = events_processed.clone();
        thread::spawn(move || monitor_loop(&running, &events_read, &events_processed))
    };

    let producer_result = producer_handle
        .join()
        .map_err(|_| anyhow!("producer thread panicked"))?;

    // Producer is done (or failed); let the consumer drain and stop.
    running.store(false, Ordering::Release);
    consumer_handle
        .join()
        .map_err(|_| anyhow!("consumer thread panicked"))?;
    monitor_handle
        .join()
        .map_err(|_| anyhow!("monitor thread panicked"))?;

    info!(
        total_read = events_read.load(Ordering::Relaxed),
        total_processed = events_processed.load(Ordering::Relaxed),
        "event processor shutdown complete"
    );

    producer_result
}
