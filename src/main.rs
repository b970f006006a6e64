use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use rand::Rng;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use trade_ledger::clock::monotonic_ns;
use trade_ledger::frame::EventType;
use trade_ledger::trade::{Side, TradePayload};
use trade_ledger::writer::EventLogWriter;

const SYMBOLS: &[&str] = &[
    "AAPL", "GOOGL", "MSFT", "AMZN", "TSLA", "META", "NVDA", "AMD",
];

#[derive(Debug, Parser)]
#[command(version, about = "Synthetic trade feed recorder (append-only event log)")]
struct Args {
    /// Event log output path
    #[arg(long, env = "EVENT_LOG_PATH", default_value = "../data/event_log.bin")]
    log: PathBuf,

    /// Submitter threads appending concurrently
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Target events per second per thread (0 = unthrottled)
    #[arg(long, default_value_t = 1_000)]
    rate: u64,

    /// Events per thread before stopping (0 = run until Ctrl-C)
    #[arg(long, default_value_t = 0)]
    count: u64,

    /// Logging verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn random_trade() -> TradePayload {
    let mut rng = rand::thread_rng();
    TradePayload {
        trade_id: Uuid::new_v4().to_string(),
        account_id: format!("ACCT-{:06}", rng.gen_range(0..1_000)),
        symbol: SYMBOLS[rng.gen_range(0..SYMBOLS.len())].to_string(),
        quantity: rng.gen_range(1..=1_000),
        price: 100.0 + rng.gen::<f64>() * 900.0,
        side: if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
        timestamp_ns: monotonic_ns(),
    }
}

fn submitter(
    writer: Arc<EventLogWriter>,
    running: Arc<AtomicBool>,
    appended: Arc<AtomicU64>,
    rate: u64,
    count: u64,
) {
    let interval = if rate > 0 {
        Duration::from_nanos(1_000_000_000 / rate)
    } else {
        Duration::ZERO
    };
    let mut next_deadline = Instant::now();
    let mut written = 0u64;

    while running.load(Ordering::Acquire) && (count == 0 || written < count) {
        let trade = random_trade();
        match writer.append(EventType::TradeCreated, &trade) {
            Ok(_) => {
                written += 1;
                appended.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!("append failed: {e:#}");
                running.store(false, Ordering::Release);
                return;
            }
        }

        if !interval.is_zero() {
            next_deadline += interval;
            let now = Instant::now();
            if next_deadline > now {
                thread::sleep(next_deadline - now);
            } else {
                next_deadline = now;
            }
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenv();
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level)
        .with_context(|| format!("invalid log level: {}", args.log_level))?;
    fmt().with_env_filter(filter).init();

    let writer = Arc::new(
        EventLogWriter::create(&args.log)
            .with_context(|| format!("open event log {:?}", args.log))?,
    );

    let running = Arc::new(AtomicBool::new(true));
    let appended = Arc::new(AtomicU64::new(0));

    let ctrlc_flag = running.clone();
    ctrlc::set_handler(move || {
        ctrlc_flag.store(false, Ordering::Release);
    })
    .context("install signal handler")?;

    info!(
        log = %args.log.display(),
        threads = args.threads,
        rate = args.rate,
        count = args.count,
        "recorder started"
    );

    let start = Instant::now();
    let handles: Vec<_> = (0..args.threads.max(1))
        .map(|_| {
            let writer = writer.clone();
            let running = running.clone();
            let appended = appended.clone();
            let (rate, count) = (args.rate, args.count);
            thread::spawn(move || submitter(writer, running, appended, rate, count))
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            error!("submitter thread panicked");
        }
    }

    let total = appended.load(Ordering::Relaxed);
    let elapsed = start.elapsed().as_secs_f64();
    info!(
        events = total,
        final_sequence = writer.current_sequence(),
        rate_per_sec = format!("{:.0}", total as f64 / elapsed.max(1e-9)),
        "recorder finished"
    );
    Ok(())
}
