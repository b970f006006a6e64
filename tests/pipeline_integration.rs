use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;

use trade_ledger::clock::monotonic_ns;
use trade_ledger::frame::{Event, EventType, FILE_HEADER_SIZE, FRAME_OVERHEAD};
use trade_ledger::histogram::LatencyHistogram;
use trade_ledger::reader::EventLogReader;
use trade_ledger::ring::SpscRing;
use trade_ledger::tailer::LogTailer;
use trade_ledger::trade::{Side, TradePayload};
use trade_ledger::validator::TradeValidator;
use trade_ledger::writer::EventLogWriter;

#[test]
fn single_write_single_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("event_log.bin");

    let payload = json!({"trade_id": "t1", "symbol": "AAPL", "quantity": 100});
    let payload_bytes = serde_json::to_vec(&payload).unwrap();

    let writer = EventLogWriter::create(&path).unwrap();
    let seq = writer.append(EventType::TradeCreated, &payload).unwrap();
    assert_eq!(seq, 1);

    let expected_size = FILE_HEADER_SIZE + FRAME_OVERHEAD + payload_bytes.len();
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        expected_size as u64
    );

    let mut reader = EventLogReader::open(&path).unwrap();
    let event = reader.read_next().unwrap().unwrap();
    assert_eq!(event.sequence_num, 1);
    assert_eq!(event.event_type, EventType::TradeCreated as u8);
    assert_eq!(event.payload, payload_bytes);
    assert!(event.timestamp_ns > 0);
    assert!(reader.read_next().unwrap().is_none());
}

#[test]
fn concurrent_appends_yield_gapless_ordered_sequences() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 10_000;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("event_log.bin");
    let writer = Arc::new(EventLogWriter::create(&path).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let writer = writer.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    writer
                        .append(
                            EventType::TradeCreated,
                            &json!({
                                "trade_id": format!("{t}-{i}"),
                                "symbol": "MSFT",
                                "quantity": 1
                            }),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(writer.current_sequence(), THREADS * PER_THREAD);

    let mut reader = EventLogReader::open(&path).unwrap();
    let mut expected = 1u64;
    while let Some(event) = reader.read_next().unwrap() {
        assert_eq!(event.sequence_num, expected, "sequence gap or reorder");
        expected += 1;
    }
    assert_eq!(expected - 1, THREADS * PER_THREAD);
}

#[test]
fn writer_payloads_validate_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("event_log.bin");

    let writer = EventLogWriter::create(&path).unwrap();
    for i in 0..50u32 {
        let trade = TradePayload {
            trade_id: format!("trade-{i}"),
            account_id: "ACCT-000001".into(),
            symbol: "NVDA".into(),
            quantity: i + 1,
            price: 425.50,
            side: if i % 2 == 0 { Side::Buy } else { Side::Sell },
            timestamp_ns: monotonic_ns(),
        };
        writer.append(EventType::TradeCreated, &trade).unwrap();
    }

    let mut reader = EventLogReader::open(&path).unwrap();
    let mut validator = TradeValidator::new();
    let mut histogram = LatencyHistogram::new();
    while let Some(event) = reader.read_next().unwrap() {
        let start = monotonic_ns();
        validator.process(&event);
        histogram.record(monotonic_ns() - start);

        let trade: TradePayload = serde_json::from_slice(&event.payload).unwrap();
        assert_eq!(trade.symbol, "NVDA");
    }

    let stats = validator.stats();
    assert_eq!(stats.events_processed, 50);
    assert_eq!(stats.trades_validated, 50);
    assert_eq!(stats.validation_errors, 0);
    assert_eq!(histogram.count(), 50);
    assert!(histogram.percentile(1.0) >= histogram.percentile(0.5));
}

#[test]
fn sequence_numbering_survives_writer_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("event_log.bin");

    for _ in 0..3 {
        let writer = EventLogWriter::create(&path).unwrap();
        for _ in 0..4 {
            writer
                .append(EventType::TradeCreated, &json!({"trade_id": "x"}))
                .unwrap();
        }
    }

    let mut reader = EventLogReader::open(&path).unwrap();
    let mut sequences = Vec::new();
    while let Some(event) = reader.read_next().unwrap() {
        sequences.push(event.sequence_num);
    }
    assert_eq!(sequences, (1..=12).collect::<Vec<u64>>());
}

#[test]
fn tail_following_observes_live_appends_exactly_once() {
    const LIVE_EVENTS: u64 = 100;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("event_log.bin");

    let writer = EventLogWriter::create(&path).unwrap();
    for _ in 0..5 {
        writer
            .append(EventType::TradeCreated, &json!({"trade_id": "seed"}))
            .unwrap();
    }

    let mut reader = EventLogReader::open(&path).unwrap();
    let mut tailer = LogTailer::init(&path).unwrap();

    let mut seen = Vec::new();
    while let Some(event) = reader.read_next().unwrap() {
        seen.push(event.sequence_num);
    }
    assert_eq!(seen.len(), 5);

    let appender = thread::spawn(move || {
        for _ in 0..LIVE_EVENTS {
            writer
                .append(EventType::TradeCreated, &json!({"trade_id": "live"}))
                .unwrap();
            thread::sleep(Duration::from_millis(2));
        }
    });

    let deadline = Instant::now() + Duration::from_secs(30);
    while (seen.len() as u64) < 5 + LIVE_EVENTS {
        assert!(Instant::now() < deadline, "tail-follow stalled: {seen:?}");
        if reader.remap_if_grown().unwrap() {
            while let Some(event) = reader.read_next().unwrap() {
                seen.push(event.sequence_num);
            }
            continue;
        }
        tailer.wait_for_modification(100).unwrap();
        reader.remap_if_grown().unwrap();
        while let Some(event) = reader.read_next().unwrap() {
            seen.push(event.sequence_num);
        }
    }
    appender.join().unwrap();

    assert_eq!(seen, (1..=5 + LIVE_EVENTS).collect::<Vec<u64>>());
}

#[test]
fn live_pipeline_through_the_ring() {
    const EVENTS: u64 = 2_000;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("event_log.bin");
    let writer = EventLogWriter::create(&path).unwrap();
    writer
        .append(EventType::TradeCreated, &json!({"trade_id": "seed", "symbol": "S", "quantity": 1}))
        .unwrap();

    let (mut tx, mut rx) = SpscRing::<Event, 256>::new().split();

    let appender = thread::spawn(move || {
        for i in 0..EVENTS {
            writer
                .append(
                    EventType::TradeCreated,
                    &json!({"trade_id": format!("t{i}"), "symbol": "S", "quantity": 1}),
                )
                .unwrap();
        }
    });

    let producer = thread::spawn(move || {
        let mut reader = EventLogReader::open(&path).unwrap();
        let mut tailer = LogTailer::init(&path).unwrap();
        let mut pushed = 0u64;
        while pushed < 1 + EVENTS {
            match reader.read_next().unwrap() {
                Some(event) => {
                    let mut item = event;
                    while let Err(back) = tx.try_push(item) {
                        item = back;
                        thread::yield_now();
                    }
                    pushed += 1;
                }
                None => {
                    if !reader.remap_if_grown().unwrap() {
                        tailer.wait_for_modification(50).unwrap();
                        reader.remap_if_grown().unwrap();
                    }
                }
            }
        }
    });

    let consumer = thread::spawn(move || {
        let mut validator = TradeValidator::new();
        let mut expected = 1u64;
        while expected <= 1 + EVENTS {
            match rx.try_pop() {
                Some(event) => {
                    assert_eq!(event.sequence_num, expected);
                    validator.process(&event);
                    expected += 1;
                }
                None => thread::yield_now(),
            }
        }
        validator.stats()
    });

    appender.join().unwrap();
    producer.join().unwrap();
    let stats = consumer.join().unwrap();
    assert_eq!(stats.events_processed, 1 + EVENTS);
    assert_eq!(stats.trades_validated, 1 + EVENTS);
    assert_eq!(stats.validation_errors, 0);
}
