//! Trade event-log pipeline library.
//!
//! This crate provides the core types and logic used by the
//! `trade_recorder` writer binary and the `event_processor` consumer tool:
//!
//! - `frame`: on-disk frame codec with CRC-32 integrity checks
//! - `writer`: append-only log writer with atomic multi-thread appends and
//!   sequence recovery on reopen
//! - `reader`: memory-mapped sequential reader that remaps as the log grows
//! - `tailer`: blocking wait for log growth (inotify on Linux, polling
//!   elsewhere)
//! - `ring`: lock-free SPSC queue between the consumer's two threads
//! - `histogram`: exact latency histogram with percentile queries
//! - `validator`: per-event semantic checks and counters
//! - `trade`: trade payload types with a canonical JSON form
//! - `clock`: monotonic nanosecond clock shared across processes
//!
//! The binaries in this repository (`src/main.rs` and
//! `src/bin/event_processor.rs`) use these modules to write and tail-follow
//! event logs with strong framing and CRC integrity checks.
pub mod clock;
pub mod frame;
pub mod histogram;
pub mod reader;
pub mod ring;
pub mod tailer;
pub mod trade;
pub mod validator;
pub mod writer;
