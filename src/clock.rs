//! Monotonic nanosecond clock shared by the writer and consumer processes.
//!
//! Event timestamps and latency measurements must come from the same clock
//! domain on the same host, and must never move backwards under wall-clock
//! adjustment. On unix this is `CLOCK_MONOTONIC`; elsewhere a process-local
//! `Instant` anchor is used (timestamps are then only comparable within one
//! process).

/// Current monotonic time in nanoseconds.
#[cfg(unix)]
pub fn monotonic_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // clock_gettime(CLOCK_MONOTONIC) cannot fail with a valid timespec.
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

/// Current monotonic time in nanoseconds.
#[cfg(not(unix))]
pub fn monotonic_ns() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    ANCHOR.get_or_init(Instant::now).elapsed().as_nanos() as u64
}
