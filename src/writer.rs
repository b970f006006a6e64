//! Append side of the event log.
//!
//! One [`EventLogWriter`] owns the log file for the lifetime of the writer
//! process. Any number of application threads may call
//! [`append`](EventLogWriter::append); sequence assignment, serialization,
//! and the file write happen under one mutex so every frame lands
//! contiguously at the append offset and file order matches sequence order.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::monotonic_ns;
use crate::frame::{
    encode_file_header, encode_frame, parse_file_header, read_u32_le, read_u64_le, Event,
    EventType, FrameError, FILE_HEADER_SIZE, FRAME_HEADER_SIZE, FRAME_OVERHEAD,
};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("event log i/o: {0}")]
    Io(#[from] io::Error),

    #[error("event log format: {0}")]
    Format(#[from] FrameError),

    #[error("payload serialization: {0}")]
    Payload(#[from] serde_json::Error),
}

pub struct EventLogWriter {
    file: Mutex<File>,
    sequence: AtomicU64,
    path: PathBuf,
}

impl EventLogWriter {
    /// Open the log at `path` for appending, creating it (and its parent
    /// directory) if needed.
    ///
    /// A new file gets the 16-byte header. An existing file is scanned so the
    /// sequence counter resumes from the last complete frame; trailing bytes
    /// of a torn frame left by a crashed writer are trimmed off so the frame
    /// chain stays parseable.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, WriteError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();

        let last_sequence = if size == 0 {
            (&file).write_all(&encode_file_header())?;
            info!(path = %path.display(), "created event log");
            0
        } else {
            let (last_sequence, valid_len) = scan_frame_chain(path)?;
            if (valid_len as u64) < size {
                warn!(
                    path = %path.display(),
                    torn_bytes = size - valid_len as u64,
                    "trimming torn frame at end of log"
                );
                file.set_len(valid_len as u64)?;
            }
            info!(
                path = %path.display(),
                size,
                resume_from = last_sequence + 1,
                "opened existing event log"
            );
            last_sequence
        };

        Ok(Self {
            file: Mutex::new(file),
            sequence: AtomicU64::new(last_sequence),
            path: path.to_path_buf(),
        })
    }

    /// Append one event and return its assigned sequence number.
    ///
    /// The payload is rendered to canonical JSON, the frame is built with the
    /// next sequence number and the current monotonic clock, and the whole
    /// frame is written with a single `write_all` while the lock is held.
    /// A failed write leaves a gap in the sequence numbering; the counter is
    /// not rolled back.
    pub fn append<P: Serialize>(
        &self,
        event_type: EventType,
        payload: &P,
    ) -> Result<u64, WriteError> {
        let payload = serde_json::to_vec(payload)?;

        let file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence_num = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let event = Event {
            sequence_num,
            timestamp_ns: monotonic_ns(),
            event_type: event_type as u8,
            payload,
        };
        let frame = encode_frame(&event);
        (&*file).write_all(&frame)?;
        debug!(
            sequence = sequence_num,
            bytes = frame.len(),
            "appended event"
        );
        Ok(sequence_num)
    }

    /// Last sequence number handed out, 0 before the first append.
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Walk the frame chain of an existing log. Returns the sequence number of
/// the last complete frame and the byte length of the valid prefix. Stops at
/// the first incomplete frame; CRCs are not rechecked here.
fn scan_frame_chain(path: &Path) -> Result<(u64, usize), WriteError> {
    let data = fs::read(path)?;
    parse_file_header(&data)?;

    let mut offset = FILE_HEADER_SIZE;
    let mut last_sequence = 0u64;
    while offset + FRAME_HEADER_SIZE <= data.len() {
        let payload_length = read_u32_le(&data, offset + 20) as usize;
        let total = FRAME_OVERHEAD + payload_length;
        if offset + total > data.len() {
            break;
        }
        last_sequence = read_u64_le(&data, offset);
        offset += total;
    }
    Ok((last_sequence, offset))
}
