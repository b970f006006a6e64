//! On-disk event frame codec.
//!
//! Every record in the event log is a self-contained frame:
//!
//! ```text
//! offset | size | field
//! -------|------|---------------
//! 0      | 8    | sequence_num   (u64, little-endian)
//! 8      | 8    | timestamp_ns   (u64, monotonic clock)
//! 16     | 1    | event_type
//! 17     | 3    | reserved       (zero)
//! 20     | 4    | payload_length (u32)
//! 24     | N    | payload        (UTF-8 JSON)
//! 24+N   | 4    | crc32          (over bytes 0..24+N)
//! ```
//!
//! The log file starts with a 16-byte header (`magic`, `version`, reserved)
//! written exactly once at creation. The CRC is the standard IEEE polynomial
//! as computed by [`crc32fast`], matching zlib.

use crc32fast::Hasher as Crc32;
use thiserror::Error;

/// Log file magic, "TRAD" read as a little-endian u32.
pub const MAGIC: u32 = 0x5452_4144;
/// Current log format version.
pub const FORMAT_VERSION: u32 = 1;
/// Size of the once-per-file header.
pub const FILE_HEADER_SIZE: usize = 16;
/// Size of the fixed per-frame header (sequence, timestamp, type, length).
pub const FRAME_HEADER_SIZE: usize = 24;
/// Fixed bytes per frame: header plus trailing CRC.
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + 4;

/// Known event types. The wire field is a raw byte; values outside this enum
/// are carried through decoding untouched and left to the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    TradeCreated = 1,
    LedgerEntriesGenerated = 2,
    PositionUpdated = 3,
}

impl EventType {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::TradeCreated),
            2 => Some(Self::LedgerEntriesGenerated),
            3 => Some(Self::PositionUpdated),
            _ => None,
        }
    }
}

/// A single decoded event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Monotonic sequence number, starting at 1, unique within one log.
    pub sequence_num: u64,
    /// Monotonic nanosecond clock sampled by the writer at append time.
    pub timestamp_ns: u64,
    /// Raw event type byte.
    pub event_type: u8,
    /// Opaque payload bytes (UTF-8 JSON for trade events).
    pub payload: Vec<u8>,
}

impl Event {
    /// Total encoded size of this event in bytes.
    pub fn encoded_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

/// Parsed log file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("bad file header: magic={magic:#010x}, version={version}")]
    BadHeader { magic: u32, version: u32 },

    #[error("insufficient data: need {needed} bytes, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("corrupted frame: stored crc={stored:#010x}, computed={computed:#010x}")]
    CorruptedFrame { stored: u32, computed: u32 },
}

pub(crate) fn read_u32_le(data: &[u8], off: usize) -> u32 {
    let mut tmp = [0u8; 4];
    tmp.copy_from_slice(&data[off..off + 4]);
    u32::from_le_bytes(tmp)
}

pub(crate) fn read_u64_le(data: &[u8], off: usize) -> u64 {
    let mut tmp = [0u8; 8];
    tmp.copy_from_slice(&data[off..off + 8]);
    u64::from_le_bytes(tmp)
}

/// Encode the 16-byte log file header.
pub fn encode_file_header() -> [u8; FILE_HEADER_SIZE] {
    let mut header = [0u8; FILE_HEADER_SIZE];
    header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    header[4..8].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header
}

/// Parse and validate the log file header.
pub fn parse_file_header(data: &[u8]) -> Result<FileHeader, FrameError> {
    if data.len() < FILE_HEADER_SIZE {
        return Err(FrameError::InsufficientData {
            needed: FILE_HEADER_SIZE,
            available: data.len(),
        });
    }
    let header = FileHeader {
        magic: read_u32_le(data, 0),
        version: read_u32_le(data, 4),
    };
    if header.magic != MAGIC || header.version != FORMAT_VERSION {
        return Err(FrameError::BadHeader {
            magic: header.magic,
            version: header.version,
        });
    }
    Ok(header)
}

/// Serialize an event into one contiguous frame, CRC included.
pub fn encode_frame(event: &Event) -> Vec<u8> {
    let n = event.payload.len();
    let mut buf = Vec::with_capacity(FRAME_OVERHEAD + n);
    buf.extend_from_slice(&event.sequence_num.to_le_bytes());
    buf.extend_from_slice(&event.timestamp_ns.to_le_bytes());
    buf.push(event.event_type);
    buf.extend_from_slice(&[0u8; 3]);
    buf.extend_from_slice(&(n as u32).to_le_bytes());
    buf.extend_from_slice(&event.payload);

    let mut hasher = Crc32::new();
    hasher.update(&buf);
    buf.extend_from_slice(&hasher.finalize().to_le_bytes());
    buf
}

/// Decode one frame from `data`, which must hold the complete frame.
///
/// Fails with [`FrameError::InsufficientData`] when the slice is shorter than
/// the frame's declared size, and [`FrameError::CorruptedFrame`] when the
/// stored CRC does not match the recomputed one.
pub fn decode_frame(data: &[u8]) -> Result<Event, FrameError> {
    if data.len() < FRAME_OVERHEAD {
        return Err(FrameError::InsufficientData {
            needed: FRAME_OVERHEAD,
            available: data.len(),
        });
    }

    let sequence_num = read_u64_le(data, 0);
    let timestamp_ns = read_u64_le(data, 8);
    let event_type = data[16];
    let payload_length = read_u32_le(data, 20) as usize;

    let total = FRAME_OVERHEAD + payload_length;
    if data.len() < total {
        return Err(FrameError::InsufficientData {
            needed: total,
            available: data.len(),
        });
    }

    let crc_end = FRAME_HEADER_SIZE + payload_length;
    let stored = read_u32_le(data, crc_end);
    let mut hasher = Crc32::new();
    hasher.update(&data[..crc_end]);
    let computed = hasher.finalize();
    if stored != computed {
        return Err(FrameError::CorruptedFrame { stored, computed });
    }

    Ok(Event {
        sequence_num,
        timestamp_ns,
        event_type,
        payload: data[FRAME_HEADER_SIZE..crc_end].to_vec(),
    })
}
