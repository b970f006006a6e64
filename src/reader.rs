//! Read side of the event log.
//!
//! The reader memory-maps the log read-only and walks frames sequentially.
//! A short tail (fewer bytes than a complete frame) is the normal state
//! while the writer is between appends and reads as end-of-stream, never as
//! an error. When the file grows, [`EventLogReader::remap_if_grown`] swaps
//! in a mapping of the new length without disturbing the read cursor.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;
use tracing::debug;

use crate::frame::{
    decode_frame, parse_file_header, read_u32_le, Event, FileHeader, FrameError,
    FILE_HEADER_SIZE, FRAME_HEADER_SIZE, FRAME_OVERHEAD,
};

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("event log i/o: {0}")]
    Io(#[from] io::Error),

    #[error("event log too small: {size} bytes")]
    TooSmall { size: u64 },

    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub struct EventLogReader {
    file: File,
    mmap: Mmap,
    offset: usize,
    header: FileHeader,
    path: PathBuf,
}

impl EventLogReader {
    /// Open and map the log read-only. Fails when the file is shorter than
    /// the 16-byte header or the header does not validate.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        if size < FILE_HEADER_SIZE as u64 {
            return Err(ReadError::TooSmall { size });
        }

        let mmap = unsafe { Mmap::map(&file)? };
        #[cfg(unix)]
        let _ = mmap.advise(memmap2::Advice::Sequential);

        let header = parse_file_header(&mmap)?;
        debug!(path = %path.display(), size, "opened event log for reading");

        Ok(Self {
            file,
            mmap,
            offset: FILE_HEADER_SIZE,
            header,
            path: path.to_path_buf(),
        })
    }

    /// Read the next complete frame.
    ///
    /// `Ok(None)` means end of stream: either true EOF or a torn tail still
    /// being written. A CRC mismatch on a fully present frame surfaces as
    /// [`FrameError::CorruptedFrame`].
    pub fn read_next(&mut self) -> Result<Option<Event>, ReadError> {
        let size = self.mmap.len();
        if self.offset >= size || self.offset + FRAME_HEADER_SIZE > size {
            return Ok(None);
        }

        let payload_length = read_u32_le(&self.mmap, self.offset + 20) as usize;
        let total = FRAME_OVERHEAD + payload_length;
        if self.offset + total > size {
            return Ok(None);
        }

        let event = decode_frame(&self.mmap[self.offset..self.offset + total])?;
        self.offset += total;
        Ok(Some(event))
    }

    /// Re-stat the file and, if it grew past the mapped length, replace the
    /// mapping. The read cursor is preserved. Returns whether a remap
    /// happened.
    pub fn remap_if_grown(&mut self) -> io::Result<bool> {
        let new_size = self.file.metadata()?.len();
        if new_size <= self.mmap.len() as u64 {
            return Ok(false);
        }

        let mmap = unsafe { Mmap::map(&self.file)? };
        #[cfg(unix)]
        let _ = mmap.advise(memmap2::Advice::Sequential);

        debug!(
            path = %self.path.display(),
            old = self.mmap.len(),
            new = mmap.len(),
            "remapped grown event log"
        );
        self.mmap = mmap;
        Ok(true)
    }

    pub fn header(&self) -> FileHeader {
        self.header
    }

    /// Current read position in bytes from the start of the file.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the currently mapped region.
    pub fn file_size(&self) -> usize {
        self.mmap.len()
    }

    pub fn eof(&self) -> bool {
        self.offset >= self.mmap.len()
    }
}
