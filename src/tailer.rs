//! Blocking wait for event-log growth.
//!
//! On Linux the tailer owns a non-blocking inotify descriptor watching the
//! log for modify and close-write events, and parks the caller in `poll`
//! until the descriptor turns readable or the timeout elapses. On every
//! other platform it falls back to stat-polling the file size with
//! exponential backoff between 10 ms and 100 ms.

use std::io;
use std::path::Path;

#[cfg(not(target_os = "linux"))]
use std::path::PathBuf;
#[cfg(not(target_os = "linux"))]
use std::time::{Duration, Instant};

use tracing::debug;

/// Smallest polling interval in milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;
/// Polling backoff cap in milliseconds.
pub const MAX_POLL_INTERVAL_MS: u64 = 100;

#[cfg(target_os = "linux")]
pub struct LogTailer {
    inotify_fd: libc::c_int,
    watch_fd: libc::c_int,
}

#[cfg(not(target_os = "linux"))]
pub struct LogTailer {
    path: PathBuf,
    last_known_size: u64,
    poll_interval_ms: u64,
}

#[cfg(target_os = "linux")]
impl LogTailer {
    /// Start watching `path`. The file must already exist.
    pub fn init(path: impl AsRef<Path>) -> io::Result<Self> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let inotify_fd =
            unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
        if inotify_fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let c_path = CString::new(path.as_ref().as_os_str().as_bytes())
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        let watch_fd = unsafe {
            libc::inotify_add_watch(
                inotify_fd,
                c_path.as_ptr(),
                libc::IN_MODIFY | libc::IN_CLOSE_WRITE,
            )
        };
        if watch_fd < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(inotify_fd) };
            return Err(err);
        }

        debug!(path = %path.as_ref().display(), "inotify watch established");
        Ok(Self {
            inotify_fd,
            watch_fd,
        })
    }

    /// Block until the watched file is modified. `timeout_ms` of 0 waits
    /// forever. Returns `false` on timeout, and also when the wait is cut
    /// short by a signal so the caller can re-check its shutdown flag.
    pub fn wait_for_modification(&mut self, timeout_ms: u64) -> io::Result<bool> {
        let timeout = if timeout_ms == 0 {
            -1
        } else {
            timeout_ms.min(libc::c_int::MAX as u64) as libc::c_int
        };

        let mut pfd = libc::pollfd {
            fd: self.inotify_fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ready = unsafe { libc::poll(&mut pfd, 1, timeout) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        if ready == 0 {
            return Ok(false);
        }

        // Drain every queued notification; the fd is non-blocking, so the
        // read returns EAGAIN once empty.
        let mut buf = [0u8; 4096];
        loop {
            let n = unsafe {
                libc::read(
                    self.inotify_fd,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                )
            };
            if n <= 0 {
                break;
            }
        }
        Ok(true)
    }

    /// Whether a kernel notification primitive backs the wait.
    pub fn is_native(&self) -> bool {
        true
    }
}

#[cfg(target_os = "linux")]
impl Drop for LogTailer {
    fn drop(&mut self) {
        unsafe {
            libc::inotify_rm_watch(self.inotify_fd, self.watch_fd);
            libc::close(self.inotify_fd);
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl LogTailer {
    /// Start watching `path` by polling its size.
    pub fn init(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let last_known_size = std::fs::metadata(&path)?.len();
        debug!(path = %path.display(), "size polling fallback in use");
        Ok(Self {
            path,
            last_known_size,
            poll_interval_ms: MIN_POLL_INTERVAL_MS,
        })
    }

    /// Poll until the file grows past the last observed size. `timeout_ms`
    /// of 0 waits forever. Returns `false` on timeout.
    pub fn wait_for_modification(&mut self, timeout_ms: u64) -> io::Result<bool> {
        let start = Instant::now();
        loop {
            let size = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
            if size > self.last_known_size {
                self.last_known_size = size;
                self.poll_interval_ms = MIN_POLL_INTERVAL_MS;
                return Ok(true);
            }

            if timeout_ms > 0 && start.elapsed() >= Duration::from_millis(timeout_ms) {
                return Ok(false);
            }

            std::thread::sleep(Duration::from_millis(self.poll_interval_ms));
            self.poll_interval_ms = (self.poll_interval_ms * 2).min(MAX_POLL_INTERVAL_MS);
        }
    }

    /// Whether a kernel notification primitive backs the wait.
    pub fn is_native(&self) -> bool {
        false
    }
}
