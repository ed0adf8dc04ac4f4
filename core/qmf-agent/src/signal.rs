//! Host notification strategies for external-thread method handoff.
//!
//! When the host runs methods on its own thread, queued invocations are
//! announced through one of three transports sharing the same queue: a
//! self-pipe file descriptor the host polls, a plain callback, or a
//! [`Notifiable`] object.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use tracing::warn;

/// Object notified when a method request is queued.
pub trait Notifiable: Send + Sync {
    /// Called (outside the agent lock) after an invocation is queued.
    fn notify(&self);
}

/// Callback-style notification target.
#[derive(Clone)]
pub enum NotifyTarget {
    /// Plain callback.
    Callback(Arc<dyn Fn() + Send + Sync>),
    /// Notifiable object.
    Notifiable(Arc<dyn Notifiable>),
}

impl NotifyTarget {
    /// Fires the notification.
    pub fn notify(&self) {
        match self {
            NotifyTarget::Callback(callback) => callback(),
            NotifyTarget::Notifiable(notifiable) => notifiable.notify(),
        }
    }
}

impl fmt::Debug for NotifyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyTarget::Callback(_) => f.write_str("NotifyTarget::Callback"),
            NotifyTarget::Notifiable(_) => f.write_str("NotifyTarget::Notifiable"),
        }
    }
}

/// Self-pipe used to signal the host's poll loop.
///
/// Both ends are non-blocking: a full buffer just means the host already
/// has plenty of unread signal bytes.
#[derive(Debug)]
pub struct SignalPipe {
    reader: UnixStream,
    writer: UnixStream,
}

impl SignalPipe {
    /// Creates the pipe.
    pub fn new() -> std::io::Result<Self> {
        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        writer.set_nonblocking(true)?;
        Ok(Self { reader, writer })
    }

    /// File descriptor the host polls for readability.
    #[must_use]
    pub fn read_fd(&self) -> RawFd {
        self.reader.as_raw_fd()
    }

    /// Writes one signaling byte; best-effort.
    pub fn signal(&self) {
        if let Err(e) = (&self.writer).write(b"X") {
            if e.kind() != ErrorKind::WouldBlock {
                warn!("signal pipe write failed: {}", e);
            }
        }
    }

    /// Consumes all pending signaling bytes.
    pub fn drain(&self) {
        let mut buf = [0u8; 100];
        while matches!((&self.reader).read(&mut buf), Ok(n) if n > 0) {}
    }
}

/// How queued method requests are announced to the host.
///
/// Strategies are mutually exclusive; the last registration wins.
#[derive(Debug, Default)]
pub enum SignalMode {
    /// No notification; the host polls on its own schedule.
    #[default]
    None,
    /// Self-pipe signaling (see `signal_fd`).
    Pipe(SignalPipe),
    /// Invoke a host callback outside the agent lock.
    Callback(NotifyTarget),
}
