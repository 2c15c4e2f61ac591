//! Readiness multiplexer wrapping the OS polling interface.
//!
//! The poller never owns a descriptor: callers register raw fds and remain
//! responsible for closing them. Events are edge-triggered, so a writable
//! event on a pending connect is terminal and must be consumed.

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Readiness flags reported for one descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub writable: bool,
    pub readable: bool,
    pub error: bool,
    pub hangup: bool,
}

/// Bounded wrapper around `mio::Poll`.
pub struct Poller {
    poll: Poll,
    events: Events,
}

impl Poller {
    /// Create the poll instance. Failure here is fatal to the scan.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(crate::config::MAX_CONCURRENCY),
        })
    }

    /// Register a descriptor for write-readiness under `token`.
    pub fn register_writable(&self, fd: RawFd, token: usize) -> io::Result<()> {
        self.poll
            .registry()
            .register(&mut SourceFd(&fd), Token(token), Interest::WRITABLE)
    }

    /// Change the interest set of an already registered descriptor.
    pub fn modify(&self, fd: RawFd, token: usize, readable: bool, writable: bool) -> io::Result<()> {
        let interest = match (readable, writable) {
            (true, true) => Interest::READABLE.add(Interest::WRITABLE),
            (true, false) => Interest::READABLE,
            (false, true) => Interest::WRITABLE,
            (false, false) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "empty interest set",
                ))
            }
        };
        self.poll
            .registry()
            .reregister(&mut SourceFd(&fd), Token(token), interest)
    }

    /// Remove a descriptor from the interest set. The fd stays open.
    pub fn unregister(&self, fd: RawFd) -> io::Result<()> {
        self.poll.registry().deregister(&mut SourceFd(&fd))
    }

    /// Block until readiness or timeout. `EINTR` reads as an empty event
    /// set; the caller's deadline sweep handles the spurious wakeup.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<Vec<(usize, Readiness)>> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }

        Ok(self
            .events
            .iter()
            .map(|ev| {
                (
                    ev.token().0,
                    Readiness {
                        writable: ev.is_writable(),
                        readable: ev.is_readable(),
                        error: ev.is_error(),
                        hangup: ev.is_read_closed() || ev.is_write_closed(),
                    },
                )
            })
            .collect())
    }
}
