//! X11 Async Event Stream
//!
//! Lets the tokio loop sleep until the X11 socket has data, so signals and
//! X events are awaited together. Events themselves are still read through
//! the connection.

use anyhow::{Context, Result};
use std::os::fd::{AsFd, OwnedFd};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use x11rb::rust_connection::RustConnection;

pub struct X11EventStream {
    fd: AsyncFd<OwnedFd>,
}

impl X11EventStream {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        Self::from_fd(conn.stream())
    }

    /// Watch a duplicate of `source`'s descriptor
    pub fn from_fd(source: impl AsFd) -> Result<Self> {
        let owned = source
            .as_fd()
            .try_clone_to_owned()
            .context("Failed to duplicate X11 socket descriptor")?;
        let fd = AsyncFd::with_interest(owned, Interest::READABLE)
            .context("Failed to register X11 socket with the runtime")?;
        Ok(Self { fd })
    }

    /// Wait until the socket is readable.
    ///
    /// Readiness is cleared before returning; the caller must drain the
    /// connection's queue before waiting again.
    pub async fn wait_readable(&self) -> Result<()> {
        let mut guard = self.fd.readable().await?;
        guard.clear_ready();
        Ok(())
    }
}
