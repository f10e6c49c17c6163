//! ## minnessyn-runtime::transport
//! **The viewer transport boundary**
//!
//! Sockets, pipes and the viewer handshake live on the host's side of
//! this trait; the runtime only needs a blocking peer wait and a
//! non-blocking best-effort write. `MemTransport` is the in-process
//! implementation used by tests and embedders that consume the stream
//! directly.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("no viewer connection available")]
    Unavailable,
    #[error("viewer closed the connection")]
    Closed,
    #[error("transport failure: {0}")]
    Failed(String),
}

/// Byte-oriented connection to the viewer, supplied by the host.
pub trait Transport {
    /// Blocks until a viewer attaches, or fails with a retryable error.
    /// Timeout and cancellation policy belong to the implementation.
    fn wait_for_peer(&mut self) -> Result<(), TransportError>;

    /// Writes as much of `buf` as the connection will take right now.
    /// `Ok(0)` signals backpressure, never end-of-stream.
    fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Releases the connection. Called once at session teardown.
    fn close(&mut self);
}

/// Loopback transport collecting the stream into memory.
#[derive(Debug, Default)]
pub struct MemTransport {
    connected: bool,
    refuse_peers: bool,
    write_quota: Option<usize>,
    sink: Vec<u8>,
}

impl MemTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose peer wait always fails, for exercising the
    /// retry path.
    pub fn refusing() -> Self {
        Self {
            refuse_peers: true,
            ..Self::default()
        }
    }

    /// Caps how many further bytes `try_write` will accept in total;
    /// `None` lifts the cap.
    pub fn set_write_quota(&mut self, quota: Option<usize>) {
        self.write_quota = quota;
    }

    /// Everything written so far.
    pub fn received(&self) -> &[u8] {
        &self.sink
    }

    pub fn into_received(self) -> Vec<u8> {
        self.sink
    }
}

impl Transport for MemTransport {
    fn wait_for_peer(&mut self) -> Result<(), TransportError> {
        if self.refuse_peers {
            return Err(TransportError::Unavailable);
        }
        self.connected = true;
        Ok(())
    }

    fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        if !self.connected {
            return Err(TransportError::Unavailable);
        }
        let n = match self.write_quota.as_mut() {
            Some(quota) => {
                let n = buf.len().min(*quota);
                *quota -= n;
                n
            }
            None => buf.len(),
        };
        self.sink.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn close(&mut self) {
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_throttles_writes() {
        let mut transport = MemTransport::new();
        transport.wait_for_peer().unwrap();
        transport.set_write_quota(Some(4));
        assert_eq!(transport.try_write(b"abcdef").unwrap(), 4);
        assert_eq!(transport.try_write(b"ef").unwrap(), 0);
        transport.set_write_quota(None);
        assert_eq!(transport.try_write(b"ef").unwrap(), 2);
        assert_eq!(transport.received(), b"abcdef");
    }

    #[test]
    fn writes_before_peer_are_refused() {
        let mut transport = MemTransport::new();
        assert_eq!(
            transport.try_write(b"x").unwrap_err(),
            TransportError::Unavailable
        );
    }
}
