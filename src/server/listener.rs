//! TCP listener for the shell server.
//!
//! Accepting is gated by a semaphore sized to the configured connection
//! limit: `accept` hands out a slot permit along with the stream, and the
//! slot frees itself when the permit drops at the end of the session task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::{Result, TelshellError};

/// Bound listener with a fixed number of connection slots.
pub struct Listener {
    inner: TcpListener,
    slots: Arc<Semaphore>,
    capacity: usize,
}

/// One occupied connection slot; dropping it frees the slot.
pub struct ConnectionPermit(OwnedSemaphorePermit);

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let inner = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let local = inner.local_addr()?;
        info!(%local, capacity = config.max_connections, "telnet listener bound");

        Ok(Self {
            inner,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            capacity: config.max_connections,
        })
    }

    /// The local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Total number of connection slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently occupied by live connections.
    pub fn in_use(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Accept the next connection once a slot is free.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit)> {
        let permit = match Arc::clone(&self.slots).acquire_owned().await {
            Ok(permit) => ConnectionPermit(permit),
            Err(_) => return Err(TelshellError::Closed),
        };
        let (stream, addr) = self.inner.accept().await?;
        debug!(%addr, in_use = self.in_use(), "connection accepted");
        Ok((stream, addr, permit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(max_connections: usize) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_connections,
        }
    }

    #[tokio::test]
    async fn test_bind_reports_capacity() {
        let listener = Listener::bind(&config(4)).await.unwrap();
        assert!(listener.local_addr().is_ok());
        assert_eq!(listener.capacity(), 4);
        assert_eq!(listener.in_use(), 0);
    }

    #[tokio::test]
    async fn test_slots_fill_and_release() {
        let listener = Listener::bind(&config(2)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _c1 = TcpStream::connect(addr).await.unwrap();
        let (_s1, peer, p1) = listener.accept().await.unwrap();
        assert_eq!(peer, _c1.local_addr().unwrap());

        let _c2 = TcpStream::connect(addr).await.unwrap();
        let (_s2, _, p2) = listener.accept().await.unwrap();
        assert_eq!(listener.in_use(), 2);

        drop(p1);
        assert_eq!(listener.in_use(), 1);
        drop(p2);
        assert_eq!(listener.in_use(), 0);
    }

    #[tokio::test]
    async fn test_accept_waits_for_a_free_slot() {
        let listener = Listener::bind(&config(1)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _c1 = TcpStream::connect(addr).await.unwrap();
        let (_s1, _, permit) = listener.accept().await.unwrap();

        // A second client can connect, but with the only slot taken the
        // accept does not complete.
        let _c2 = TcpStream::connect(addr).await.unwrap();
        let waited = tokio::time::timeout(Duration::from_millis(50), listener.accept()).await;
        assert!(waited.is_err());

        drop(permit);
        let accepted = tokio::time::timeout(Duration::from_secs(1), listener.accept()).await;
        let (_s2, _, _p2) = accepted.unwrap().unwrap();
        assert_eq!(listener.in_use(), 1);
    }
}
