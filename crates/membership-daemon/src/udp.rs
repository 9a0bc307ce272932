//! UDP transport for a single daemon node.
//!
//! The engine's `Transport::send` must not block, so it only pushes onto an
//! unbounded channel. A send task drains that channel into the socket, and a
//! receive task forwards every inbound datagram to a second channel that
//! `recv` empties without waiting.

use std::io::ErrorKind;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use membership_core::transport::{self, TransportError};
use membership_core::{Endpoint, Transport};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Largest datagram we accept. Anything bigger is truncated by the OS and
/// then rejected by the codec.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Pause after a receive error that is not a stale ICMP report.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Datagram transport over one tokio `UdpSocket`.
pub struct UdpTransport {
    local: Endpoint,
    outgoing_tx: mpsc::UnboundedSender<(SocketAddrV4, Vec<u8>)>,
    incoming_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    send_task: JoinHandle<()>,
    recv_task: JoinHandle<()>,
}

impl UdpTransport {
    /// Bind a socket and spawn its send and receive tasks.
    ///
    /// The bound address is the node's endpoint, so it must be one peers can
    /// reach: `0.0.0.0` is rejected. Must be called from within a tokio runtime.
    pub async fn bind(addr: SocketAddrV4) -> Result<Self> {
        if addr.ip().is_unspecified() {
            bail!(
                "Cannot bind to unspecified address {}: peers would be told to reply to it",
                addr
            );
        }
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("Failed to bind UDP socket on {}", addr))?;
        let local = match socket.local_addr()? {
            SocketAddr::V4(bound) => Endpoint::from(bound),
            SocketAddr::V6(bound) => bail!("Bound to IPv6 address {}, expected IPv4", bound),
        };
        debug!("UDP transport listening on {}", local.to_socket_addr());

        let socket = Arc::new(socket);
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        let send_task = tokio::spawn(Self::send_loop(Arc::clone(&socket), outgoing_rx));
        let recv_task = tokio::spawn(Self::recv_loop(socket, incoming_tx));

        Ok(Self {
            local,
            outgoing_tx,
            incoming_rx,
            send_task,
            recv_task,
        })
    }

    /// Endpoint of the bound socket.
    pub fn local(&self) -> Endpoint {
        self.local
    }

    /// Wait for the next inbound datagram.
    ///
    /// Returns `None` once the receive task has stopped.
    pub async fn readable(&mut self) -> Option<Vec<u8>> {
        self.incoming_rx.recv().await
    }

    async fn send_loop(
        socket: Arc<UdpSocket>,
        mut outgoing_rx: mpsc::UnboundedReceiver<(SocketAddrV4, Vec<u8>)>,
    ) {
        while let Some((to, data)) = outgoing_rx.recv().await {
            match socket.send_to(&data, to).await {
                Ok(sent) => trace!("Sent {} bytes to {}", sent, to),
                Err(e) => warn!("UDP send to {} failed: {}", to, e),
            }
        }
        debug!("UDP send loop finished");
    }

    async fn recv_loop(socket: Arc<UdpSocket>, incoming_tx: mpsc::UnboundedSender<Vec<u8>>) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, from)) => {
                    trace!("Received {} bytes from {}", len, from);
                    if incoming_tx.send(buf[..len].to_vec()).is_err() {
                        break;
                    }
                }
                // ICMP port-unreachable from an earlier send surfaces here on some platforms
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
                    ) =>
                {
                    debug!("UDP receive error: {}", e);
                }
                Err(e) => {
                    warn!("UDP receive error: {}", e);
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                }
            }
        }
        debug!("UDP receive loop finished");
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, _from: Endpoint, to: Endpoint, data: &[u8]) -> transport::Result<()> {
        self.outgoing_tx
            .send((to.to_socket_addr(), data.to_vec()))
            .map_err(|_| TransportError::Closed)
    }

    fn recv(&mut self, at: Endpoint) -> Vec<Vec<u8>> {
        if at != self.local {
            return Vec::new();
        }
        let mut received = Vec::new();
        while let Ok(data) = self.incoming_rx.try_recv() {
            received.push(data);
        }
        received
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.send_task.abort();
        self.recv_task.abort();
    }
}
