//! Connected-UDP transport.
//!
//! One socket per session, bound to an ephemeral port and connected to the
//! lookup server, so plain `send`/`recv` apply and stray traffic from other
//! peers is filtered by the kernel.

use super::QueryTransport;
use crate::wire::MAX_RESPONSE_SIZE;
use async_trait::async_trait;
use ip2loc_domain::LookupError;
use std::io;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::UdpSocket;
use tracing::debug;

pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an ephemeral port and connect it to `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, LookupError> {
        let server_addr = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| {
                LookupError::TransportFailure(format!("failed to resolve {host}: {e}"))
            })?
            .next()
            .ok_or_else(|| {
                LookupError::TransportFailure(format!("no usable address for {host}"))
            })?;

        // Bind to ephemeral port (0 = OS assigns)
        let bind_addr: SocketAddr = if server_addr.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };

        let socket = UdpSocket::bind(bind_addr).await.map_err(|e| {
            LookupError::TransportFailure(format!("failed to bind UDP socket: {e}"))
        })?;
        socket.connect(server_addr).await.map_err(|e| {
            LookupError::TransportFailure(format!("failed to connect to {server_addr}: {e}"))
        })?;

        debug!(server = %server_addr, "UDP transport connected");
        Ok(Self { socket })
    }
}

#[async_trait]
impl QueryTransport for UdpTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), LookupError> {
        self.socket
            .send(payload)
            .await
            .map(|_| ())
            .map_err(|e| LookupError::WriteFailure(format!("send failed: {e}")))
    }

    async fn recv_until(&self, deadline: Instant) -> Result<Option<Vec<u8>>, LookupError> {
        let mut buf = vec![0u8; MAX_RESPONSE_SIZE];

        // Past the deadline: drain whatever is queued without waiting.
        if Instant::now() >= deadline {
            return match self.socket.try_recv(&mut buf) {
                Ok(len) => {
                    buf.truncate(len);
                    Ok(Some(buf))
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
                Err(e) => Err(LookupError::TransportFailure(format!("recv failed: {e}"))),
            };
        }

        match tokio::time::timeout_at(deadline.into(), self.socket.recv(&mut buf)).await {
            Ok(Ok(len)) => {
                buf.truncate(len);
                Ok(Some(buf))
            }
            Ok(Err(e)) => Err(LookupError::TransportFailure(format!("recv failed: {e}"))),
            Err(_) => Ok(None),
        }
    }
}
