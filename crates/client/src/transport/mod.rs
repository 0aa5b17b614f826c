pub mod udp;

use async_trait::async_trait;
use ip2loc_domain::LookupError;
use std::time::Instant;

pub use udp::UdpTransport;

/// The socket seam of the query engine.
///
/// One implementation speaks to a real connected UDP socket; tests drive the
/// engine through scripted implementations.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Send one request datagram.
    async fn send(&self, payload: &[u8]) -> Result<(), LookupError>;

    /// Receive one datagram, blocking until `deadline` at the latest. Once
    /// the deadline has passed this must not wait: it drains packets already
    /// queued and reports `Ok(None)` when the queue is empty.
    ///
    /// `Ok(None)` is the would-block/timed-out outcome and ends a receive
    /// phase; `Err` is a hard transport failure and aborts the whole call.
    async fn recv_until(&self, deadline: Instant) -> Result<Option<Vec<u8>>, LookupError>;
}
