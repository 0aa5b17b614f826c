use crate::engine;
use crate::outcome::BatchOutcome;
use crate::transport::{QueryTransport, UdpTransport};
use ip2loc_domain::{ClientConfig, LookupError};
use tracing::debug;

/// A connection to one lookup server.
///
/// A session lives for any number of [`resolve`](Session::resolve) calls and
/// ends with [`close`](Session::close), which is permanent. `resolve` takes
/// `&mut self`: the challenge bookkeeping and the socket's receive deadline
/// belong to a single call at a time, and the borrow checker enforces that
/// instead of a lock.
pub struct Session {
    config: ClientConfig,
    transport: Option<Box<dyn QueryTransport>>,
}

impl Session {
    /// Validate `config`, bind an ephemeral UDP port and connect it to the
    /// configured server. Fails fast on any invalid parameter or socket
    /// failure.
    pub async fn connect(config: ClientConfig) -> Result<Self, LookupError> {
        config.validate()?;
        let transport = UdpTransport::connect(&config.host, config.port).await?;
        debug!(server = %config.host, port = config.port, "session connected");
        Ok(Self {
            config,
            transport: Some(Box::new(transport)),
        })
    }

    /// Build a session over a caller-supplied transport. Lets tests and
    /// embedders drive the engine without a real socket.
    pub fn with_transport(
        config: ClientConfig,
        transport: Box<dyn QueryTransport>,
    ) -> Result<Self, LookupError> {
        config.validate()?;
        Ok(Self {
            config,
            transport: Some(transport),
        })
    }

    /// Resolve a batch of up to 64 IP address strings.
    ///
    /// Returns an outcome holding, for every distinct address in `batch`,
    /// either its location record or the error that kept it unresolved.
    /// `Err` is reserved for call-level failures (closed session, oversized
    /// batch, hard transport errors): no per-address state is returned then.
    pub async fn resolve<S: AsRef<str>>(
        &mut self,
        batch: &[S],
    ) -> Result<BatchOutcome, LookupError> {
        let transport = self
            .transport
            .as_deref()
            .ok_or(LookupError::SessionClosed)?;
        engine::run_batch(transport, &self.config, batch).await
    }

    /// Release the transport. Idempotent; every later `resolve` fails with
    /// `SessionClosed` without touching the network.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!(server = %self.config.host, "session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }
}
