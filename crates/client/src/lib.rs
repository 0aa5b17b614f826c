//! Client for the ip2loc UDP lookup protocol.
//!
//! Resolves batches of IPv4 address strings into geolocation records from a
//! remote lookup service. Each request carries a random anti-spoof challenge
//! that the server must echo; the engine retries unanswered requests across
//! bounded rounds and reports a definite location or error for every address
//! in the batch.
//!
//! ```no_run
//! use ip2loc_client::{ClientConfig, Session};
//!
//! # async fn demo() -> Result<(), ip2loc_client::LookupError> {
//! let mut session = Session::connect(ClientConfig::new("secret")).await?;
//! let outcome = session.resolve(&["99.50.206.241"]).await?;
//! if let Some(location) = outcome.location("99.50.206.241") {
//!     println!("{} is in {}", location.ip_addr, location.country);
//! }
//! session.close();
//! # Ok(())
//! # }
//! ```

mod challenge;
mod engine;
pub mod outcome;
mod session;
pub mod transport;
pub mod wire;

pub use engine::MAX_BATCH_SIZE;
pub use ip2loc_domain::{is_ip_addr, ClientConfig, GeoLocation, LookupError};
pub use outcome::BatchOutcome;
pub use session::Session;
pub use transport::{QueryTransport, UdpTransport};
