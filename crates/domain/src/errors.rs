use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LookupError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not an IP address")]
    InvalidFormat,

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Request send failed: {0}")]
    WriteFailure(String),

    #[error("Timed out waiting for a response")]
    Timeout,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Duplicate response")]
    DuplicateResponse,

    #[error("Incorrect challenge in response")]
    IncorrectChallenge,

    #[error("Packet flood detected")]
    FloodGuardTripped,

    #[error("Session has been closed")]
    SessionClosed,

    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("Unknown error")]
    Unknown,
}
