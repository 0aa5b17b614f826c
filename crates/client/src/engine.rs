//! The batched query engine.
//!
//! One `run_batch` call drives up to `retries + 1` send/receive rounds over
//! the session transport. Per-address state lives in a [`BatchState`];
//! the most recent generic error is threaded through the round functions as
//! an explicit value and only consulted at reconciliation, so every path
//! that can fail an address is auditable in one place.

use crate::challenge;
use crate::outcome::BatchOutcome;
use crate::transport::QueryTransport;
use crate::wire;
use ip2loc_domain::{is_ip_addr, ClientConfig, GeoLocation, LookupError};
use rustc_hash::FxHashMap;
use std::time::Instant;
use tracing::{debug, warn};

/// Upper bound on addresses per `resolve` call.
pub const MAX_BATCH_SIZE: usize = 64;

/// Malformed/duplicate packets tolerated after the deadline before the
/// round's receive phase is abandoned.
const FLOOD_THRESHOLD: u32 = 1024;

struct PendingEntry {
    format_ok: bool,
    /// Every challenge ever sent for this address, across all rounds.
    /// Grows monotonically; a response may answer any of them.
    sent_challenges: Vec<u32>,
    location: Option<GeoLocation>,
    /// Most recent send failure, kept for final attribution even if a later
    /// round's send succeeded.
    write_error: Option<LookupError>,
    bad_challenge: bool,
}

impl PendingEntry {
    fn new(format_ok: bool) -> Self {
        Self {
            format_ok,
            sent_challenges: Vec::new(),
            location: None,
            write_error: None,
            bad_challenge: false,
        }
    }

    fn unresolved_and_valid(&self) -> bool {
        self.format_ok && self.location.is_none()
    }
}

struct BatchState {
    /// Distinct addresses in input order; drives send ordering.
    order: Vec<String>,
    entries: FxHashMap<String, PendingEntry>,
    /// Valid-format addresses still waiting for a location.
    remaining: usize,
}

impl BatchState {
    fn new<S: AsRef<str>>(batch: &[S]) -> Self {
        let mut order = Vec::with_capacity(batch.len());
        let mut entries =
            FxHashMap::with_capacity_and_hasher(batch.len(), Default::default());
        let mut remaining = 0;
        for ip_addr in batch {
            let ip_addr = ip_addr.as_ref();
            if entries.contains_key(ip_addr) {
                continue;
            }
            let format_ok = is_ip_addr(ip_addr);
            if format_ok {
                remaining += 1;
            }
            order.push(ip_addr.to_string());
            entries.insert(ip_addr.to_string(), PendingEntry::new(format_ok));
        }
        Self {
            order,
            entries,
            remaining,
        }
    }
}

pub(crate) async fn run_batch<S: AsRef<str>>(
    transport: &dyn QueryTransport,
    config: &ClientConfig,
    batch: &[S],
) -> Result<BatchOutcome, LookupError> {
    if batch.len() > MAX_BATCH_SIZE {
        return Err(LookupError::InvalidArgument(format!(
            "batch holds {} addresses, limit is {MAX_BATCH_SIZE}",
            batch.len()
        )));
    }

    let mut state = BatchState::new(batch);
    let mut last_error: Option<LookupError> = None;

    for attempt in 0..=config.retries() {
        if state.remaining == 0 {
            break;
        }
        send_requests(transport, config, &mut state, attempt).await;
        let deadline = Instant::now() + config.timeout();
        last_error = drain_responses(transport, deadline, &mut state, last_error).await?;
    }

    reconcile(state, last_error)
}

/// Send one freshly-challenged request per unresolved valid address. Send
/// failures are recorded on the address and do not stop the phase: requests
/// from earlier rounds may still be answered during this round's window.
async fn send_requests(
    transport: &dyn QueryTransport,
    config: &ClientConfig,
    state: &mut BatchState,
    attempt: u32,
) {
    let clock_sample = challenge::clock_sample();
    let BatchState { order, entries, .. } = state;
    for ip_addr in order.iter() {
        let Some(entry) = entries.get_mut(ip_addr) else {
            continue;
        };
        if !entry.unresolved_and_valid() {
            continue;
        }
        let challenge = challenge::next_challenge(clock_sample);
        entry.sent_challenges.push(challenge);
        let frame = wire::encode_request(&config.password, challenge, ip_addr);
        match transport.send(&frame).await {
            Ok(()) => {
                debug!(address = %ip_addr, attempt, challenge, "request sent");
            }
            Err(error) => {
                warn!(address = %ip_addr, attempt, %error, "request send failed");
                entry.write_error = Some(error);
            }
        }
    }
}

/// One round's receive phase. Returns the updated generic error; `Err` only
/// for hard transport failures, which abort the whole call.
async fn drain_responses(
    transport: &dyn QueryTransport,
    deadline: Instant,
    state: &mut BatchState,
    mut last_error: Option<LookupError>,
) -> Result<Option<LookupError>, LookupError> {
    let mut bad_after_deadline: u32 = 0;

    loop {
        if state.remaining == 0 {
            return Ok(last_error);
        }
        if bad_after_deadline > FLOOD_THRESHOLD {
            warn!(bad_packets = bad_after_deadline, "flood guard tripped, abandoning round");
            return Ok(Some(LookupError::FloodGuardTripped));
        }

        // Bad-packet accounting applies only to packets drained after the
        // deadline; a hostile peer cannot spin this loop forever.
        let past_deadline = Instant::now() >= deadline;

        let raw = match transport.recv_until(deadline).await? {
            Some(raw) => raw,
            None => {
                // Would-block or timed out: the round is over. Keep an
                // earlier, more specific error if one was recorded.
                if last_error.is_none() {
                    last_error = Some(LookupError::Timeout);
                }
                return Ok(last_error);
            }
        };

        let frame = match wire::parse_response(&raw) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, bytes = raw.len(), "discarding packet");
                if past_deadline {
                    bad_after_deadline += 1;
                }
                last_error = Some(error);
                continue;
            }
        };

        let Some(entry) = state.entries.get_mut(&frame.ip_addr) else {
            warn!(address = %frame.ip_addr, "response for an address we never asked about");
            if past_deadline {
                bad_after_deadline += 1;
            }
            last_error = Some(LookupError::MalformedResponse(
                "echoed address is not part of this batch".to_string(),
            ));
            continue;
        };

        if entry.location.is_some() {
            // Duplicate or replay; never overwrite a resolved address.
            if past_deadline {
                bad_after_deadline += 1;
            }
            last_error = Some(LookupError::DuplicateResponse);
            continue;
        }

        // Zero is never issued, and a response may answer a challenge from
        // any earlier round, so match against the full history.
        let matched = frame.challenge != 0
            && entry
                .sent_challenges
                .iter()
                .rev()
                .any(|&sent| sent == frame.challenge);
        if !matched {
            warn!(address = %frame.ip_addr, challenge = frame.challenge, "challenge mismatch");
            entry.bad_challenge = true;
            if past_deadline {
                bad_after_deadline += 1;
            }
            continue;
        }

        debug!(address = %frame.ip_addr, "location resolved");
        entry.location = Some(frame.into_location());
        state.remaining -= 1;
    }
}

/// Assign every address its final location or error.
///
/// Error attribution order for an unresolved address: format error, then
/// challenge mismatch, then recorded send failure, then the most recent
/// generic error of the call. Violations of the one-entry-per-address
/// accounting are engine defects and surface as `InternalInvariant`, never
/// as a per-address error.
fn reconcile(
    state: BatchState,
    last_error: Option<LookupError>,
) -> Result<BatchOutcome, LookupError> {
    let BatchState {
        order,
        mut entries,
        mut remaining,
    } = state;
    let generic_error = last_error.unwrap_or(LookupError::Unknown);

    let mut locations = FxHashMap::with_capacity_and_hasher(order.len(), Default::default());
    let mut errors = FxHashMap::with_capacity_and_hasher(order.len(), Default::default());

    for ip_addr in &order {
        let entry = entries.remove(ip_addr).ok_or_else(|| {
            LookupError::InternalInvariant(format!("no pending entry for {ip_addr}"))
        })?;
        match entry.location {
            Some(location) => {
                if !entry.format_ok {
                    return Err(LookupError::InternalInvariant(format!(
                        "{ip_addr} resolved despite failing validation"
                    )));
                }
                locations.insert(ip_addr.clone(), location);
            }
            None => {
                let error = if !entry.format_ok {
                    LookupError::InvalidFormat
                } else if entry.bad_challenge {
                    LookupError::IncorrectChallenge
                } else if let Some(write_error) = entry.write_error {
                    write_error
                } else {
                    generic_error.clone()
                };
                errors.insert(ip_addr.clone(), error);
                if entry.format_ok {
                    remaining = remaining.checked_sub(1).ok_or_else(|| {
                        LookupError::InternalInvariant(
                            "completion counter underflow".to_string(),
                        )
                    })?;
                }
            }
        }
    }

    if remaining != 0 {
        return Err(LookupError::InternalInvariant(format!(
            "completion counter ended at {remaining}"
        )));
    }
    if locations.len() + errors.len() != order.len() {
        return Err(LookupError::InternalInvariant(
            "location and error entries do not cover the batch".to_string(),
        ));
    }

    Ok(BatchOutcome::new(order, locations, errors))
}
