use std::time::{SystemTime, UNIX_EPOCH};

/// Microsecond wall-clock sample, truncated to 32 bits. Taken once per send
/// phase and mixed into every challenge issued during that phase.
pub(crate) fn clock_sample() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u32)
        .unwrap_or(0)
}

/// A fresh 32-bit challenge, never zero.
///
/// Zero is reserved on the wire as "challenge absent", so the mix is redrawn
/// until it is non-zero. Two PRNG draws cover the high and low halves; the
/// clock sample perturbs both.
pub(crate) fn next_challenge(clock_sample: u32) -> u32 {
    loop {
        let mixed = (fastrand::u32(..) << 16) ^ (fastrand::u32(..) & 0xffff) ^ clock_sample;
        if mixed != 0 {
            return mixed;
        }
    }
}
