//! Wire codec for the ip2loc packet grammar.
//!
//! Both directions are newline-delimited text. A request carries four fields
//! and a trailing newline; a response splits into exactly eleven fields, two
//! of which must be empty. Anything that deviates is rejected as malformed —
//! a malformed packet is never fatal, it only feeds the flood guard.

use ip2loc_domain::{is_ip_addr, GeoLocation, LookupError};

pub const REQUEST_TAG: &str = "ip2locRequest";
pub const RESPONSE_TAG: &str = "ip2locResponse";
pub const CHALLENGE_PREFIX: &str = "getLocationForIP:";

/// Response datagrams beyond this size are truncated by the read buffer.
pub const MAX_RESPONSE_SIZE: usize = 512;

const RESPONSE_FIELDS: usize = 11;
/// `getLocationForIP:` plus 8 hex digits.
const CHALLENGE_FIELD_LEN: usize = CHALLENGE_PREFIX.len() + 8;

/// Encode one request frame.
pub fn encode_request(password: &str, challenge: u32, ip_addr: &str) -> Vec<u8> {
    format!("{REQUEST_TAG}\n{password}\n{CHALLENGE_PREFIX}{challenge:08x}\n{ip_addr}\n")
        .into_bytes()
}

/// Validated fields of one response frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub ip_addr: String,
    pub challenge: u32,
    pub country_code: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: String,
    pub longitude: String,
}

impl ResponseFrame {
    /// Consume the frame into a location record for its echoed address.
    pub fn into_location(self) -> GeoLocation {
        GeoLocation::from_fields(
            self.country_code,
            self.country,
            self.region,
            self.city,
            &self.latitude,
            &self.longitude,
            self.ip_addr,
        )
    }
}

/// Decode and validate one received datagram.
pub fn parse_response(raw: &[u8]) -> Result<ResponseFrame, LookupError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| malformed("response is not valid UTF-8"))?;

    let fields: Vec<&str> = text.splitn(RESPONSE_FIELDS, '\n').collect();
    if fields.len() != RESPONSE_FIELDS {
        return Err(malformed("response does not split into 11 fields"));
    }
    if fields[0] != RESPONSE_TAG {
        return Err(malformed("missing response tag"));
    }

    let challenge_field = fields[1];
    if challenge_field.len() != CHALLENGE_FIELD_LEN
        || !challenge_field.starts_with(CHALLENGE_PREFIX)
        || !challenge_field.as_bytes()[CHALLENGE_PREFIX.len()..]
            .iter()
            .all(u8::is_ascii_hexdigit)
    {
        return Err(malformed("bad challenge field"));
    }
    let challenge = u32::from_str_radix(&challenge_field[CHALLENGE_PREFIX.len()..], 16)
        .map_err(|_| malformed("bad challenge field"))?;

    if !is_ip_addr(fields[2]) {
        return Err(malformed("echoed address is not an IP address"));
    }
    if !fields[3].is_empty() || !fields[10].is_empty() {
        return Err(malformed("separator fields are not empty"));
    }

    Ok(ResponseFrame {
        ip_addr: fields[2].to_string(),
        challenge,
        country_code: fields[4].to_string(),
        country: fields[5].to_string(),
        region: fields[6].to_string(),
        city: fields[7].to_string(),
        latitude: fields[8].to_string(),
        longitude: fields[9].to_string(),
    })
}

fn malformed(reason: &str) -> LookupError {
    LookupError::MalformedResponse(reason.to_string())
}
