use serde::Serialize;

/// One resolved geolocation record.
///
/// Built exactly once per address, from the fields of a validated response,
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoLocation {
    pub country_code: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    /// The address this record answers, echoed back by the server.
    pub ip_addr: String,
}

impl GeoLocation {
    /// Build a record from response frame fields. Latitude and longitude
    /// arrive as decimal strings; text that does not parse yields 0.0 rather
    /// than failing the match.
    pub fn from_fields(
        country_code: String,
        country: String,
        region: String,
        city: String,
        latitude: &str,
        longitude: &str,
        ip_addr: String,
    ) -> Self {
        Self {
            country_code,
            country,
            region,
            city,
            latitude: latitude.parse().unwrap_or(0.0),
            longitude: longitude.parse().unwrap_or(0.0),
            ip_addr,
        }
    }
}
