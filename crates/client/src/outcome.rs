use ip2loc_domain::{GeoLocation, LookupError};
use rustc_hash::FxHashMap;

/// Final state of one `resolve` call.
///
/// Every address of the batch appears in exactly one of the two maps: a
/// location for addresses that resolved, an error for those that did not.
/// The engine verifies that property before handing the outcome back, so a
/// lookup by either accessor tells the whole story for an address.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    order: Vec<String>,
    locations: FxHashMap<String, GeoLocation>,
    errors: FxHashMap<String, LookupError>,
}

impl BatchOutcome {
    pub(crate) fn new(
        order: Vec<String>,
        locations: FxHashMap<String, GeoLocation>,
        errors: FxHashMap<String, LookupError>,
    ) -> Self {
        Self {
            order,
            locations,
            errors,
        }
    }

    /// Number of distinct addresses in the batch.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Batch addresses in send order.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn location(&self, ip_addr: &str) -> Option<&GeoLocation> {
        self.locations.get(ip_addr)
    }

    pub fn error(&self, ip_addr: &str) -> Option<&LookupError> {
        self.errors.get(ip_addr)
    }

    pub fn resolved_count(&self) -> usize {
        self.locations.len()
    }

    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    pub fn fully_resolved(&self) -> bool {
        self.errors.is_empty()
    }

    /// Per-address results in send order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Result<&GeoLocation, &LookupError>)> {
        static NO_ENTRY: LookupError = LookupError::Unknown;
        self.order.iter().map(move |ip| {
            let entry = match self.locations.get(ip) {
                Some(location) => Ok(location),
                None => Err(self.errors.get(ip).unwrap_or(&NO_ENTRY)),
            };
            (ip.as_str(), entry)
        })
    }
}
