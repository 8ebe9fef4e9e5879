//! Lookup request and result types.

use std::collections::BTreeMap;

use crate::error::{IntegrationError, IntegrationResult};

/// Logical lookup coordinates (e.g. country, region, place).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupParams(BTreeMap<String, String>);

impl LookupParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a coordinate. Blank values are dropped.
    pub fn with(mut self, name: impl Into<String>, value: impl AsRef<str>) -> Self {
        let value = value.as_ref().trim();
        if !value.is_empty() {
            self.0.insert(name.into(), value.to_string());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where a lookup result came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupSource {
    /// Fetched from the upstream during this call.
    Upstream,
    /// Served from a cache entry still inside its TTL.
    Cache,
    /// The upstream failed; an expired cache entry was served instead.
    StaleCache { error: IntegrationError },
    /// The upstream failed, nothing was cached, and the lookup type degrades
    /// to an empty result.
    Degraded { error: IntegrationError },
}

/// Result of a lookup plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    pub records: Vec<T>,
    pub source: LookupSource,
}

impl<T> Lookup<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when the upstream failed and the result is a fallback.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.source,
            LookupSource::StaleCache { .. } | LookupSource::Degraded { .. }
        )
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }

    /// Convert every record, failing on the first error.
    pub fn try_map<U, F>(self, f: F) -> IntegrationResult<Lookup<U>>
    where
        F: FnMut(T) -> IntegrationResult<U>,
    {
        let records = self.records.into_iter().map(f).collect::<IntegrationResult<Vec<U>>>()?;
        Ok(Lookup {
            records,
            source: self.source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_drop_blank_values() {
        let params = LookupParams::new()
            .with("country", " US ")
            .with("region", "   ");
        assert_eq!(params.get("country"), Some("US"));
        assert_eq!(params.get("region"), None);
    }

    #[test]
    fn test_degraded_flags() {
        let error = IntegrationError::Upstream {
            status: 503,
            body: String::new(),
        };
        let fresh: Lookup<u8> = Lookup {
            records: vec![1],
            source: LookupSource::Upstream,
        };
        let stale: Lookup<u8> = Lookup {
            records: vec![1],
            source: LookupSource::StaleCache { error },
        };
        assert!(!fresh.is_degraded());
        assert!(stale.is_degraded());
    }

    #[test]
    fn test_try_map_stops_on_error() {
        let lookup = Lookup {
            records: vec!["1", "x", "3"],
            source: LookupSource::Cache,
        };
        let err = lookup
            .try_map(|s| {
                s.parse::<u8>()
                    .map_err(|e| IntegrationError::Protocol(e.to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, IntegrationError::Protocol(_)));
    }
}
