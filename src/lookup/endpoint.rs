//! Mapping logical lookups onto upstream requests and cache keys.

use url::Url;

use crate::config::EndpointConfig;
use crate::error::{IntegrationError, IntegrationResult};

use super::matching::normalize;
use super::types::LookupParams;

impl EndpointConfig {
    /// Composite cache key, e.g. `regions:US` or `cities:US/CA`.
    ///
    /// Coordinates are normalized so that lookups differing only in case or
    /// spacing share one entry. Parameters outside `key_params` are appended
    /// in name order so they can never collide with a bare key.
    pub fn cache_key(&self, name: &str, params: &LookupParams) -> String {
        let coordinates: Vec<String> = self
            .key_params
            .iter()
            .map(|p| params.get(p).map(key_part).unwrap_or_default())
            .collect();

        let mut key = if coordinates.is_empty() {
            name.to_string()
        } else {
            format!("{}:{}", name, coordinates.join("/"))
        };

        let extras: Vec<String> = params
            .iter()
            .filter(|(k, _)| !self.key_params.iter().any(|p| p.as_str() == *k))
            .map(|(k, v)| format!("{}={}", k, key_part(v)))
            .collect();
        if !extras.is_empty() {
            key.push('?');
            key.push_str(&extras.join("&"));
        }

        key
    }

    /// Upstream query pairs: the mapped logical parameters, the fixed query,
    /// and the caller identity.
    pub fn upstream_query(
        &self,
        params: &LookupParams,
        client_id_param: &str,
        client_id: &str,
    ) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = self
            .query_params
            .iter()
            .filter_map(|(logical, upstream)| {
                params
                    .get(logical)
                    .map(|value| (upstream.clone(), value.to_string()))
            })
            .collect();

        query.extend(
            self.static_query
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        query.push((client_id_param.to_string(), client_id.to_string()));
        query
    }

    /// Absolute upstream URL for this lookup under `base_url`.
    pub fn url(&self, base_url: &str) -> IntegrationResult<String> {
        let joined = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map(|u| u.to_string())
            .map_err(|e| {
                IntegrationError::Configuration(format!("invalid lookup URL '{}': {}", joined, e))
            })
    }
}

fn key_part(value: &str) -> String {
    normalize(value).to_uppercase()
}
