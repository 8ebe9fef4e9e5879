//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! integration layer. All types derive Serde traits for deserialization from
//! config files; environment overrides are applied afterwards by the loader.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Login-gated upstream (bearer credential).
    pub session: SessionConfig,

    /// Read-only reference-data upstream.
    pub lookup: LookupConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Authenticated session settings.
///
/// Unset URLs and credentials are allowed here; the session client reports
/// them as configuration errors when it is first used.
#[derive(Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Login endpoint receiving `{username, password}`.
    pub login_url: Option<String>,

    /// Base URL that relative request targets are resolved against.
    pub base_url: Option<String>,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Token lifetime assumed when the login response does not state one.
    pub assumed_token_lifetime_secs: u64,

    /// Safety margin subtracted from the token lifetime.
    pub guard_band_secs: u64,

    /// Per-request network timeout.
    pub request_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_url: None,
            base_url: None,
            username: None,
            password: None,
            assumed_token_lifetime_secs: 3600,
            guard_band_secs: 600,
            request_timeout_secs: 15,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("login_url", &self.login_url)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("assumed_token_lifetime_secs", &self.assumed_token_lifetime_secs)
            .field("guard_band_secs", &self.guard_band_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Reference-data lookup settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LookupConfig {
    /// Upstream base URL.
    pub base_url: String,

    /// Caller identity required by the upstream on every request.
    pub client_id: Option<String>,

    /// Query parameter carrying `client_id`.
    pub client_id_param: String,

    /// How long a cached result is served without a network call.
    pub cache_ttl_secs: u64,

    /// Per-request network timeout.
    pub request_timeout_secs: u64,

    pub retry: RetryConfig,

    /// Per-lookup-type policy, keyed by lookup name.
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.geonames.org".to_string(),
            client_id: None,
            client_id_param: "username".to_string(),
            cache_ttl_secs: 7 * 24 * 3600,
            request_timeout_secs: 15,
            retry: RetryConfig::default(),
            endpoints: default_endpoints(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per logical call, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Extra random delay as a fraction of the computed delay (0 disables).
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter_ratio: 0.0,
        }
    }
}

/// What a lookup returns when the upstream failed and nothing is cached.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DegradePolicy {
    /// Surface the error (or `NotFound` for an empty result).
    #[default]
    Propagate,
    /// Return an empty collection.
    Empty,
}

/// Record field that must agree with a lookup parameter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MatchRule {
    /// Field in the upstream record.
    pub field: String,
    /// Logical lookup parameter it is compared to.
    pub param: String,
}

/// Result filtering for one lookup type.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MatchPolicy {
    pub rules: Vec<MatchRule>,

    /// Always allow the fuzzy pass when the exact pass finds nothing.
    pub lenient: bool,

    /// Parameter naming the upstream partition (usually the country).
    pub partition_param: Option<String>,

    /// Partitions with sparse metadata that need the fuzzy pass.
    pub lenient_partitions: Vec<String>,
}

/// Deterministic ordering of returned records.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum OrderPolicy {
    /// Keep upstream order.
    #[default]
    Upstream,
    /// Case-insensitive ordering on a string field.
    Name { field: String },
    /// Descending on a numeric field, ties broken by a string field.
    WeightDesc { field: String, tie_break: String },
}

/// Policy for one logical lookup type.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Path appended to the lookup base URL.
    pub path: String,

    /// Payload field holding the result collection.
    pub collection_field: String,

    /// Ordered parameters that make up the cache key.
    #[serde(default)]
    pub key_params: Vec<String>,

    /// Logical parameter → upstream query parameter.
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,

    /// Fixed query parameters sent on every call.
    #[serde(default)]
    pub static_query: BTreeMap<String, String>,

    /// Fields every record must carry; anything else is a protocol error.
    #[serde(default)]
    pub required_fields: Vec<String>,

    #[serde(default)]
    pub degrade: DegradePolicy,

    #[serde(default)]
    pub matching: MatchPolicy,

    #[serde(default)]
    pub order: OrderPolicy,

    /// Field identifying duplicates. Falls back to the whole record.
    #[serde(default)]
    pub dedupe_field: Option<String>,
}

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn rule(field: &str, param: &str) -> MatchRule {
    MatchRule {
        field: field.to_string(),
        param: param.to_string(),
    }
}

/// Location lookups used by the quoting pipeline.
pub fn default_endpoints() -> BTreeMap<String, EndpointConfig> {
    let mut endpoints = BTreeMap::new();

    endpoints.insert(
        "countries".to_string(),
        EndpointConfig {
            path: "/countryInfoJSON".to_string(),
            collection_field: "geonames".to_string(),
            key_params: Vec::new(),
            query_params: BTreeMap::new(),
            static_query: BTreeMap::new(),
            required_fields: strings(&["countryCode", "countryName"]),
            degrade: DegradePolicy::Propagate,
            matching: MatchPolicy::default(),
            order: OrderPolicy::Name {
                field: "countryName".to_string(),
            },
            dedupe_field: Some("countryCode".to_string()),
        },
    );

    endpoints.insert(
        "regions".to_string(),
        EndpointConfig {
            path: "/searchJSON".to_string(),
            collection_field: "geonames".to_string(),
            key_params: strings(&["country"]),
            query_params: params(&[("country", "country")]),
            static_query: params(&[("featureCode", "ADM1"), ("maxRows", "1000")]),
            required_fields: strings(&["name"]),
            degrade: DegradePolicy::Empty,
            matching: MatchPolicy {
                rules: vec![rule("countryCode", "country")],
                ..MatchPolicy::default()
            },
            order: OrderPolicy::Name {
                field: "name".to_string(),
            },
            dedupe_field: Some("adminCode1".to_string()),
        },
    );

    endpoints.insert(
        "cities".to_string(),
        EndpointConfig {
            path: "/searchJSON".to_string(),
            collection_field: "geonames".to_string(),
            key_params: strings(&["country", "region"]),
            query_params: params(&[("country", "country"), ("region", "adminCode1")]),
            static_query: params(&[("featureClass", "P"), ("maxRows", "1000")]),
            required_fields: strings(&["name"]),
            degrade: DegradePolicy::Empty,
            matching: MatchPolicy {
                rules: vec![rule("countryCode", "country"), rule("adminCode1", "region")],
                ..MatchPolicy::default()
            },
            order: OrderPolicy::WeightDesc {
                field: "population".to_string(),
                tie_break: "name".to_string(),
            },
            dedupe_field: Some("geonameId".to_string()),
        },
    );

    endpoints.insert(
        "places".to_string(),
        EndpointConfig {
            path: "/postalCodeSearchJSON".to_string(),
            collection_field: "postalCodes".to_string(),
            key_params: strings(&["country", "region", "place"]),
            query_params: params(&[("country", "country"), ("place", "placename")]),
            static_query: params(&[("maxRows", "50")]),
            required_fields: strings(&["placeName", "countryCode"]),
            degrade: DegradePolicy::Propagate,
            matching: MatchPolicy {
                rules: vec![rule("placeName", "place"), rule("adminCode1", "region")],
                lenient: false,
                partition_param: Some("country".to_string()),
                lenient_partitions: strings(&["GB", "CA", "MT"]),
            },
            order: OrderPolicy::Name {
                field: "placeName".to_string(),
            },
            dedupe_field: Some("placeName".to_string()),
        },
    );

    endpoints.insert(
        "postal_codes".to_string(),
        EndpointConfig {
            path: "/postalCodeSearchJSON".to_string(),
            collection_field: "postalCodes".to_string(),
            key_params: strings(&["country", "place"]),
            query_params: params(&[("country", "country"), ("place", "placename")]),
            static_query: params(&[("maxRows", "100")]),
            required_fields: strings(&["postalCode"]),
            degrade: DegradePolicy::Empty,
            matching: MatchPolicy {
                rules: vec![rule("placeName", "place")],
                lenient: true,
                ..MatchPolicy::default()
            },
            order: OrderPolicy::Name {
                field: "postalCode".to_string(),
            },
            dedupe_field: Some("postalCode".to_string()),
        },
    );

    endpoints
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
