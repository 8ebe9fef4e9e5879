//! Resilient lookup client.
//!
//! # Responsibilities
//! - Serve results from the cache while they are inside the TTL
//! - Refresh from the upstream with bounded exponential backoff
//! - Collapse concurrent refreshes of one key into a single upstream call
//! - Fall back to a stale entry, then to the lookup type's degrade policy
//!
//! # Resolution Order
//! ```text
//! fresh cache entry        → LookupSource::Cache
//! upstream (with retries)  → LookupSource::Upstream, cache overwritten
//! upstream failed, entry   → LookupSource::StaleCache
//! upstream failed, none    → degrade = empty     → LookupSource::Degraded
//!                            degrade = propagate → Err
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::config::{DegradePolicy, EndpointConfig, LookupConfig};
use crate::error::{ErrorKind, IntegrationError, IntegrationResult};
use crate::http::{HttpRequest, ReqwestTransport, Transport};
use crate::lookup::cache::LookupCache;
use crate::lookup::matching;
use crate::lookup::payload::extract_records;
use crate::lookup::types::{Lookup, LookupParams, LookupSource};
use crate::observability::metrics;
use crate::resilience::{run_with_retry, RetryPolicy, SingleFlight};

/// Validated upstream collection as cached.
type Records = Arc<Vec<Value>>;

/// Everything an upstream refresh needs. Shared with in-flight refreshes.
#[derive(Debug)]
struct Fetcher {
    config: LookupConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    cache: LookupCache<Records>,
    policy: RetryPolicy,
}

#[derive(Debug)]
struct LookupInner {
    fetcher: Arc<Fetcher>,
    refreshes: SingleFlight<String, IntegrationResult<Records>>,
}

/// Client for the reference-data upstream.
///
/// Cheap to clone; clones share the cache.
#[derive(Debug, Clone)]
pub struct LookupClient {
    inner: Arc<LookupInner>,
}

impl LookupClient {
    /// Build a client over the production transport and system clock.
    pub fn new(config: LookupConfig) -> IntegrationResult<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::with_transport(
            config,
            Arc::new(transport),
            Arc::new(SystemClock),
        ))
    }

    pub fn with_transport(
        config: LookupConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = LookupCache::new(Duration::from_secs(config.cache_ttl_secs));
        let policy = RetryPolicy::from_config(&config.retry);
        Self {
            inner: Arc::new(LookupInner {
                fetcher: Arc::new(Fetcher {
                    config,
                    transport,
                    clock,
                    cache,
                    policy,
                }),
                refreshes: SingleFlight::new("lookup"),
            }),
        }
    }

    /// Run the lookup named `name` (a key of `lookup.endpoints`).
    ///
    /// Configuration problems are reported before the cache or the network
    /// is consulted.
    pub async fn fetch(&self, name: &str, params: &LookupParams) -> IntegrationResult<Lookup<Value>> {
        let fetcher = &self.inner.fetcher;
        let endpoint = fetcher.endpoint(name)?;
        fetcher.client_id()?;
        endpoint.url(&fetcher.config.base_url)?;

        let key = endpoint.cache_key(name, params);
        if let Some(entry) = fetcher.cache.get_fresh(&key, fetcher.clock.now()) {
            tracing::debug!(endpoint = name, key = %key, "Lookup cache hit");
            metrics::record_cache_result(name, "hit");
            return select(name, &key, endpoint, params, &entry.value, LookupSource::Cache);
        }
        metrics::record_cache_result(name, "miss");

        let refresh = {
            let fetcher = fetcher.clone();
            let name = name.to_string();
            let endpoint = endpoint.clone();
            let params = params.clone();
            let key = key.clone();
            move || async move { fetcher.refresh(&name, &endpoint, &params, &key).await }
        };

        match self.inner.refreshes.run(key.clone(), refresh).await {
            Ok(records) => select(name, &key, endpoint, params, &records, LookupSource::Upstream),
            Err(error) => self.fall_back(name, &key, endpoint, params, error),
        }
    }

    /// [`fetch`](Self::fetch), deserializing each record into `T`.
    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        name: &str,
        params: &LookupParams,
    ) -> IntegrationResult<Lookup<T>> {
        self.fetch(name, params).await?.try_map(|record| {
            serde_json::from_value(record).map_err(|e| {
                IntegrationError::Protocol(format!("unexpected {} record: {}", name, e))
            })
        })
    }

    /// `(fresh, stale)` cache entry counts.
    pub fn cache_summary(&self) -> (usize, usize) {
        let fetcher = &self.inner.fetcher;
        fetcher.cache.get_summary(fetcher.clock.now())
    }

    /// Configured lookup names.
    pub fn lookup_names(&self) -> impl Iterator<Item = &str> {
        self.inner.fetcher.config.endpoints.keys().map(String::as_str)
    }

    fn fall_back(
        &self,
        name: &str,
        key: &str,
        endpoint: &EndpointConfig,
        params: &LookupParams,
        error: IntegrationError,
    ) -> IntegrationResult<Lookup<Value>> {
        if error.kind() == ErrorKind::Configuration {
            return Err(error);
        }

        let fetcher = &self.inner.fetcher;
        if let Some(entry) = fetcher.cache.get(key) {
            tracing::warn!(
                endpoint = name,
                key,
                error = %error,
                age_secs = entry.age(fetcher.clock.now()).as_secs(),
                "Lookup upstream failed, serving stale cache"
            );
            metrics::record_cache_result(name, "stale");
            return select(
                name,
                key,
                endpoint,
                params,
                &entry.value,
                LookupSource::StaleCache { error },
            );
        }

        match endpoint.degrade {
            DegradePolicy::Empty => {
                tracing::warn!(endpoint = name, key, error = %error, "Lookup degraded to empty result");
                metrics::record_cache_result(name, "degraded");
                Ok(Lookup {
                    records: Vec::new(),
                    source: LookupSource::Degraded { error },
                })
            }
            DegradePolicy::Propagate => {
                tracing::warn!(endpoint = name, key, error = %error, "Lookup failed");
                Err(error)
            }
        }
    }
}

impl Fetcher {
    fn endpoint(&self, name: &str) -> IntegrationResult<&EndpointConfig> {
        self.config
            .endpoints
            .get(name)
            .ok_or_else(|| IntegrationError::Configuration(format!("unknown lookup '{}'", name)))
    }

    fn client_id(&self) -> IntegrationResult<&str> {
        self.config
            .client_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| IntegrationError::Configuration("lookup.client_id is not configured".into()))
    }

    /// Fetch from the upstream with retries and overwrite the cache entry.
    async fn refresh(
        &self,
        name: &str,
        endpoint: &EndpointConfig,
        params: &LookupParams,
        key: &str,
    ) -> IntegrationResult<Records> {
        let url = endpoint.url(&self.config.base_url)?;
        let query = endpoint.upstream_query(params, &self.config.client_id_param, self.client_id()?);

        let records = run_with_retry(&self.policy, self.clock.as_ref(), name, |attempt| {
            let mut request = HttpRequest::get(url.as_str());
            request.query = query.clone();
            async move { self.attempt(name, endpoint, request, attempt).await }
        })
        .await?;

        let records = Arc::new(records);
        self.cache.insert(key, records.clone(), self.clock.now());
        tracing::info!(endpoint = name, key, records = records.len(), "Lookup refreshed");
        Ok(records)
    }

    async fn attempt(
        &self,
        name: &str,
        endpoint: &EndpointConfig,
        request: HttpRequest,
        attempt: u32,
    ) -> IntegrationResult<Vec<Value>> {
        tracing::debug!(endpoint = name, attempt, "Calling lookup upstream");
        let result = self.transport.send(request).await;
        metrics::record_upstream_request("lookup", result.as_ref().ok().map(|r| r.status));

        let body: Value = result?.error_for_status()?.json()?;
        extract_records(&body, endpoint)
    }
}

/// Apply the match policy to `records`. An empty selection is `NotFound`
/// unless the lookup type degrades to empty.
fn select(
    name: &str,
    key: &str,
    endpoint: &EndpointConfig,
    params: &LookupParams,
    records: &[Value],
    source: LookupSource,
) -> IntegrationResult<Lookup<Value>> {
    let records = matching::select(records, endpoint, params);
    if records.is_empty() && endpoint.degrade == DegradePolicy::Propagate {
        return Err(IntegrationError::NotFound(format!(
            "{} lookup matched nothing for {}",
            name, key
        )));
    }
    Ok(Lookup { records, source })
}
