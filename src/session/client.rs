//! Authenticated session client.
//!
//! # Responsibilities
//! - Log in with the configured credentials and cache the bearer token
//! - Attach the token to caller requests
//! - Recover exactly one 401 per call by logging in again and retrying once
//!
//! # State Machine
//! ```text
//! UNAUTHENTICATED → login → AUTHENTICATED
//! AUTHENTICATED → 401 → UNAUTHENTICATED → login → AUTHENTICATED-RETRY
//! AUTHENTICATED-RETRY → 2xx → Success
//! AUTHENTICATED-RETRY → anything else → Upstream error (no further retries)
//! ```

use arc_swap::ArcSwapOption;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{IntegrationError, IntegrationResult};
use crate::http::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, X_REQUEST_ID};
use crate::observability::metrics;
use crate::resilience::SingleFlight;
use crate::session::credential::{parse_login_response, validity_window, CachedCredential};

/// A request against the protected upstream. Never carries a credential.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute URL, or a path resolved against `session.base_url`.
    pub target: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Credential metadata safe to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialInfo {
    pub acquired_at: SystemTime,
    pub valid_until: SystemTime,
}

/// Everything a login needs. Shared with in-flight login futures.
#[derive(Debug)]
struct LoginContext {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    slot: ArcSwapOption<CachedCredential>,
}

#[derive(Debug)]
struct SessionInner {
    ctx: Arc<LoginContext>,
    logins: SingleFlight<(), IntegrationResult<Arc<CachedCredential>>>,
}

/// Client for a login-gated upstream.
///
/// Cheap to clone; clones share the cached credential.
#[derive(Debug, Clone)]
pub struct SessionClient {
    inner: Arc<SessionInner>,
}

impl SessionClient {
    /// Build a client over the production transport and system clock.
    pub fn new(config: SessionConfig) -> IntegrationResult<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::with_transport(
            config,
            Arc::new(transport),
            Arc::new(SystemClock),
        ))
    }

    pub fn with_transport(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                ctx: Arc::new(LoginContext {
                    config,
                    transport,
                    clock,
                    slot: ArcSwapOption::empty(),
                }),
                logins: SingleFlight::new("login"),
            }),
        }
    }

    /// Send `request` with a bearer credential, logging in as needed.
    ///
    /// A 401 invalidates the credential, triggers one fresh login and one
    /// retry. Any other non-2xx, or a second failure, is returned as
    /// [`IntegrationError::Upstream`].
    pub async fn authorized_request(&self, request: ApiRequest) -> IntegrationResult<HttpResponse> {
        let ctx = &self.inner.ctx;
        ctx.login_params()?;
        let url = ctx.resolve_target(&request.target)?;
        let request_id = Uuid::new_v4().to_string();

        let credential = self.credential().await?;
        let response = ctx.send(&request, &url, &credential, &request_id).await?;
        if response.status != 401 {
            return response.error_for_status();
        }

        tracing::info!(
            request_id = %request_id,
            url = %url,
            "Upstream rejected credential, logging in again"
        );
        metrics::record_reauth();
        ctx.invalidate_if_current(&credential);

        let fresh = self.credential().await?;
        let retry = ctx.send(&request, &url, &fresh, &request_id).await?;
        if retry.status == 401 {
            tracing::warn!(
                request_id = %request_id,
                url = %url,
                "Upstream rejected fresh credential"
            );
        }
        retry.error_for_status()
    }

    /// Current valid credential, logging in (once, shared) if there is none.
    async fn credential(&self) -> IntegrationResult<Arc<CachedCredential>> {
        let ctx = &self.inner.ctx;
        if let Some(current) = ctx.slot.load_full() {
            if current.is_valid_at(ctx.clock.now()) {
                return Ok(current);
            }
            tracing::debug!("Cached credential expired");
        }

        let ctx = ctx.clone();
        self.inner
            .logins
            .run((), move || async move { ctx.login().await })
            .await
    }

    /// Drop the cached credential; the next request logs in again.
    pub fn invalidate(&self) {
        self.inner.ctx.slot.store(None);
    }

    /// Acquisition and expiry of the cached credential, if any.
    pub fn credential_info(&self) -> Option<CredentialInfo> {
        self.inner.ctx.slot.load_full().map(|c| CredentialInfo {
            acquired_at: c.acquired_at(),
            valid_until: c.valid_until(),
        })
    }
}

impl LoginContext {
    fn login_params(&self) -> IntegrationResult<(&str, &str, &str)> {
        let missing = |name: &str| {
            IntegrationError::Configuration(format!("session.{} is not configured", name))
        };
        let login_url = non_empty(&self.config.login_url).ok_or_else(|| missing("login_url"))?;
        let username = non_empty(&self.config.username).ok_or_else(|| missing("username"))?;
        let password = non_empty(&self.config.password).ok_or_else(|| missing("password"))?;
        Ok((login_url, username, password))
    }

    fn resolve_target(&self, target: &str) -> IntegrationResult<String> {
        if target.starts_with("http://") || target.starts_with("https://") {
            return Ok(target.to_string());
        }
        let base = non_empty(&self.config.base_url).ok_or_else(|| {
            IntegrationError::Configuration(format!(
                "relative target '{}' needs session.base_url",
                target
            ))
        })?;
        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            target.trim_start_matches('/')
        ))
    }

    async fn login(&self) -> IntegrationResult<Arc<CachedCredential>> {
        let (login_url, username, password) = self.login_params()?;
        let request = HttpRequest::post(login_url)
            .json(json!({ "username": username, "password": password }));

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Login request failed");
                metrics::record_login("error");
                metrics::record_upstream_request("login", None);
                return Err(e);
            }
        };
        metrics::record_upstream_request("login", Some(response.status));

        if !response.is_success() {
            tracing::warn!(status = response.status, "Login rejected");
            metrics::record_login("rejected");
            return Err(IntegrationError::Auth {
                status: response.status,
                body: response.text(),
            });
        }

        let grant = response
            .json::<Value>()
            .and_then(|body| parse_login_response(&body))
            .inspect_err(|_| metrics::record_login("error"))?;

        let acquired_at = self.clock.now();
        let lifetime = grant
            .expires_in
            .unwrap_or(Duration::from_secs(self.config.assumed_token_lifetime_secs));
        let window = validity_window(lifetime, Duration::from_secs(self.config.guard_band_secs));
        let credential = Arc::new(CachedCredential::new(
            grant.token,
            acquired_at,
            acquired_at + window,
        ));
        self.slot.store(Some(credential.clone()));

        metrics::record_login("success");
        tracing::info!(valid_for_secs = window.as_secs(), "Login succeeded");
        Ok(credential)
    }

    async fn send(
        &self,
        request: &ApiRequest,
        url: &str,
        credential: &CachedCredential,
        request_id: &str,
    ) -> IntegrationResult<HttpResponse> {
        let mut outgoing = HttpRequest::new(request.method.clone(), url);
        for (name, value) in &request.headers {
            if !name.eq_ignore_ascii_case("authorization") {
                outgoing.set_header(name.as_str(), value.as_str());
            }
        }
        outgoing.set_header("Authorization", credential.bearer());
        outgoing.set_header(X_REQUEST_ID, request_id);
        outgoing.query = request.query.clone();
        outgoing.body = request.body.clone();

        let result = self.transport.send(outgoing).await;
        metrics::record_upstream_request("session", result.as_ref().ok().map(|r| r.status));
        if let Err(e) = &result {
            tracing::warn!(request_id, url, error = %e, "Authorized request failed");
        }
        result
    }

    /// Clear the slot only if it still holds `used`, so a credential
    /// refreshed concurrently by another caller survives.
    fn invalidate_if_current(&self, used: &Arc<CachedCredential>) {
        self.slot.rcu(|current| match current {
            Some(c) if Arc::ptr_eq(c, used) => None,
            other => other.clone(),
        });
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ErrorKind;
    use crate::http::ScriptedTransport;
    use futures_util::future::join_all;

    const LOGIN: &str = "https://carrier.test/auth/login";

    fn config() -> SessionConfig {
        SessionConfig {
            login_url: Some(LOGIN.into()),
            base_url: Some("https://carrier.test/api".into()),
            username: Some("portal".into()),
            password: Some("s3cret".into()),
            ..SessionConfig::default()
        }
    }

    fn token(value: &str) -> IntegrationResult<HttpResponse> {
        Ok(HttpResponse::json_body(200, &json!({ "token": value })))
    }

    fn status(code: u16) -> IntegrationResult<HttpResponse> {
        Ok(HttpResponse::json_body(code, &json!({ "status": code })))
    }

    fn client(transport: ScriptedTransport, clock: Arc<ManualClock>) -> (SessionClient, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        let client = SessionClient::with_transport(config(), transport.clone(), clock);
        (client, transport)
    }

    #[tokio::test]
    async fn test_first_call_logs_in_and_attaches_bearer() {
        let transport = ScriptedTransport::new()
            .route("/auth/login", vec![token("t1")])
            .route("/api/", vec![status(200)]);
        let (client, transport) = client(transport, Arc::new(ManualClock::new()));

        let response = client
            .authorized_request(ApiRequest::get("/shipments/42"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(
            requests[0].body,
            Some(json!({"username": "portal", "password": "s3cret"}))
        );
        assert_eq!(requests[1].url, "https://carrier.test/api/shipments/42");
        assert_eq!(requests[1].header_value("authorization"), Some("Bearer t1"));
        assert!(requests[1].header_value(X_REQUEST_ID).is_some());
    }

    #[tokio::test]
    async fn test_credential_reused_within_validity_window() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new()
            .route("/auth/login", vec![token("t1"), token("t2")])
            .route("/api/", vec![status(200)]);
        let (client, transport) = client(transport, clock.clone());

        client.authorized_request(ApiRequest::get("/quotes")).await.unwrap();
        clock.advance(Duration::from_secs(10 * 60));
        client.authorized_request(ApiRequest::get("/quotes")).await.unwrap();
        assert_eq!(transport.calls_to("/auth/login"), 1);

        // 51 minutes after the login: past the 50 minute window.
        clock.advance(Duration::from_secs(41 * 60));
        client.authorized_request(ApiRequest::get("/quotes")).await.unwrap();
        assert_eq!(transport.calls_to("/auth/login"), 2);

        let last = transport.requests().pop().unwrap();
        assert_eq!(last.header_value("authorization"), Some("Bearer t2"));
    }

    #[tokio::test]
    async fn test_stated_expiry_minus_guard_band() {
        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new()
            .route(
                "/auth/login",
                vec![Ok(HttpResponse::json_body(
                    200,
                    &json!({"access_token": "short", "expires_in": 1800}),
                ))],
            )
            .route("/api/", vec![status(200)]);
        let (client, transport) = client(transport, clock.clone());

        client.authorized_request(ApiRequest::get("/quotes")).await.unwrap();
        let info = client.credential_info().unwrap();
        assert_eq!(
            info.valid_until.duration_since(info.acquired_at).unwrap(),
            Duration::from_secs(1200)
        );

        clock.advance(Duration::from_secs(1201));
        client.authorized_request(ApiRequest::get("/quotes")).await.unwrap();
        assert_eq!(transport.calls_to("/auth/login"), 2);
    }

    #[tokio::test]
    async fn test_401_triggers_one_relogin_and_one_retry() {
        let transport = ScriptedTransport::new()
            .route("/auth/login", vec![token("stale"), token("fresh")])
            .route("/api/", vec![status(401), status(200)]);
        let (client, transport) = client(transport, Arc::new(ManualClock::new()));

        let response = client
            .authorized_request(ApiRequest::post("/bookings").json(json!({"quote": 7})))
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        assert_eq!(transport.calls_to("/auth/login"), 2);
        assert_eq!(transport.calls_to("/api/"), 2);

        let requests = transport.requests();
        let api: Vec<_> = requests.iter().filter(|r| r.url.contains("/api/")).collect();
        assert_eq!(api[0].header_value("authorization"), Some("Bearer stale"));
        assert_eq!(api[1].header_value("authorization"), Some("Bearer fresh"));
        assert_eq!(api[0].header_value(X_REQUEST_ID), api[1].header_value(X_REQUEST_ID));
        assert_eq!(api[1].body, Some(json!({"quote": 7})));
    }

    #[tokio::test]
    async fn test_second_401_is_terminal() {
        let transport = ScriptedTransport::new()
            .route("/auth/login", vec![token("a"), token("b"), token("c")])
            .route("/api/", vec![status(401)]);
        let (client, transport) = client(transport, Arc::new(ManualClock::new()));

        let err = client
            .authorized_request(ApiRequest::get("/quotes"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(err.kind(), ErrorKind::FatalUpstream);
        assert_eq!(transport.calls_to("/auth/login"), 2);
        assert_eq!(transport.calls_to("/api/"), 2);
    }

    #[tokio::test]
    async fn test_other_errors_surface_without_retry() {
        let transport = ScriptedTransport::new()
            .route("/auth/login", vec![token("t1")])
            .route(
                "/api/",
                vec![Ok(HttpResponse::new(422, "weight must be positive"))],
            );
        let (client, transport) = client(transport, Arc::new(ManualClock::new()));

        let err = client
            .authorized_request(ApiRequest::post("/quotes"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            IntegrationError::Upstream {
                status: 422,
                body: "weight must be positive".into()
            }
        );
        assert_eq!(transport.calls_to("/auth/login"), 1);
        assert_eq!(transport.calls_to("/api/"), 1);
    }

    #[tokio::test]
    async fn test_missing_configuration_fails_before_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let config = SessionConfig {
            password: None,
            ..config()
        };
        let client =
            SessionClient::with_transport(config, transport.clone(), Arc::new(ManualClock::new()));

        let err = client
            .authorized_request(ApiRequest::get("/quotes"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_relative_target_without_base_url() {
        let transport = Arc::new(ScriptedTransport::new());
        let config = SessionConfig {
            base_url: None,
            ..config()
        };
        let client =
            SessionClient::with_transport(config, transport.clone(), Arc::new(ManualClock::new()));

        let err = client
            .authorized_request(ApiRequest::get("/quotes"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_login_rejected_is_auth_error() {
        let transport = ScriptedTransport::new()
            .route("/auth/login", vec![Ok(HttpResponse::new(403, "bad credentials"))]);
        let (client, transport) = client(transport, Arc::new(ManualClock::new()));

        let err = client
            .authorized_request(ApiRequest::get("/quotes"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            IntegrationError::Auth {
                status: 403,
                body: "bad credentials".into()
            }
        );
        assert_eq!(transport.calls_to("/api/"), 0);
        assert!(client.credential_info().is_none());
    }

    #[tokio::test]
    async fn test_login_without_token_is_protocol_error() {
        let transport = ScriptedTransport::new().route(
            "/auth/login",
            vec![Ok(HttpResponse::json_body(200, &json!({"session": "abc"})))],
        );
        let (client, _) = client(transport, Arc::new(ManualClock::new()));

        let err = client
            .authorized_request(ApiRequest::get("/quotes"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_login() {
        let transport = ScriptedTransport::new()
            .with_latency(Duration::from_millis(20))
            .route("/auth/login", vec![token("t1")])
            .route("/api/", vec![status(200)]);
        let (client, transport) = client(transport, Arc::new(ManualClock::new()));

        let calls = (0..10).map(|i| client.authorized_request(ApiRequest::get(format!("/quotes/{}", i))));
        let results = join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(transport.calls_to("/auth/login"), 1);
        assert_eq!(transport.calls_to("/api/"), 10);
    }

    #[tokio::test]
    async fn test_caller_authorization_header_is_replaced() {
        let transport = ScriptedTransport::new()
            .route("/auth/login", vec![token("t1")])
            .route("/api/", vec![status(200)]);
        let (client, transport) = client(transport, Arc::new(ManualClock::new()));

        client
            .authorized_request(
                ApiRequest::get("https://carrier.test/api/quotes")
                    .header("Authorization", "Bearer forged")
                    .header("Accept", "application/json"),
            )
            .await
            .unwrap();

        let request = transport.requests().pop().unwrap();
        assert_eq!(request.header_value("authorization"), Some("Bearer t1"));
        assert_eq!(request.header_value("accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_invalidate_forces_login() {
        let transport = ScriptedTransport::new()
            .route("/auth/login", vec![token("t1"), token("t2")])
            .route("/api/", vec![status(200)]);
        let (client, transport) = client(transport, Arc::new(ManualClock::new()));

        client.authorized_request(ApiRequest::get("/quotes")).await.unwrap();
        client.invalidate();
        assert!(client.credential_info().is_none());

        client.authorized_request(ApiRequest::get("/quotes")).await.unwrap();
        assert_eq!(transport.calls_to("/auth/login"), 2);
    }
}
