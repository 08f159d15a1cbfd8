//! Session-aware API client for the Arogya Mitra backend.
//!
//! `SessionClient` owns the credential pair, attaches the bearer credential
//! to outgoing requests, detects expired credentials from 401 responses,
//! refreshes them at most once per credential generation, and retries the
//! failed request once with the fresh credential.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::auth::store::{SessionStore, StoreKey};
use crate::config::Config;
use crate::models::{AuthResponse, LoginRequest, UserType};

use super::endpoints;
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, RequestBody, Transport};
use super::ApiError;

const BEARER_PREFIX: &str = "Bearer ";

/// Method, body and header overrides for a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub body: RequestBody,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Default)]
struct CredentialState {
    credential: Option<String>,
    refresh: Option<String>,
    /// Bumped on every change to the pair so concurrent requests can tell
    /// whether someone else already refreshed the credential they used.
    generation: u64,
}

pub struct SessionClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    state: RwLock<CredentialState>,
    refresh_lock: Mutex<()>,
}

impl SessionClient {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            transport,
            store,
            state: RwLock::new(CredentialState::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Create a client talking to the configured backend over reqwest.
    pub fn from_config(config: &Config, store: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::new(config.base_url.clone(), Arc::new(transport), store))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Load the persisted credential pair into memory.
    pub async fn hydrate(&self) {
        let credential = self.read_store(StoreKey::Credential);
        let refresh = self.read_store(StoreKey::RefreshCredential);
        debug!(
            has_credential = credential.is_some(),
            has_refresh = refresh.is_some(),
            "Hydrating session client"
        );

        let mut state = self.state.write().await;
        state.credential = credential.map(|c| strip_bearer(&c).to_string());
        state.refresh = refresh;
        state.generation += 1;
    }

    /// The active credential, without the `Bearer ` prefix.
    pub async fn credential(&self) -> Option<String> {
        self.state.read().await.credential.clone()
    }

    // ===== Request lifecycle =====

    /// Send a request and return the parsed JSON body of a 2xx response.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let response = self.execute(endpoint, &options).await?;
        Self::parse_json(endpoint, &response)
    }

    /// Send with the current credential; on an expired credential refresh
    /// and resend once. Returns the raw 2xx response.
    pub(crate) async fn execute(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ApiError> {
        let (credential, generation) = self.snapshot().await;
        let response = self.send(endpoint, options, credential.as_deref()).await?;
        if response.is_success() {
            return Ok(response);
        }

        let status = response.status.as_u16();
        let body = response.json();
        debug!(
            endpoint = endpoint,
            status = status,
            body = %ApiError::truncate_body(&response.text()),
            "Request failed"
        );

        match ApiError::from_response(status, body.as_ref()) {
            ApiError::TokenExpired => {
                info!(endpoint = endpoint, "Credential rejected, refreshing");
                let fresh = self.refresh_after(generation).await?;
                let retry = self.send(endpoint, options, Some(&fresh)).await?;
                if retry.is_success() {
                    Ok(retry)
                } else {
                    Err(ApiError::request_failed(
                        retry.status.as_u16(),
                        retry.json().as_ref(),
                    ))
                }
            }
            err => Err(err),
        }
    }

    async fn snapshot(&self) -> (Option<String>, u64) {
        let state = self.state.read().await;
        (state.credential.clone(), state.generation)
    }

    async fn send(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        credential: Option<&str>,
    ) -> Result<HttpResponse, ApiError> {
        let request = HttpRequest {
            method: options.method.clone(),
            url: format!("{}{}", self.base_url, endpoint),
            headers: Self::build_headers(options, credential)?,
            body: options.body.clone(),
        };
        debug!(method = %request.method, url = %request.url, "Sending request");
        self.transport.send(request).await
    }

    fn build_headers(
        options: &RequestOptions,
        credential: Option<&str>,
    ) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        // Multipart bodies get their content type (with boundary) from the transport
        if !options.body.is_multipart() {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        if let Some(credential) = credential {
            headers.insert(header::AUTHORIZATION, bearer_value(credential)?);
        }
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::InvalidRequest(format!("header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::InvalidRequest(format!("header {}: {}", name, e)))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    fn parse_json(endpoint: &str, response: &HttpResponse) -> Result<Value, ApiError> {
        if response.body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&response.body).map_err(|e| {
            ApiError::InvalidResponse(format!(
                "Failed to parse JSON response from {}: {}",
                endpoint, e
            ))
        })
    }

    // ===== Credential refresh =====

    /// Refresh for a request that was sent with credential generation
    /// `seen_generation`. Concurrent callers queue on the refresh lock; only
    /// the first one whose generation is still current hits the network.
    async fn refresh_after(&self, seen_generation: u64) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;
        {
            let state = self.state.read().await;
            if state.generation != seen_generation {
                return match &state.credential {
                    Some(credential) => {
                        debug!("Credential already replaced by a concurrent refresh");
                        Ok(credential.clone())
                    }
                    None => Err(ApiError::SessionExpired),
                };
            }
        }

        match self.refresh_locked().await {
            Ok(credential) => Ok(credential),
            // The session was replaced or cleared while refreshing; leave it alone
            Err(ApiError::SessionExpired) => Err(ApiError::SessionExpired),
            Err(e) => {
                warn!(error = %e, "Credential refresh failed, clearing session");
                self.clear_session().await;
                Err(ApiError::SessionExpired)
            }
        }
    }

    /// Mint a new credential from the refresh credential.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;
        match self.refresh_locked().await {
            Ok(credential) => Ok(credential),
            Err(ApiError::NoRefreshCredential) => Err(ApiError::NoRefreshCredential),
            Err(ApiError::SessionExpired) => Err(ApiError::SessionExpired),
            Err(e) => {
                warn!(error = %e, "Credential refresh failed, clearing session");
                self.clear_session().await;
                Err(ApiError::SessionExpired)
            }
        }
    }

    /// Caller must hold `refresh_lock`. The minted credential is only
    /// installed if the pair is unchanged since the refresh was sent;
    /// otherwise `SessionExpired` is returned and the new credential dropped.
    async fn refresh_locked(&self) -> Result<String, ApiError> {
        let (refresh, generation) = {
            let state = self.state.read().await;
            let refresh = state.refresh.clone().ok_or(ApiError::NoRefreshCredential)?;
            (refresh, state.generation)
        };

        let options = RequestOptions::post().json(json!({ "refresh": refresh }));
        let response = self.send(endpoints::REFRESH_TOKEN, &options, None).await?;
        let body = response.json();
        if !response.is_success() {
            return Err(ApiError::request_failed(
                response.status.as_u16(),
                body.as_ref(),
            ));
        }

        let auth = body
            .as_ref()
            .map(AuthResponse::from_value)
            .unwrap_or_default();
        let token = auth.token.ok_or_else(|| {
            ApiError::InvalidResponse("refresh response did not include a token".to_string())
        })?;

        // The backend may rotate the refresh credential; keep the old one otherwise
        let next_refresh = auth.refresh.unwrap_or(refresh);
        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!("Session changed while refreshing, discarding new credential");
            return Err(ApiError::SessionExpired);
        }
        let credential = self.install_credentials(&mut state, &token, Some(next_refresh));
        info!("Credential refreshed");
        Ok(credential)
    }

    // ===== Auth endpoints =====

    /// Log in through the patient or hospital endpoint and keep the issued
    /// credential pair. The response body is returned unchanged.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Value, ApiError> {
        let endpoint = match credentials.user_type {
            UserType::Patient => endpoints::PATIENT_LOGIN,
            UserType::Hospital => endpoints::HOSPITAL_LOGIN,
        };
        let body = serde_json::to_value(credentials)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let data = self.request(endpoint, RequestOptions::post().json(body)).await?;

        let auth = AuthResponse::from_value(&data);
        if let Some(token) = auth.token {
            self.store_credentials(&token, auth.refresh).await;
            info!(username = %credentials.username, user_type = ?credentials.user_type, "Logged in");
        }
        Ok(data)
    }

    /// Best-effort server logout followed by an unconditional local clear.
    pub async fn logout(&self) {
        if let Err(e) = self.request(endpoints::LOGOUT, RequestOptions::post()).await {
            debug!(error = %e, "Logout request failed, clearing credentials anyway");
        }
        self.clear_credentials().await;
        info!("Logged out");
    }

    // ===== State changes =====

    /// Replace the credential pair. A missing refresh credential clears the
    /// old one so the pair never mixes generations.
    async fn store_credentials(&self, credential: &str, refresh: Option<String>) -> String {
        let mut state = self.state.write().await;
        self.install_credentials(&mut state, credential, refresh)
    }

    /// Store writes happen under the state lock so the persisted pair
    /// follows the same order as the in-memory one.
    fn install_credentials(
        &self,
        state: &mut CredentialState,
        credential: &str,
        refresh: Option<String>,
    ) -> String {
        let credential = strip_bearer(credential).to_string();
        state.credential = Some(credential.clone());
        state.refresh = refresh.clone();
        state.generation += 1;

        if let Err(e) = self.store.set(StoreKey::Credential, &credential) {
            warn!(error = %e, "Failed to persist credential");
        }
        let persisted = match refresh {
            Some(ref refresh) => self.store.set(StoreKey::RefreshCredential, refresh),
            None => self.store.remove(StoreKey::RefreshCredential),
        };
        if let Err(e) = persisted {
            warn!(error = %e, "Failed to persist refresh credential");
        }
        credential
    }

    async fn clear_credentials(&self) {
        self.reset_state(&[StoreKey::Credential, StoreKey::RefreshCredential])
            .await;
    }

    /// Forget the credential pair and the cached profile.
    async fn clear_session(&self) {
        self.reset_state(&[
            StoreKey::Credential,
            StoreKey::RefreshCredential,
            StoreKey::Profile,
        ])
        .await;
    }

    async fn reset_state(&self, keys: &[StoreKey]) {
        let mut state = self.state.write().await;
        state.credential = None;
        state.refresh = None;
        state.generation += 1;
        if let Err(e) = self.store.remove_many(keys) {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }

    fn read_store(&self, key: StoreKey) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "Failed to read session store");
                None
            }
        }
    }

    // ===== Helpers for resource endpoints =====

    pub(crate) async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(endpoint, RequestOptions::get()).await
    }

    pub(crate) async fn post<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.request(endpoint, RequestOptions::post().json(body)).await
    }
}

/// Strip any `Bearer ` prefixes a stored credential may already carry.
fn strip_bearer(raw: &str) -> &str {
    let mut credential = raw.trim();
    while let Some(rest) = credential.strip_prefix(BEARER_PREFIX) {
        credential = rest.trim_start();
    }
    credential
}

fn bearer_value(credential: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!("{}{}", BEARER_PREFIX, strip_bearer(credential)))
        .map_err(|e| ApiError::InvalidRequest(format!("credential is not a valid header: {}", e)))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::api::transport::mock::{json_response, MockTransport};
    use crate::auth::store::MemoryStore;

    const BASE: &str = "http://localhost:8000";

    fn client_with(transport: Arc<MockTransport>, store: Arc<MemoryStore>) -> SessionClient {
        SessionClient::new(BASE, transport, store)
    }

    async fn seeded(
        transport: Arc<MockTransport>,
        credential: &str,
        refresh: Option<&str>,
    ) -> (SessionClient, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.set(StoreKey::Credential, credential).unwrap();
        if let Some(refresh) = refresh {
            store.set(StoreKey::RefreshCredential, refresh).unwrap();
        }
        let client = client_with(transport, store.clone());
        client.hydrate().await;
        (client, store)
    }

    fn auth_of(request: &HttpRequest) -> Option<String> {
        request.authorization().map(str::to_string)
    }

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("abc"), "abc");
        assert_eq!(strip_bearer("Bearer abc"), "abc");
        assert_eq!(strip_bearer("Bearer Bearer abc"), "abc");
        assert_eq!(strip_bearer("  abc "), "abc");
    }

    #[test]
    fn test_build_headers() {
        let headers = SessionClient::build_headers(&RequestOptions::get(), Some("Bearer xyz")).unwrap();
        assert_eq!(headers.get_all(header::AUTHORIZATION).iter().count(), 1);
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer xyz");
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");

        let multipart = RequestOptions::post().body(RequestBody::Multipart(Default::default()));
        let headers = SessionClient::build_headers(&multipart, None).unwrap();
        assert!(headers.get(header::CONTENT_TYPE).is_none());
        assert!(headers.get(header::AUTHORIZATION).is_none());

        let overridden = RequestOptions::get().header("Accept-Language", "kn");
        let headers = SessionClient::build_headers(&overridden, None).unwrap();
        assert_eq!(headers.get("accept-language").unwrap(), "kn");

        let bad = RequestOptions::get().header("X-Bad", "line\nbreak");
        assert!(matches!(
            SessionClient::build_headers(&bad, None),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_no_credential_means_no_authorization_header() {
        let transport = MockTransport::new(|_| json_response(200, json!({"success": true})));
        let client = client_with(transport.clone(), Arc::new(MemoryStore::new()));
        client.hydrate().await;

        client.get(endpoints::SUBSCRIPTION).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].authorization(), None);
    }

    #[tokio::test]
    async fn test_stored_credential_attached_once_with_prefix() {
        let transport = MockTransport::new(|_| {
            json_response(200, json!({"success": true, "data": [{"id": 1}]}))
        });
        let (client, _) = seeded(transport.clone(), "xyz", None).await;

        let result = client.get(endpoints::PATIENT_REPORTS).await.unwrap();

        assert_eq!(result, json!({"success": true, "data": [{"id": 1}]}));
        let sent = transport.sent();
        assert_eq!(sent[0].url, "http://localhost:8000/api/patient/reports/");
        assert_eq!(sent[0].headers.get_all(header::AUTHORIZATION).iter().count(), 1);
        assert_eq!(auth_of(&sent[0]).as_deref(), Some("Bearer xyz"));
    }

    #[tokio::test]
    async fn test_prefixed_stored_credential_is_normalized() {
        let transport = MockTransport::new(|_| json_response(200, json!({"success": true})));
        let (client, _) = seeded(transport.clone(), "Bearer xyz", None).await;

        client.get(endpoints::ACCESS_LOGS).await.unwrap();

        assert_eq!(auth_of(&transport.sent()[0]).as_deref(), Some("Bearer xyz"));
        assert_eq!(client.credential().await.as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_retries_once() {
        let transport = MockTransport::new(|req| {
            if req.url.ends_with(endpoints::REFRESH_TOKEN) {
                return json_response(200, json!({"success": true, "token": "new"}));
            }
            match req.authorization() {
                Some("Bearer new") => json_response(200, json!({"success": true, "data": {"is_premium": false}})),
                _ => json_response(401, json!({"detail": "token expired"})),
            }
        });
        let (client, store) = seeded(transport.clone(), "old", Some("r1")).await;

        let result = client.get(endpoints::SUBSCRIPTION).await.unwrap();

        assert_eq!(result["data"]["is_premium"], false);
        let refreshes = transport.sent_to(endpoints::REFRESH_TOKEN);
        assert_eq!(refreshes.len(), 1);
        match &refreshes[0].body {
            RequestBody::Json(body) => assert_eq!(body, &json!({"refresh": "r1"})),
            other => panic!("unexpected refresh body {:?}", other),
        }
        assert_eq!(refreshes[0].authorization(), None);

        let attempts = transport.sent_to(endpoints::SUBSCRIPTION);
        assert_eq!(attempts.len(), 2);
        assert_eq!(auth_of(&attempts[0]).as_deref(), Some("Bearer old"));
        assert_eq!(auth_of(&attempts[1]).as_deref(), Some("Bearer new"));

        assert_eq!(client.credential().await.as_deref(), Some("new"));
        assert_eq!(store.get(StoreKey::Credential).unwrap().as_deref(), Some("new"));
        assert_eq!(store.get(StoreKey::RefreshCredential).unwrap().as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_retry_failure_is_request_failed_without_second_refresh() {
        let transport = MockTransport::new(|req| {
            if req.url.ends_with(endpoints::REFRESH_TOKEN) {
                return json_response(200, json!({"token": "new"}));
            }
            json_response(401, json!({"detail": "Given token not valid for any token type"}))
        });
        let (client, _) = seeded(transport.clone(), "old", Some("r1")).await;

        let err = client.get(endpoints::PATIENT_REPORTS).await.unwrap_err();

        assert!(matches!(err, ApiError::RequestFailed { status: 401, .. }));
        assert_eq!(transport.sent_to(endpoints::REFRESH_TOKEN).len(), 1);
        assert_eq!(transport.sent_to(endpoints::PATIENT_REPORTS).len(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_session() {
        let transport = MockTransport::new(|req| {
            if req.url.ends_with(endpoints::REFRESH_TOKEN) {
                return json_response(401, json!({"success": false, "error": "Token is blacklisted"}));
            }
            json_response(401, json!({"detail": "token expired"}))
        });
        let (client, store) = seeded(transport.clone(), "old", Some("r1")).await;
        store.set(StoreKey::Profile, r#"{"username":"asha"}"#).unwrap();
        store.set(StoreKey::Language, "en").unwrap();

        let err = client.get(endpoints::SUBSCRIPTION).await.unwrap_err();

        assert!(matches!(err, ApiError::SessionExpired));
        assert_eq!(client.credential().await, None);
        assert_eq!(client.state.read().await.refresh, None);
        assert_eq!(store.get(StoreKey::Credential).unwrap(), None);
        assert_eq!(store.get(StoreKey::RefreshCredential).unwrap(), None);
        assert_eq!(store.get(StoreKey::Profile).unwrap(), None);
        assert_eq!(store.get(StoreKey::Language).unwrap().as_deref(), Some("en"));
        assert_eq!(transport.sent_to(endpoints::SUBSCRIPTION).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_refresh_credential_expires_session() {
        let transport = MockTransport::new(|_| json_response(401, json!({"detail": "token expired"})));
        let (client, _) = seeded(transport.clone(), "old", None).await;

        let err = client.get(endpoints::SUBSCRIPTION).await.unwrap_err();

        assert!(err.is_session_expired());
        assert!(transport.sent_to(endpoints::REFRESH_TOKEN).is_empty());
        assert_eq!(client.credential().await, None);
    }

    #[tokio::test]
    async fn test_direct_refresh_without_refresh_credential_skips_network() {
        let transport = MockTransport::new(|_| json_response(200, json!({"token": "never"})));
        let client = client_with(transport.clone(), Arc::new(MemoryStore::new()));

        let err = client.refresh().await.unwrap_err();

        assert!(matches!(err, ApiError::NoRefreshCredential));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_without_token_field_is_failure() {
        let transport = MockTransport::new(|_| json_response(200, json!({"success": true})));
        let (client, _) = seeded(transport, "old", Some("r1")).await;

        let err = client.refresh().await.unwrap_err();

        assert!(matches!(err, ApiError::SessionExpired));
        assert_eq!(client.credential().await, None);
    }

    #[tokio::test]
    async fn test_permission_401_does_not_refresh() {
        let transport = MockTransport::new(|_| {
            json_response(401, json!({"success": false, "error": "Only patients can request OTP"}))
        });
        let (client, _) = seeded(transport.clone(), "xyz", Some("r1")).await;

        let err = client
            .request(endpoints::REQUEST_OTP, RequestOptions::post())
            .await
            .unwrap_err();

        match err {
            ApiError::RequestFailed { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Only patients can request OTP");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(transport.sent_to(endpoints::REFRESH_TOKEN).is_empty());
        assert_eq!(client.credential().await.as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn test_non_json_error_body_uses_generic_message() {
        let transport = MockTransport::new(|_| {
            crate::api::transport::mock::bytes_response(502, "text/html", b"<html>Bad gateway</html>")
        });
        let client = client_with(transport, Arc::new(MemoryStore::new()));

        let err = client.get(endpoints::SUBSCRIPTION).await.unwrap_err();

        assert_eq!(err.to_string(), crate::api::error::GENERIC_ERROR_MESSAGE);
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_invalid_response() {
        let transport = MockTransport::new(|_| {
            crate::api::transport::mock::bytes_response(200, "application/json", b"{oops")
        });
        let client = client_with(transport, Arc::new(MemoryStore::new()));

        let err = client.get(endpoints::SUBSCRIPTION).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_network_failure_propagates() {
        let transport = MockTransport::new(|_| Err(ApiError::Network("connection refused".into())));
        let client = client_with(transport.clone(), Arc::new(MemoryStore::new()));

        let err = client.get(endpoints::SUBSCRIPTION).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_login_stores_pair_and_routes_by_role() {
        let transport = MockTransport::new(|req| {
            if req.url.ends_with(endpoints::HOSPITAL_LOGIN) {
                json_response(200, json!({"success": true, "role": "HOSPITAL_STAFF", "token": "abc", "refresh": "r1"}))
            } else {
                json_response(200, json!({"success": true}))
            }
        });
        let store = Arc::new(MemoryStore::new());
        let client = client_with(transport.clone(), store.clone());

        let request = LoginRequest {
            user_type: UserType::Hospital,
            username: "drrao".into(),
            password: "secret1".into(),
        };
        let data = client.login(&request).await.unwrap();
        assert_eq!(data["role"], "HOSPITAL_STAFF");
        assert_eq!(transport.sent_to(endpoints::HOSPITAL_LOGIN).len(), 1);
        assert!(transport.sent_to(endpoints::PATIENT_LOGIN).is_empty());

        assert_eq!(store.get(StoreKey::Credential).unwrap().as_deref(), Some("abc"));
        assert_eq!(store.get(StoreKey::RefreshCredential).unwrap().as_deref(), Some("r1"));
        // The client never persists the profile itself
        assert_eq!(store.get(StoreKey::Profile).unwrap(), None);

        client.get(endpoints::UPLOAD_HISTORY).await.unwrap();
        let history = transport.sent_to(endpoints::UPLOAD_HISTORY);
        assert_eq!(auth_of(&history[0]).as_deref(), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_second_login_replaces_credential_pair() {
        let logins = Arc::new(AtomicUsize::new(0));
        let counter = logins.clone();
        let transport = MockTransport::new(move |req| {
            if req.url.ends_with(endpoints::PATIENT_LOGIN) {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    json_response(200, json!({"success": true, "token": "abc", "refresh": "r1"}))
                } else {
                    json_response(200, json!({"success": true, "token": "def"}))
                }
            } else {
                json_response(200, json!({"success": true}))
            }
        });
        let store = Arc::new(MemoryStore::new());
        let client = client_with(transport.clone(), store.clone());
        let request = LoginRequest {
            user_type: UserType::Patient,
            username: "asha".into(),
            password: "pw1234".into(),
        };

        client.login(&request).await.unwrap();
        client.login(&request).await.unwrap();
        client.get(endpoints::PATIENT_REPORTS).await.unwrap();

        let reports = transport.sent_to(endpoints::PATIENT_REPORTS);
        assert_eq!(auth_of(&reports[0]).as_deref(), Some("Bearer def"));
        assert_eq!(client.state.read().await.refresh, None);
        assert_eq!(store.get(StoreKey::RefreshCredential).unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_login_keeps_no_credential() {
        let transport = MockTransport::new(|_| {
            json_response(401, json!({"success": false, "error": "Invalid credentials or not a registered patient"}))
        });
        let client = client_with(transport.clone(), Arc::new(MemoryStore::new()));
        let request = LoginRequest {
            user_type: UserType::Patient,
            username: "asha".into(),
            password: "wrong1".into(),
        };

        let err = client.login(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials or not a registered patient");
        assert_eq!(client.credential().await, None);
        assert!(transport.sent_to(endpoints::REFRESH_TOKEN).is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_network_fails() {
        let transport = MockTransport::new(|_| Err(ApiError::Network("unreachable".into())));
        let (client, store) = seeded(transport.clone(), "abc", Some("r1")).await;

        client.logout().await;

        assert_eq!(transport.sent_to(endpoints::LOGOUT).len(), 1);
        assert_eq!(client.credential().await, None);
        assert_eq!(store.get(StoreKey::Credential).unwrap(), None);
        assert_eq!(store.get(StoreKey::RefreshCredential).unwrap(), None);

        // Nothing sent after logout carries the old credential
        client.get(endpoints::SUBSCRIPTION).await.ok();
        let after = transport.sent_to(endpoints::SUBSCRIPTION);
        assert_eq!(after[0].authorization(), None);
    }

    #[tokio::test]
    async fn test_logout_sends_credential_then_clears() {
        let transport = MockTransport::new(|_| json_response(200, json!({"success": true})));
        let (client, _) = seeded(transport.clone(), "abc", Some("r1")).await;

        client.logout().await;

        let logout = transport.sent_to(endpoints::LOGOUT);
        assert_eq!(auth_of(&logout[0]).as_deref(), Some("Bearer abc"));
        assert_eq!(client.credential().await, None);
    }

    #[tokio::test]
    async fn test_concurrent_expiry_coalesces_into_one_refresh() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = refreshes.clone();
        let transport = MockTransport::with_delay(Duration::from_millis(20), move |req| {
            if req.url.ends_with(endpoints::REFRESH_TOKEN) {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                return json_response(200, json!({"token": format!("new{}", n)}));
            }
            match req.authorization() {
                Some("Bearer old") => json_response(401, json!({"detail": "token expired"})),
                _ => json_response(200, json!({"success": true})),
            }
        });
        let (client, _) = seeded(transport.clone(), "old", Some("r1")).await;

        let (a, b, c) = tokio::join!(
            client.get(endpoints::PATIENT_REPORTS),
            client.get(endpoints::SUBSCRIPTION),
            client.get(endpoints::ACCESS_LOGS),
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        for path in [endpoints::PATIENT_REPORTS, endpoints::SUBSCRIPTION, endpoints::ACCESS_LOGS] {
            let attempts = transport.sent_to(path);
            assert_eq!(attempts.len(), 2);
            assert_eq!(auth_of(&attempts[1]).as_deref(), Some("Bearer new1"));
        }
    }

    #[tokio::test]
    async fn test_logout_during_refresh_discards_new_credential() {
        let transport = MockTransport::with_route_delay(
            endpoints::REFRESH_TOKEN,
            Duration::from_millis(100),
            |req| {
                if req.url.ends_with(endpoints::REFRESH_TOKEN) {
                    return json_response(200, json!({"token": "new", "refresh": "r2"}));
                }
                match req.authorization() {
                    Some("Bearer old") if !req.url.ends_with(endpoints::LOGOUT) => {
                        json_response(401, json!({"detail": "token expired"}))
                    }
                    _ => json_response(200, json!({"success": true})),
                }
            },
        );
        let (client, store) = seeded(transport.clone(), "old", Some("r1")).await;
        let client = Arc::new(client);

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.get(endpoints::SUBSCRIPTION).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.logout().await;

        let result = pending.await.unwrap();

        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert_eq!(transport.sent_to(endpoints::REFRESH_TOKEN).len(), 1);
        assert_eq!(client.credential().await, None);
        assert_eq!(store.get(StoreKey::Credential).unwrap(), None);
        assert_eq!(store.get(StoreKey::RefreshCredential).unwrap(), None);

        client.get(endpoints::ACCESS_LOGS).await.unwrap();
        assert_eq!(transport.sent_to(endpoints::ACCESS_LOGS)[0].authorization(), None);
    }

    #[tokio::test]
    async fn test_login_during_refresh_keeps_new_session() {
        let transport = MockTransport::with_route_delay(
            endpoints::REFRESH_TOKEN,
            Duration::from_millis(100),
            |req| {
                if req.url.ends_with(endpoints::REFRESH_TOKEN) {
                    return json_response(200, json!({"token": "stale"}));
                }
                if req.url.ends_with(endpoints::PATIENT_LOGIN) {
                    return json_response(200, json!({"success": true, "token": "fresh", "refresh": "rf"}));
                }
                match req.authorization() {
                    Some("Bearer old") => json_response(401, json!({"detail": "token expired"})),
                    _ => json_response(200, json!({"success": true})),
                }
            },
        );
        let (client, store) = seeded(transport.clone(), "old", Some("r1")).await;
        let client = Arc::new(client);

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.get(endpoints::SUBSCRIPTION).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        client
            .login(&LoginRequest {
                user_type: UserType::Patient,
                username: "asha".into(),
                password: "pw1234".into(),
            })
            .await
            .unwrap();

        let result = pending.await.unwrap();

        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert_eq!(client.credential().await.as_deref(), Some("fresh"));
        assert_eq!(store.get(StoreKey::Credential).unwrap().as_deref(), Some("fresh"));
        assert_eq!(store.get(StoreKey::RefreshCredential).unwrap().as_deref(), Some("rf"));
    }

    #[tokio::test]
    async fn test_concurrent_expiry_after_failed_refresh_all_expire() {
        let transport = MockTransport::with_delay(Duration::from_millis(20), |req| {
            if req.url.ends_with(endpoints::REFRESH_TOKEN) {
                return json_response(401, json!({"error": "Token is invalid or expired"}));
            }
            json_response(401, json!({"detail": "token expired"}))
        });
        let (client, _) = seeded(transport.clone(), "old", Some("r1")).await;

        let (a, b) = tokio::join!(
            client.get(endpoints::PATIENT_REPORTS),
            client.get(endpoints::SUBSCRIPTION),
        );

        assert!(matches!(a, Err(ApiError::SessionExpired)));
        assert!(matches!(b, Err(ApiError::SessionExpired)));
        assert_eq!(transport.sent_to(endpoints::REFRESH_TOKEN).len(), 1);
    }
}
