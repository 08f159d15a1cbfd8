use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::{ApiError, SessionClient};
use crate::models::{AuthResponse, Language, LoginRequest, RegisterRequest, Role, UserProfile};

use super::store::{SessionStore, StoreKey};

/// Result of a login attempt. `profile` is set only when the backend
/// confirmed the login with a user object and a token.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub response: Value,
    pub profile: Option<UserProfile>,
}

impl LoginOutcome {
    pub fn is_authenticated(&self) -> bool {
        self.profile.is_some()
    }
}

/// Application-wide session context. Constructed once at startup and
/// shared with everything that needs to know who is signed in.
pub struct AuthContext {
    client: Arc<SessionClient>,
    profile: RwLock<Option<UserProfile>>,
}

impl AuthContext {
    /// Restore the session from the store. Anything short of a consistent
    /// credential plus a parsable profile counts as logged out, and the
    /// leftovers are wiped.
    pub async fn bootstrap(client: Arc<SessionClient>) -> Self {
        let profile = match Self::load_profile(client.store().as_ref()) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "Discarding inconsistent session state");
                if let Err(e) = client.store().clear_all() {
                    warn!(error = %e, "Failed to clear session store");
                }
                None
            }
        };

        client.hydrate().await;
        debug!(authenticated = profile.is_some(), "Session bootstrapped");

        Self {
            client,
            profile: RwLock::new(profile),
        }
    }

    fn load_profile(store: &dyn SessionStore) -> Result<Option<UserProfile>> {
        let credential = store.get(StoreKey::Credential)?;
        let refresh = store.get(StoreKey::RefreshCredential)?;
        let profile = store.get(StoreKey::Profile)?;

        match (credential, profile) {
            (Some(_), Some(raw)) => {
                let profile: UserProfile = serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("Failed to parse stored profile: {}", e))?;
                Ok(Some(profile))
            }
            (None, None) if refresh.is_none() => Ok(None),
            _ => Err(anyhow::anyhow!("Stored session is incomplete")),
        }
    }

    pub fn client(&self) -> &Arc<SessionClient> {
        &self.client
    }

    pub async fn is_authenticated(&self) -> bool {
        self.profile.read().await.is_some()
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.profile.read().await.clone()
    }

    pub async fn role(&self) -> Option<Role> {
        self.profile.read().await.as_ref().map(UserProfile::role)
    }

    // ===== Auth flows =====

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome, ApiError> {
        let response = self.client.login(request).await?;
        let auth = AuthResponse::from_value(&response);

        let profile = match (auth.success, auth.user, auth.token.is_some()) {
            (true, Some(mut user), true) => {
                // Explicit role first, then the profile's own, then the login route
                user.role = auth
                    .role
                    .or(user.role)
                    .or(Some(request.user_type.into()));
                self.persist_profile(&user);
                *self.profile.write().await = Some(user.clone());
                info!(username = %user.username, role = ?user.role(), "Session started");
                Some(user)
            }
            _ => None,
        };

        Ok(LoginOutcome { response, profile })
    }

    pub async fn register(&self, registration: &RegisterRequest) -> Result<Value, ApiError> {
        self.client.register(registration).await
    }

    /// Log out on the server (best effort) and forget the local session.
    pub async fn logout(&self) {
        self.client.logout().await;
        self.forget().await;
    }

    /// Pass a result through, ending the local session if it reports an
    /// expired session.
    pub async fn observe<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(ref e) = result {
            if e.is_session_expired() {
                warn!("Session expired, signing out");
                self.forget().await;
            }
        }
        result
    }

    async fn forget(&self) {
        *self.profile.write().await = None;
        if let Err(e) = self.client.store().remove(StoreKey::Profile) {
            warn!(error = %e, "Failed to remove stored profile");
        }
    }

    fn persist_profile(&self, profile: &UserProfile) {
        let persisted = serde_json::to_string(profile)
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.client.store().set(StoreKey::Profile, &raw));
        if let Err(e) = persisted {
            warn!(error = %e, "Failed to persist profile");
        }
    }

    // ===== Preferences =====

    pub fn language(&self) -> Language {
        match self.client.store().get(StoreKey::Language) {
            Ok(Some(code)) => code.parse().unwrap_or_default(),
            Ok(None) => Language::default(),
            Err(e) => {
                debug!(error = %e, "Failed to read language preference");
                Language::default()
            }
        }
    }

    pub fn set_language(&self, language: Language) -> Result<()> {
        self.client.store().set(StoreKey::Language, language.code())
    }
}
