//! Session holder plugin for the Nimbus client
//!
//! The plugin keeps the current user session and hands its access token to
//! other plugins. Closing the client clears the session unless
//! [`AuthConfig::clear_on_close`] is turned off.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::header::AUTHORIZATION;
use nimbus_client::{ClientHandle, PluginDescriptor};
use nimbus_core::{Error, Plugin, PluginError, PluginKey, PluginResult, Result};
use nimbus_transport::{HeaderValue, TransportRequest};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Descriptor of the auth plugin
#[derive(Debug, Clone, Copy, Default)]
pub struct Auth;

impl Auth {
    /// Key the plugin is installed under
    pub const KEY: PluginKey = PluginKey::from_static("auth");
}

/// Auth plugin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Sessions expiring within this margin are treated as expired
    #[serde(with = "humantime_serde")]
    pub expiry_margin: Duration,

    /// Clear the session when the client is closed
    pub clear_on_close: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            expiry_margin: Duration::from_secs(10),
            clear_on_close: true,
        }
    }
}

/// Authenticated user session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for user-scoped requests
    pub access_token: String,

    /// Token used to obtain a new access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Expiry of the access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Id of the signed-in user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Session {
    /// Create a session with no expiry
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            user_id: None,
        }
    }

    /// Set the expiry
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the user id
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Check if the session expires before `now + margin`
    pub fn is_expired_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        self.expires_at.is_some_and(|expires_at| expires_at <= now + margin)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl PluginDescriptor for Auth {
    type Config = AuthConfig;
    type Plugin = AuthPlugin;

    fn key(&self) -> PluginKey {
        Self::KEY
    }

    fn validate_config(&self, config: &AuthConfig) -> PluginResult<()> {
        if config.expiry_margin > Duration::from_secs(3600) {
            return Err(PluginError::config("expiry_margin must not exceed 1h"));
        }
        Ok(())
    }

    fn create(&self, client: ClientHandle, config: AuthConfig) -> PluginResult<AuthPlugin> {
        debug!(clear_on_close = config.clear_on_close, "Creating auth plugin");

        Ok(AuthPlugin {
            client,
            config,
            session: RwLock::new(None),
        })
    }
}

/// Holds the session of the signed-in user
#[derive(Debug)]
pub struct AuthPlugin {
    client: ClientHandle,
    config: AuthConfig,
    session: RwLock<Option<Session>>,
}

impl AuthPlugin {
    /// Plugin configuration
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Replace the current session
    pub fn set_session(&self, session: Session) -> PluginResult<()> {
        if session.access_token.trim().is_empty() {
            return Err(PluginError::invalid_state("session has no access token"));
        }

        info!(user_id = ?session.user_id, "Session set");
        *self.session.write() = Some(session);
        Ok(())
    }

    /// Current session, expired or not
    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Access token of the current session if it has not expired
    pub fn access_token(&self) -> Option<String> {
        let session = self.session.read();
        let session = session.as_ref()?;

        if session.is_expired_at(Utc::now(), self.config.expiry_margin) {
            debug!("Session expired");
            return None;
        }

        Some(session.access_token.clone())
    }

    /// Drop the current session, returning whether there was one
    pub fn clear_session(&self) -> bool {
        self.session.write().take().is_some()
    }

    /// Fetch the signed-in user from the backend
    ///
    /// Fails with [`Error::Plugin`] carrying [`PluginError::InvalidState`]
    /// when there is no live session.
    pub async fn get_user(&self) -> Result<serde_json::Value> {
        let token = self.access_token().ok_or_else(|| {
            Error::plugin(Auth::KEY, PluginError::invalid_state("no active session"))
        })?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            Error::plugin(
                Auth::KEY,
                PluginError::invalid_state(format!("access token is not a valid header value: {e}")),
            )
        })?;
        bearer.set_sensitive(true);

        let client = self.client.upgrade()?;
        client
            .transport()
            .execute(TransportRequest::get("auth/v1/user").header(AUTHORIZATION, bearer))
            .await?
            .error_for_status()?
            .json()
    }
}

#[async_trait]
impl Plugin for AuthPlugin {
    async fn close(&self) -> PluginResult<()> {
        if self.config.clear_on_close && self.clear_session() {
            info!("Session cleared");
        }
        Ok(())
    }
}
