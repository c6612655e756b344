// Portal session
//
// Owns the cookie-bearing HTTP client, the credential pair, and the
// authenticated/expired state machine. Every method takes `&self` and is
// safe to call concurrently from the poll loop and interactive handlers.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use reqwest::cookie::Jar;
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;
use tracing::debug;

use crate::error::Error;
use crate::state::DeviceId;
use crate::transport::TransportConfig;

/// Sessions lapse after 30 minutes without an authenticated call.
pub const DEFAULT_SESSION_EXPIRY: Duration = Duration::from_secs(30 * 60);

/// Username/password pair. The password never leaves its `SecretString`
/// except when the login form is built.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    /// Both halves are non-empty. Login is never attempted otherwise.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.expose_secret().is_empty()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    credentials: Option<Credentials>,
    authenticated: bool,
    last_auth: Option<Instant>,
    last_device_id: Option<DeviceId>,
}

/// Authenticated HTTP transport plus login state.
pub struct Session {
    state: RwLock<SessionState>,
    http: RwLock<reqwest::Client>,
    transport: TransportConfig,
    expiry: Duration,
}

impl Session {
    pub fn new(transport: TransportConfig, expiry: Duration) -> Result<Self, Error> {
        let http = transport.build_session_client(Arc::new(Jar::default()))?;
        Ok(Self {
            state: RwLock::new(SessionState::default()),
            http: RwLock::new(http),
            transport,
            expiry,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current HTTP client. Cheap to clone (reqwest clients are `Arc`s).
    pub fn client(&self) -> reqwest::Client {
        self.http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── Credentials ─────────────────────────────────────────────────

    /// Replace the credential pair. Always drops back to unauthenticated.
    pub fn set_credentials(&self, username: impl Into<String>, password: SecretString) {
        let mut state = self.write();
        state.credentials = Some(Credentials {
            username: username.into(),
            password,
        });
        state.authenticated = false;
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.read().credentials.clone()
    }

    pub fn has_credentials(&self) -> bool {
        self.read()
            .credentials
            .as_ref()
            .is_some_and(Credentials::is_complete)
    }

    // ── Authentication state ────────────────────────────────────────

    /// True only while the flag is set and the last authentication is
    /// within the expiry window.
    pub fn is_authenticated(&self) -> bool {
        let state = self.read();
        state.authenticated
            && state
                .last_auth
                .is_some_and(|at| at.elapsed() <= self.expiry)
    }

    pub fn mark_authenticated(&self) {
        let mut state = self.write();
        state.authenticated = true;
        state.last_auth = Some(Instant::now());
    }

    pub fn mark_unauthenticated(&self) {
        self.write().authenticated = false;
    }

    /// Slide the expiry window forward without touching the flag.
    pub fn refresh(&self) {
        self.write().last_auth = Some(Instant::now());
    }

    /// Drop every cookie and fall back to unauthenticated.
    pub fn clear(&self) -> Result<(), Error> {
        let fresh = self
            .transport
            .build_session_client(Arc::new(Jar::default()))?;
        *self.http.write().unwrap_or_else(PoisonError::into_inner) = fresh;

        let mut state = self.write();
        state.authenticated = false;
        state.last_auth = None;
        debug!("session cleared");
        Ok(())
    }

    // ── Discovery aid ───────────────────────────────────────────────

    pub fn last_device_id(&self) -> Option<DeviceId> {
        self.read().last_device_id
    }

    pub fn set_last_device_id(&self, id: DeviceId) {
        self.write().last_device_id = Some(id);
    }
}
