//! Admin sessions.
//!
//! A single configured credential unlocks the admin API. A successful login
//! issues an opaque bearer token that the server remembers until it expires
//! or the admin logs out. No hashing, no user table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::AppState;
use crate::errors::ServerError;

/// Where the admin UI should go after a successful login.
pub const DASHBOARD_PATH: &str = "/admin/dashboard";

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct SessionStore {
    username: String,
    password: String,
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(username: impl Into<String>, password: impl Into<String>, ttl: Duration) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Open a session when `credentials` match the configured pair.
    pub async fn login(&self, credentials: &Credentials) -> Option<Session> {
        if credentials.username != self.username || credentials.password != self.password {
            warn!("Rejected admin login for {:?}", credentials.username);
            return None;
        }

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let issued_at = Utc::now();
        let session = Session {
            token: hex::encode(bytes),
            username: credentials.username.clone(),
            issued_at,
            expires_at: issued_at
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());
        Some(session)
    }

    /// The live session for `token`, if any.
    pub async fn verify(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|s| !s.is_expired(Utc::now()))
            .cloned()
    }

    /// Returns whether a session was actually closed.
    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Drop expired sessions; returns how many were removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!("Purged {purged} expired admin sessions");
        }
        purged
    }
}

/// Extractor for handlers that require a logged-in admin.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ServerError::Unauthorized("missing bearer token".to_string()))?;
        state
            .sessions
            .verify(token)
            .await
            .map(AdminSession)
            .ok_or_else(|| ServerError::Unauthorized("session expired or unknown".to_string()))
    }
}
