//! Session authentication — resolves bearer tokens to session subjects.
//!
//! The identity provider lives outside this service; all we need from a
//! request is the opaque subject identifier it issued. `JwtSessions` reads
//! the `sub` claim out of the bearer JWT's payload segment — signature
//! verification happens upstream at the identity layer, so none is repeated
//! here.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::Deserialize;

/// Subject identifier the identity provider issued for the authenticated
/// caller. Used as an opaque key into the users table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionSubject(pub String);

impl SessionSubject {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session lookup: a bearer token either maps to a subject or to nothing.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> Option<SessionSubject>;
}

/// Extract the bearer token from an Authorization header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

// ── JWT sessions ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct JwtPayload {
    sub: String,
    #[serde(default)]
    exp: Option<i64>,
}

/// Resolves subjects from identity-provider JWTs.
#[derive(Debug, Clone, Default)]
pub struct JwtSessions;

impl JwtSessions {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionProvider for JwtSessions {
    async fn authenticate(&self, token: &str) -> Option<SessionSubject> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return None;
        }
        let payload_bytes = URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
        let payload: JwtPayload = serde_json::from_slice(&payload_bytes).ok()?;

        if let Some(exp) = payload.exp {
            if exp < Utc::now().timestamp() {
                return None;
            }
        }

        Some(SessionSubject(payload.sub))
    }
}

// ── Static sessions ─────────────────────────────────────────────────────

/// Fixed token-to-subject map for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSessions {
    tokens: HashMap<String, String>,
}

impl StaticSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, subject: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), subject.into());
        self
    }
}

#[async_trait]
impl SessionProvider for StaticSessions {
    async fn authenticate(&self, token: &str) -> Option<SessionSubject> {
        self.tokens
            .get(token)
            .map(|subject| SessionSubject(subject.clone()))
    }
}
