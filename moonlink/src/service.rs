//! Inbound API: create short tokens, resolve them, ping the runtime.
//!
//! [`UrlShortener`] is what an HTTP front end would call. It owns no state;
//! every call goes through the node's router to the token's worker.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::actors::{ActorError, ActorRef, ActorRouter};
use crate::health;
use crate::worker::UrlRecordRef;

/// Path prefix under which tokens are resolved.
pub const RESOLVE_PATH_PREFIX: &str = "/go/";

/// Tokens drawn before [`UrlShortener::create_short`] gives up on collisions.
pub const MAX_TOKEN_ATTEMPTS: usize = 8;

/// Opaque short token; the key of a URL record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShortToken(String);

impl ShortToken {
    /// Generate a fresh token: uppercase hex of a random 32-bit value.
    pub fn generate() -> Self {
        Self(format!("{:X}", rand::random::<u32>()))
    }

    /// The token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path that resolves this token, e.g. `/go/1F3A`.
    pub fn resolve_path(&self) -> String {
        format!("{RESOLVE_PATH_PREFIX}{}", self.0)
    }
}

impl From<String> for ShortToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for ShortToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl fmt::Display for ShortToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// URL shortener front door.
#[derive(Clone)]
pub struct UrlShortener {
    router: Rc<ActorRouter>,
}

impl UrlShortener {
    /// Serve requests through `router`.
    pub fn new(router: Rc<ActorRouter>) -> Self {
        Self { router }
    }

    /// Store `raw` under a fresh token and return the token.
    ///
    /// Fails with [`ActorError::InvalidArgument`] when `raw` is missing or
    /// blank; nothing is stored in that case. A token that already holds a
    /// record is never overwritten: another one is drawn instead.
    pub async fn create_short(&self, raw: Option<&str>) -> Result<ShortToken, ActorError> {
        self.create_with(raw, ShortToken::generate).await
    }

    async fn create_with(
        &self,
        raw: Option<&str>,
        mut next_token: impl FnMut() -> ShortToken,
    ) -> Result<ShortToken, ActorError> {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = next_token();
            if UrlRecordRef::from_router(token.as_str(), &self.router)
                .create(raw)
                .await?
            {
                tracing::info!(token = %token, "short url created");
                return Ok(token);
            }
            tracing::warn!(token = %token, "token collision, drawing another");
        }
        Err(ActorError::Unavailable(format!(
            "no free token after {MAX_TOKEN_ATTEMPTS} attempts"
        )))
    }

    /// The full URL stored under `token`, or [`ActorError::NotFound`].
    pub async fn resolve(&self, token: &ShortToken) -> Result<String, ActorError> {
        UrlRecordRef::from_router(token.as_str(), &self.router)
            .read()
            .await
    }

    /// Round-trip through the node-local health actor.
    pub async fn ping(&self) -> Result<(), ActorError> {
        health::ping(&self.router).await
    }
}
