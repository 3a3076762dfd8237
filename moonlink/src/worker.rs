//! The URL record worker: one virtual actor per short token.
//!
//! Each activation holds the token's [`UrlRecord`] in a
//! [`PersistentState`] under the `url-store` record type. Writes normalize
//! the URL, then persist before acknowledging; reads serve the cached record
//! and fall back to one store read on a cold activation.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::actors::{
    ActorContext, ActorError, ActorHandler, ActorId, ActorRef, ActorRouter, ActorType,
    DeactivationReason, PersistentState,
};
use crate::normalize::normalize;

/// Actor type of [`UrlRecordWorker`].
pub const URL_RECORD_ACTOR: ActorType = ActorType(0x5552_4C53);

/// Record type the worker persists under.
pub const URL_STORE: &str = "url-store";

/// Method discriminants of [`UrlRecordWorker`].
pub mod url_record_methods {
    /// Store a URL under the token.
    pub const WRITE: u32 = 1;
    /// Return the stored URL.
    pub const READ: u32 = 2;
    /// Store a URL only if the token is still free; answers `true` when stored.
    pub const CREATE: u32 = 3;
}

/// The persisted record for one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The short token this record belongs to.
    pub token: String,
    /// Normalized absolute URL.
    pub full_url: String,
}

/// Body of a `WRITE` call. `None` models a missing form field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Raw URL as received.
    pub full_url: Option<String>,
}

/// Virtual actor owning one token's [`UrlRecord`].
///
/// The cached record only changes once the store has accepted the new one,
/// so a failed write leaves both the cache and the store as they were.
#[derive(Debug, Default)]
pub struct UrlRecordWorker {
    record: Option<PersistentState<Option<UrlRecord>>>,
}

impl UrlRecordWorker {
    fn record(&mut self) -> Result<&mut PersistentState<Option<UrlRecord>>, ActorError> {
        self.record
            .as_mut()
            .ok_or_else(|| ActorError::Handler("url record used before activation".into()))
    }

    async fn write(&mut self, ctx: &ActorContext, body: &[u8]) -> Result<Vec<u8>, ActorError> {
        let request: WriteRequest = serde_json::from_slice(body)?;
        let full_url = normalize(request.full_url.as_deref())?;

        let record = self.record()?;
        record
            .commit(Some(UrlRecord {
                token: ctx.id.identity.clone(),
                full_url,
            }))
            .await?;
        tracing::debug!(token = %ctx.id.identity, etag = ?record.etag(), "url stored");
        Ok(serde_json::to_vec(&())?)
    }

    async fn create(&mut self, ctx: &ActorContext, body: &[u8]) -> Result<Vec<u8>, ActorError> {
        let request: WriteRequest = serde_json::from_slice(body)?;
        let full_url = normalize(request.full_url.as_deref())?;

        let record = self.record()?;
        if record.state().is_some() {
            tracing::debug!(token = %ctx.id.identity, "token already taken");
            return Ok(serde_json::to_vec(&false)?);
        }
        record
            .commit(Some(UrlRecord {
                token: ctx.id.identity.clone(),
                full_url,
            }))
            .await?;
        Ok(serde_json::to_vec(&true)?)
    }

    async fn read(&mut self, ctx: &ActorContext) -> Result<Vec<u8>, ActorError> {
        let record = self.record()?;
        if record.state().is_none() {
            record.read_state().await?;
        }
        match record.state() {
            Some(stored) => Ok(serde_json::to_vec(&stored.full_url)?),
            None => Err(ActorError::NotFound {
                key: ctx.id.identity.clone(),
            }),
        }
    }
}

#[async_trait::async_trait(?Send)]
impl ActorHandler for UrlRecordWorker {
    fn actor_type() -> ActorType {
        URL_RECORD_ACTOR
    }

    async fn on_activate(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        let record = PersistentState::load(ctx.store().clone(), URL_STORE, &ctx.id.identity).await?;
        self.record = Some(record);
        Ok(())
    }

    async fn on_deactivate(
        &mut self,
        ctx: &ActorContext,
        reason: DeactivationReason,
    ) -> Result<(), ActorError> {
        if let Some(record) = self.record.as_mut().filter(|r| r.is_dirty()) {
            tracing::info!(token = %ctx.id.identity, ?reason, "flushing unsaved url");
            record.write_state_last_wins().await?;
        }
        Ok(())
    }

    async fn dispatch(
        &mut self,
        ctx: &ActorContext,
        method: u32,
        body: &[u8],
    ) -> Result<Vec<u8>, ActorError> {
        match method {
            url_record_methods::WRITE => self.write(ctx, body).await,
            url_record_methods::READ => self.read(ctx).await,
            url_record_methods::CREATE => self.create(ctx, body).await,
            _ => Err(ActorError::UnknownMethod(method)),
        }
    }
}

/// Typed reference to a token's [`UrlRecordWorker`].
#[derive(Clone)]
pub struct UrlRecordRef {
    id: ActorId,
    router: Rc<ActorRouter>,
}

impl ActorRef for UrlRecordRef {
    fn from_router(identity: impl Into<String>, router: &Rc<ActorRouter>) -> Self {
        Self {
            id: ActorId::new(URL_RECORD_ACTOR, identity),
            router: router.clone(),
        }
    }
}

impl UrlRecordRef {
    /// The token this reference addresses.
    pub fn token(&self) -> &str {
        &self.id.identity
    }

    /// Store `full_url` under the token, replacing any previous value.
    pub async fn write(&self, full_url: Option<&str>) -> Result<(), ActorError> {
        let request = WriteRequest {
            full_url: full_url.map(str::to_string),
        };
        self.router
            .invoke(&self.id, url_record_methods::WRITE, &request)
            .await
    }

    /// Store `full_url` unless the token already holds a record. Returns
    /// whether it was stored.
    pub async fn create(&self, full_url: Option<&str>) -> Result<bool, ActorError> {
        let request = WriteRequest {
            full_url: full_url.map(str::to_string),
        };
        self.router
            .invoke(&self.id, url_record_methods::CREATE, &request)
            .await
    }

    /// The stored URL, or [`ActorError::NotFound`].
    pub async fn read(&self) -> Result<String, ActorError> {
        self.router
            .invoke(&self.id, url_record_methods::READ, &())
            .await
    }
}
