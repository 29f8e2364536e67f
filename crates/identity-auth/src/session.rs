//! Login session lifecycle
//!
//! Sessions use sliding expiration. A session validated inside the trailing
//! refresh window is replaced: a new session (new id, new secret, full
//! span) is saved, the old row is deleted, and the new token is handed
//! back so the caller can update the client's cookie. Rows are never
//! extended in place.

use chrono::Duration;
use identity_tokens::{SessionId, SessionToken};
use tracing::instrument;

use crate::artifact::Session;
use crate::config::AuthConfig;
use crate::engine::ArtifactEngine;
use crate::error::AuthResult;
use crate::user::{User, UserId};

/// A freshly issued session and the user it belongs to.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    /// Signed-in user
    pub user: User,
    /// Stored session
    pub session: Session,
    /// Token to hand to the client
    pub token: SessionToken,
}

/// Result of validating a session token.
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    /// The live session; the replacement when a refresh happened
    pub session: Session,
    /// Signed-in user
    pub user: User,
    /// New token when the session was rotated
    pub refreshed: Option<SessionToken>,
}

/// Creates, validates, refreshes and revokes login sessions.
#[derive(Debug, Clone)]
pub struct SessionLifecycle {
    engine: ArtifactEngine<Session>,
    ttl: Duration,
    refresh_window: Duration,
}

impl SessionLifecycle {
    /// Create a lifecycle using the session spans from `config`.
    pub fn new(engine: ArtifactEngine<Session>, config: &AuthConfig) -> Self {
        Self {
            engine,
            ttl: config.session_ttl(),
            refresh_window: config.session_refresh_window(),
        }
    }

    /// Underlying engine.
    pub fn engine(&self) -> &ArtifactEngine<Session> {
        &self.engine
    }

    /// Check whether `session` is dead now.
    pub fn is_expired(&self, session: &Session) -> bool {
        self.engine.now() >= session.expires_at
    }

    /// Check whether `session` has entered its refresh window.
    pub fn is_refreshable(&self, session: &Session) -> bool {
        self.engine.now() >= session.expires_at - self.refresh_window
    }

    /// Issue a new session for `user_id`.
    pub async fn create(&self, user_id: UserId) -> AuthResult<(Session, SessionToken)> {
        self.engine
            .issue(self.ttl, |seed| Session {
                id: seed.id,
                user_id,
                secret_hash: seed.secret_hash,
                expires_at: seed.expires_at,
            })
            .await
    }

    /// Issue a new session and package it with its user.
    pub async fn grant(&self, user: User) -> AuthResult<SessionGrant> {
        let (session, token) = self.create(user.id).await?;
        tracing::info!(user_id = %user.id, session_id = %session.id, "session granted");
        Ok(SessionGrant {
            user,
            session,
            token,
        })
    }

    /// Validate a session token, rotating it inside the refresh window.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &SessionToken) -> AuthResult<ValidatedSession> {
        let (session, user) = self.engine.validate(token).await?.into_bound()?;

        if !self.is_refreshable(&session) {
            return Ok(ValidatedSession {
                session,
                user,
                refreshed: None,
            });
        }

        let (replacement, token) = self.create(user.id).await?;
        self.engine.consume(&session.id).await?;
        tracing::debug!(
            user_id = %user.id,
            old_session_id = %session.id,
            session_id = %replacement.id,
            "session rotated"
        );

        Ok(ValidatedSession {
            session: replacement,
            user,
            refreshed: Some(token),
        })
    }

    /// Delete one session.
    pub async fn invalidate(&self, id: &SessionId) -> AuthResult<()> {
        self.engine.consume(id).await
    }

    /// Delete every session of `user_id`.
    pub async fn invalidate_all(&self, user_id: UserId) -> AuthResult<u64> {
        let removed = self.engine.revoke_owner(user_id).await?;
        tracing::info!(user_id = %user_id, removed, "all sessions invalidated");
        Ok(removed)
    }
}
