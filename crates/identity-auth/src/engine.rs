//! Artifact validation engine
//!
//! [`ArtifactEngine`] is the single issue/validate algorithm shared by every
//! artifact kind. Validation runs in a fixed order:
//!
//! 1. decode the token
//! 2. look the artifact up by id
//! 3. delete it now, for [`VerifyOrder::DeleteThenVerify`] kinds
//! 4. verify the secret against the stored hash (constant time)
//! 5. reject and delete if expired
//! 6. load the bound owner; reject and delete if missing or if the owner's
//!    email drifted from the one the artifact was issued for
//!
//! All cleanup deletions complete before the error is returned.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use identity_tokens::{ArtifactId, ArtifactKind, SecretHasher, Token};
use tracing::instrument;

use crate::artifact::{Artifact, ArtifactSeed, Binding, CodeBearing, VerifyOrder};
use crate::clock::Clock;
use crate::error::{AuthError, AuthResult, InvalidReason};
use crate::store::ArtifactStore;
use crate::user::{User, UserId, UserStore};

/// An artifact that passed validation, with its bound owner.
#[derive(Debug, Clone)]
pub struct Validated<A> {
    /// The stored artifact
    pub artifact: A,
    /// The bound owner, loaded during validation; `None` for unbound kinds
    pub owner: Option<User>,
}

impl<A> Validated<A> {
    /// Split into artifact and owner, for kinds that are always bound.
    pub fn into_bound(self) -> AuthResult<(A, User)> {
        match self.owner {
            Some(owner) => Ok((self.artifact, owner)),
            None => Err(AuthError::Internal(
                "validated artifact has no bound owner".to_string(),
            )),
        }
    }
}

/// Issues and validates artifacts of type `A`.
pub struct ArtifactEngine<A: Artifact> {
    store: Arc<dyn ArtifactStore<A>>,
    users: Arc<dyn UserStore>,
    hasher: Arc<dyn SecretHasher>,
    clock: Arc<dyn Clock>,
}

impl<A: Artifact> Clone for ArtifactEngine<A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            users: Arc::clone(&self.users),
            hasher: Arc::clone(&self.hasher),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<A: Artifact> std::fmt::Debug for ArtifactEngine<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactEngine")
            .field("kind", &Self::kind())
            .finish_non_exhaustive()
    }
}

impl<A: Artifact> ArtifactEngine<A> {
    /// Create an engine over the given store and collaborators.
    pub fn new(
        store: Arc<dyn ArtifactStore<A>>,
        users: Arc<dyn UserStore>,
        hasher: Arc<dyn SecretHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            users,
            hasher,
            clock,
        }
    }

    fn kind() -> &'static str {
        <A::Kind as ArtifactKind>::NAME
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<dyn ArtifactStore<A>> {
        &self.store
    }

    /// User store used for binding checks.
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// Issue a new artifact living for `span`.
    ///
    /// Generates the id and secret, hands the seed to `build` for the
    /// kind-specific fields, saves the result and returns it with the
    /// client token. The plaintext secret exists only inside the token.
    #[instrument(skip_all, fields(kind = Self::kind()))]
    pub async fn issue<F>(&self, span: Duration, build: F) -> AuthResult<(A, Token<A::Kind>)>
    where
        F: FnOnce(ArtifactSeed<A::Kind>) -> A,
    {
        let secret = self.hasher.generate_secret();
        let issued_at = self.clock.now();
        let artifact = build(ArtifactSeed {
            id: ArtifactId::generate(),
            secret_hash: self.hasher.hash(&secret),
            expires_at: issued_at + span,
            issued_at,
        });

        self.store.save(&artifact).await?;
        let token = Token::encode(artifact.id(), &secret);

        tracing::debug!(
            artifact_id = %artifact.id(),
            expires_at = %artifact.expires_at(),
            "artifact issued"
        );
        Ok((artifact, token))
    }

    /// Validate a presented token.
    #[instrument(skip_all, fields(kind = Self::kind()))]
    pub async fn validate(&self, token: &Token<A::Kind>) -> AuthResult<Validated<A>> {
        let (id, secret) = token
            .decode()
            .map_err(|_| Self::reject(None, InvalidReason::Malformed))?;

        let Some(artifact) = self.store.find_by_id(&id).await? else {
            return Err(Self::reject(Some(&id), InvalidReason::NotFound));
        };

        let burned = A::VERIFY_ORDER == VerifyOrder::DeleteThenVerify;
        if burned {
            self.store.delete_by_id(&id).await?;
        }

        if !self.hasher.verify(&secret, artifact.secret_hash()) {
            return Err(Self::reject(Some(&id), InvalidReason::SecretMismatch));
        }

        if artifact.is_expired_at(self.clock.now()) {
            self.discard(&id, burned).await?;
            tracing::debug!(artifact_id = %id, "artifact expired");
            return Err(AuthError::Expired);
        }

        let owner = match artifact.binding() {
            Binding::None => None,
            Binding::Owner(user_id) => Some(self.bound_owner(&id, user_id, None, burned).await?),
            Binding::OwnerEmail { user_id, email } => {
                Some(self.bound_owner(&id, user_id, Some(email), burned).await?)
            }
        };

        Ok(Validated { artifact, owner })
    }

    /// Check an emailed code. A mismatch leaves the artifact in place.
    pub fn check_code(&self, artifact: &A, presented: &str) -> AuthResult<()>
    where
        A: CodeBearing,
    {
        match artifact.code() {
            Some(code) if code.matches(presented) => Ok(()),
            _ => {
                tracing::debug!(
                    kind = Self::kind(),
                    artifact_id = %artifact.id(),
                    "verification code mismatch"
                );
                Err(AuthError::InvalidCode)
            }
        }
    }

    /// Write back flag changes to a stored artifact; `expires_at` is never
    /// changed. Fails with `Invalid(NotFound)` if the artifact was deleted
    /// since it was validated.
    pub async fn update(&self, artifact: &A) -> AuthResult<()> {
        if self.store.update(artifact).await? {
            Ok(())
        } else {
            Err(Self::reject(Some(artifact.id()), InvalidReason::NotFound))
        }
    }

    /// Delete one artifact.
    pub async fn consume(&self, id: &ArtifactId<A::Kind>) -> AuthResult<()> {
        self.store.delete_by_id(id).await?;
        Ok(())
    }

    /// Delete every artifact of this kind bound to `owner`.
    pub async fn revoke_owner(&self, owner: UserId) -> AuthResult<u64> {
        let removed = self.store.delete_by_owner(owner).await?;
        if removed > 0 {
            tracing::debug!(kind = Self::kind(), user_id = %owner, removed, "artifacts revoked");
        }
        Ok(removed)
    }

    /// Delete every expired artifact of this kind.
    pub async fn sweep_expired(&self) -> AuthResult<u64> {
        let removed = self.store.delete_expired(self.clock.now()).await?;
        tracing::info!(kind = Self::kind(), removed, "expired artifacts swept");
        Ok(removed)
    }

    async fn bound_owner(
        &self,
        id: &ArtifactId<A::Kind>,
        user_id: UserId,
        email: Option<&str>,
        burned: bool,
    ) -> AuthResult<User> {
        let Some(owner) = self.users.find_by_id(user_id).await? else {
            self.discard(id, burned).await?;
            return Err(Self::reject(Some(id), InvalidReason::OwnerMissing));
        };

        if let Some(email) = email {
            if owner.email != email {
                self.discard(id, burned).await?;
                return Err(Self::reject(Some(id), InvalidReason::BindingMismatch));
            }
        }

        Ok(owner)
    }

    async fn discard(&self, id: &ArtifactId<A::Kind>, burned: bool) -> AuthResult<()> {
        if !burned {
            self.store.delete_by_id(id).await?;
        }
        Ok(())
    }

    fn reject(id: Option<&ArtifactId<A::Kind>>, reason: InvalidReason) -> AuthError {
        tracing::debug!(
            kind = Self::kind(),
            artifact_id = id.map(|id| id.as_str()),
            reason = reason.as_str(),
            "artifact validation failed"
        );
        AuthError::Invalid(reason)
    }
}
