//! Credential artifacts
//!
//! An artifact is the stored half of an ephemeral credential: the hashed
//! secret, its expiry, what it is bound to, and a kind-specific payload.
//! The client holds the other half, a [`Token`](identity_tokens::Token).
//!
//! Every kind implements [`Artifact`] so the validation engine and stores
//! can treat them uniformly. The verification order is a per-kind constant
//! rather than a runtime flag.

use chrono::{DateTime, Utc};
use identity_tokens::{
    kind, ArtifactId, ArtifactKind, EmailVerificationRequestId, PasswordResetSessionId,
    SecretHash, SessionId, SignupSessionId, VerificationCode,
};

use crate::user::UserId;

/// When the stored row is removed relative to secret verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOrder {
    /// Verify the secret first; the row survives a failed validation
    /// unless it is expired or unbound.
    VerifyThenDelete,
    /// Delete the row as soon as it is found, before any check. Any
    /// presentation of the token burns it.
    DeleteThenVerify,
}

/// What a stored artifact is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding<'a> {
    /// Not bound to any user (e.g. signup before the account exists)
    None,
    /// Bound to a user who must still exist
    Owner(UserId),
    /// Bound to a user whose email must still equal `email`
    OwnerEmail {
        /// Bound user
        user_id: UserId,
        /// Email the user had when the artifact was issued
        email: &'a str,
    },
}

impl Binding<'_> {
    /// The bound user, if any.
    pub fn owner_id(&self) -> Option<UserId> {
        match self {
            Binding::None => None,
            Binding::Owner(user_id) | Binding::OwnerEmail { user_id, .. } => Some(*user_id),
        }
    }
}

/// Fields the engine generates for a freshly issued artifact.
#[derive(Debug)]
pub struct ArtifactSeed<K: ArtifactKind> {
    /// New identifier
    pub id: ArtifactId<K>,
    /// Hash of the new secret
    pub secret_hash: SecretHash,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
    /// Issue time
    pub issued_at: DateTime<Utc>,
}

/// A stored credential artifact.
pub trait Artifact: Clone + Send + Sync + 'static {
    /// Kind marker shared with the artifact's id and token types.
    type Kind: ArtifactKind;

    /// Row removal order during validation.
    const VERIFY_ORDER: VerifyOrder = VerifyOrder::VerifyThenDelete;

    /// Artifact identifier.
    fn id(&self) -> &ArtifactId<Self::Kind>;

    /// Stored hash of the secret.
    fn secret_hash(&self) -> &SecretHash;

    /// Absolute expiry; the artifact is dead at and after this instant.
    fn expires_at(&self) -> DateTime<Utc>;

    /// Binding checked on every validation.
    fn binding(&self) -> Binding<'_>;

    /// The bound user, if any.
    fn owner_id(&self) -> Option<UserId> {
        self.binding().owner_id()
    }

    /// Check expiry against `now`.
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Artifacts that may carry an emailed verification code.
pub trait CodeBearing: Artifact {
    /// The code, when this artifact requires one.
    fn code(&self) -> Option<&VerificationCode>;
}

/// A login session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session ID
    pub id: SessionId,
    /// Signed-in user
    pub user_id: UserId,
    /// Hash of the session secret
    pub secret_hash: SecretHash,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

impl Artifact for Session {
    type Kind = kind::Session;

    fn id(&self) -> &SessionId {
        &self.id
    }

    fn secret_hash(&self) -> &SecretHash {
        &self.secret_hash
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn binding(&self) -> Binding<'_> {
        Binding::Owner(self.user_id)
    }
}

/// Pending signup; the account does not exist yet.
#[derive(Debug, Clone)]
pub struct SignupSession {
    /// Signup session ID
    pub id: SignupSessionId,
    /// Email being registered
    pub email: String,
    /// Set once the emailed code has been confirmed
    pub email_verified: bool,
    /// Emailed code
    pub code: VerificationCode,
    /// Hash of the secret
    pub secret_hash: SecretHash,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

impl Artifact for SignupSession {
    type Kind = kind::SignupSession;

    fn id(&self) -> &SignupSessionId {
        &self.id
    }

    fn secret_hash(&self) -> &SecretHash {
        &self.secret_hash
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn binding(&self) -> Binding<'_> {
        Binding::None
    }
}

impl CodeBearing for SignupSession {
    fn code(&self) -> Option<&VerificationCode> {
        Some(&self.code)
    }
}

/// Email verification for an existing user.
#[derive(Debug, Clone)]
pub struct EmailVerificationRequest {
    /// Request ID
    pub id: EmailVerificationRequestId,
    /// User whose email is being verified
    pub user_id: UserId,
    /// Email at issue time
    pub email: String,
    /// Emailed code
    pub code: VerificationCode,
    /// Hash of the secret
    pub secret_hash: SecretHash,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

impl Artifact for EmailVerificationRequest {
    type Kind = kind::EmailVerificationRequest;

    fn id(&self) -> &EmailVerificationRequestId {
        &self.id
    }

    fn secret_hash(&self) -> &SecretHash {
        &self.secret_hash
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn binding(&self) -> Binding<'_> {
        Binding::OwnerEmail {
            user_id: self.user_id,
            email: &self.email,
        }
    }
}

impl CodeBearing for EmailVerificationRequest {
    fn code(&self) -> Option<&VerificationCode> {
        Some(&self.code)
    }
}

/// Password reset in progress.
#[derive(Debug, Clone)]
pub struct PasswordResetSession {
    /// Reset session ID
    pub id: PasswordResetSessionId,
    /// User resetting their password
    pub user_id: UserId,
    /// Email at issue time
    pub email: String,
    /// Set once the emailed code has been confirmed
    pub email_verified: bool,
    /// Emailed code
    pub code: VerificationCode,
    /// Hash of the secret
    pub secret_hash: SecretHash,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

impl Artifact for PasswordResetSession {
    type Kind = kind::PasswordResetSession;

    fn id(&self) -> &PasswordResetSessionId {
        &self.id
    }

    fn secret_hash(&self) -> &SecretHash {
        &self.secret_hash
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn binding(&self) -> Binding<'_> {
        Binding::OwnerEmail {
            user_id: self.user_id,
            email: &self.email,
        }
    }
}

impl CodeBearing for PasswordResetSession {
    fn code(&self) -> Option<&VerificationCode> {
        Some(&self.code)
    }
}
