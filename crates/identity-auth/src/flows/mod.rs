//! Credential flows built on the artifact engine.
//!
//! Each flow owns the engines for the artifact kinds it issues and a
//! [`SessionLifecycle`](crate::SessionLifecycle) for the sessions it grants.

pub mod email_verification;
pub mod login;
pub mod password_reset;
pub mod signup;

pub use email_verification::EmailVerificationFlow;
pub use login::PasswordLogin;
pub use password_reset::PasswordResetFlow;
pub use signup::SignupFlow;
