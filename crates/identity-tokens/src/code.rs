//! Numeric verification codes
//!
//! Short human-typable codes mailed alongside artifacts that require a
//! second factor (signup, email verification, password reset and account
//! association).

use std::fmt;

use rand::Rng;

use crate::key::constant_time_str_eq;

/// Default number of digits in a verification code.
pub const DEFAULT_CODE_LENGTH: usize = 8;

/// A one-time numeric code. `Debug` output is redacted.
#[derive(Clone)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Generate a code of `length` decimal digits.
    pub fn generate(length: usize) -> Self {
        Self(generate_numeric_code(length))
    }

    /// Wrap a code loaded from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the digits, for delivery or persistence.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check a presented code in constant time.
    pub fn matches(&self, presented: &str) -> bool {
        verify_code(&self.0, presented)
    }
}

impl fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationCode([REDACTED])")
    }
}

/// Generate a code of `length` decimal digits. Leading zeros are allowed.
pub fn generate_numeric_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Compare a presented code against the expected one in constant time.
pub fn verify_code(expected: &str, presented: &str) -> bool {
    constant_time_str_eq(expected, presented.trim())
}
