//! Dealing with user passwords.

use std::fmt::Debug;

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use password_hash::SaltString;
use rand_core::OsRng;
use semval::prelude::*;

const MAX_PASSWORD_LENGTH: usize = 512;
const MIN_PASSWORD_LENGTH: usize = 8;

/// A user's raw password.
pub struct Password(String);

impl Password {
    /// Construct an unvalidated password.
    ///
    /// This is used when a password is part of a larger object that is
    /// validated as a whole, or when checking credentials where the length
    /// rules don't apply.
    pub fn unvalidated(password: String) -> Self {
        Self(password)
    }

    /// Hash the password with a fresh salt.
    ///
    /// # Returns
    ///
    /// The PHC string representation of the hash, suitable for persisting.
    pub fn hash(&self) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        Ok(Argon2::default()
            .hash_password(self.0.as_bytes(), salt.as_ref())?
            .to_string())
    }

    /// Determine if the password matches a persisted hash.
    ///
    /// An error is only returned if the stored hash is malformed.
    pub fn matches_hash(&self, stored_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(stored_hash)?;

        match Argon2::default().verify_password(self.0.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(other) => Err(other.into()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PasswordInvalidity {
    /// Longer than the maximum length, which is contained as a value.
    MaxLength(usize),
    /// Shorter than the minimum length, which is contained as a value.
    MinLength(usize),
}

impl PasswordInvalidity {
    pub fn message(&self) -> String {
        match self {
            Self::MaxLength(max) => {
                format!("Passwords may not contain more than {} characters.", max)
            }
            Self::MinLength(min) => format!("Passwords must contain at least {} characters.", min),
        }
    }
}

impl Validate for Password {
    type Invalidity = PasswordInvalidity;

    fn validate(&self) -> ValidationResult<Self::Invalidity> {
        let length = self.0.chars().count();

        ValidationContext::new()
            .invalidate_if(
                length < MIN_PASSWORD_LENGTH,
                PasswordInvalidity::MinLength(MIN_PASSWORD_LENGTH),
            )
            .invalidate_if(
                length > MAX_PASSWORD_LENGTH,
                PasswordInvalidity::MaxLength(MAX_PASSWORD_LENGTH),
            )
            .into()
    }
}

impl ValidatedFrom<&str> for Password {
    fn validated_from(from: &str) -> ValidatedResult<Self> {
        let into = Password(from.to_owned());

        match into.validate() {
            Ok(_) => Ok(into),
            Err(context) => Err((into, context)),
        }
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't include the raw password in debug output.
        f.debug_tuple("Password").field(&"*".repeat(8)).finish()
    }
}
