//! Random password generation

use rand::Rng;

use crate::error::{ErrorCategory, ErrorKind, Result, XcreeptorError};

/// Characters generated passwords are drawn from.
pub const PASSWORD_CHARSET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-=_+[]{}|;:,.<>?";

pub const DEFAULT_PASSWORD_LENGTH: usize = 12;

pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Generate a password of `length` characters, each drawn uniformly from
/// [`PASSWORD_CHARSET`].
pub fn generate_password(length: usize) -> String {
    let charset = PASSWORD_CHARSET.as_bytes();
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(charset[rng.random_range(0..charset.len())]))
        .collect()
}

/// Parse a user-supplied password length in `1..=MAX_PASSWORD_LENGTH`.
pub fn parse_length(input: &str) -> Result<usize> {
    let length: usize = input.trim().parse().map_err(|e| {
        XcreeptorError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::InvalidArgument,
            format!("invalid password length {:?}", input),
            e,
        )
    })?;
    if length == 0 || length > MAX_PASSWORD_LENGTH {
        return Err(XcreeptorError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidArgument,
            format!(
                "password length must be between 1 and {}, got {}",
                MAX_PASSWORD_LENGTH, length
            ),
        ));
    }
    Ok(length)
}
