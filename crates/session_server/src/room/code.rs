//! Short room identifiers.
//!
//! Codes are 5 characters sampled from an alphabet that excludes the
//! visually ambiguous characters (no `0`/`O`, no `1`/`I`), so they survive
//! being read aloud or retyped. Uniqueness among live rooms is enforced by
//! the registry, which retries generation on collision.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a room code.
pub const CODE_LEN: usize = 5;

/// Alphabet a room code is sampled from.
pub const CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// A validated room code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Samples a fresh code. The caller is responsible for collision
    /// checking against live rooms.
    pub fn generate() -> Self {
        let alphabet: Vec<char> = CODE_ALPHABET.chars().collect();
        let mut rng = rand::thread_rng();
        let code = (0..CODE_LEN)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect();
        Self(code)
    }

    /// Validates and wraps a client-supplied code.
    pub fn parse(value: &str) -> Result<Self, CodeError> {
        if value.len() != CODE_LEN {
            return Err(CodeError::InvalidLength {
                expected: CODE_LEN,
                found: value.len(),
            });
        }
        for (index, ch) in value.chars().enumerate() {
            if !CODE_ALPHABET.contains(ch) {
                return Err(CodeError::InvalidCharacter { ch, index });
            }
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomCode {
    type Err = CodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Error returned when a client-supplied room code is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("room code must be {expected} chars, got {found}")]
    InvalidLength { expected: usize, found: usize },

    #[error("invalid character '{ch}' at position {index}")]
    InvalidCharacter { ch: char, index: usize },
}
