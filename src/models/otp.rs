use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

/// Six-digit one-time code. Stored as an integer, always shown zero-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OtpCode(u32);

impl OtpCode {
    pub const MAX: u32 = 999_999;

    pub fn new(value: u32) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    /// Parses user input. Surrounding whitespace is ignored; anything that is not
    /// a number in range yields `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.len() > 6 || !trimmed.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        trimmed.parse().ok().and_then(Self::new)
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(0..=Self::MAX))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OtpChallenge {
    pub id: String,
    pub invite_id: String,
    pub code: OtpCode,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailRate {
    pub email: String,
    pub last_send_at: DateTime<Utc>,
}
