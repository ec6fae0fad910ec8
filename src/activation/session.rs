use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use chrono::Utc;
use data_encoding::BASE64URL_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::models::invite::Invite;

pub const ACTIVATION_COOKIE: &str = "IDCLAIM_ACTIVATION";

const NONCE_LEN: usize = 12;

/// Where an invitee stands once they have proven control of their email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ActivationState {
    /// OTP accepted; a login name may be chosen for `invite_id`.
    OtpVerified {
        email: String,
        otp: String,
        invite_id: String,
        activating: bool,
    },
    /// Account created; only the one-time credential read remains.
    Provisioned { invite_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationSession {
    pub state: ActivationState,
    /// Unix seconds.
    pub issued_at: i64,
}

impl ActivationSession {
    pub fn verified(email: &str, otp: &str, invite_id: &str) -> Self {
        Self {
            state: ActivationState::OtpVerified {
                email: email.to_string(),
                otp: otp.to_string(),
                invite_id: invite_id.to_string(),
                activating: true,
            },
            issued_at: Utc::now().timestamp(),
        }
    }

    pub fn provisioned(invite_id: &str) -> Self {
        Self {
            state: ActivationState::Provisioned {
                invite_id: invite_id.to_string(),
            },
            issued_at: Utc::now().timestamp(),
        }
    }

    /// True only for a verified session whose invite id and email both match
    /// `invite` and whose activating flag is set.
    pub fn authorizes(&self, invite: &Invite) -> bool {
        match &self.state {
            ActivationState::OtpVerified {
                email,
                invite_id,
                activating,
                ..
            } => *activating && *invite_id == invite.id && *email == invite.email,
            ActivationState::Provisioned { .. } => false,
        }
    }

    pub fn provisioned_for(&self, id: &str) -> bool {
        matches!(&self.state, ActivationState::Provisioned { invite_id } if invite_id == id)
    }
}

/// Encrypts activation sessions into opaque cookie values.
///
/// AES-256-GCM with a key derived from the configured secret; the value is
/// `base64url(nonce || ciphertext)`. Tampered, foreign or expired values all
/// open to `None`.
pub struct SessionSealer {
    cipher: Aes256Gcm,
    ttl_secs: i64,
}

impl SessionSealer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn seal(&self, session: &ActivationSession) -> Result<String, AppError> {
        let plaintext = serde_json::to_vec(session)
            .map_err(|e| AppError::Internal(format!("failed to encode session: {e}")))?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| AppError::Internal(format!("failed to seal session: {e}")))?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64URL_NOPAD.encode(&sealed))
    }

    pub fn open(&self, value: &str) -> Option<ActivationSession> {
        self.open_at(value, Utc::now().timestamp())
    }

    pub fn open_at(&self, value: &str, now: i64) -> Option<ActivationSession> {
        let sealed = BASE64URL_NOPAD.decode(value.as_bytes()).ok()?;
        if sealed.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .ok()?;
        let session: ActivationSession = serde_json::from_slice(&plaintext).ok()?;

        let age = now - session.issued_at;
        if !(0..=self.ttl_secs).contains(&age) {
            tracing::debug!("activation session expired ({age}s old)");
            return None;
        }
        Some(session)
    }
}

/// Reads one cookie from every `Cookie` header on the request.
pub fn read_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == cookie_name).then(|| value.to_string())
        })
}

pub fn set_cookie(value: &str, max_age: i64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{ACTIVATION_COOKIE}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax{secure}")
}

pub fn clear_cookie(secure: bool) -> String {
    set_cookie("", 0, secure)
}
