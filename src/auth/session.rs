//! Session tokens
//!
//! Sessions are issued by the account service and carried as
//! `base64(payload).base64(hmac_sha256(payload))`. Verification is
//! stateless: any instance holding the shared secret can check a token.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Authenticated caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub account_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

fn keyed_mac(secret: &str, payload_b64: &str) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid session key: {e}")))?;
    mac.update(payload_b64.as_bytes());
    Ok(mac)
}

/// Encode and sign `session`
///
/// Used by tooling and tests; production tokens come from the account
/// service with the same encoding.
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    let payload = serde_json::to_vec(session).map_err(|e| AppError::Internal(e.into()))?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let signature = keyed_mac(secret, &payload_b64)?.finalize().into_bytes();

    Ok(format!("{payload_b64}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

/// Verify and decode a session token
///
/// # Errors
/// `InvalidSignature` if the signature does not match, `Unauthorized`
/// if the token is malformed or expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, AppError> {
    let (payload_b64, signature_b64) = match token.split_once('.') {
        Some((payload, signature)) if !signature.contains('.') => (payload, signature),
        _ => return Err(AppError::Unauthorized),
    };

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;
    keyed_mac(secret, payload_b64)?
        .verify_slice(&signature)
        .map_err(|_| AppError::InvalidSignature)?;

    let session: Session = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(AppError::Unauthorized)?;

    if session.is_expired() {
        tracing::debug!(account = %session.account_id, "Expired session token");
        return Err(AppError::Unauthorized);
    }

    Ok(session)
}
