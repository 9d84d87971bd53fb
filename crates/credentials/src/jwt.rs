//! Read-only view of JWT claims. Signatures are the backend's business; the
//! client only needs the expiry to decide how stale a stored token is.

use base64::Engine as _;
use serde::Deserialize;

use crate::CredentialError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    pub exp: Option<u64>,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub token_type: Option<String>,
}

pub fn decode_claims(token: &str) -> Result<Claims, CredentialError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_sig)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(CredentialError::Corrupt("token is not a JWT".to_string()));
    };

    // Some issuers pad, most don't.
    let payload = payload.trim_end_matches('=');
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| CredentialError::Corrupt(format!("jwt payload: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| CredentialError::Corrupt(format!("jwt claims: {e}")))
}

pub fn expires_at(token: &str) -> Option<u64> {
    decode_claims(token).ok()?.exp
}

/// A token that cannot be decoded or has no `exp` counts as expired.
pub fn is_expired(token: &str, now_unix_secs: u64) -> bool {
    match expires_at(token) {
        Some(exp) => now_unix_secs >= exp,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with(payload: &str) -> String {
        let enc = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.sig",
            enc.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            enc.encode(payload)
        )
    }

    #[test]
    fn reads_exp_claim() {
        let token = token_with(r#"{"exp":1700000000,"token_type":"access","user_id":7}"#);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.exp, Some(1_700_000_000));
        assert_eq!(claims.token_type.as_deref(), Some("access"));
        assert!(!is_expired(&token, 1_699_999_999));
        assert!(is_expired(&token, 1_700_000_000));
    }

    #[test]
    fn malformed_tokens_are_expired() {
        assert!(is_expired("opaque-token", 0));
        assert!(is_expired(&token_with("not json"), 0));
        assert!(is_expired(&token_with(r#"{"sub":"x"}"#), 0));
        assert_eq!(expires_at("a.b"), None);
    }
}
