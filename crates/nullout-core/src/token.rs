//! HMAC-SHA256 confirm tokens. A token is a short-lived capability for one
//! delete, bound to a finding and the identity it carried at scan time.
//!
//! Wire format: `base64url(json_body) + "." + base64url(hmac)`. The body is
//! sorted-key compact JSON so signatures are deterministic, and the `.`
//! separator lives outside the base64 alphabet.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Signed token payload. Every field must match the live finding at verify
/// time; tokens are stateless on the server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmClaims {
    pub finding_id: String,
    pub root_id: String,
    pub scan_id: String,
    pub volume_serial: Option<String>,
    pub file_id: Option<String>,
    pub strategy: String,
    pub reparse_policy: String,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Missing separator, undecodable base64, or a body that is not a claims
    /// object.
    Malformed,
    /// The HMAC does not match the body under the server secret.
    BadSignature,
    /// Signature checks out but `exp` is in the past.
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "token is malformed"),
            TokenError::BadSignature => write!(f, "token signature is invalid"),
            TokenError::Expired => write!(f, "token has expired"),
        }
    }
}

impl std::error::Error for TokenError {}

pub fn mint_confirm_token(claims: &ConfirmClaims, secret: &[u8]) -> String {
    let body = canonical_body(claims);
    let mut mac = keyed(secret);
    mac.update(&body);
    let sig = mac.finalize().into_bytes();
    format!("{}.{}", URL_SAFE.encode(&body), URL_SAFE.encode(sig))
}

pub fn verify_confirm_token(token: &str, secret: &[u8]) -> Result<ConfirmClaims, TokenError> {
    let (body_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let body = URL_SAFE.decode(body_b64).map_err(|_| TokenError::Malformed)?;
    let sig = URL_SAFE.decode(sig_b64).map_err(|_| TokenError::Malformed)?;

    let mut mac = keyed(secret);
    mac.update(&body);
    // verify_slice compares in constant time.
    mac.verify_slice(&sig).map_err(|_| TokenError::BadSignature)?;

    let claims: ConfirmClaims = serde_json::from_slice(&body).map_err(|_| TokenError::Malformed)?;
    if chrono::Utc::now().timestamp() > claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

fn keyed(secret: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length")
}

/// Sorted-key compact JSON; serde_json maps are ordered, so re-encoding the
/// claims through a `Value` pins the byte layout the signature covers.
fn canonical_body(claims: &ConfirmClaims) -> Vec<u8> {
    let value = serde_json::to_value(claims).expect("claims serialize to plain JSON");
    serde_json::to_vec(&value).expect("JSON value serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn sample_claims(exp_offset: i64) -> ConfirmClaims {
        ConfirmClaims {
            finding_id: "fnd_test_1".into(),
            root_id: "root_test".into(),
            scan_id: "scan_test".into(),
            volume_serial: Some("0x12345678".into()),
            file_id: Some("0x0000000000001234".into()),
            strategy: "WIN_EXTENDED_PATH_DELETE".into(),
            reparse_policy: "deny_all".into(),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        }
    }

    #[test]
    fn round_trip() {
        let claims = sample_claims(300);
        let token = mint_confirm_token(&claims, SECRET);
        let decoded = verify_confirm_token(&token, SECRET).expect("verify");
        assert_eq!(decoded, claims);
    }

    #[test]
    fn minting_is_deterministic() {
        let claims = sample_claims(300);
        assert_eq!(
            mint_confirm_token(&claims, SECRET),
            mint_confirm_token(&claims, SECRET)
        );
    }

    #[test]
    fn expired_token_rejected() {
        let token = mint_confirm_token(&sample_claims(-10), SECRET);
        assert_eq!(
            verify_confirm_token(&token, SECRET),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = mint_confirm_token(&sample_claims(300), SECRET);
        assert_eq!(
            verify_confirm_token(&token, b"wrong-secret"),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn tampered_token_rejected() {
        let token = mint_confirm_token(&sample_claims(300), SECRET);
        let mid = token.len() / 2;
        let mut chars: Vec<char> = token.chars().collect();
        chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        // Depending on which byte the flip lands in, the token is either
        // undecodable or fails the signature check; both must reject.
        assert!(verify_confirm_token(&tampered, SECRET).is_err());
    }

    #[test]
    fn missing_separator_rejected() {
        assert_eq!(
            verify_confirm_token("not-a-token", SECRET),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn null_identity_claims_round_trip() {
        let mut claims = sample_claims(300);
        claims.volume_serial = None;
        claims.file_id = None;
        let token = mint_confirm_token(&claims, SECRET);
        assert_eq!(verify_confirm_token(&token, SECRET).unwrap(), claims);
    }
}
