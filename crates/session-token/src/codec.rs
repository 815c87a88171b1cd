//! Session token minting and verification

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Tolerated clock skew for tokens whose issue time lies in the future.
const MAX_CLOCK_SKEW_SECS: u64 = 60;

/// Generate a fresh random session identifier (UUID v4).
pub fn new_identifier() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Signed token payload. Field names are kept short since the payload
/// travels in URLs as the OAuth `state` parameter.
#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    sid: String,
    iat: u64,
}

/// Mints and verifies session tokens under a single signing secret.
#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
}

impl SessionCodec {
    /// Build a codec keyed with the relay's signing secret.
    pub fn new(secret: &Secret<String>) -> Result<Self> {
        let key = secret.expose().as_bytes();
        if key.is_empty() {
            return Err(Error::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(key).map_err(|_| Error::EmptySecret)?;
        Ok(Self { mac })
    }

    /// Mint a token for `identifier` stamped with the current time.
    pub fn mint(&self, identifier: &str) -> Result<String> {
        self.mint_at(identifier, unix_now())
    }

    /// Mint a token with an explicit issue time (unix seconds).
    pub fn mint_at(&self, identifier: &str, issued_at: u64) -> Result<String> {
        let payload = Payload {
            sid: identifier.to_owned(),
            iat: issued_at,
        };
        let json = serde_json::to_vec(&payload).map_err(|e| Error::Encode(e.to_string()))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(json);
        let signature_b64 = URL_SAFE_NO_PAD.encode(self.sign(&payload_b64));
        Ok(format!("{payload_b64}.{signature_b64}"))
    }

    /// Verify `token` and return the embedded identifier.
    ///
    /// Fails with `Invalid` on malformed input or signature mismatch, and
    /// with `Expired` when the token is older than `max_age`.
    pub fn verify(&self, token: &str, max_age: Duration) -> Result<String> {
        self.verify_at(token, max_age, unix_now())
    }

    /// Verify `token` against an explicit current time (unix seconds).
    pub fn verify_at(&self, token: &str, max_age: Duration, now: u64) -> Result<String> {
        let (payload_b64, signature_b64) = token
            .split_once('.')
            .ok_or(Error::Invalid("missing signature separator"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| Error::Invalid("signature is not base64url"))?;

        let mut mac = self.mac.clone();
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| Error::Invalid("signature mismatch"))?;

        let json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| Error::Invalid("payload is not base64url"))?;
        let payload: Payload =
            serde_json::from_slice(&json).map_err(|_| Error::Invalid("malformed payload"))?;

        if payload.iat > now.saturating_add(MAX_CLOCK_SKEW_SECS) {
            return Err(Error::Invalid("issued in the future"));
        }

        let age_secs = now.saturating_sub(payload.iat);
        let max_age_secs = max_age.as_secs();
        if age_secs > max_age_secs {
            debug!(age_secs, max_age_secs, "session token expired");
            return Err(Error::Expired {
                identifier: payload.sid,
                age_secs,
                max_age_secs,
            });
        }

        Ok(payload.sid)
    }

    fn sign(&self, payload_b64: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload_b64.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

impl fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCodec").finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN_MINUTES: Duration = Duration::from_secs(600);
    const ISSUED: u64 = 1_760_000_000;

    fn codec(secret: &str) -> SessionCodec {
        SessionCodec::new(&Secret::new(secret.to_string())).unwrap()
    }

    #[test]
    fn mint_then_verify_returns_identifier() {
        let codec = codec("signing-secret");
        let id = new_identifier();
        let token = codec.mint(&id).unwrap();
        assert_eq!(codec.verify(&token, TEN_MINUTES).unwrap(), id);
    }

    #[test]
    fn verify_accepts_token_at_exact_max_age() {
        let codec = codec("signing-secret");
        let token = codec.mint_at("abc", ISSUED).unwrap();
        let id = codec.verify_at(&token, TEN_MINUTES, ISSUED + 600).unwrap();
        assert_eq!(id, "abc");
    }

    #[test]
    fn verify_rejects_token_past_max_age() {
        let codec = codec("signing-secret");
        let token = codec.mint_at("abc", ISSUED).unwrap();
        match codec.verify_at(&token, TEN_MINUTES, ISSUED + 601) {
            Err(Error::Expired {
                identifier,
                age_secs,
                max_age_secs,
            }) => {
                assert_eq!(identifier, "abc");
                assert_eq!(age_secs, 601);
                assert_eq!(max_age_secs, 600);
            }
            other => panic!("expected Expired, got {other:?}"),
        }
    }

    #[test]
    fn any_altered_character_invalidates_token() {
        let codec = codec("signing-secret");
        let token = codec.mint_at("3f0c9a3e-0000-4000-8000-000000000000", ISSUED).unwrap();

        for (index, original) in token.char_indices() {
            let replacement = if original == 'A' { 'B' } else { 'A' };
            let mut altered = token.clone();
            altered.replace_range(index..index + 1, &replacement.to_string());

            let result = codec.verify_at(&altered, TEN_MINUTES, ISSUED + 1);
            assert!(
                matches!(result, Err(Error::Invalid(_))),
                "altering position {index} must be rejected as invalid, got {result:?}"
            );
        }
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let token = codec("secret-a").mint_at("abc", ISSUED).unwrap();
        let result = codec("secret-b").verify_at(&token, TEN_MINUTES, ISSUED);
        assert!(matches!(result, Err(Error::Invalid("signature mismatch"))));
    }

    #[test]
    fn tampered_and_expired_token_reports_invalid() {
        let codec = codec("signing-secret");
        let token = codec.mint_at("abc", ISSUED).unwrap();
        let forged = format!("{}x", token);
        let result = codec.verify_at(&forged, TEN_MINUTES, ISSUED + 10_000);
        assert!(matches!(result, Err(Error::Invalid(_))), "got {result:?}");
    }

    #[test]
    fn garbage_is_invalid() {
        let codec = codec("signing-secret");
        for garbage in ["garbage", "", ".", "a.b", "not.base64!"] {
            let result = codec.verify(garbage, TEN_MINUTES);
            assert!(
                matches!(result, Err(Error::Invalid(_))),
                "{garbage:?} must be invalid, got {result:?}"
            );
        }
    }

    #[test]
    fn future_issue_time_beyond_skew_is_invalid() {
        let codec = codec("signing-secret");
        let token = codec.mint_at("abc", ISSUED + 3600).unwrap();
        let result = codec.verify_at(&token, TEN_MINUTES, ISSUED);
        assert!(matches!(result, Err(Error::Invalid("issued in the future"))));

        let within_skew = codec.mint_at("abc", ISSUED + 30).unwrap();
        assert_eq!(codec.verify_at(&within_skew, TEN_MINUTES, ISSUED).unwrap(), "abc");
    }

    #[test]
    fn empty_secret_is_rejected() {
        let result = SessionCodec::new(&Secret::new(String::new()));
        assert!(matches!(result, Err(Error::EmptySecret)));
    }

    #[test]
    fn tokens_are_url_safe() {
        let token = codec("signing-secret").mint(&new_identifier()).unwrap();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'),
            "token must be usable as an OAuth state parameter: {token}"
        );
    }

    #[test]
    fn identifiers_are_unique() {
        assert_ne!(new_identifier(), new_identifier());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let debug = format!("{:?}", codec("super-secret-key"));
        assert!(!debug.contains("super-secret-key"));
    }
}
