//! HMAC-signed bearer tokens for room and user sessions.
//!
//! A token is `base64url(claims-json) "." base64url(hmac-sha256-tag)`,
//! both without padding. The tag is computed over the encoded payload,
//! verified in constant time, and the two claim schemas are disjoint so
//! a user token can never pass as a room token or vice versa.
//!
//! The service holds the shared secret; with an empty secret every
//! operation fails closed with [`TokenError::MissingSecret`].

mod claims;
mod error;

pub use claims::{RoomClaims, UserClaims};
pub use error::TokenError;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of a room-session token.
pub fn default_room_ttl() -> Duration {
    Duration::hours(24)
}

/// Default lifetime of a user-session token.
pub fn default_user_ttl() -> Duration {
    Duration::days(7)
}

/// Mints and verifies both token variants with one shared secret.
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
}

impl TokenService {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Generates a room-session token and its absolute expiry.
    pub fn generate_room_token(
        &self,
        room_id: Uuid,
        room_player_id: Uuid,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let expires_at = Utc::now() + ttl;
        let claims = RoomClaims {
            room_id,
            room_player_id,
            exp: expires_at.timestamp(),
        };
        Ok((self.sign(&claims)?, expires_at))
    }

    /// Verifies a room-session token and returns its claims.
    pub fn verify_room_token(&self, token: &str) -> Result<RoomClaims, TokenError> {
        let payload = self.verify_tag(token)?;
        let room_id = require_uuid(&payload, "room_id")?;
        let room_player_id = require_uuid(&payload, "room_player_id")?;
        let exp = require_exp(&payload)?;
        check_expiry(exp)?;
        Ok(RoomClaims {
            room_id,
            room_player_id,
            exp,
        })
    }

    /// Generates a user-session token and its absolute expiry.
    pub fn generate_user_token(
        &self,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let expires_at = Utc::now() + ttl;
        let claims = UserClaims {
            user_id,
            exp: expires_at.timestamp(),
        };
        Ok((self.sign(&claims)?, expires_at))
    }

    /// Verifies a user-session token and returns its claims.
    pub fn verify_user_token(&self, token: &str) -> Result<UserClaims, TokenError> {
        let payload = self.verify_tag(token)?;
        let user_id = require_uuid(&payload, "user_id")?;
        let exp = require_exp(&payload)?;
        check_expiry(exp)?;
        Ok(UserClaims { user_id, exp })
    }

    fn sign<C: Serialize>(&self, claims: &C) -> Result<String, TokenError> {
        if self.secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        let json = serde_json::to_vec(claims).map_err(|_| TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenError::MissingSecret)?;
        mac.update(payload.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{tag}"))
    }

    /// Checks the tag and returns the decoded claim object.
    ///
    /// The tag is checked before the payload is decoded, so nothing
    /// attacker-controlled is parsed without a valid signature.
    fn verify_tag(&self, token: &str) -> Result<serde_json::Value, TokenError> {
        if self.secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        let (payload, tag) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| TokenError::MissingSecret)?;
        mac.update(payload.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&tag).map_err(|_| TokenError::Invalid)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)
    }
}

fn require_uuid(payload: &serde_json::Value, field: &str) -> Result<Uuid, TokenError> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(TokenError::Invalid)
}

fn require_exp(payload: &serde_json::Value) -> Result<i64, TokenError> {
    payload
        .get("exp")
        .and_then(|v| v.as_i64())
        .ok_or(TokenError::Invalid)
}

fn check_expiry(exp: i64) -> Result<(), TokenError> {
    if Utc::now().timestamp() > exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(b"test-secret".to_vec())
    }

    #[test]
    fn test_room_token_round_trip() {
        let svc = service();
        let room = Uuid::new_v4();
        let player = Uuid::new_v4();

        let (token, expires_at) = svc
            .generate_room_token(room, player, Duration::hours(1))
            .unwrap();
        let claims = svc.verify_room_token(&token).unwrap();

        assert_eq!(claims.room_id, room);
        assert_eq!(claims.room_player_id, player);
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn test_user_token_round_trip() {
        let svc = service();
        let user = Uuid::new_v4();

        let (token, _) = svc
            .generate_user_token(user, Duration::hours(1))
            .unwrap();
        let claims = svc.verify_user_token(&token).unwrap();

        assert_eq!(claims.user_id, user);
    }

    #[test]
    fn test_expired_token_rejected() {
        let svc = service();
        let (token, _) = svc
            .generate_room_token(Uuid::new_v4(), Uuid::new_v4(), Duration::seconds(-5))
            .unwrap();

        assert_eq!(svc.verify_room_token(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let svc = service();
        let other = TokenService::new(b"another-secret".to_vec());
        let (token, _) = svc
            .generate_room_token(Uuid::new_v4(), Uuid::new_v4(), Duration::hours(1))
            .unwrap();

        assert_eq!(other.verify_room_token(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let svc = service();
        let (token, _) = svc
            .generate_room_token(Uuid::new_v4(), Uuid::new_v4(), Duration::hours(1))
            .unwrap();

        // Swap the payload for a freshly encoded one; the tag no longer
        // matches.
        let tag = token.split_once('.').unwrap().1;
        let forged_payload = URL_SAFE_NO_PAD.encode(b"{\"exp\":9999999999}");
        let forged = format!("{forged_payload}.{tag}");

        assert_eq!(svc.verify_room_token(&forged), Err(TokenError::Invalid));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let svc = service();
        assert_eq!(svc.verify_room_token(""), Err(TokenError::Malformed));
        assert_eq!(
            svc.verify_room_token("no-delimiter"),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            svc.verify_room_token("a.b.c%%%"),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_user_token_does_not_verify_as_room_token() {
        let svc = service();
        let (token, _) = svc
            .generate_user_token(Uuid::new_v4(), Duration::hours(1))
            .unwrap();

        // Signature is fine, but room claims are missing.
        assert_eq!(svc.verify_room_token(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_room_token_does_not_verify_as_user_token() {
        let svc = service();
        let (token, _) = svc
            .generate_room_token(Uuid::new_v4(), Uuid::new_v4(), Duration::hours(1))
            .unwrap();

        assert_eq!(svc.verify_user_token(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_empty_secret_fails_closed() {
        let svc = TokenService::new(Vec::new());

        assert_eq!(
            svc.generate_room_token(Uuid::new_v4(), Uuid::new_v4(), Duration::hours(1))
                .unwrap_err(),
            TokenError::MissingSecret
        );
        assert_eq!(
            svc.verify_room_token("anything.at-all"),
            Err(TokenError::MissingSecret)
        );
    }
}
