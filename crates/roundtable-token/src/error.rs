//! Error types for token generation and verification.

/// Errors surfaced by the token service.
///
/// Verification distinguishes three failure classes so callers can log
/// them differently, but all of them mean "reject the credential".
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    /// The token string is not `payload.signature` or the base64/JSON
    /// layers do not decode.
    #[error("malformed token")]
    Malformed,

    /// The signature does not match, or a required claim is absent.
    #[error("invalid token")]
    Invalid,

    /// The token was valid once but its expiry has passed.
    #[error("token expired")]
    Expired,

    /// No signing secret is configured. Everything fails closed.
    #[error("token secret is not configured")]
    MissingSecret,
}
