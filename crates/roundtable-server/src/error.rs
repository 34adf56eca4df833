//! Mapping of internal failures onto the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roundtable_store::StoreError;
use roundtable_token::TokenError;

/// Errors a handler can return. Bodies are plain text; internal
/// details never leak past the 500 boundary.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Unauthorized(&'static str),
    Forbidden(&'static str),
    NotFound(&'static str),
    Conflict(&'static str),
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            Self::Validation(msg) => msg.clone(),
            Self::Unauthorized(msg) => (*msg).to_string(),
            Self::Forbidden(msg) => (*msg).to_string(),
            Self::NotFound(msg) => (*msg).to_string(),
            Self::Conflict(msg) => (*msg).to_string(),
            Self::Internal => "internal server error".to_string(),
        };
        (self.status(), body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RoomNotFound => Self::NotFound("room not found"),
            StoreError::NotInRoom => Self::Forbidden("player not in room"),
            StoreError::UserNotInRoom => Self::Forbidden("not in room"),
            StoreError::EmailExists => Self::Conflict("email already registered"),
            StoreError::PasswordRequired => {
                Self::Unauthorized("password is required")
            }
            StoreError::InvalidPassword => Self::Unauthorized("invalid password"),
            StoreError::NameTaken => {
                Self::Conflict("display name already taken in this room")
            }
            StoreError::RoomHasNoPlayers => {
                Self::Validation("room has no players".to_string())
            }
            err => {
                tracing::error!(error = %err, "store failure");
                Self::Internal
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingSecret => {
                tracing::error!("token secret is not configured");
                Self::Internal
            }
            _ => Self::Unauthorized("unauthorized"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_http_statuses() {
        let cases = [
            (StoreError::RoomNotFound, StatusCode::NOT_FOUND),
            (StoreError::NotInRoom, StatusCode::FORBIDDEN),
            (StoreError::UserNotInRoom, StatusCode::FORBIDDEN),
            (StoreError::EmailExists, StatusCode::CONFLICT),
            (StoreError::PasswordRequired, StatusCode::UNAUTHORIZED),
            (StoreError::InvalidPassword, StatusCode::UNAUTHORIZED),
            (StoreError::NameTaken, StatusCode::CONFLICT),
            (StoreError::SnapshotConflict, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_token_errors_are_unauthorized_except_missing_secret() {
        assert_eq!(
            ApiError::from(TokenError::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(TokenError::Invalid).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(TokenError::MissingSecret).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
