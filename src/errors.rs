use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;
use tracing::error;

/// Taxonomie des erreurs API
///
/// Toutes les réponses d'erreur ont la forme {"error": "..."}.
/// Les détails BD/upstream sont loggés mais jamais renvoyés au client.
#[derive(Debug, Error)]
pub enum ApiError {
    // Message uniforme email inconnu / mauvais mot de passe,
    // pour éviter l'énumération de comptes
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    // Assertion d'identité fédérée refusée par le fournisseur
    #[error("Invalid Firebase token")]
    InvalidAssertion,

    #[error("Unauthorized")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Upstream service error")]
    Upstream(String),

    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),

    #[error("Internal server error")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials
            | ApiError::Unauthorized
            | ApiError::InvalidAssertion => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Database(e) => error!(source = %e, "database error"),
            ApiError::Upstream(detail) => error!(detail = %detail, "upstream service error"),
            ApiError::Internal(detail) => error!(detail = %detail, "internal error"),
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Conflict("Email already registered".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Validation("Email is required".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Upstream("provider down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_generic_messages_hide_detail() {
        // Le détail upstream ne doit pas fuiter dans le message client
        let err = ApiError::Upstream("firebase: key rotation failed".into());
        assert_eq!(err.to_string(), "Upstream service error");
    }
}
