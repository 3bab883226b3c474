use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fretboard_collab::{AuthError, CollabError, DatabaseError};
use fretboard_core::ProviderError;
use log::error;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub type ServerResult<T> = Result<T, ServerError>;

/// The body of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "Non authentifié")]
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Non authentifié")]
    Unauthenticated,
    #[error("Identifiants invalides")]
    InvalidCredentials,
    #[error("Cette fonctionnalité nécessite un abonnement Pro ou Band")]
    PlanRequired,
    #[error("Action non autorisée")]
    Forbidden,
    #[error("Ressource introuvable")]
    NotFound { resource: &'static str },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    /// A third-party service failed, `status` is forwarded when it's an error status
    #[error("Le service externe a échoué")]
    Upstream { status: Option<u16> },
    #[error("Ce service n'est pas configuré")]
    Unavailable,
    /// Details are logged, never shown
    #[error("Erreur interne du serveur")]
    Internal(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::PlanRequired | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let Self::Internal(details) = &self {
            error!("Request failed: {}", details);
        }

        let body = ErrorBody {
            error: self.to_string(),
        };

        (self.as_status_code(), Json(body)).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::InvalidSession => Self::Unauthenticated,
            AuthError::UsernameTaken => {
                Self::Conflict("Ce nom d'utilisateur est déjà pris".to_string())
            }
            AuthError::Db(e) => e.into(),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound { resource, .. } => Self::NotFound { resource },
            DatabaseError::Conflict { resource, .. } => Self::Conflict(conflict_message(resource)),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<ProviderError> for ServerError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::Status { code, message } => {
                error!("Provider responded with {}: {}", code, message);
                Self::Upstream { status: Some(code) }
            }
            ProviderError::Unavailable => Self::Unavailable,
            e => {
                error!("Provider failed: {}", e);
                Self::Upstream { status: None }
            }
        }
    }
}

impl From<CollabError> for ServerError {
    fn from(value: CollabError) -> Self {
        match value {
            CollabError::PlanRequired => Self::PlanRequired,
            CollabError::Forbidden(_) => Self::Forbidden,
            CollabError::NotFound(resource) => Self::NotFound { resource },
            CollabError::Invalid(message) => Self::BadRequest(message),
            CollabError::SourcesFailed => Self::Upstream { status: None },
            CollabError::Db(e) => e.into(),
            CollabError::Provider(e) => e.into(),
        }
    }
}

fn conflict_message(resource: &str) -> String {
    let message = match resource {
        "user" => "Ce nom d'utilisateur est déjà pris",
        "band member" => "Cet utilisateur fait déjà partie du groupe",
        "friendship" => "Vous êtes déjà amis",
        "friend request" => "Une demande est déjà en attente",
        "playlist song" => "Ce morceau est déjà dans la playlist",
        _ => "Cette ressource existe déjà",
    };

    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_collab_errors_to_statuses() {
        let cases = [
            (CollabError::PlanRequired, StatusCode::FORBIDDEN),
            (CollabError::Forbidden("nope"), StatusCode::FORBIDDEN),
            (CollabError::NotFound("jam"), StatusCode::NOT_FOUND),
            (CollabError::invalid("Le titre est requis"), StatusCode::BAD_REQUEST),
            (CollabError::SourcesFailed, StatusCode::BAD_GATEWAY),
        ];

        for (error, status) in cases {
            assert_eq!(ServerError::from(error).as_status_code(), status);
        }
    }

    #[test]
    fn forwards_provider_error_statuses() {
        let forwarded = ServerError::from(ProviderError::Status {
            code: 429,
            message: "slow down".to_string(),
        });
        assert_eq!(forwarded.as_status_code(), StatusCode::TOO_MANY_REQUESTS);

        let odd = ServerError::from(ProviderError::Status {
            code: 302,
            message: "moved".to_string(),
        });
        assert_eq!(odd.as_status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn hides_internal_details() {
        let error = ServerError::Internal("connection reset".to_string());
        assert_eq!(error.to_string(), "Erreur interne du serveur");
    }
}
