use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::Error;

/// Errors surfaced by the consent route handlers.
#[derive(Debug, thiserror::Error)]
pub enum RoutesError {
    /// No session cookie, or it references no live session.
    #[error("no active authorization session")]
    NoSession,

    /// A flow operation failed.
    #[error(transparent)]
    Flow(#[from] Error),
}

impl IntoResponse for RoutesError {
    fn into_response(self) -> Response {
        match self {
            Self::NoSession => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            Self::Flow(e) => match &e {
                Error::MissingCredential(_)
                | Error::UnsupportedCertificate(_)
                | Error::UnknownField(_)
                | Error::Payload(_) => {
                    (StatusCode::BAD_REQUEST, e.to_string()).into_response()
                }
                Error::AuthenticationRejected => {
                    (StatusCode::UNAUTHORIZED, e.to_string()).into_response()
                }
                Error::InvalidState { .. } => {
                    (StatusCode::CONFLICT, e.to_string()).into_response()
                }
                Error::DecisionAlreadyMade => {
                    tracing::error!(error = %e, "consent decision submitted twice");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
                }
                _ => {
                    tracing::error!(error = %e, "vault internal error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
                }
            },
        }
    }
}
