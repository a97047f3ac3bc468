//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use broker::BrokerError;
use domain::DomainError;
use messaging::MessagingError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The requested service role is not hosted by this node.
    NotHosted(&'static str),
    /// Error from a messaging-backed service.
    Messaging(MessagingError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotHosted(role) => (
                StatusCode::NOT_FOUND,
                format!("The {role} service is not hosted on this node"),
            ),
            ApiError::Messaging(err) => messaging_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn messaging_error_to_response(err: MessagingError) -> (StatusCode, String) {
    let status = match &err {
        MessagingError::Domain(domain_err) => domain_status(domain_err),
        e if e.is_publish_failure() => StatusCode::SERVICE_UNAVAILABLE,
        MessagingError::Broker(BrokerError::TopicUnavailable { .. })
        | MessagingError::BrokerNotReady { .. }
        | MessagingError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::warn!(error = %err, status = status.as_u16(), "request failed");
    }
    (status, err.to_string())
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::CartNotFound { .. } | DomainError::ProductNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        DomainError::EmptyCart { .. } | DomainError::InvalidQuantity { .. } => {
            StatusCode::BAD_REQUEST
        }
        DomainError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        DomainError::Dependency(_) => StatusCode::BAD_GATEWAY,
        DomainError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<MessagingError> for ApiError {
    fn from(err: MessagingError) -> Self {
        ApiError::Messaging(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Messaging(MessagingError::Domain(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ProductId, UserId};

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_domain_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(DomainError::CartNotFound {
                user_id: UserId::new(1)
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::ProductNotFound {
                product_id: ProductId::new(7)
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::EmptyCart {
                user_id: UserId::new(1)
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(DomainError::Dependency("catalog down".to_string())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_publish_failure_is_service_unavailable() {
        let err = MessagingError::Broker(BrokerError::Unavailable {
            broker: "in-memory".to_string(),
            cause: "offline".to_string(),
        });
        assert_eq!(status_of(err), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_not_hosted_is_not_found() {
        assert_eq!(
            ApiError::NotHosted("invoice").into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
