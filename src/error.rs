use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Application-level failure taxonomy. Every handler returns this on the
/// error path; `IntoResponse` maps each variant to a status and a JSON body
/// of the shape `{"error": "..."}` (plus variant-specific fields).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient ticket balance")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Daily ad limit reached ({limit}/day)")]
    DailyLimitReached { limit: i64 },

    /// Unexpected failures. Logged with full context, surfaced to the
    /// caller as a generic message so internal detail never leaks.
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::InsufficientBalance { .. } => StatusCode::CONFLICT,
            AppError::DailyLimitReached { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err).context("database query failed"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(ref err) = self {
            tracing::error!(error = ?err, "internal error");
        }

        let status = self.status();
        let body = match &self {
            AppError::InsufficientBalance {
                required,
                available,
            } => serde_json::json!({
                "error": self.to_string(),
                "required": required,
                "available": available,
            }),
            AppError::DailyLimitReached { limit } => serde_json::json!({
                "error": self.to_string(),
                "limit": limit,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn internal_error_returns_500_generic_message() {
        let err = AppError::Internal(anyhow::anyhow!("database connection failed"));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response_body(response).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn internal_error_hides_sensitive_details() {
        let err = AppError::Internal(anyhow::anyhow!("password=secret123 leaked"));
        let response = err.into_response();

        let body = response_body(response).await.to_string();
        assert!(!body.contains("secret123"));
    }

    #[tokio::test]
    async fn insufficient_balance_reports_amounts() {
        let err = AppError::InsufficientBalance {
            required: 50,
            available: 12,
        };
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = response_body(response).await;
        assert_eq!(body["required"], 50);
        assert_eq!(body["available"], 12);
    }

    #[tokio::test]
    async fn daily_limit_returns_429_with_limit() {
        let err = AppError::DailyLimitReached { limit: 5 };
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = response_body(response).await;
        assert_eq!(body["limit"], 5);
    }

    #[tokio::test]
    async fn taxonomy_maps_to_expected_statuses() {
        let cases = [
            (
                AppError::Unauthenticated("no token".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::Forbidden("admins only".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::NotFound("raffle not found".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Validation("invalid ticket count".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Conflict("raffle already drawn".into()),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn sqlx_error_converts_to_internal() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
