use crate::error::AppError;
use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Shared secret for admin routes, injected as a request extension.
#[derive(Clone)]
pub struct AdminToken(pub Arc<str>);

/// Middleware: require `Authorization: Bearer <admin token>`.
///
/// Requests pass through untouched when no [`AdminToken`] extension is
/// installed (admin token not configured).
pub async fn require_admin_token(request: Request, next: Next) -> Response {
    let Some(expected) = request.extensions().get::<AdminToken>().cloned() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let authorized = provided
        .map(|token| bool::from(token.as_bytes().ct_eq(expected.0.as_bytes())))
        .unwrap_or(false);

    if !authorized {
        tracing::warn!(
            path = %request.uri().path(),
            method = %request.method(),
            has_header = provided.is_some(),
            "admin auth rejected"
        );
        return AppError::Unauthorized("valid admin bearer token required".to_string())
            .into_response();
    }

    next.run(request).await
}
