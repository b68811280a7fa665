//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use lms_core::PortError;
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::state::AppState;

/// Middleware that resolves the caller's credential into a `Principal`.
///
/// The credential is taken from an `Authorization: Bearer` header, falling back to a
/// `session` cookie. If valid, the principal is inserted into the request extensions
/// for handlers to use. If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the credential
    let credential = credential_from(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Resolve it into a principal
    let principal = state
        .principals
        .resolve_principal(&credential)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized | PortError::NotFound(_) => {
                warn!("Rejected credential");
                StatusCode::UNAUTHORIZED
            }
            other => {
                error!("Failed to resolve principal: {:?}", other);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    // 3. Hand it to the handler
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

fn credential_from(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
