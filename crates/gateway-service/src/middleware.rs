//! Bearer-token authentication middleware.
//!
//! Validates the token against the auth service (`validate-token`) on every
//! request; the gateway holds no signing secret of its own.

use crate::errors::GatewayError;
use crate::routes::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Identity attached to the request after token validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub email: String,
}

/// Middleware that requires a valid bearer token.
///
/// On success the [`AuthenticatedUser`] is stored in request extensions for
/// downstream handlers. Validation failures surface as 401 through the
/// error mapping.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GatewayError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(GatewayError::MissingToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(GatewayError::MissingToken)?;

    let user: AuthenticatedUser = state
        .auth
        .call("validate-token", &json!({ "token": token }))
        .await?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
