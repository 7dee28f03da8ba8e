//! Command handlers for the authentication service.
//!
//! Handlers are plain async functions wired into a [`CommandRegistry`] at
//! startup. Registration provisions a rider profile over the same RPC core
//! (auth -> rider service), so this service is both a callee and a caller.

use crate::config::AuthConfig;
use crate::errors::AuthError;
use crate::repository::UserRepository;
use crate::tokens::TokenService;
use broker_rpc::{handler_fn, CommandClient, CommandRegistry, HandlerError, RpcError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Registration request payload.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Login request payload.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Rider provisioning payload sent to the rider service.
#[derive(Debug, Serialize)]
struct CreateRiderRequest<'a> {
    user_id: i64,
    email: &'a str,
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
}

/// The slice of the rider reply this service cares about.
#[derive(Debug, Deserialize)]
struct RiderCreated {
    id: i64,
}

/// Shared state for all auth handlers. Cheaply cloneable.
#[derive(Clone)]
pub struct AuthState {
    pub users: UserRepository,
    pub tokens: TokenService,
    /// Proxy to the rider service for profile provisioning.
    pub rider_client: Arc<CommandClient>,
    pub bcrypt_cost: u32,
}

impl AuthState {
    /// Assemble state from configuration and a connected rider proxy.
    #[must_use]
    pub fn new(config: &AuthConfig, rider_client: Arc<CommandClient>) -> Self {
        Self {
            users: UserRepository::new(),
            tokens: TokenService::new(&config.jwt_secret, config.token_ttl_seconds),
            rider_client,
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

/// Build the auth command registry.
///
/// # Errors
///
/// Returns `RpcError::DuplicateCommand` on conflicting registrations
/// (a configuration bug, caught at startup).
pub fn build_registry(state: AuthState) -> Result<CommandRegistry, RpcError> {
    let register_state = state.clone();
    let login_state = state.clone();
    let validate_state = state;

    Ok(CommandRegistry::builder()
        .register(
            "register",
            handler_fn(move |_ctx, payload| {
                let state = register_state.clone();
                async move { register(state, payload).await }
            }),
        )?
        .register(
            "login",
            handler_fn(move |_ctx, payload| {
                let state = login_state.clone();
                async move { login(state, payload).await }
            }),
        )?
        .register(
            "validate-token",
            handler_fn(move |_ctx, payload| {
                let state = validate_state.clone();
                async move { validate_token(state, payload).await }
            }),
        )?
        .build())
}

/// Handle `register`: hash the password, store the user, provision a rider
/// profile, return `{email}`.
async fn register(state: AuthState, payload: Value) -> Result<Value, HandlerError> {
    let request: RegisterRequest = serde_json::from_value(payload)
        .map_err(|e| AuthError::InvalidPayload(e.to_string()))?;

    if request.email.is_empty() || request.password.is_empty() {
        return Err(AuthError::InvalidPayload("email and password are required".to_string()).into());
    }

    let password_hash = hash_password(request.password, state.bcrypt_cost).await?;

    let user = state.users.insert(&request.email, &password_hash).await?;

    // Provision the rider profile before acknowledging registration.
    let rider_request = CreateRiderRequest {
        user_id: user.id,
        email: &user.email,
        first_name: request.first_name.as_deref(),
        last_name: request.last_name.as_deref(),
    };
    let rider: RiderCreated = state
        .rider_client
        .call("create-rider", &rider_request)
        .await
        .map_err(|e| {
            error!(
                target: "auth.handlers",
                error = %e,
                user_id = user.id,
                "Rider provisioning failed"
            );
            AuthError::Rpc(e.to_string())
        })?;

    info!(
        target: "auth.handlers",
        user_id = user.id,
        rider_id = rider.id,
        "User registered"
    );

    Ok(json!({ "email": user.email }))
}

/// Handle `login`: verify credentials and issue an access token.
async fn login(state: AuthState, payload: Value) -> Result<Value, HandlerError> {
    let request: LoginRequest = serde_json::from_value(payload)
        .map_err(|e| AuthError::InvalidPayload(e.to_string()))?;

    // Same failure for unknown email and bad password; no account probing.
    let user = state
        .users
        .find_by_email(&request.email)
        .await
        .ok_or(AuthError::InvalidCredentials)?;

    let matches = verify_password(request.password, user.password_hash.clone()).await?;
    if !matches {
        warn!(
            target: "auth.handlers",
            user_id = user.id,
            "Login rejected: bad password"
        );
        return Err(AuthError::InvalidCredentials.into());
    }

    let access_token = state.tokens.sign(user.id, &user.email)?;

    Ok(json!({ "access_token": access_token }))
}

/// Handle `validate-token`: return the claims of a valid token.
///
/// Accepts either `{"token": "..."}` or a bare token string, matching what
/// callers have historically sent.
async fn validate_token(state: AuthState, payload: Value) -> Result<Value, HandlerError> {
    let token = match &payload {
        Value::String(token) => token.clone(),
        other => other
            .get("token")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| AuthError::InvalidPayload("expected a token".to_string()))?,
    };

    let claims = state.tokens.verify(&token)?;

    Ok(json!({ "user_id": claims.user_id, "email": claims.email }))
}

/// bcrypt hashing is CPU-bound; keep it off the async workers.
async fn hash_password(password: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::Hashing(format!("hash task failed: {e}")))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Hashing(format!("verify task failed: {e}")))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}
