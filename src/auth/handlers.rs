use axum::{extract::State, http::StatusCode, Form, Json};
use tracing::{error, info, instrument, warn};

use crate::auth::dto::{
    ApiResponse, LoginRequest, LoginResponse, OAuthError, RegisterRequest, TokenRequest,
    TokenResponse,
};
use crate::auth::error::AuthError;
use crate::auth::validate;
use crate::state::AppState;

type ErrorEnvelope = (StatusCode, Json<ApiResponse>);

fn envelope_failure(status: StatusCode, message: &str) -> ErrorEnvelope {
    (status, Json(ApiResponse::failure(status, message)))
}

fn map_auth_error(err: AuthError) -> ErrorEnvelope {
    match err {
        AuthError::DuplicateUsername => {
            envelope_failure(StatusCode::CONFLICT, "Username already exists")
        }
        AuthError::DuplicateEmail => {
            envelope_failure(StatusCode::CONFLICT, "Email already in use")
        }
        AuthError::InvalidCredentials => {
            envelope_failure(StatusCode::UNAUTHORIZED, "Invalid username or password")
        }
        AuthError::UnsupportedGrantType => {
            envelope_failure(StatusCode::BAD_REQUEST, "Unsupported grant type")
        }
        AuthError::Internal(e) => {
            error!(error = %e, "internal error");
            envelope_failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn success_body(message: &str, issued: crate::auth::jwt::IssuedToken) -> ApiResponse<LoginResponse> {
    ApiResponse::ok(
        message,
        LoginResponse {
            success: true,
            token: Some(issued.token),
            message: Some(message.to_owned()),
            expires_at: Some(issued.expires_at),
        },
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ErrorEnvelope> {
    let errors = validate::validate_register(&payload);
    if !errors.is_empty() {
        warn!("register payload failed validation");
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::validation_failure(errors)),
        ));
    }

    let email = payload.email.as_deref().filter(|e| !e.is_empty());
    let user = state
        .credentials
        .register(&payload.username, &payload.password, email)
        .await
        .map_err(map_auth_error)?;

    let issued = state
        .issuer
        .issue(&user.username)
        .map_err(|e| map_auth_error(AuthError::Internal(e)))?;

    info!(user_id = %user.id, username = %user.username, "registration successful");
    Ok(Json(success_body("Registration successful", issued)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ErrorEnvelope> {
    let errors = validate::validate_login(&payload);
    if !errors.is_empty() {
        warn!("login payload failed validation");
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::validation_failure(errors)),
        ));
    }

    let user = state
        .credentials
        .verify(&payload.username, &payload.password)
        .await
        .map_err(map_auth_error)?;

    state
        .credentials
        .record_login(&user)
        .await
        .map_err(map_auth_error)?;

    let issued = state
        .issuer
        .issue(&user.username)
        .map_err(|e| map_auth_error(AuthError::Internal(e)))?;

    info!(user_id = %user.id, username = %user.username, "login successful");
    Ok(Json(success_body("Login successful", issued)))
}

type GrantError = (StatusCode, Json<OAuthError>);

fn map_grant_error(err: AuthError) -> GrantError {
    match err {
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            Json(OAuthError::new("invalid_grant", "invalid username or password")),
        ),
        AuthError::UnsupportedGrantType => (
            StatusCode::BAD_REQUEST,
            Json(OAuthError::new(
                "unsupported_grant_type",
                "only the password grant type is supported",
            )),
        ),
        other => {
            error!(error = %other, "token request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(OAuthError::new("server_error", "internal server error")),
            )
        }
    }
}

/// OAuth2 password grant. Verifies credentials like login but does not
/// bump `updated_at`.
#[instrument(skip(state, payload))]
pub async fn token(
    State(state): State<AppState>,
    Form(payload): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, GrantError> {
    if payload.grant_type != "password" {
        warn!(grant_type = %payload.grant_type, "unsupported grant type");
        return Err(map_grant_error(AuthError::UnsupportedGrantType));
    }

    let user = state
        .credentials
        .verify(&payload.username, &payload.password)
        .await
        .map_err(map_grant_error)?;

    let issued = state
        .issuer
        .issue(&user.username)
        .map_err(|e| map_grant_error(AuthError::Internal(e)))?;

    info!(user_id = %user.id, username = %user.username, "token granted");
    Ok(Json(TokenResponse {
        access_token: issued.token,
        token_type: "Bearer".into(),
        expires_in: (state.config.jwt.ttl_minutes as u64) * 60,
        username: user.username,
    }))
}
