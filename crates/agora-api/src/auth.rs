use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde_json::json;
use tracing::{error, info, warn};

use agora_types::api::{ActivateRequest, Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use agora_types::models::{User, UserStatus};

use crate::notifications::ActivationNotification;
use crate::state::{AppState, AppStateInner, run_blocking};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("account is not active")]
    NotActive,
    #[error("unknown or already used activation token")]
    UnknownToken,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotActive => StatusCode::FORBIDDEN,
            Self::UnknownToken => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let message = match &self {
            Self::Internal(e) => {
                error!(error = ?e, "auth internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    // Validate input
    let username_len = req.username.chars().count();
    if !(3..=32).contains(&username_len) {
        return Err(AuthError::InvalidInput("username must be 3 to 32 characters"));
    }
    if req.password.len() < 8 {
        return Err(AuthError::InvalidInput("password must be at least 8 characters"));
    }
    if !req.email.contains('@') || req.email.len() > 255 {
        return Err(AuthError::InvalidInput("invalid email address"));
    }

    let user_id = run_blocking(move || register_user(&state, req)).await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

fn register_user(state: &AppStateInner, req: RegisterRequest) -> Result<i64, AuthError> {
    if state.db.get_user_by_username(&req.username)?.is_some() {
        return Err(AuthError::Conflict("username is taken"));
    }
    if state.db.get_user_by_email(&req.email)?.is_some() {
        return Err(AuthError::Conflict("email is already registered"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let token = activation_token();
    let user_id = state.db.create_user(&req.username, &req.email, &password_hash, &token)?;
    info!("Registered {} ({})", req.username, user_id);

    // The account exists either way; a lost mail can be re-sent by an operator
    if let Some(row) = state.db.get_user_by_id(user_id)? {
        let user = User::try_from(row)?;
        if let Err(e) = state.mailer.send(&user, &ActivationNotification::new(token)) {
            warn!("Activation mail to {} failed: {}", user.username, e);
        }
    }

    Ok(user_id)
}

pub async fn activate(
    State(state): State<AppState>,
    Json(req): Json<ActivateRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let user_id = run_blocking(move || Ok::<_, AuthError>(state.db.activate_user(&req.token)?))
        .await?
        .ok_or(AuthError::UnknownToken)?;

    info!("Activated user {}", user_id);
    Ok(Json(json!({ "user_id": user_id, "activated": true })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let response = run_blocking(move || login_user(&state, req)).await?;
    Ok(Json(response))
}

fn login_user(state: &AppStateInner, req: LoginRequest) -> Result<LoginResponse, AuthError> {
    let row = state
        .db
        .get_user_by_username(&req.username)?
        .ok_or(AuthError::InvalidCredentials)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&row.password).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)?;

    if row.status != UserStatus::Active.as_i64() {
        return Err(AuthError::NotActive);
    }

    let token = create_token(&state.jwt_secret, row.id, &row.username)?;

    Ok(LoginResponse {
        user_id: row.id,
        username: row.username,
        token,
    })
}

pub fn create_token(secret: &str, user_id: i64, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Claims of a valid, unexpired token.
pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

fn activation_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
