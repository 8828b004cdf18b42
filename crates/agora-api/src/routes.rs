use axum::{
    Json, Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use agora_gateway::connection;
use agora_types::models::User;

use crate::auth::{self, AuthError, decode_token};
use crate::guard::guard_for;
use crate::parameters::Parameters;
use crate::request::RequestContext;
use crate::state::{AppState, run_blocking};

/// Header naming the caller's own gateway connection.
pub const SOCKET_ID_HEADER: &str = "x-socket-id";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/activate", post(auth::activate))
        .route("/auth/login", post(auth::login))
        .route("/api/{name}", post(api_request))
        .route("/gateway", get(ws_upgrade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn socket_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(SOCKET_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

async fn api_request(
    State(state): State<AppState>,
    Path(name): Path<String>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, AuthError> {
    let Some(params) = Parameters::from_json(body) else {
        debug!("Request '{}' body is not a JSON object", name);
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "parameters must be a JSON object" })),
        )
            .into_response());
    };

    let token = bearer.ok().map(|TypedHeader(auth)| auth.token().to_string());
    let socket_id = socket_id(&headers);

    let response = run_blocking(move || {
        let guard = guard_for(&state.db, &state.jwt_secret, token.as_deref(), socket_id)?;
        let ctx = RequestContext {
            db: &state.db,
            dispatcher: &state.dispatcher,
            guard: &guard,
        };
        Ok::<_, AuthError>(state.registry.resolve(&name, &params, &ctx))
    })
    .await?;

    Ok(response.into_response())
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: String,
}

/// Validates the JWT before upgrading; only active users may connect.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AuthError> {
    let Some(claims) = decode_token(&state.jwt_secret, &query.token) else {
        warn!("Gateway connection with invalid token");
        return Err(AuthError::InvalidCredentials);
    };

    let db_state = state.clone();
    let user = run_blocking(move || {
        let row = db_state
            .db
            .get_user_by_id(claims.sub)?
            .ok_or(AuthError::InvalidCredentials)?;
        Ok::<_, AuthError>(User::try_from(row)?)
    })
    .await?;

    if !user.is_active() {
        return Err(AuthError::NotActive);
    }

    let dispatcher = state.dispatcher.clone();
    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, user.username)))
}
