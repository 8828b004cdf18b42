use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::validation::ValidationErrors;

/// Outcome of resolving one named API request.
///
/// Failures are still HTTP 200: `success` carries the outcome and `data`
/// the payload, the error text, or `{"validation": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub name: String,
    pub success: bool,
    pub data: Value,
}

/// The payload of a response that has nothing to say.
pub fn empty_payload() -> Value {
    Value::Array(vec![])
}

impl ApiResponse {
    pub fn new(name: &str, success: bool, data: Value) -> Self {
        Self {
            name: name.to_string(),
            success,
            data,
        }
    }

    pub fn success(name: &str, data: Value) -> Self {
        Self::new(name, true, data)
    }

    pub fn empty_success(name: &str) -> Self {
        Self::new(name, true, empty_payload())
    }

    pub fn failure(name: &str, data: Value) -> Self {
        Self::new(name, false, data)
    }

    pub fn empty_failure(name: &str) -> Self {
        Self::new(name, false, empty_payload())
    }

    pub fn validation_failed(name: &str, errors: &ValidationErrors) -> Self {
        Self::new(name, false, json!({ "validation": errors }))
    }

    pub fn has_empty_payload(&self) -> bool {
        self.data.as_array().is_some_and(Vec::is_empty)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
