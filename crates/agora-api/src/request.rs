//! The resolution pipeline every API request goes through:
//! precondition, validation, then the request's own logic.

use serde_json::Value;
use tracing::{debug, error, warn};

use agora_db::Database;
use agora_gateway::dispatcher::Dispatcher;

use crate::guard::Guard;
use crate::parameters::Parameters;
use crate::response::{ApiResponse, empty_payload};
use crate::validation::{FieldRule, validate};

/// Result of a request's precondition check.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    Proceed,
    /// Stop with a failed response carrying this payload.
    Refuse(Value),
}

impl From<bool> for Precondition {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Proceed
        } else {
            Self::Refuse(empty_payload())
        }
    }
}

/// Everything a request may touch while resolving.
pub struct RequestContext<'a> {
    pub db: &'a Database,
    pub dispatcher: &'a Dispatcher,
    pub guard: &'a Guard,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
    #[error("could not shape resource: {0}")]
    Shape(#[from] serde_json::Error),
}

pub trait ApiRequest: Send + Sync {
    /// Gate checked before anything else. Defaults to proceeding.
    fn should_resolve(&self, _ctx: &RequestContext<'_>) -> Precondition {
        Precondition::Proceed
    }

    /// Rules the parameters must satisfy before `do_resolve` runs.
    fn rules(&self, _params: &Parameters) -> Vec<FieldRule> {
        Vec::new()
    }

    /// Runs only after the precondition and validation passed.
    fn do_resolve(
        &self,
        name: &str,
        params: &Parameters,
        ctx: &RequestContext<'_>,
    ) -> Result<ApiResponse, RequestError>;
}

/// Resolves `request` into a response. Never fails: refusals, validation
/// errors and storage errors all become failed responses.
pub fn resolve(
    request: &dyn ApiRequest,
    name: &str,
    params: &Parameters,
    ctx: &RequestContext<'_>,
) -> ApiResponse {
    if let Precondition::Refuse(payload) = request.should_resolve(ctx) {
        debug!("Request '{}' refused by precondition", name);
        return ApiResponse::failure(name, payload);
    }

    let rules = request.rules(params);
    if let Err(errors) = validate(params, &rules) {
        warn!("Request '{}' failed validation: {}", name, errors);
        return ApiResponse::validation_failed(name, &errors);
    }

    match request.do_resolve(name, params, ctx) {
        Ok(response) => {
            debug!("Request '{}' resolved (success={})", name, response.success);
            response
        }
        Err(e) => {
            error!(error = ?e, "Request '{}' failed", name);
            ApiResponse::empty_failure(name)
        }
    }
}
