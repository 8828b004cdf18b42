use tracing::warn;

use agora_types::models::{User, UserStatus};

use crate::db_request::{DbBinding, Model};
use crate::parameters::{Parameters, coerce_integer};
use crate::request::{ApiRequest, Precondition, RequestContext, RequestError};
use crate::response::ApiResponse;
use crate::validation::FieldRule;

/// Public profile lookup by username.
pub struct UserRequest {
    binding: DbBinding,
}

impl Default for UserRequest {
    fn default() -> Self {
        Self {
            binding: DbBinding::new(Model::User),
        }
    }
}

impl ApiRequest for UserRequest {
    fn rules(&self, _params: &Parameters) -> Vec<FieldRule> {
        vec![FieldRule::required("username").string().max(255)]
    }

    fn do_resolve(
        &self,
        name: &str,
        params: &Parameters,
        ctx: &RequestContext<'_>,
    ) -> Result<ApiResponse, RequestError> {
        let Some(username) = params.string("username") else {
            return Ok(ApiResponse::empty_failure(name));
        };

        match ctx.db.get_user_by_username(username)? {
            Some(row) => {
                let user = User::try_from(row)?;
                Ok(ApiResponse::success(name, self.binding.present(&user)?))
            }
            None => Ok(ApiResponse::empty_failure(name)),
        }
    }
}

/// Prefix search over users, with an optional `status` filter.
pub struct UsersSearchRequest {
    binding: DbBinding,
    per_page_default: u32,
}

impl Default for UsersSearchRequest {
    fn default() -> Self {
        Self {
            binding: DbBinding::new(Model::User),
            per_page_default: 15,
        }
    }
}

impl ApiRequest for UsersSearchRequest {
    fn should_resolve(&self, ctx: &RequestContext<'_>) -> Precondition {
        ctx.guard.check().into()
    }

    fn rules(&self, _params: &Parameters) -> Vec<FieldRule> {
        vec![
            FieldRule::required("q").string().min(1).max(255),
            FieldRule::sometimes("per_page").integer().between(1, 50),
        ]
    }

    fn do_resolve(
        &self,
        name: &str,
        params: &Parameters,
        ctx: &RequestContext<'_>,
    ) -> Result<ApiResponse, RequestError> {
        let Some(term) = params.string("q") else {
            return Ok(ApiResponse::empty_failure(name));
        };
        let limit = params
            .integer("per_page")
            .map_or(self.per_page_default, |n| n.clamp(1, 50) as u32);

        let mut status = None;
        for (column, value) in self.binding.filters(params, &self.rules(params)) {
            match coerce_integer(&value).and_then(UserStatus::from_i64) {
                Some(s) if column == "status" => status = Some(s),
                _ => warn!("Ignoring invalid '{}' filter: {}", column, value),
            }
        }

        let users = ctx
            .db
            .search_users(term, status, limit)?
            .into_iter()
            .map(User::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(ApiResponse::success(
            name,
            serde_json::Value::Array(self.binding.present_all(&users)?),
        ))
    }
}
