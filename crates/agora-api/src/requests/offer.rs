use tracing::info;

use agora_types::events::GatewayEvent;
use agora_types::models::{ModerationState, Offer};

use crate::db_request::{DbBinding, Model};
use crate::parameters::Parameters;
use crate::request::{ApiRequest, Precondition, RequestContext, RequestError};
use crate::resource::Resource;
use crate::response::ApiResponse;
use crate::validation::FieldRule;

/// Admin decision on an offer's moderation state.
pub struct OfferModerationRequest {
    binding: DbBinding,
    target: ModerationState,
}

impl OfferModerationRequest {
    pub fn mark_appropriate() -> Self {
        Self {
            binding: DbBinding::new(Model::Offer),
            target: ModerationState::Appropriate,
        }
    }

    pub fn mark_inappropriate() -> Self {
        Self {
            binding: DbBinding::new(Model::Offer),
            target: ModerationState::Inappropriate,
        }
    }
}

impl ApiRequest for OfferModerationRequest {
    fn should_resolve(&self, ctx: &RequestContext<'_>) -> Precondition {
        ctx.guard.is_admin().into()
    }

    fn rules(&self, _params: &Parameters) -> Vec<FieldRule> {
        vec![FieldRule::required("id").integer()]
    }

    fn do_resolve(
        &self,
        name: &str,
        params: &Parameters,
        ctx: &RequestContext<'_>,
    ) -> Result<ApiResponse, RequestError> {
        let (Some(admin), Some(id)) = (ctx.guard.user(), params.integer("id")) else {
            return Ok(ApiResponse::empty_failure(name));
        };

        let Some(row) = ctx.db.get_offer(id)? else {
            return Ok(ApiResponse::empty_failure(name));
        };
        let mut offer = Offer::try_from(row)?;

        if !offer.moderate(self.target) || !ctx.db.save_offer_moderation(offer.id, offer.moderation)? {
            return Ok(ApiResponse::empty_failure(name));
        }

        info!("Offer {} marked {} by {}", offer.id, offer.moderation.as_str(), admin.username);

        ctx.dispatcher.broadcast_to_others(
            ctx.guard.socket_id(),
            GatewayEvent::OfferModerated {
                offer: offer.shape(),
                by: admin.username.clone(),
            },
        );

        Ok(ApiResponse::success(name, self.binding.present(&offer)?))
    }
}

/// Publishes a new offer, pending moderation.
pub struct OfferCreateRequest {
    binding: DbBinding,
}

impl Default for OfferCreateRequest {
    fn default() -> Self {
        Self {
            binding: DbBinding::new(Model::Offer),
        }
    }
}

impl ApiRequest for OfferCreateRequest {
    fn should_resolve(&self, ctx: &RequestContext<'_>) -> Precondition {
        ctx.guard.user().is_some_and(|u| u.is_active()).into()
    }

    fn rules(&self, _params: &Parameters) -> Vec<FieldRule> {
        vec![
            FieldRule::required("title").string().min(1).max(255),
            FieldRule::sometimes("description").string(),
        ]
    }

    fn do_resolve(
        &self,
        name: &str,
        params: &Parameters,
        ctx: &RequestContext<'_>,
    ) -> Result<ApiResponse, RequestError> {
        let (Some(user), Some(title)) = (ctx.guard.user(), params.string("title")) else {
            return Ok(ApiResponse::empty_failure(name));
        };

        let row = ctx.db.insert_offer(user.id, title, params.string("description"))?;
        let offer = Offer::try_from(row)?;

        Ok(ApiResponse::success(name, self.binding.present(&offer)?))
    }
}
