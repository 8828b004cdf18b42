use std::collections::HashMap;

use serde_json::json;
use tracing::warn;

use crate::parameters::Parameters;
use crate::request::{ApiRequest, RequestContext, resolve};
use crate::requests::{
    MessageReceivedNotifyRequest, MessageSendRequest, MessagesRequest, OfferCreateRequest,
    OfferModerationRequest, UserRequest, UsersSearchRequest,
};
use crate::response::ApiResponse;

/// Maps request names to their handlers.
#[derive(Default)]
pub struct RequestRegistry {
    requests: HashMap<&'static str, Box<dyn ApiRequest>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("message.received", MessageReceivedNotifyRequest);
        registry.register("messages", MessagesRequest::default());
        registry.register("message.send", MessageSendRequest::default());
        registry.register("offer.mark_appropriate", OfferModerationRequest::mark_appropriate());
        registry.register("offer.mark_inappropriate", OfferModerationRequest::mark_inappropriate());
        registry.register("offer.create", OfferCreateRequest::default());
        registry.register("user", UserRequest::default());
        registry.register("users.search", UsersSearchRequest::default());
        registry
    }

    /// Registers `request` under `name`, replacing any previous handler.
    pub fn register(&mut self, name: &'static str, request: impl ApiRequest + 'static) {
        self.requests.insert(name, Box::new(request));
    }

    pub fn resolve(&self, name: &str, params: &Parameters, ctx: &RequestContext<'_>) -> ApiResponse {
        match self.requests.get(name) {
            Some(request) => resolve(request.as_ref(), name, params, ctx),
            None => {
                warn!("Unknown request '{}'", name);
                ApiResponse::failure(name, json!("Unknown request."))
            }
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.requests.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
