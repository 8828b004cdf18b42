use serde::Serialize;
use serde_json::Value;

use agora_types::api::{MessageResource, OfferResource, UserResource};
use agora_types::models::{Message, Offer, User};

/// Maps a model onto the shape clients see.
pub trait Resource {
    type Shape: Serialize;

    fn shape(&self) -> Self::Shape;

    fn to_resource(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self.shape())
    }
}

impl Resource for User {
    type Shape = UserResource;

    fn shape(&self) -> UserResource {
        UserResource::from(self)
    }
}

impl Resource for Message {
    type Shape = MessageResource;

    fn shape(&self) -> MessageResource {
        MessageResource::from(self)
    }
}

impl Resource for Offer {
    type Shape = OfferResource;

    fn shape(&self) -> OfferResource {
        OfferResource::from(self)
    }
}
