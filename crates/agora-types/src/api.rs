use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Message, ModerationState, Offer, User};

// -- JWT Claims --

/// JWT claims shared by the REST layer and the gateway upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

// -- Resources --

/// External shape of a user. Never carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResource {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub status: i64,
    pub description: Option<String>,
    pub profile_image: Option<String>,
}

impl From<&User> for UserResource {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            status: user.status.as_i64(),
            description: user.description.clone(),
            profile_image: user.profile_image.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResource {
    pub id: i64,
    pub from_username: String,
    pub to_username: String,
    pub body: String,
    pub received: bool,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessageResource {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            from_username: message.from_username.clone(),
            to_username: message.to_username.clone(),
            body: message.body.clone(),
            received: message.received,
            read: message.read,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferResource {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub moderation: ModerationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Offer> for OfferResource {
    fn from(offer: &Offer) -> Self {
        Self {
            id: offer.id,
            user_id: offer.user_id,
            title: offer.title.clone(),
            description: offer.description.clone(),
            moderation: offer.moderation,
            created_at: offer.created_at,
            updated_at: offer.updated_at,
        }
    }
}
