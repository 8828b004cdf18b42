use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{MessageResource, OfferResource};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection. Clients send `socket_id` back in the
    /// `X-Socket-ID` header so their own actions are not echoed to them.
    Ready { username: String, socket_id: Uuid },

    /// A new direct message was sent
    MessageSent { message: MessageResource, by: String },

    /// A message was received or read by its recipient
    MessageReceived { message: MessageResource, by: String },

    /// An admin changed an offer's moderation state
    OfferModerated { offer: OfferResource, by: String },

    /// A user started typing to another user
    TypingStart { from: String, to: String },

    /// A user came online or went offline
    PresenceUpdate { username: String, online: bool },
}

impl GatewayEvent {
    /// Usernames this event is addressed to. `None` means every connected client.
    pub fn audience(&self) -> Option<[&str; 2]> {
        match self {
            Self::MessageSent { message, .. } | Self::MessageReceived { message, .. } => {
                Some([message.from_username.as_str(), message.to_username.as_str()])
            }
            Self::TypingStart { from, to } => Some([from.as_str(), to.as_str()]),
            // Ready is sent directly; OfferModerated and PresenceUpdate are global
            _ => None,
        }
    }

    pub fn is_visible_to(&self, username: &str) -> bool {
        self.audience()
            .map_or(true, |audience| audience.contains(&username))
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Indicate typing to another user
    StartTyping { to: String },
}
