mod chat;
mod offer;
mod user;

pub use chat::{MessageReceivedNotifyRequest, MessageSendRequest, MessagesRequest};
pub use offer::{OfferCreateRequest, OfferModerationRequest};
pub use user::{UserRequest, UsersSearchRequest};
