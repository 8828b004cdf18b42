use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account status, stored as a tiny integer in the `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Inactive = 0,
    Active = 1,
    Banned = 2,
}

impl UserStatus {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Inactive),
            1 => Some(Self::Active),
            2 => Some(Self::Banned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub status: UserStatus,
    pub description: Option<String>,
    pub profile_image: Option<String>,
    /// Free-form JSON preferences; `locale` is the only key read by the server.
    pub options: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Preferred locale from `options`, if the user set one.
    pub fn locale(&self) -> Option<String> {
        let options = self.options.as_deref()?;
        let value: serde_json::Value = serde_json::from_str(options).ok()?;
        value
            .get("locale")
            .and_then(|l| l.as_str())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
    }
}

/// A direct message between two users.
///
/// `received` and `read` only ever move from false to true. Reading a
/// message implies it was received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub from_username: String,
    pub to_username: String,
    pub body: String,
    pub received: bool,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Marks the message received. Returns true if the flag changed.
    pub fn mark_received(&mut self) -> bool {
        let changed = !self.received;
        self.received = true;
        changed
    }

    /// Marks the message read (and therefore received). Returns true if
    /// either flag changed.
    pub fn mark_read(&mut self) -> bool {
        let changed = self.mark_received() | !self.read;
        self.read = true;
        changed
    }

    pub fn is_addressed_to(&self, username: &str) -> bool {
        self.to_username == username
    }

    /// Both usernames taking part in the conversation.
    pub fn participants(&self) -> [&str; 2] {
        [&self.from_username, &self.to_username]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationState {
    Pending,
    Appropriate,
    Inappropriate,
}

impl ModerationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Appropriate => "appropriate",
            Self::Inappropriate => "inappropriate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "appropriate" => Some(Self::Appropriate),
            "inappropriate" => Some(Self::Inappropriate),
            _ => None,
        }
    }

    /// Whether moderation may move an offer from `self` to `target`.
    /// Nothing moves back to pending.
    pub fn can_transition_to(self, target: Self) -> bool {
        target != Self::Pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub moderation: ModerationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// Applies a moderation decision. Returns false if the transition is not allowed.
    pub fn moderate(&mut self, target: ModerationState) -> bool {
        if !self.moderation.can_transition_to(target) {
            return false;
        }
        self.moderation = target;
        true
    }

    pub fn mark_appropriate(&mut self) -> bool {
        self.moderate(ModerationState::Appropriate)
    }

    pub fn mark_inappropriate(&mut self) -> bool {
        self.moderate(ModerationState::Inappropriate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message {
            id: 1,
            from_username: "alice".into(),
            to_username: "bob".into(),
            body: "hi".into(),
            received: false,
            read: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn read_implies_received() {
        let mut m = message();
        assert!(m.mark_read());
        assert!(m.received);
        assert!(m.read);
        assert!(!m.mark_read());
        assert!(!m.mark_received());
    }

    #[test]
    fn received_does_not_touch_read() {
        let mut m = message();
        assert!(m.mark_received());
        assert!(!m.read);
    }

    #[test]
    fn moderation_never_returns_to_pending() {
        let mut offer = Offer {
            id: 3,
            user_id: 1,
            title: "Bike".into(),
            description: None,
            moderation: ModerationState::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(offer.mark_inappropriate());
        assert!(offer.mark_appropriate());
        assert!(offer.mark_appropriate());
        assert!(!offer.moderate(ModerationState::Pending));
        assert_eq!(offer.moderation, ModerationState::Appropriate);
    }

    #[test]
    fn locale_comes_from_options() {
        let mut user = User {
            id: 1,
            username: "carol".into(),
            email: "carol@example.com".into(),
            display_name: None,
            is_admin: false,
            status: UserStatus::Active,
            description: None,
            profile_image: None,
            options: Some(r#"{"locale":"de"}"#.into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(user.locale().as_deref(), Some("de"));

        user.options = Some("not json".into());
        assert_eq!(user.locale(), None);

        user.options = None;
        assert_eq!(user.locale(), None);
    }

    #[test]
    fn status_roundtrips_through_tiny_integer() {
        for status in [UserStatus::Inactive, UserStatus::Active, UserStatus::Banned] {
            assert_eq!(UserStatus::from_i64(status.as_i64()), Some(status));
        }
        assert_eq!(UserStatus::from_i64(7), None);
    }
}
