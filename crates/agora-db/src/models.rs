//! Database row types. These map directly to SQLite rows and stay distinct
//! from the agora-types models so credentials never leave this crate by accident.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};

use agora_types::models::{Message, ModerationState, Offer, User, UserStatus};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub activation_token: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub options: Option<String>,
    pub status: i64,
    pub description: Option<String>,
    pub profile_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub from_username: String,
    pub to_username: String,
    pub body: String,
    pub received: bool,
    pub read: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct OfferRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub moderation: String,
    pub created_at: String,
    pub updated_at: String,
}

/// SQLite's `datetime('now')` has no timezone; values are UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", value, e))
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        let status = UserStatus::from_i64(row.status)
            .ok_or_else(|| anyhow!("Corrupt status {} on user {}", row.status, row.id))?;

        Ok(Self {
            id: row.id,
            username: row.username,
            email: row.email,
            display_name: row.display_name,
            is_admin: row.is_admin,
            status,
            description: row.description,
            profile_image: row.profile_image,
            options: row.options,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            from_username: row.from_username,
            to_username: row.to_username,
            body: row.body,
            received: row.received,
            read: row.read,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl TryFrom<OfferRow> for Offer {
    type Error = anyhow::Error;

    fn try_from(row: OfferRow) -> Result<Self> {
        let moderation = ModerationState::parse(&row.moderation)
            .ok_or_else(|| anyhow!("Corrupt moderation '{}' on offer {}", row.moderation, row.id))?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            moderation,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        let naive = parse_timestamp("2024-05-01 12:30:00").unwrap();
        let rfc = parse_timestamp("2024-05-01T12:30:00Z").unwrap();
        assert_eq!(naive, rfc);
        assert!(parse_timestamp("yesterday").is_err());
    }
}
