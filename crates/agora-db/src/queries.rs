use crate::Database;
use crate::models::{MessageRow, OfferRow, UserRow};
use agora_types::models::{ModerationState, UserStatus};
use anyhow::{Result, anyhow};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params_from_iter};

const USER_COLUMNS: &str = "id, username, email, password, activation_token, display_name, is_admin, \
     options, status, description, profile_image, created_at, updated_at";

const MESSAGE_COLUMNS: &str =
    "id, from_username, to_username, body, received, \"read\", created_at, updated_at";

const OFFER_COLUMNS: &str = "id, user_id, title, description, moderation, created_at, updated_at";

/// Ids bound per `IN (...)` query. SQLite caps bound variables at 32766.
const ID_CHUNK_SIZE: usize = 500;

/// Order-based page of a user's personal messages.
#[derive(Debug, Clone)]
pub struct MessageListQuery<'a> {
    /// Only messages this user sent or received.
    pub username: &'a str,
    /// Narrow to messages exchanged with this correspondent.
    pub with: Option<&'a str>,
    pub received: Option<bool>,
    pub read: Option<bool>,
    pub descending: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        activation_token: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password, activation_token, status) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![username, email, password_hash, activation_token, UserStatus::Inactive.as_i64()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    /// Activates the inactive user holding `token`. Returns the user id, or
    /// `None` if no inactive user has that token.
    pub fn activate_user(&self, token: &str) -> Result<Option<i64>> {
        if token.is_empty() {
            return Ok(None);
        }

        self.with_conn_mut(|conn| {
            let id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM users WHERE activation_token = ?1 AND status = ?2",
                    rusqlite::params![token, UserStatus::Inactive.as_i64()],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(id) = id {
                conn.execute(
                    "UPDATE users SET status = ?2, activation_token = '', updated_at = datetime('now') WHERE id = ?1",
                    rusqlite::params![id, UserStatus::Active.as_i64()],
                )?;
            }

            Ok(id)
        })
    }

    pub fn set_user_status(&self, id: i64, status: UserStatus) -> Result<()> {
        self.update_user_column(id, "status", Value::Integer(status.as_i64()))
    }

    pub fn set_user_admin(&self, id: i64, is_admin: bool) -> Result<()> {
        self.update_user_column(id, "is_admin", Value::Integer(is_admin as i64))
    }

    pub fn set_user_options(&self, id: i64, options: Option<&str>) -> Result<()> {
        let value = options.map_or(Value::Null, |o| Value::Text(o.to_string()));
        self.update_user_column(id, "options", value)
    }

    fn update_user_column(&self, id: i64, column: &'static str, value: Value) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                &format!("UPDATE users SET {column} = ?2, updated_at = datetime('now') WHERE id = ?1"),
                rusqlite::params![id, value],
            )?;
            if changed == 0 {
                return Err(anyhow!("User not found: {}", id));
            }
            Ok(())
        })
    }

    /// Prefix search over the `i_users_search` columns, optionally limited
    /// to one account status.
    pub fn search_users(&self, term: &str, status: Option<UserStatus>, limit: u32) -> Result<Vec<UserRow>> {
        let pattern = format!("{}%", escape_like(term));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE (email LIKE ?1 ESCAPE '\\'
                    OR username LIKE ?1 ESCAPE '\\'
                    OR display_name LIKE ?1 ESCAPE '\\')
                   AND (?3 IS NULL OR status = ?3)
                 ORDER BY username
                 LIMIT ?2"
            ))?;

            let rows = stmt
                .query_map(rusqlite::params![pattern, limit, status.map(UserStatus::as_i64)], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, from_username: &str, to_username: &str, body: &str) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (from_username, to_username, body) VALUES (?1, ?2, ?3)",
                (from_username, to_username, body),
            )?;
            let id = conn.last_insert_rowid();
            query_message(conn, id)?.ok_or_else(|| anyhow!("Message vanished after insert: {}", id))
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Batch-fetch messages by id, restricted to those addressed to `to_username`.
    /// Ids are queried in chunks to stay under SQLite's bound-variable limit.
    pub fn get_messages_for_recipient(&self, ids: &[i64], to_username: &str) -> Result<Vec<MessageRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let mut rows = Vec::new();

            for chunk in ids.chunks(ID_CHUNK_SIZE) {
                let placeholders: Vec<String> = (2..=chunk.len() + 1).map(|i| format!("?{}", i)).collect();
                let sql = format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE to_username = ?1 AND id IN ({})",
                    placeholders.join(", ")
                );

                let mut values = Vec::with_capacity(chunk.len() + 1);
                values.push(Value::Text(to_username.to_string()));
                values.extend(chunk.iter().map(|id| Value::Integer(*id)));

                let mut stmt = conn.prepare(&sql)?;
                let found = stmt.query_map(params_from_iter(values.iter()), message_from_row)?;
                for row in found {
                    rows.push(row?);
                }
            }

            rows.sort_by_key(|row| row.id);
            rows.dedup_by_key(|row| row.id);
            Ok(rows)
        })
    }

    /// Persists delivery flags. Flags are combined with `MAX`, so a stale
    /// writer can never turn a flag back off.
    pub fn save_message_flags(&self, id: i64, received: bool, read: bool) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE messages
                 SET received = MAX(received, ?2), \"read\" = MAX(\"read\", ?3), updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![id, received, read],
            )?;
            if changed == 0 {
                return Err(anyhow!("Message not found: {}", id));
            }
            Ok(())
        })
    }

    /// One page of messages plus the total number matching the filters.
    pub fn list_messages(&self, query: &MessageListQuery<'_>) -> Result<(Vec<MessageRow>, u64)> {
        let mut clauses = vec!["(from_username = ?1 OR to_username = ?1)".to_string()];
        let mut values = vec![Value::Text(query.username.to_string())];

        if let Some(with) = query.with {
            values.push(Value::Text(with.to_string()));
            let n = values.len();
            clauses.push(format!("(to_username = ?{n} OR from_username = ?{n})"));
        }
        if let Some(received) = query.received {
            values.push(Value::Integer(received as i64));
            clauses.push(format!("received = ?{}", values.len()));
        }
        if let Some(read) = query.read {
            values.push(Value::Integer(read as i64));
            clauses.push(format!("\"read\" = ?{}", values.len()));
        }

        let where_sql = clauses.join(" AND ");
        let direction = if query.descending { "DESC" } else { "ASC" };

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM messages WHERE {where_sql}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE {where_sql}
                 ORDER BY id {direction}
                 LIMIT {} OFFSET {}",
                query.limit, query.offset
            ))?;

            let rows = stmt
                .query_map(params_from_iter(values.iter()), message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total.max(0) as u64))
        })
    }

    // -- Offers --

    pub fn insert_offer(&self, user_id: i64, title: &str, description: Option<&str>) -> Result<OfferRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO offers (user_id, title, description, moderation) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user_id, title, description, ModerationState::Pending.as_str()],
            )?;
            let id = conn.last_insert_rowid();
            query_offer(conn, id)?.ok_or_else(|| anyhow!("Offer vanished after insert: {}", id))
        })
    }

    pub fn get_offer(&self, id: i64) -> Result<Option<OfferRow>> {
        self.with_conn(|conn| query_offer(conn, id))
    }

    /// Returns false if no offer with `id` exists.
    pub fn save_offer_moderation(&self, id: i64, moderation: ModerationState) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE offers SET moderation = ?2, updated_at = datetime('now') WHERE id = ?1",
                rusqlite::params![id, moderation.as_str()],
            )?;
            Ok(changed == 1)
        })
    }
}

fn query_user(conn: &Connection, column: &'static str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    stmt.query_row([value], user_from_row).optional()
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        [id],
        message_from_row,
    )
    .optional()
}

fn query_offer(conn: &Connection, id: i64) -> Result<Option<OfferRow>> {
    conn.query_row(
        &format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = ?1"),
        [id],
        offer_from_row,
    )
    .optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        activation_token: row.get(4)?,
        display_name: row.get(5)?,
        is_admin: row.get(6)?,
        options: row.get(7)?,
        status: row.get(8)?,
        description: row.get(9)?,
        profile_image: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        from_username: row.get(1)?,
        to_username: row.get(2)?,
        body: row.get(3)?,
        received: row.get(4)?,
        read: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn offer_from_row(row: &Row<'_>) -> rusqlite::Result<OfferRow> {
    Ok(OfferRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        moderation: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        for name in ["alice", "bob", "carol"] {
            db.create_user(name, &format!("{name}@example.com"), "hash", &format!("token-{name}"))
                .unwrap();
        }
        db
    }

    #[test]
    fn new_users_start_inactive_until_activated() {
        let db = seeded();
        let alice = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(alice.status, UserStatus::Inactive.as_i64());

        assert_eq!(db.activate_user("token-alice").unwrap(), Some(alice.id));
        let alice = db.get_user_by_id(alice.id).unwrap().unwrap();
        assert_eq!(alice.status, UserStatus::Active.as_i64());
        assert!(alice.activation_token.is_empty());

        // Tokens are single-use
        assert_eq!(db.activate_user("token-alice").unwrap(), None);
        assert_eq!(db.activate_user("").unwrap(), None);
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let db = seeded();
        assert!(db.create_user("alice", "other@example.com", "hash", "t").is_err());
        assert!(db.create_user("dave", "alice@example.com", "hash", "t").is_err());
    }

    #[test]
    fn recipient_scope_hides_other_users_messages() {
        let db = seeded();
        let to_bob = db.insert_message("alice", "bob", "hi bob").unwrap();
        let to_carol = db.insert_message("alice", "carol", "hi carol").unwrap();

        let rows = db.get_messages_for_recipient(&[to_bob.id, to_carol.id], "bob").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, to_bob.id);
        assert!(db.get_messages_for_recipient(&[], "bob").unwrap().is_empty());
    }

    #[test]
    fn recipient_lookup_spans_many_chunks() {
        let db = seeded();
        let first = db.insert_message("alice", "bob", "first").unwrap();
        let last = db.insert_message("carol", "bob", "last").unwrap();

        let mut ids: Vec<i64> = vec![last.id, first.id];
        ids.extend(100_000..140_000);
        ids.push(first.id);

        let rows = db.get_messages_for_recipient(&ids, "bob").unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first.id, last.id]);
    }

    #[test]
    fn flags_never_regress() {
        let db = seeded();
        let msg = db.insert_message("alice", "bob", "hello").unwrap();
        assert!(!msg.received && !msg.read);

        db.save_message_flags(msg.id, true, true).unwrap();
        db.save_message_flags(msg.id, false, false).unwrap();

        let msg = db.get_message(msg.id).unwrap().unwrap();
        assert!(msg.received);
        assert!(msg.read);
        assert!(db.save_message_flags(999, true, false).is_err());
    }

    #[test]
    fn list_messages_pages_in_order() {
        let db = seeded();
        for i in 0..5 {
            db.insert_message("alice", "bob", &format!("m{i}")).unwrap();
        }
        db.insert_message("carol", "bob", "elsewhere").unwrap();
        db.insert_message("carol", "alice", "not for bob").unwrap();

        let query = MessageListQuery {
            username: "bob",
            with: Some("alice"),
            received: None,
            read: None,
            descending: false,
            limit: 2,
            offset: 2,
        };
        let (rows, total) = db.list_messages(&query).unwrap();
        assert_eq!(total, 5);
        let bodies: Vec<&str> = rows.iter().map(|r| r.body.as_str()).collect();
        assert_eq!(bodies, vec!["m2", "m3"]);

        let (rows, total) = db
            .list_messages(&MessageListQuery { with: None, descending: true, offset: 0, limit: 10, ..query })
            .unwrap();
        assert_eq!(total, 6);
        assert_eq!(rows[0].body, "elsewhere");
    }

    #[test]
    fn list_messages_filters_on_flags() {
        let db = seeded();
        let first = db.insert_message("alice", "bob", "one").unwrap();
        db.insert_message("alice", "bob", "two").unwrap();
        db.save_message_flags(first.id, true, false).unwrap();

        let query = MessageListQuery {
            username: "bob",
            with: None,
            received: Some(false),
            read: None,
            descending: true,
            limit: 15,
            offset: 0,
        };
        let (rows, total) = db.list_messages(&query).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].body, "two");
    }

    #[test]
    fn search_matches_prefixes_and_escapes_wildcards() {
        let db = seeded();
        let hits = db.search_users("ca", None, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "carol");

        assert!(db.search_users("%", None, 10).unwrap().is_empty());
        assert_eq!(db.search_users("bob@", None, 10).unwrap().len(), 1);
    }

    #[test]
    fn search_can_filter_by_status() {
        let db = seeded();
        db.activate_user("token-bob").unwrap();

        let active = db.search_users("b", Some(UserStatus::Active), 10).unwrap();
        assert_eq!(active.len(), 1);
        assert!(db.search_users("a", Some(UserStatus::Active), 10).unwrap().is_empty());
        assert_eq!(db.search_users("a", Some(UserStatus::Inactive), 10).unwrap().len(), 1);
    }

    #[test]
    fn offer_moderation_is_persisted() {
        let db = seeded();
        let alice = db.get_user_by_username("alice").unwrap().unwrap();
        let offer = db.insert_offer(alice.id, "Bike", Some("Barely used")).unwrap();
        assert_eq!(offer.moderation, "pending");

        assert!(db.save_offer_moderation(offer.id, ModerationState::Appropriate).unwrap());
        assert_eq!(db.get_offer(offer.id).unwrap().unwrap().moderation, "appropriate");
        assert!(!db.save_offer_moderation(4242, ModerationState::Appropriate).unwrap());
    }

    #[test]
    fn user_columns_can_be_updated() {
        let db = seeded();
        let bob = db.get_user_by_username("bob").unwrap().unwrap();
        db.set_user_admin(bob.id, true).unwrap();
        db.set_user_status(bob.id, UserStatus::Banned).unwrap();
        db.set_user_options(bob.id, Some(r#"{"locale":"de"}"#)).unwrap();

        let bob = db.get_user_by_id(bob.id).unwrap().unwrap();
        assert!(bob.is_admin);
        assert_eq!(bob.status, UserStatus::Banned.as_i64());
        assert_eq!(bob.options.as_deref(), Some(r#"{"locale":"de"}"#));
        assert!(db.set_user_admin(12345, true).is_err());
    }
}
