use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            username          TEXT NOT NULL UNIQUE,
            email             TEXT NOT NULL UNIQUE,
            password          TEXT NOT NULL,
            activation_token  TEXT NOT NULL,
            display_name      TEXT,
            is_admin          INTEGER NOT NULL DEFAULT 0,
            options           TEXT,
            -- 0 == inactive, 1 == active, 2 == banned
            status            INTEGER NOT NULL,
            description       TEXT,
            profile_image     TEXT,
            remember_token    TEXT,
            created_at        TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS i_users_search
            ON users(email, username, display_name);

        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            from_username   TEXT NOT NULL REFERENCES users(username),
            to_username     TEXT NOT NULL REFERENCES users(username),
            body            TEXT NOT NULL,
            received        INTEGER NOT NULL DEFAULT 0,
            \"read\"          INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_recipient
            ON messages(to_username, from_username);

        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(from_username);

        CREATE TABLE IF NOT EXISTS offers (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         INTEGER NOT NULL REFERENCES users(id),
            title           TEXT NOT NULL,
            description     TEXT,
            moderation      TEXT NOT NULL DEFAULT 'pending',
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_offers_user
            ON offers(user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
