//! Shared fixtures for unit tests.

use agora_db::Database;
use agora_types::models::User;

pub const SECRET: &str = "test-secret";

pub struct Users {
    pub alice: User,
    pub bob: User,
    pub carol: User,
    pub admin: User,
}

fn active_user(db: &Database, username: &str, is_admin: bool) -> User {
    let token = format!("activate-{username}");
    let id = db
        .create_user(username, &format!("{username}@example.com"), "not-a-hash", &token)
        .unwrap();
    db.activate_user(&token).unwrap();
    if is_admin {
        db.set_user_admin(id, true).unwrap();
    }
    User::try_from(db.get_user_by_id(id).unwrap().unwrap()).unwrap()
}

/// In-memory database with three active users and one active admin (`root`).
pub fn seeded() -> (Database, Users) {
    let db = Database::open_in_memory().unwrap();
    let users = Users {
        alice: active_user(&db, "alice", false),
        bob: active_user(&db, "bob", false),
        carol: active_user(&db, "carol", false),
        admin: active_user(&db, "root", true),
    };
    (db, users)
}
