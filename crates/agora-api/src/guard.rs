use tracing::warn;
use uuid::Uuid;

use agora_db::Database;
use agora_types::models::{User, UserStatus};

use crate::auth::decode_token;

/// Who is calling: the authenticated user, if any, and the gateway
/// connection to leave out of "to others" broadcasts.
#[derive(Debug, Clone, Default)]
pub struct Guard {
    user: Option<User>,
    socket_id: Option<Uuid>,
}

impl Guard {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn authenticated(user: User) -> Self {
        Self {
            user: Some(user),
            socket_id: None,
        }
    }

    pub fn with_socket(self, socket_id: Option<Uuid>) -> Self {
        Self { socket_id, ..self }
    }

    /// True when a user is authenticated.
    pub fn check(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin)
    }

    pub fn socket_id(&self) -> Option<Uuid> {
        self.socket_id
    }
}

/// Builds the guard for a call. A missing, invalid or stale token, or a
/// banned account, yields a guest.
pub fn guard_for(
    db: &Database,
    jwt_secret: &str,
    token: Option<&str>,
    socket_id: Option<Uuid>,
) -> anyhow::Result<Guard> {
    let guest = Guard::guest().with_socket(socket_id);

    let Some(claims) = token.and_then(|t| decode_token(jwt_secret, t)) else {
        return Ok(guest);
    };

    let Some(row) = db.get_user_by_id(claims.sub)? else {
        warn!("Token for unknown user {} ({})", claims.sub, claims.username);
        return Ok(guest);
    };

    let user = User::try_from(row)?;
    if user.status == UserStatus::Banned {
        warn!("Banned user {} presented a token", user.username);
        return Ok(guest);
    }

    Ok(Guard::authenticated(user).with_socket(socket_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use crate::test_support::{SECRET, seeded};

    #[test]
    fn valid_token_authenticates() {
        let (db, users) = seeded();
        let token = create_token(SECRET, users.alice.id, "alice").unwrap();
        let socket = Uuid::new_v4();

        let guard = guard_for(&db, SECRET, Some(&token), Some(socket)).unwrap();
        assert!(guard.check());
        assert!(!guard.is_admin());
        assert_eq!(guard.user().unwrap().username, "alice");
        assert_eq!(guard.socket_id(), Some(socket));
    }

    #[test]
    fn bad_or_missing_token_is_a_guest() {
        let (db, users) = seeded();
        assert!(!guard_for(&db, SECRET, None, None).unwrap().check());
        assert!(!guard_for(&db, SECRET, Some("garbage"), None).unwrap().check());

        let forged = create_token("another-secret", users.alice.id, "alice").unwrap();
        assert!(!guard_for(&db, SECRET, Some(&forged), None).unwrap().check());
    }

    #[test]
    fn banned_users_are_guests() {
        let (db, users) = seeded();
        db.set_user_status(users.bob.id, UserStatus::Banned).unwrap();
        let token = create_token(SECRET, users.bob.id, "bob").unwrap();
        assert!(!guard_for(&db, SECRET, Some(&token), None).unwrap().check());
    }

    #[test]
    fn admins_are_recognised() {
        let (db, users) = seeded();
        let token = create_token(SECRET, users.admin.id, "root").unwrap();
        assert!(guard_for(&db, SECRET, Some(&token), None).unwrap().is_admin());
    }
}
