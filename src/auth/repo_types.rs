use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account role. There is no self-service path to `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(value)),
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub login_attempts: i32,
    pub lock_until: Option<OffsetDateTime>,
    pub last_login: Option<OffsetDateTime>,
    pub preferences: serde_json::Value,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Locked while `lock_until` sits in the future.
    pub fn is_locked(&self, now: OffsetDateTime) -> bool {
        self.lock_until.map_or(false, |until| until > now)
    }
}

#[cfg(test)]
pub(crate) fn test_user() -> User {
    User {
        id: Uuid::new_v4(),
        username: "alice1".into(),
        email: "a@example.com".into(),
        password_hash: "$argon2id$fake".into(),
        role: Role::User,
        login_attempts: 0,
        lock_until: None,
        last_login: None,
        preferences: serde_json::json!({ "theme": "dark" }),
        created_at: OffsetDateTime::now_utc(),
        updated_at: OffsetDateTime::now_utc(),
    }
}
