use axum::http::{header, HeaderMap};
use sqlx::{FromRow, PgPool};
use time::{Duration as TimeDuration, OffsetDateTime};
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Cookie carrying the server-side session id.
pub const SESSION_COOKIE: &str = "sid";
/// Cookie some clients use to carry the raw token themselves.
pub const TOKEN_COOKIE: &str = "token";

/// Server-side session row backing the `sid` cookie: the issued token plus a
/// minimal snapshot of the user it belongs to.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub async fn create(
        db: &PgPool,
        user: &User,
        token: &str,
        ttl: TimeDuration,
    ) -> anyhow::Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, token, username, email, role, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, token, username, email, role, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(token)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(OffsetDateTime::now_utc() + ttl)
        .fetch_one(db)
        .await?;
        Ok(session)
    }

    /// Look up a live session; expired rows are treated as absent.
    pub async fn find_valid(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, token, username, email, role, created_at, expires_at
            FROM sessions
            WHERE id = $1 AND expires_at > now()
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(session)
    }

    /// Idempotent: deleting an already-absent session succeeds.
    pub async fn destroy(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM sessions WHERE id = $1"#)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Revoke every session of a user, optionally sparing one (the session
    /// performing the change). Returns how many were removed.
    pub async fn destroy_all_for_user_except(
        db: &PgPool,
        user_id: Uuid,
        keep: Option<Uuid>,
    ) -> anyhow::Result<u64> {
        let result =
            sqlx::query(r#"DELETE FROM sessions WHERE user_id = $1 AND ($2::uuid IS NULL OR id <> $2)"#)
                .bind(user_id)
                .bind(keep)
                .execute(db)
                .await?;
        Ok(result.rows_affected())
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

pub fn session_cookie(session: &Session) -> String {
    let max_age = (session.expires_at - session.created_at).whole_seconds().max(0);
    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session.id, max_age
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Pull one cookie out of the request's `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
