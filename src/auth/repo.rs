use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, login_attempts,
                   lock_until, last_login, preferences, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a user by email. Emails are stored lowercased.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, login_attempts,
                   lock_until, last_login, preferences, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Uniqueness pre-check for registration: whichever of the two fields is
    /// already taken comes back so the caller can name it.
    pub async fn find_by_email_or_username(
        db: &PgPool,
        email: &str,
        username: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, login_attempts,
                   lock_until, last_login, preferences, created_at, updated_at
            FROM users
            WHERE email = $1 OR username = $2
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn username_taken_by_other(
        db: &PgPool,
        username: &str,
        id: Uuid,
    ) -> anyhow::Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 AND id <> $2)"#,
        )
        .bind(username)
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(taken)
    }

    /// Create a new user with hashed password. Role and preferences take
    /// their column defaults.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, role, login_attempts,
                      lock_until, last_login, preferences, created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// One atomic statement: bump the failure counter and set the lock the
    /// moment the counter reaches `max_attempts`. Concurrent failures cannot
    /// lose increments.
    pub async fn record_login_failure(
        db: &PgPool,
        id: Uuid,
        max_attempts: i32,
        lock_until: OffsetDateTime,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET login_attempts = login_attempts + 1,
                lock_until = CASE WHEN login_attempts + 1 >= $2 THEN $3 ELSE lock_until END,
                updated_at = now()
            WHERE id = $1
            RETURNING id, username, email, password_hash, role, login_attempts,
                      lock_until, last_login, preferences, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(max_attempts)
        .bind(lock_until)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Successful authentication: counter to zero, lock cleared, last_login
    /// stamped.
    pub async fn record_login_success(db: &PgPool, id: Uuid) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET login_attempts = 0,
                lock_until = NULL,
                last_login = now(),
                updated_at = now()
            WHERE id = $1
            RETURNING id, username, email, password_hash, role, login_attempts,
                      lock_until, last_login, preferences, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        username: Option<&str>,
        preferences: Option<&serde_json::Value>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                preferences = COALESCE($3, preferences),
                updated_at = now()
            WHERE id = $1
            RETURNING id, username, email, password_hash, role, login_attempts,
                      lock_until, last_login, preferences, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(preferences.cloned())
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_password_hash(
        db: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password_hash = $2,
                updated_at = now()
            WHERE id = $1
            RETURNING id, username, email, password_hash, role, login_attempts,
                      lock_until, last_login, preferences, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
