use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::dto::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest,
};
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo_types::User;
use crate::auth::session::Session;
use crate::db::AppState;
use crate::error::{db_conflict, ApiError};

pub const MAX_LOGIN_ATTEMPTS: i32 = 5;
pub const LOCK_DURATION: TimeDuration = TimeDuration::hours(2);
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_PASSWORD_STRENGTH: u8 = 2;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Count of satisfied checks: length >= 8, lowercase, uppercase, digit,
/// special character.
pub fn password_strength(password: &str) -> u8 {
    let mut strength = 0;
    if password.chars().count() >= 8 {
        strength += 1;
    }
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        strength += 1;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        strength += 1;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        strength += 1;
    }
    if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        strength += 1;
    }
    strength
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.len() < 3 || username.len() > 30 {
        return Err(ApiError::validation_field(
            "Username must be between 3 and 30 characters",
            "username",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::validation_field(
            "Username can only contain letters, numbers, and underscores",
            "username",
        ));
    }
    Ok(())
}

/// What a successful register/login hands back to the handler.
#[derive(Debug)]
pub struct AuthOutcome {
    pub user: User,
    pub token: String,
    pub session: Session,
}

async fn open_session(state: &AppState, user: &User) -> Result<(String, Session), ApiError> {
    let keys = JwtKeys::from_config(&state.config.jwt).map_err(|e| ApiError::Internal(e.into()))?;
    let token = keys.issue(user).map_err(|e| ApiError::Internal(e.into()))?;
    let session = Session::create(&state.db, user, &token, keys.ttl).await?;
    Ok((token, session))
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<AuthOutcome, ApiError> {
    let username = req.username.as_deref().map(str::trim).unwrap_or_default();
    let email = req
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .unwrap_or_default();
    let password = req.password.unwrap_or_default();
    let confirm = req.confirm_password.unwrap_or_default();

    if username.is_empty() || email.is_empty() || password.is_empty() || confirm.is_empty() {
        let field = if username.is_empty() {
            "username"
        } else if email.is_empty() {
            "email"
        } else if password.is_empty() {
            "password"
        } else {
            "confirmPassword"
        };
        return Err(ApiError::validation_field("All fields are required", field));
    }
    if password != confirm {
        return Err(ApiError::validation_field(
            "Passwords do not match",
            "confirmPassword",
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation_field(
            "Password must be at least 6 characters long",
            "password",
        ));
    }
    if password_strength(&password) < MIN_PASSWORD_STRENGTH {
        return Err(ApiError::validation_field(
            "Password is too weak. Please include uppercase, lowercase, numbers, and special characters.",
            "password",
        ));
    }
    validate_username(username)?;
    if !is_valid_email(&email) {
        return Err(ApiError::validation_field(
            "Please enter a valid email",
            "email",
        ));
    }

    if let Some(existing) = User::find_by_email_or_username(&state.db, &email, username).await? {
        let field = if existing.email == email { "email" } else { "username" };
        warn!(field, "registration conflict");
        return Err(ApiError::conflict(field));
    }

    let hash = hash_password(&password)?;
    let user = match User::create(&state.db, username, &email, &hash).await {
        Ok(user) => user,
        Err(e) => {
            // The pre-check races against concurrent inserts; the unique
            // index has the final word.
            if let Some(conflict) = e.downcast_ref::<sqlx::Error>().and_then(db_conflict) {
                return Err(conflict);
            }
            return Err(e.into());
        }
    };

    let (token, session) = open_session(state, &user).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(AuthOutcome {
        user,
        token,
        session,
    })
}

pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthOutcome, ApiError> {
    let email = req
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .unwrap_or_default();
    let password = req.password.unwrap_or_default();

    if email.is_empty() || password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    let now = OffsetDateTime::now_utc();
    // Locked accounts fail fast: no hashing work, no counter movement.
    if user.is_locked(now) {
        warn!(user_id = %user.id, "login attempt on locked account");
        return Err(ApiError::AccountLocked);
    }

    if !verify_password(&password, &user.password_hash)? {
        let updated =
            User::record_login_failure(&state.db, user.id, MAX_LOGIN_ATTEMPTS, now + LOCK_DURATION)
                .await?;
        if updated.is_locked(now) {
            warn!(user_id = %user.id, attempts = updated.login_attempts, "account locked");
        } else {
            warn!(user_id = %user.id, attempts = updated.login_attempts, "login invalid password");
        }
        return Err(ApiError::InvalidCredentials);
    }

    let user = User::record_login_success(&state.db, user.id).await?;
    let (token, session) = open_session(state, &user).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(AuthOutcome {
        user,
        token,
        session,
    })
}

pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    current_session: Option<Uuid>,
    req: ChangePasswordRequest,
) -> Result<(), ApiError> {
    let current = req.current_password.unwrap_or_default();
    let new = req.new_password.unwrap_or_default();
    let confirm = req.confirm_new_password.unwrap_or_default();

    if current.is_empty() || new.is_empty() || confirm.is_empty() {
        return Err(ApiError::validation("All password fields are required"));
    }
    if new != confirm {
        return Err(ApiError::validation_field(
            "New passwords do not match",
            "confirmNewPassword",
        ));
    }
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation_field(
            "New password must be at least 6 characters long",
            "newPassword",
        ));
    }

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    if !verify_password(&current, &user.password_hash)? {
        warn!(user_id = %user.id, "change password with wrong current password");
        return Err(ApiError::validation_field(
            "Current password is incorrect",
            "currentPassword",
        ));
    }

    let hash = hash_password(&new)?;
    User::update_password_hash(&state.db, user.id, &hash).await?;
    // Other sessions die with the old password; outstanding bearer tokens
    // simply age out at their 24h expiry.
    let revoked = Session::destroy_all_for_user_except(&state.db, user.id, current_session).await?;
    info!(user_id = %user.id, sessions_revoked = revoked, "password changed");
    Ok(())
}

pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<User, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    let mut new_username: Option<String> = None;
    if let Some(name) = req.username.as_deref().map(str::trim) {
        if !name.is_empty() && name != user.username {
            validate_username(name)?;
            if User::username_taken_by_other(&state.db, name, user.id).await? {
                return Err(ApiError::Conflict {
                    message: "Username already taken".into(),
                    field: "username",
                });
            }
            new_username = Some(name.to_string());
        }
    }

    let merged = req
        .preferences
        .map(|incoming| merge_preferences(&user.preferences, &incoming));

    if new_username.is_none() && merged.is_none() {
        return Ok(user);
    }

    let user =
        User::update_profile(&state.db, user.id, new_username.as_deref(), merged.as_ref()).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}

/// Shallow merge: incoming top-level keys overwrite, everything else stays.
fn merge_preferences(current: &serde_json::Value, incoming: &serde_json::Value) -> serde_json::Value {
    match (current, incoming) {
        (serde_json::Value::Object(cur), serde_json::Value::Object(inc)) => {
            let mut out = cur.clone();
            for (key, value) in inc {
                out.insert(key.clone(), value.clone());
            }
            serde_json::Value::Object(out)
        }
        _ => incoming.clone(),
    }
}
