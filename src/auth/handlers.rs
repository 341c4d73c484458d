use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use tracing::{error, instrument};
use uuid::Uuid;

use crate::auth::dto::{
    AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, PublicUser,
    RegisterRequest, TokenIdentity, UpdateProfileRequest, UserResponse, VerifyResponse,
};
use crate::auth::extractors::AuthUser;
use crate::auth::repo_types::User;
use crate::auth::services;
use crate::auth::session::{
    clear_session_cookie, cookie_value, session_cookie, Session, SESSION_COOKIE,
};
use crate::db::AppState;
use crate::error::ApiError;

fn set_cookie_headers(cookie: String) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie.parse().unwrap());
    headers
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    let outcome = services::register(&state, payload).await?;
    let headers = set_cookie_headers(session_cookie(&outcome.session));
    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            message: "Registration successful".into(),
            token: outcome.token,
            user: PublicUser::from(&outcome.user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let outcome = services::login(&state, payload).await?;
    let headers = set_cookie_headers(session_cookie(&outcome.session));
    Ok((
        headers,
        Json(AuthResponse {
            message: "Login successful".into(),
            token: outcome.token,
            user: PublicUser::from(&outcome.user),
        }),
    ))
}

/// Destroys the session named by the cookie. Already-gone sessions are a
/// success, so a double logout stays 200.
#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<MessageResponse>), ApiError> {
    if let Some(sid) =
        cookie_value(&headers, SESSION_COOKIE).and_then(|v| Uuid::parse_str(&v).ok())
    {
        Session::destroy(&state.db, sid).await.map_err(|e| {
            error!(error = %e, "session destroy failed");
            ApiError::Internal(e.context("could not log out properly"))
        })?;
    }
    Ok((
        set_cookie_headers(clear_session_cookie()),
        Json(MessageResponse {
            message: "Logout successful".into(),
        }),
    ))
}

/// Identity as the verified token asserts it; no store round trip.
#[instrument(skip_all)]
pub async fn verify(AuthUser(claims): AuthUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        message: "Token is valid".into(),
        user: TokenIdentity::from(claims),
    })
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(UserResponse {
        message: None,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = services::update_profile(&state, claims.sub, payload).await?;
    Ok(Json(UserResponse {
        message: Some("Profile updated successfully".into()),
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, headers, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let current_session =
        cookie_value(&headers, SESSION_COOKIE).and_then(|v| Uuid::parse_str(&v).ok());
    services::change_password(&state, claims.sub, current_session, payload).await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_serialization() {
        let user = crate::auth::repo_types::test_user();
        let response = AuthResponse {
            message: "Registration successful".into(),
            token: "jwt".into(),
            user: PublicUser::from(&user),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("Registration successful"));
        assert!(json.contains("a@example.com"));
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn register_handler_surfaces_validation_errors() {
        let state = AppState::fake();
        let err = register(
            State(state),
            Json(RegisterRequest {
                username: None,
                email: Some("a@example.com".into()),
                password: Some("Str0ng!pw".into()),
                confirm_password: Some("Str0ng!pw".into()),
            }),
        )
        .await
        .err()
        .expect("missing username must fail");
        match err {
            ApiError::Validation { field, .. } => assert_eq!(field, Some("username")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_handler_rejects_empty_body() {
        let state = AppState::fake();
        let err = login(
            State(state),
            Json(LoginRequest {
                email: None,
                password: None,
            }),
        )
        .await
        .err()
        .expect("empty login must fail");
        assert!(matches!(err, ApiError::Validation { .. }));
    }
}
