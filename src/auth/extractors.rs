use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::jwt::{Claims, JwtKeys};
use crate::auth::repo_types::Role;
use crate::auth::session::{cookie_value, Session, SESSION_COOKIE, TOKEN_COOKIE};
use crate::db::AppState;
use crate::error::ApiError;

/// Extracts and verifies the caller's token, attaching its claims.
///
/// Token sources, in documented priority order:
/// 1. the server-side session named by the `sid` cookie,
/// 2. the `Authorization: Bearer` header,
/// 3. the `token` cookie.
#[derive(Debug)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let keys =
            JwtKeys::from_config(&state.config.jwt).map_err(|e| ApiError::Internal(e.into()))?;

        let mut token: Option<String> = None;
        if let Some(sid) = cookie_value(&parts.headers, SESSION_COOKIE)
            .and_then(|v| Uuid::parse_str(&v).ok())
        {
            token = Session::find_valid(&state.db, sid).await?.map(|s| s.token);
        }
        if token.is_none() {
            token = bearer_token(&parts.headers);
        }
        if token.is_none() {
            token = cookie_value(&parts.headers, TOKEN_COOKIE);
        }

        let token = token.ok_or(ApiError::Unauthenticated)?;
        let claims = keys.verify(&token).map_err(|e| {
            warn!(error = %e, "token verification failed");
            ApiError::Forbidden("Invalid or expired token.")
        })?;
        Ok(AuthUser(claims))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(|t| t.to_string())
}

/// Admin-only gate composed on top of [`AuthUser`].
#[derive(Debug)]
pub struct AdminUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Admin {
            return Err(ApiError::Forbidden("Admin access required"));
        }
        Ok(AdminUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{test_user, Role, User};
    use axum::http::Request;

    fn fake_keys(state: &AppState) -> JwtKeys {
        JwtKeys::from_config(&state.config.jwt).expect("keys")
    }

    fn parts_with_headers(headers: &[(&str, String)]) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/me");
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_token_is_unauthenticated() {
        let state = AppState::fake();
        let mut parts = parts_with_headers(&[]);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
    }

    #[tokio::test]
    async fn bearer_header_authenticates() {
        let state = AppState::fake();
        let user = test_user();
        let token = fake_keys(&state).issue(&user).expect("issue");
        let mut parts =
            parts_with_headers(&[("authorization", format!("Bearer {token}"))]);
        let AuthUser(claims) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("authenticated");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, user.username);
    }

    #[tokio::test]
    async fn token_cookie_authenticates() {
        let state = AppState::fake();
        let user = test_user();
        let token = fake_keys(&state).issue(&user).expect("issue");
        let mut parts = parts_with_headers(&[("cookie", format!("token={token}"))]);
        let AuthUser(claims) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("authenticated");
        assert_eq!(claims.sub, user.id);
    }

    #[tokio::test]
    async fn bearer_header_outranks_token_cookie() {
        let state = AppState::fake();
        let user = test_user();
        let token = fake_keys(&state).issue(&user).expect("issue");
        // A broken cookie must not shadow a valid header.
        let mut parts = parts_with_headers(&[
            ("authorization", format!("Bearer {token}")),
            ("cookie", "token=garbage".to_string()),
        ]);
        assert!(AuthUser::from_request_parts(&mut parts, &state)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn tampered_token_is_forbidden() {
        let state = AppState::fake();
        let mut parts =
            parts_with_headers(&[("authorization", "Bearer not-a-jwt".to_string())]);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn admin_gate_rejects_plain_users() {
        let state = AppState::fake();
        let token = fake_keys(&state).issue(&test_user()).expect("issue");
        let mut parts =
            parts_with_headers(&[("authorization", format!("Bearer {token}"))]);
        let err = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden("Admin access required")));
    }

    #[tokio::test]
    async fn admin_gate_admits_admins() {
        let state = AppState::fake();
        let admin = User {
            role: Role::Admin,
            ..test_user()
        };
        let token = fake_keys(&state).issue(&admin).expect("issue");
        let mut parts =
            parts_with_headers(&[("authorization", format!("Bearer {token}"))]);
        let AdminUser(claims) = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .expect("admin");
        assert_eq!(claims.role, Role::Admin);
    }
}
