use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::db::AppState;

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod rate_limit;
mod repo;
pub mod repo_types;
pub mod services;
pub mod session;

pub fn router(state: &AppState) -> Router<AppState> {
    // Only the credential endpoints are throttled.
    let throttled = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_auth_attempts,
        ));

    Router::new()
        .merge(throttled)
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/verify", get(handlers::verify))
        .route("/auth/me", get(handlers::me))
        .route("/auth/profile", put(handlers::update_profile))
        .route("/auth/change-password", put(handlers::change_password))
}
