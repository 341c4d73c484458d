use axum::{
    routing::{get, post},
    Router,
};

use crate::db::AppState;

pub mod dto;
pub mod handlers;
pub mod notify;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contact/submit", post(handlers::submit))
        .route("/contact/test", get(handlers::test))
}
