use axum::{extract::State, Json};
use time::OffsetDateTime;
use tracing::instrument;

use crate::contact::dto::{ContactRequest, ContactResponse, ContactTestResponse};
use crate::contact::services;
use crate::db::AppState;
use crate::error::ApiError;

/// The submission succeeds once it is validated and logged; downstream
/// delivery outcomes are reported per channel, not bubbled up.
#[instrument(skip(state, payload))]
pub async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<ContactRequest>,
) -> Result<Json<ContactResponse>, ApiError> {
    let msg = services::sanitize(payload)?;
    let notifications = services::dispatch(&state, &msg).await;
    Ok(Json(ContactResponse {
        success: true,
        message: "Message transmitted successfully! I will get back to you soon.".into(),
        timestamp: OffsetDateTime::now_utc(),
        notifications,
    }))
}

#[instrument]
pub async fn test() -> Json<ContactTestResponse> {
    Json(ContactTestResponse {
        success: true,
        message: "Contact API is working".into(),
        timestamp: OffsetDateTime::now_utc(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_rejects_invalid_payload_before_dispatch() {
        let state = AppState::fake();
        let err = submit(
            State(state),
            Json(ContactRequest {
                name: Some("Alice".into()),
                email: Some("not-an-email".into()),
                subject: Some("Hi".into()),
                message: Some("Hello".into()),
            }),
        )
        .await
        .err()
        .expect("malformed email must fail");
        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[tokio::test]
    async fn submit_reports_per_channel_statuses() {
        // fake state carries no-op senders, so every channel reports sent
        let state = AppState::fake();
        let Json(response) = submit(
            State(state),
            Json(ContactRequest {
                name: Some("Alice".into()),
                email: Some("a@example.com".into()),
                subject: Some("Hi".into()),
                message: Some("Hello".into()),
            }),
        )
        .await
        .expect("valid submission succeeds");
        assert!(response.success);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""email":"sent""#));
        assert!(json.contains(r#""relay":"sent""#));
        assert!(json.contains(r#""autoReply":"sent""#));
    }
}
