use tracing::{error, info};

use crate::auth::services::is_valid_email;
use crate::contact::dto::{ChannelStatus, ContactMessage, ContactRequest, NotificationReport};
use crate::db::AppState;
use crate::error::ApiError;

/// Validates and trims a raw submission. Runs before any channel is touched.
pub fn sanitize(req: ContactRequest) -> Result<ContactMessage, ApiError> {
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    let email = req
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .unwrap_or_default();
    let subject = req.subject.as_deref().map(str::trim).unwrap_or_default();
    let message = req.message.as_deref().map(str::trim).unwrap_or_default();

    if name.is_empty() || email.is_empty() || subject.is_empty() || message.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Please enter a valid email address"));
    }

    Ok(ContactMessage {
        name: name.to_string(),
        email,
        subject: subject.to_string(),
        message: message.to_string(),
    })
}

/// Fans the submission out to every channel. A failing channel is logged and
/// reported, never propagated.
pub async fn dispatch(state: &AppState, msg: &ContactMessage) -> NotificationReport {
    info!(
        name = %msg.name,
        email = %msg.email,
        subject = %msg.subject,
        "new contact form submission"
    );

    let email = match state.mailer.send_contact_email(msg).await {
        Ok(()) => ChannelStatus::Sent,
        Err(e) => {
            error!(error = %e, "contact email failed");
            ChannelStatus::Failed
        }
    };
    let relay = match state.relay.send_contact_message(msg).await {
        Ok(()) => ChannelStatus::Sent,
        Err(e) => {
            error!(error = %e, "relay message failed");
            ChannelStatus::Failed
        }
    };
    let auto_reply = match state.mailer.send_auto_reply(msg).await {
        Ok(()) => ChannelStatus::Sent,
        Err(e) => {
            error!(error = %e, "auto-reply failed");
            ChannelStatus::Failed
        }
    };

    NotificationReport {
        email,
        relay,
        auto_reply,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::notify::{EmailNotifier, RelayNotifier};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn request(
        name: &str,
        email: &str,
        subject: &str,
        message: &str,
    ) -> ContactRequest {
        ContactRequest {
            name: Some(name.into()),
            email: Some(email.into()),
            subject: Some(subject.into()),
            message: Some(message.into()),
        }
    }

    #[derive(Default)]
    struct CountingMailer {
        contact_calls: AtomicUsize,
        reply_calls: AtomicUsize,
        fail_contact: bool,
    }

    #[async_trait]
    impl EmailNotifier for CountingMailer {
        async fn send_contact_email(&self, _msg: &ContactMessage) -> anyhow::Result<()> {
            self.contact_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_contact {
                anyhow::bail!("smtp boom")
            }
            Ok(())
        }

        async fn send_auto_reply(&self, _msg: &ContactMessage) -> anyhow::Result<()> {
            self.reply_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingRelay {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RelayNotifier for CountingRelay {
        async fn send_contact_message(&self, _msg: &ContactMessage) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn sanitize_rejects_blank_fields() {
        let err = sanitize(request("  ", "a@example.com", "Hi", "Hello")).unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));

        let err = sanitize(ContactRequest {
            name: Some("Alice".into()),
            email: None,
            subject: Some("Hi".into()),
            message: Some("Hello".into()),
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[test]
    fn sanitize_rejects_malformed_email() {
        let err = sanitize(request("Alice", "not-an-email", "Hi", "Hello")).unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[test]
    fn sanitize_trims_and_lowercases() {
        let msg = sanitize(request("  Alice  ", "  A@Example.COM ", " Hi ", " Hello ")).unwrap();
        assert_eq!(msg.name, "Alice");
        assert_eq!(msg.email, "a@example.com");
        assert_eq!(msg.subject, "Hi");
        assert_eq!(msg.message, "Hello");
    }

    fn state_with(
        mailer: Arc<CountingMailer>,
        relay: Arc<CountingRelay>,
    ) -> AppState {
        let base = AppState::fake();
        AppState::from_parts(base.db, base.config, base.limiter, mailer, relay)
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_the_channels() {
        let mailer = Arc::new(CountingMailer::default());
        let relay = Arc::new(CountingRelay::default());
        let state = state_with(mailer.clone(), relay.clone());

        if let Ok(msg) = sanitize(request("Alice", "not-an-email", "Hi", "Hello")) {
            dispatch(&state, &msg).await;
        }

        assert_eq!(mailer.contact_calls.load(Ordering::SeqCst), 0);
        assert_eq!(relay.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_abort_the_others() {
        let mailer = Arc::new(CountingMailer {
            fail_contact: true,
            ..Default::default()
        });
        let relay = Arc::new(CountingRelay::default());
        let state = state_with(mailer.clone(), relay.clone());

        let msg = sanitize(request("Alice", "a@example.com", "Hi", "Hello")).unwrap();
        let report = dispatch(&state, &msg).await;

        assert_eq!(report.email, ChannelStatus::Failed);
        assert_eq!(report.relay, ChannelStatus::Sent);
        assert_eq!(report.auto_reply, ChannelStatus::Sent);
        assert_eq!(relay.calls.load(Ordering::SeqCst), 1);
        assert_eq!(mailer.reply_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_channels_reported_sent_on_success() {
        let mailer = Arc::new(CountingMailer::default());
        let relay = Arc::new(CountingRelay::default());
        let state = state_with(mailer.clone(), relay.clone());

        let msg = sanitize(request("Alice", "a@example.com", "Hi", "Hello")).unwrap();
        let report = dispatch(&state, &msg).await;

        assert_eq!(report.email, ChannelStatus::Sent);
        assert_eq!(report.relay, ChannelStatus::Sent);
        assert_eq!(report.auto_reply, ChannelStatus::Sent);
    }
}
