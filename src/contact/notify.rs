use async_trait::async_trait;
use serde_json::json;

use crate::config::{EmailConfig, RelayConfig};
use crate::contact::dto::ContactMessage;

/// Sends contact-form email notifications.
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    async fn send_contact_email(&self, msg: &ContactMessage) -> anyhow::Result<()>;
    async fn send_auto_reply(&self, msg: &ContactMessage) -> anyhow::Result<()>;
}

/// Forwards contact submissions to a messaging API.
#[async_trait]
pub trait RelayNotifier: Send + Sync {
    async fn send_contact_message(&self, msg: &ContactMessage) -> anyhow::Result<()>;
}

/// Email delivery through an HTTP mail API.
pub struct HttpMailer {
    client: reqwest::Client,
    config: EmailConfig,
}

impl HttpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn send(
        &self,
        to: &str,
        reply_to: Option<&str>,
        subject: &str,
        body: String,
    ) -> anyhow::Result<()> {
        let payload = json!({
            "from": self.config.from,
            "to": to,
            "reply_to": reply_to,
            "subject": subject,
            "text": body,
        });
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;
        anyhow::ensure!(
            response.status().is_success(),
            "mail API returned {}",
            response.status()
        );
        Ok(())
    }
}

#[async_trait]
impl EmailNotifier for HttpMailer {
    async fn send_contact_email(&self, msg: &ContactMessage) -> anyhow::Result<()> {
        let subject = format!("Portfolio Contact: {}", msg.subject);
        let body = format!(
            "New contact form submission\n\nName: {}\nEmail: {}\nSubject: {}\n\n{}\n",
            msg.name, msg.email, msg.subject, msg.message
        );
        self.send(&self.config.contact_inbox, Some(&msg.email), &subject, body)
            .await
    }

    async fn send_auto_reply(&self, msg: &ContactMessage) -> anyhow::Result<()> {
        let subject = format!("Thanks for reaching out, {}", msg.name);
        let body = format!(
            "Hi {},\n\nThanks for your message about \"{}\". I received it and will get back to you soon.\n",
            msg.name, msg.subject
        );
        self.send(&msg.email, None, &subject, body).await
    }
}

/// WhatsApp Cloud API relay.
pub struct CloudApiRelay {
    client: reqwest::Client,
    config: RelayConfig,
}

impl CloudApiRelay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl RelayNotifier for CloudApiRelay {
    async fn send_contact_message(&self, msg: &ContactMessage) -> anyhow::Result<()> {
        let url = format!(
            "{}/{}/messages",
            self.config.api_url.trim_end_matches('/'),
            self.config.phone_id
        );
        let text = format!(
            "New contact form submission\nName: {}\nEmail: {}\nSubject: {}\nMessage: {}",
            msg.name, msg.email, msg.subject, msg.message
        );
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": self.config.to,
            "type": "text",
            "text": { "body": text },
        });
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await?;
        anyhow::ensure!(
            response.status().is_success(),
            "relay API returned {}",
            response.status()
        );
        Ok(())
    }
}

/// Stand-in for channels with no configuration; every send fails and is
/// reported as such, without failing the submission.
pub struct DisabledChannel;

#[async_trait]
impl EmailNotifier for DisabledChannel {
    async fn send_contact_email(&self, _msg: &ContactMessage) -> anyhow::Result<()> {
        anyhow::bail!("email channel is not configured")
    }

    async fn send_auto_reply(&self, _msg: &ContactMessage) -> anyhow::Result<()> {
        anyhow::bail!("email channel is not configured")
    }
}

#[async_trait]
impl RelayNotifier for DisabledChannel {
    async fn send_contact_message(&self, _msg: &ContactMessage) -> anyhow::Result<()> {
        anyhow::bail!("relay channel is not configured")
    }
}
