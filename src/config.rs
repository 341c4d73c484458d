use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Outbound mail API settings. Absent when the channel is not configured.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
    pub contact_inbox: String,
}

/// Messaging-relay (WhatsApp Cloud API) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    pub api_url: String,
    pub access_token: String,
    pub phone_id: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub email: Option<EmailConfig>,
    pub relay: Option<RelayConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let secret = std::env::var("JWT_SECRET")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET must not be empty");
        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "portfolio-backend".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "portfolio-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
        };

        let email = match (
            std::env::var("EMAIL_API_URL").ok(),
            std::env::var("EMAIL_API_KEY").ok(),
            std::env::var("EMAIL_FROM").ok(),
            std::env::var("CONTACT_EMAIL").ok(),
        ) {
            (Some(api_url), Some(api_key), Some(from), Some(contact_inbox)) => Some(EmailConfig {
                api_url,
                api_key,
                from,
                contact_inbox,
            }),
            _ => None,
        };

        let relay = match (
            std::env::var("WHATSAPP_ACCESS_TOKEN").ok(),
            std::env::var("WHATSAPP_PHONE_ID").ok(),
            std::env::var("WHATSAPP_PHONE_NUMBER").ok(),
        ) {
            (Some(access_token), Some(phone_id), Some(to)) => Some(RelayConfig {
                api_url: std::env::var("WHATSAPP_API_URL")
                    .unwrap_or_else(|_| "https://graph.facebook.com/v18.0".into()),
                access_token,
                phone_id,
                to,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt,
            email,
            relay,
        })
    }
}
