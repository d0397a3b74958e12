use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;

use crate::config::{AppConfig, SmsSettings, SmtpSettings};
use crate::error::{DairyError, DairyResult};

/// An outbound message channel. Sends are attempted once; callers decide
/// whether a failure matters.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, message: &str) -> DairyResult<()>;

    fn channel(&self) -> &'static str;
}

pub struct SmsNotifier {
    client: reqwest::Client,
    settings: SmsSettings,
}

impl SmsNotifier {
    pub fn new(settings: SmsSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, recipient: &str, message: &str) -> DairyResult<()> {
        let params = [
            ("key", self.settings.api_key.as_str()),
            ("sender", self.settings.sender.as_str()),
            ("receiver", recipient),
            ("msg", message),
        ];

        let resp = self
            .client
            .post(&self.settings.api_url)
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DairyError::Internal(format!("SMS API Error: {}", text)));
        }
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "sms"
    }
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    url: String,
}

impl TelegramNotifier {
    pub fn new(token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("https://api.telegram.org/bot{}", token),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    /// `recipient` is a chat id.
    async fn send(&self, recipient: &str, message: &str) -> DairyResult<()> {
        let payload = json!({ "chat_id": recipient, "text": message });
        let resp = self
            .client
            .post(format!("{}/sendMessage", self.url))
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DairyError::Internal(format!("Telegram API Error: {}", text)));
        }
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "telegram"
    }
}

const EMAIL_SUBJECT: &str = "Dairy farm notification";

/// Plain-text email over SMTP. `recipient` is an email address.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    pub fn new(settings: &SmtpSettings) -> DairyResult<Self> {
        let from = settings
            .from
            .parse::<Mailbox>()
            .map_err(|e| DairyError::Internal(format!("Invalid SMTP_FROM address: {}", e)))?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| DairyError::Internal(format!("SMTP relay error: {}", e)))?
            .port(settings.port);
        if !settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, recipient: &str, message: &str) -> DairyResult<()> {
        let to = recipient
            .parse::<Mailbox>()
            .map_err(|e| DairyError::Validation(format!("Invalid email address: {}", e)))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(EMAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(message.to_string())
            .map_err(|e| DairyError::Internal(format!("Email build error: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| DairyError::Internal(format!("SMTP Error: {}", e)))?;
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "email"
    }
}

/// Simulated delivery for deployments without credentials.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, message: &str) -> DairyResult<()> {
        tracing::info!(
            recipient,
            preview = %message.chars().take(40).collect::<String>(),
            "SIMULATION: message not delivered, no transport configured"
        );
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "log"
    }
}

pub fn notifier_from_config(config: &AppConfig) -> Box<dyn Notifier> {
    match &config.sms {
        Some(settings) => Box::new(SmsNotifier::new(settings.clone())),
        None => {
            tracing::warn!("SMS credentials not set, report notifications will only be logged");
            Box::new(LogNotifier)
        }
    }
}

/// Channel for messages addressed to an account's email, such as reset links.
/// Never the SMS gateway: it only understands phone numbers.
pub fn mailer_from_config(config: &AppConfig) -> Box<dyn Notifier> {
    match config.smtp.as_ref().map(EmailNotifier::new) {
        Some(Ok(mailer)) => Box::new(mailer),
        Some(Err(e)) => {
            tracing::error!("Failed to set up SMTP, emails will only be logged: {}", e);
            Box::new(LogNotifier)
        }
        None => {
            tracing::warn!("SMTP settings not set, emails will only be logged");
            Box::new(LogNotifier)
        }
    }
}

pub fn bot_from_config(config: &AppConfig) -> Box<dyn Notifier> {
    match &config.telegram_token {
        Some(token) => Box::new(TelegramNotifier::new(token)),
        None => Box::new(LogNotifier),
    }
}

/// Sends `message` to every recipient and returns how many sends succeeded.
/// Failures are logged and not retried.
pub async fn broadcast(notifier: &dyn Notifier, recipients: &[String], message: &str) -> usize {
    let mut delivered = 0;
    for recipient in recipients {
        match notifier.send(recipient, message).await {
            Ok(()) => delivered += 1,
            Err(e) => tracing::warn!(
                channel = notifier.channel(),
                recipient = %recipient,
                error = %e,
                "notification failed"
            ),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingNotifier;

    #[tokio::test]
    async fn test_broadcast_counts_and_skips_failures() {
        let notifier = RecordingNotifier::failing_for("+254700000002");
        let recipients = vec![
            "+254700000001".to_string(),
            "+254700000002".to_string(),
            "+254700000003".to_string(),
        ];

        let delivered = broadcast(&notifier, &recipients, "hello").await;
        assert_eq!(delivered, 2);
        assert_eq!(notifier.sent().len(), 2);
    }

    #[test]
    fn test_missing_credentials_fall_back_to_log() {
        let config = AppConfig::default();
        assert_eq!(notifier_from_config(&config).channel(), "log");
        assert_eq!(bot_from_config(&config).channel(), "log");
        assert_eq!(mailer_from_config(&config).channel(), "log");

        let config = AppConfig {
            telegram_token: Some("123:abc".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(bot_from_config(&config).channel(), "telegram");
    }

    #[tokio::test]
    async fn test_email_goes_through_smtp_even_with_sms_configured() {
        let config = AppConfig {
            sms: Some(SmsSettings {
                api_url: "http://127.0.0.1:9/sms".to_string(),
                api_key: "key".to_string(),
                sender: "FARM".to_string(),
            }),
            smtp: Some(SmtpSettings {
                host: "smtp.farm.test".to_string(),
                port: 587,
                username: "mailer".to_string(),
                password: "secret".to_string(),
                from: "Dairy Farm <noreply@farm.test>".to_string(),
            }),
            ..AppConfig::default()
        };
        assert_eq!(notifier_from_config(&config).channel(), "sms");
        assert_eq!(mailer_from_config(&config).channel(), "email");

        let sms_only = AppConfig {
            smtp: None,
            ..config
        };
        assert_eq!(mailer_from_config(&sms_only).channel(), "log");
    }

    #[tokio::test]
    async fn test_email_rejects_non_address_recipients() {
        let mailer = EmailNotifier::new(&SmtpSettings {
            host: "smtp.farm.test".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: "noreply@farm.test".to_string(),
        })
        .unwrap();
        let err = mailer.send("+254700000001", "hello").await.unwrap_err();
        assert!(matches!(err, DairyError::Validation(_)));
    }
}
