//! Mail notifications rendered in the recipient's locale.
//!
//! The locale is resolved per send and handed to the notification by value,
//! so concurrent sends in different locales never interfere.

use std::sync::Arc;

use tracing::{debug, info};

use agora_types::models::User;

/// Locales with translated notification texts. The first one is the fallback.
pub const SUPPORTED_LOCALES: &[&str] = &["en", "de"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub locale: String,
    pub subject: String,
    pub body: String,
}

/// Delivers rendered mail.
pub trait MailTransport: Send + Sync {
    fn deliver(&self, mail: &MailMessage) -> anyhow::Result<()>;
}

impl<T: MailTransport + ?Sized> MailTransport for Arc<T> {
    fn deliver(&self, mail: &MailMessage) -> anyhow::Result<()> {
        (**self).deliver(mail)
    }
}

/// Writes mail to the log instead of sending it.
pub struct LogTransport;

impl MailTransport for LogTransport {
    fn deliver(&self, mail: &MailMessage) -> anyhow::Result<()> {
        info!(to = %mail.to, locale = %mail.locale, subject = %mail.subject, "mail (log transport)");
        debug!("{}", mail.body);
        Ok(())
    }
}

pub trait Notification {
    fn to_mail(&self, notifiable: &User, locale: &str) -> MailMessage;
}

/// Mail channel that renders each notification in the recipient's locale.
pub struct LocalizedMailChannel<T> {
    transport: T,
    default_locale: String,
}

impl<T: MailTransport> LocalizedMailChannel<T> {
    pub fn new(transport: T, default_locale: impl Into<String>) -> Self {
        Self {
            transport,
            default_locale: default_locale.into(),
        }
    }

    /// The recipient's own locale, else the channel default.
    pub fn locale_for(&self, notifiable: &User) -> String {
        notifiable
            .locale()
            .unwrap_or_else(|| self.default_locale.clone())
    }

    pub fn send(&self, notifiable: &User, notification: &dyn Notification) -> anyhow::Result<()> {
        let locale = self.locale_for(notifiable);
        let mail = notification.to_mail(notifiable, &locale);
        debug!("Sending '{}' to {} in {}", mail.subject, notifiable.username, locale);
        self.transport.deliver(&mail)
    }
}

/// Maps a requested locale onto one we have texts for.
pub fn supported_locale(locale: &str) -> &'static str {
    SUPPORTED_LOCALES
        .iter()
        .copied()
        .find(|l| *l == locale)
        .unwrap_or(SUPPORTED_LOCALES[0])
}

/// Sent after registration with the token that activates the account.
pub struct ActivationNotification {
    token: String,
}

impl ActivationNotification {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl Notification for ActivationNotification {
    fn to_mail(&self, notifiable: &User, locale: &str) -> MailMessage {
        let name = notifiable
            .display_name
            .as_deref()
            .unwrap_or(&notifiable.username);
        let locale = supported_locale(locale);

        let (subject, body) = match locale {
            "de" => (
                "Bitte aktiviere dein Konto".to_string(),
                format!("Hallo {name},\n\ndein Aktivierungscode lautet: {}\n", self.token),
            ),
            _ => (
                "Please activate your account".to_string(),
                format!("Hello {name},\n\nyour activation code is: {}\n", self.token),
            ),
        };

        MailMessage {
            to: notifiable.email.clone(),
            locale: locale.to_string(),
            subject,
            body,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use agora_types::models::UserStatus;
    use chrono::Utc;

    /// Keeps every delivered mail for inspection.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Mutex<Vec<MailMessage>>,
    }

    impl MailTransport for RecordingTransport {
        fn deliver(&self, mail: &MailMessage) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    fn user(options: Option<&str>) -> User {
        User {
            id: 1,
            username: "dora".into(),
            email: "dora@example.com".into(),
            display_name: Some("Dora".into()),
            is_admin: false,
            status: UserStatus::Inactive,
            description: None,
            profile_image: None,
            options: options.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn uses_recipient_locale() {
        let transport = Arc::new(RecordingTransport::default());
        let channel = LocalizedMailChannel::new(transport.clone(), "en");

        channel
            .send(&user(Some(r#"{"locale":"de"}"#)), &ActivationNotification::new("abc"))
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].locale, "de");
        assert_eq!(sent[0].to, "dora@example.com");
        assert!(sent[0].body.starts_with("Hallo Dora"));
        assert!(sent[0].body.contains("abc"));
    }

    #[test]
    fn falls_back_to_channel_default() {
        let transport = Arc::new(RecordingTransport::default());
        let channel = LocalizedMailChannel::new(transport.clone(), "de");
        assert_eq!(channel.locale_for(&user(None)), "de");

        let english = LocalizedMailChannel::new(transport.clone(), "en");
        english.send(&user(None), &ActivationNotification::new("xyz")).unwrap();
        assert_eq!(transport.sent.lock().unwrap()[0].subject, "Please activate your account");
    }

    #[test]
    fn unsupported_locales_render_in_english() {
        let mail = ActivationNotification::new("t").to_mail(&user(None), "fr");
        assert_eq!(mail.locale, "en");
        assert_eq!(supported_locale("de"), "de");
    }
}
