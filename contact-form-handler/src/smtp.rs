use crate::{
    config::Config,
    contact::Contact,
    secrets::SecretRepository,
    sender::{ContactSender, SendError},
};
use async_once_cell::OnceCell;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use tracing::{debug, info};

pub const SMTP_CREDENTIALS_NAME: &str = "smtp-ses-credentials";

/// Sends the notification through the SES SMTP interface as a plaintext/HTML alternative.
pub struct SesSmtpSender<SecretRepositoryT: SecretRepository> {
    secrets_repository: SecretRepositoryT,
    mailer: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
    smtp_url: String,
    from: Mailbox,
    to: Vec<Mailbox>,
    text_content_type: ContentType,
    html_content_type: ContentType,
}

#[derive(Deserialize)]
struct SmtpCredentials {
    #[serde(rename = "SMTP_USERNAME")]
    username: String,
    #[serde(rename = "SMTP_PASSWORD")]
    password: String,
}

impl<SecretRepositoryT: SecretRepository> SesSmtpSender<SecretRepositoryT> {
    pub fn new(config: &Config, secrets_repository: SecretRepositoryT) -> Result<Self, SendError> {
        Ok(Self {
            secrets_repository,
            mailer: Default::default(),
            smtp_url: config.smtp_url.clone(),
            from: config.sending_address.parse()?,
            to: config
                .receiving_addresses
                .iter()
                .map(|address| address.parse())
                .collect::<Result<_, _>>()?,
            text_content_type: content_type("text/plain", &config.charset)?,
            html_content_type: content_type("text/html", &config.charset)?,
        })
    }

    fn construct_email_message(&self, contact: &Contact) -> Result<Message, SendError> {
        let rendered = contact.render_email()?;
        let mut builder = Message::builder()
            .from(self.from.clone())
            .reply_to(Mailbox::new(
                Some(contact.name().into()),
                contact.email().parse()?,
            ))
            .subject(rendered.subject);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        Ok(builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(self.text_content_type.clone())
                        .body(rendered.text_body),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(self.html_content_type.clone())
                        .body(rendered.html_body),
                ),
        )?)
    }

    async fn initialise_mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, SendError> {
        debug!("initialise_mailer: Connecting to {}", self.smtp_url);
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&self.smtp_url)?
            .authentication(vec![Mechanism::Plain]);

        // Credentials are only ever sent over TLS. A misconfigured plain URL gets rejected by SES
        // instead of leaking them.
        if self.smtp_url.starts_with("smtps://") {
            let parsed_credentials: SmtpCredentials = self
                .secrets_repository
                .get_secret(SMTP_CREDENTIALS_NAME)
                .await?;
            builder = builder.credentials(Credentials::new(
                parsed_credentials.username,
                parsed_credentials.password,
            ));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl<SecretRepositoryT: SecretRepository> ContactSender for SesSmtpSender<SecretRepositoryT> {
    async fn send(&self, contact: &Contact) -> Result<(), SendError> {
        let email = self.construct_email_message(contact)?;
        let mailer = self
            .mailer
            .get_or_try_init(self.initialise_mailer())
            .await?;
        mailer.send(email).await?;
        info!("Sent contact notification for {} via SES", contact.email());
        Ok(())
    }
}

fn content_type(mime: &str, charset: &str) -> Result<ContentType, SendError> {
    ContentType::parse(&format!("{mime}; charset={charset}")).map_err(|error| {
        SendError::Charset {
            charset: charset.into(),
            description: error.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{SesSmtpSender, SMTP_CREDENTIALS_NAME};
    use crate::{
        config::Config,
        contact::Contact,
        secrets::test_support::FakeSecretRepository,
        sender::{ContactSender, SendError},
    };
    use googletest::prelude::*;
    use serial_test::serial;
    use std::{sync::OnceLock, time::Duration};
    use test_support::{
        fake_smtp::{start_poisoned_smtp_server, FakeSmtpServer, POISONED_SMTP_PORT, SMTP_PORT},
        setup_logging,
    };
    use tokio::time::timeout;

    fn config(smtp_url: String) -> Config {
        Config::from_lookup(|key| match key {
            "EMAIL_PROVIDER" => Some("ses".into()),
            "SENDING_ADDRESS" => Some("Web contact form <noreply@example.com>".into()),
            "RECEIVING_ADDRESSES" => Some("one@example.com,two@example.com".into()),
            "SMTP_URL" => Some(smtp_url.clone()),
            _ => None,
        })
        .unwrap()
    }

    fn fake_smtp_config() -> Config {
        config(format!("smtp://127.0.0.1:{SMTP_PORT}"))
    }

    fn contact() -> Contact {
        Contact::new(
            "thisis@sparta.com",
            "spartan",
            "hi",
            "this is sparta",
            Some("+30 123 456".into()),
            None,
        )
        .unwrap()
    }

    async fn init() {
        setup_logging();
        fake_smtp().start();
        fake_smtp().flush().await;
    }

    fn fake_smtp() -> &'static FakeSmtpServer {
        static FAKE_SMTP: OnceLock<FakeSmtpServer> = OnceLock::new();
        FAKE_SMTP.get_or_init(FakeSmtpServer::new)
    }

    #[googletest::test]
    #[tokio::test]
    #[serial]
    async fn delivers_multipart_notification() {
        init().await;
        let subject = SesSmtpSender::new(&fake_smtp_config(), FakeSecretRepository::new()).unwrap();

        let result = subject.send(&contact()).await;

        expect_that!(result, ok(anything()));
        expect_that!(
            timeout(Duration::from_secs(1), fake_smtp().last_mail_content()).await,
            ok(ok(all!(
                contains_substring("<noreply@example.com>"),
                contains_substring("one@example.com"),
                contains_substring("two@example.com"),
                contains_substring("Reply-To: "),
                contains_substring("<thisis@sparta.com>"),
                contains_substring("Subject: New Contact from thisis@sparta.com"),
                contains_substring("multipart/alternative"),
                contains_substring("text/plain; charset="),
                contains_substring("text/html; charset="),
                contains_substring("Name: spartan"),
                contains_substring("Phone: +30 123 456")
            )))
        );
    }

    #[googletest::test]
    #[tokio::test]
    #[serial]
    async fn reuses_mailer_for_subsequent_messages() {
        init().await;
        let subject = SesSmtpSender::new(&fake_smtp_config(), FakeSecretRepository::new()).unwrap();
        subject.send(&contact()).await.unwrap();
        fake_smtp().flush().await;

        let result = subject.send(&contact()).await;

        expect_that!(result, ok(anything()));
        expect_that!(
            timeout(Duration::from_secs(1), fake_smtp().last_mail_content()).await,
            ok(ok(contains_substring("this is sparta")))
        );
    }

    #[tokio::test]
    #[serial]
    async fn returns_error_when_smtp_fails() -> Result<()> {
        init().await;
        start_poisoned_smtp_server();
        let subject = SesSmtpSender::new(
            &config(format!("smtp://127.0.0.1:{POISONED_SMTP_PORT}")),
            FakeSecretRepository::new(),
        )
        .unwrap();

        let result = subject.send(&contact()).await;

        verify_that!(
            result,
            err(predicate(|e: &SendError| matches!(e, SendError::Smtp(_))))
        )
    }

    #[tokio::test]
    #[serial]
    async fn returns_error_when_credentials_are_missing_for_smtps() -> Result<()> {
        init().await;
        let mut secrets_repository = FakeSecretRepository::new();
        secrets_repository.remove_secret(SMTP_CREDENTIALS_NAME);
        let subject = SesSmtpSender::new(
            &config(format!("smtps://127.0.0.1:{SMTP_PORT}")),
            secrets_repository,
        )
        .unwrap();

        let result = subject.send(&contact()).await;

        verify_that!(
            result,
            err(predicate(|e: &SendError| matches!(e, SendError::Credentials(_))))
        )
    }

    #[test]
    fn rejects_invalid_sending_address() -> Result<()> {
        let config = Config::from_lookup(|key| match key {
            "EMAIL_PROVIDER" => Some("ses".into()),
            "SENDING_ADDRESS" => Some("not an address".into()),
            "RECEIVING_ADDRESSES" => Some("one@example.com".into()),
            _ => None,
        })
        .unwrap();

        verify_that!(
            SesSmtpSender::new(&config, FakeSecretRepository::new()).map(|_| ()),
            err(predicate(|e: &SendError| matches!(e, SendError::Address(_))))
        )
    }
}
