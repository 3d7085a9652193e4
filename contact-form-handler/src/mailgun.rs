use crate::{
    config::Config,
    contact::Contact,
    secrets::SecretRepository,
    sender::{ContactSender, SendError},
};
use async_once_cell::OnceCell;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

pub const MAILGUN_CREDENTIALS_NAME: &str = "mailgun-credentials";
const MAILGUN_API_USER: &str = "api";

/// Posts the notification to the Mailgun messages API.
pub struct MailgunSender<SecretRepositoryT: SecretRepository> {
    secrets_repository: SecretRepositoryT,
    credentials: OnceCell<MailgunCredentials>,
    client: Client,
    url: String,
    from: String,
    to: Vec<String>,
}

#[derive(Deserialize)]
struct MailgunCredentials {
    #[serde(rename = "MAILGUN_API_KEY")]
    api_key: String,
}

impl<SecretRepositoryT: SecretRepository> MailgunSender<SecretRepositoryT> {
    pub fn new(config: &Config, secrets_repository: SecretRepositoryT) -> Self {
        Self {
            secrets_repository,
            credentials: Default::default(),
            client: Client::new(),
            url: config.mailgun_url.clone(),
            from: config.sending_address.clone(),
            to: config.receiving_addresses.clone(),
        }
    }
}

#[async_trait]
impl<SecretRepositoryT: SecretRepository> ContactSender for MailgunSender<SecretRepositoryT> {
    async fn send(&self, contact: &Contact) -> Result<(), SendError> {
        let payload = contact.render_relay_payload(&self.from, &self.to)?;
        let credentials = self
            .credentials
            .get_or_try_init(self.secrets_repository.get_secret(MAILGUN_CREDENTIALS_NAME))
            .await?;
        let response = self
            .client
            .post(&self.url)
            .basic_auth(MAILGUN_API_USER, Some(&credentials.api_key))
            .form(&payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        info!(status = status.as_u16(), body = %body, "Mailgun responded");
        if !status.is_success() {
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
