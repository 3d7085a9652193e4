use crate::{contact::Contact, message::RenderError, secrets::SecretError};
use async_trait::async_trait;

/// Delivers a validated contact to the people who answer the form.
#[async_trait]
pub trait ContactSender: Send + Sync {
    async fn send(&self, contact: &Contact) -> Result<(), SendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Error rendering notification: {0}")]
    Render(#[from] RenderError),
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Invalid charset {charset}: {description}")]
    Charset {
        charset: String,
        description: String,
    },
    #[error("Error building message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("Error talking to SMTP server: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("Error talking to relay: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unable to obtain credentials: {0}")]
    Credentials(#[from] SecretError),
    #[error("Relay rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
