use crate::config::Config;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Missing secret {0}")]
    MissingSecret(&'static str),
    #[error("Unable to retrieve secret: {0}")]
    SecretsManager(#[from] aws_sdk_secretsmanager::Error),
    #[error("Malformed secret {name}: {source}")]
    Malformed {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait SecretRepository: Send + Sync {
    async fn open(config: &Config) -> Self;

    async fn get_secret<T: DeserializeOwned>(&self, name: &'static str) -> Result<T, SecretError>;
}

#[derive(Clone)]
pub struct AwsSecretsManagerSecretRepository(aws_sdk_secretsmanager::Client);

#[async_trait]
impl SecretRepository for AwsSecretsManagerSecretRepository {
    async fn open(config: &Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()));
        if let Some(url) = config.aws_endpoint_url.as_ref() {
            loader = loader.endpoint_url(url);
        }
        let sdk_config = loader.load().await;
        Self(aws_sdk_secretsmanager::Client::new(&sdk_config))
    }

    async fn get_secret<T: DeserializeOwned>(&self, name: &'static str) -> Result<T, SecretError> {
        let secret = self
            .0
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(aws_sdk_secretsmanager::Error::from)?;
        let Some(secret_value) = secret.secret_string() else {
            return Err(SecretError::MissingSecret(name));
        };
        parse_secret(name, secret_value)
    }
}

fn parse_secret<T: DeserializeOwned>(name: &'static str, value: &str) -> Result<T, SecretError> {
    serde_json::from_str(value).map_err(|source| SecretError::Malformed { name, source })
}
