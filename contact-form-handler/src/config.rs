use anyhow::{bail, Context};
use std::str::FromStr;

const DEFAULT_CHARSET: &str = "UTF-8";
const DEFAULT_AWS_REGION: &str = "us-east-1";
const DEFAULT_SENDING_ADDRESS: &str = "dummy@address.com";

/// Which outbound collaborator delivers the notification. Chosen once per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ses,
    Mailgun,
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ses" => Ok(Provider::Ses),
            "mailgun" => Ok(Provider::Mailgun),
            other => bail!("Unknown email provider {other:?}, expected \"ses\" or \"mailgun\""),
        }
    }
}

/// Process-wide settings, resolved once in `main` and handed to the senders.
#[derive(Debug, Clone)]
pub struct Config {
    pub charset: String,
    pub aws_region: String,
    pub aws_endpoint_url: Option<String>,
    pub sending_address: String,
    pub receiving_addresses: Vec<String>,
    pub provider: Provider,
    pub smtp_url: String,
    pub mailgun_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let aws_region = get("AWS_REGION").unwrap_or_else(|| DEFAULT_AWS_REGION.into());
        let provider = match get("EMAIL_PROVIDER") {
            Some(value) => value
                .parse()
                .context("Invalid EMAIL_PROVIDER environment variable")?,
            None => Provider::Mailgun,
        };
        let smtp_url = get("SMTP_URL")
            .unwrap_or_else(|| format!("smtps://email-smtp.{aws_region}.amazonaws.com"));
        let mailgun_url = get("MAILGUN_URL").unwrap_or_default();
        if provider == Provider::Mailgun && mailgun_url.is_empty() {
            bail!("MAILGUN_URL must be set when EMAIL_PROVIDER is mailgun");
        }
        let receiving_addresses = get("RECEIVING_ADDRESSES")
            .map(|value| parse_list(&value))
            .unwrap_or_default();
        if receiving_addresses.is_empty() {
            bail!("RECEIVING_ADDRESSES must name at least one recipient");
        }

        Ok(Self {
            charset: get("CHARSET").unwrap_or_else(|| DEFAULT_CHARSET.into()),
            aws_endpoint_url: get("AWS_ENDPOINT_URL"),
            sending_address: get("SENDING_ADDRESS")
                .unwrap_or_else(|| DEFAULT_SENDING_ADDRESS.into()),
            receiving_addresses,
            aws_region,
            provider,
            smtp_url,
            mailgun_url,
        })
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
