use contact_form_handler::{
    config::{Config, Provider},
    handler::ContactFormHandler,
    mailgun::MailgunSender,
    secrets::{AwsSecretsManagerSecretRepository, SecretRepository},
    smtp::SesSmtpSender,
};
use lambda_http::{run, service_fn, Error};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env()?;
    info!("Delivering contact form messages via {:?}", config.provider);
    let secrets_repository = AwsSecretsManagerSecretRepository::open(&config).await;
    match config.provider {
        Provider::Ses => {
            let handler = ContactFormHandler::new(SesSmtpSender::new(&config, secrets_repository)?);
            run(service_fn(|event| handler.handle(event))).await
        }
        Provider::Mailgun => {
            let handler = ContactFormHandler::new(MailgunSender::new(&config, secrets_repository));
            run(service_fn(|event| handler.handle(event))).await
        }
    }
}
