use async_trait::async_trait;
use contact_form_handler::{
    config::Config,
    handler::ContactFormHandler,
    mailgun::{MailgunSender, MAILGUN_CREDENTIALS_NAME},
    secrets::{SecretError, SecretRepository},
};
use googletest::prelude::*;
use lambda_http::{http::HeaderValue, Body, Request};
use serde::de::DeserializeOwned;
use std::time::Duration;
use test_support::{fake_mailgun::FakeMailgun, setup_logging};
use tokio::time::timeout;

const FAKE_MAILGUN_API_KEY: &str = "arbitrary mailgun key";

struct StaticSecretRepository;

#[async_trait]
impl SecretRepository for StaticSecretRepository {
    async fn open(_config: &Config) -> Self {
        Self
    }

    async fn get_secret<T: DeserializeOwned>(
        &self,
        name: &'static str,
    ) -> std::result::Result<T, SecretError> {
        assert_eq!(name, MAILGUN_CREDENTIALS_NAME);
        Ok(serde_json::from_str(&format!(
            r#"{{ "MAILGUN_API_KEY": "{FAKE_MAILGUN_API_KEY}" }}"#
        ))
        .unwrap())
    }
}

async fn handler_for(mailgun_url: &str) -> ContactFormHandler<MailgunSender<StaticSecretRepository>> {
    let config = Config::from_lookup(|key| match key {
        "SENDING_ADDRESS" => Some("Web contact form <noreply@example.com>".into()),
        "RECEIVING_ADDRESSES" => Some("team@example.com".into()),
        "MAILGUN_URL" => Some(mailgun_url.into()),
        _ => None,
    })
    .unwrap();
    let secrets_repository = StaticSecretRepository::open(&config).await;
    ContactFormHandler::new(MailgunSender::new(&config, secrets_repository))
}

fn form_event(body: &str) -> Request {
    let mut event = Request::new(Body::Text(body.into()));
    event.headers_mut().append(
        "Content-Type",
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    event
}

#[googletest::test]
#[tokio::test]
async fn forwards_submission_to_relay() {
    setup_logging();
    let mut fake_mailgun = FakeMailgun::new(FAKE_MAILGUN_API_KEY).start().await;
    let handler = handler_for(&fake_mailgun.url).await;

    let response = handler
        .handle(form_event(
            "email=thisis%40sparta.com&name=spartan&subject=hi&content=this+is+sparta",
        ))
        .await
        .unwrap();

    expect_that!(response.status().as_u16(), eq(200));
    expect_that!(
        timeout(Duration::from_secs(1), fake_mailgun.next_message()).await,
        ok(some(all!(
            has_entry(
                "from".to_string(),
                eq("Web contact form <noreply@example.com>")
            ),
            has_entry("to".to_string(), eq("team@example.com")),
            has_entry(
                "subject".to_string(),
                eq("New Contact from thisis@sparta.com")
            ),
            has_entry(
                "text".to_string(),
                contains_substring("<p>this is sparta</p>")
            )
        )))
    );
}

#[googletest::test]
#[tokio::test]
async fn does_not_contact_relay_for_invalid_submission() {
    setup_logging();
    let mut fake_mailgun = FakeMailgun::new(FAKE_MAILGUN_API_KEY).start().await;
    let handler = handler_for(&fake_mailgun.url).await;

    let response = handler
        .handle(form_event("name=spartan;content=thisissparta"))
        .await
        .unwrap();

    expect_that!(response.status().as_u16(), eq(400));
    expect_that!(
        timeout(Duration::from_millis(200), fake_mailgun.next_message()).await,
        err(anything())
    );
}

#[tokio::test]
async fn surfaces_relay_rejection_as_error() -> Result<()> {
    setup_logging();
    let fake_mailgun = FakeMailgun::new(FAKE_MAILGUN_API_KEY)
        .reject_messages()
        .start()
        .await;
    let handler = handler_for(&fake_mailgun.url).await;

    let result = handler
        .handle(form_event(
            "email=thisis%40sparta.com&name=spartan&subject=hi&content=this+is+sparta",
        ))
        .await;

    verify_that!(
        result.map(|response| response.status().as_u16()),
        err(displays_as(contains_substring("400")))
    )
}
