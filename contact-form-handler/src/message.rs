use crate::contact::Contact;
use serde::Serialize;
use serde_json::Value;
use tinytemplate::{error::Error, format, TinyTemplate};

pub type RenderError = Error;

const SUBJECT_PREFIX: &str = "New Contact from ";

const HTML_TEMPLATE_NAME: &str = "notification-html";
const TEXT_TEMPLATE_NAME: &str = "notification-text";
const HTML_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/notification.html"
));
const TEXT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/notification.txt"
));

/// Notification for the transactional email collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Flat form payload for the HTTP relay. `to` is a comma separated recipient list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayPayload {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Serialize)]
struct Context<'a> {
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    content: &'a str,
    phone: Option<&'a str>,
    company_name: Option<&'a str>,
}

impl Contact {
    pub fn notification_subject(&self) -> String {
        format!("{SUBJECT_PREFIX}{}", self.email())
    }

    pub fn render_email(&self) -> Result<EmailMessage, RenderError> {
        let templates = templates()?;
        let context = self.template_context();
        Ok(EmailMessage {
            subject: self.notification_subject(),
            html_body: templates.render(HTML_TEMPLATE_NAME, &context)?,
            text_body: templates.render(TEXT_TEMPLATE_NAME, &context)?,
        })
    }

    /// The relay receives the HTML rendering as its `text` field, markup included.
    pub fn render_relay_payload(
        &self,
        from: &str,
        to: &[String],
    ) -> Result<RelayPayload, RenderError> {
        let templates = templates()?;
        Ok(RelayPayload {
            from: from.into(),
            to: to.join(", "),
            subject: self.notification_subject(),
            text: templates.render(HTML_TEMPLATE_NAME, &self.template_context())?,
        })
    }

    fn template_context(&self) -> Context<'_> {
        Context {
            name: self.name(),
            email: self.email(),
            subject: self.subject(),
            content: self.content(),
            phone: self.phone(),
            company_name: self.company_name(),
        }
    }
}

fn templates() -> Result<TinyTemplate<'static>, RenderError> {
    let mut tt = TinyTemplate::new();
    tt.add_formatter("render_paragraphs", render_paragraphs);
    tt.add_template(HTML_TEMPLATE_NAME, HTML_TEMPLATE)?;
    tt.add_template(TEXT_TEMPLATE_NAME, TEXT_TEMPLATE)?;
    Ok(tt)
}

fn render_paragraphs(value: &Value, output: &mut String) -> Result<(), Error> {
    output.push_str("<p>");
    let mut formatted = String::new();
    format(value, &mut formatted)?;
    output.push_str(
        &formatted
            .replace("\r\n", "\n")
            .replace("\n\n", "</p><p>"),
    );
    output.push_str("</p>");
    Ok(())
}
