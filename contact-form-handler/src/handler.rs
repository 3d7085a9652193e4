use crate::{contact::Contact, form::parse_form_single_value, sender::ContactSender};
use lambda_http::{http::StatusCode, Body, Error, Request, Response};
use serde::Serialize;
use tracing::{error, info};

/// Turns one form submission event into a notification and a JSON response.
pub struct ContactFormHandler<SenderT: ContactSender> {
    sender: SenderT,
}

impl<SenderT: ContactSender> ContactFormHandler<SenderT> {
    pub fn new(sender: SenderT) -> Self {
        Self { sender }
    }

    /// Validation failures become a 400 response. Failures of the sender are returned as errors
    /// so that the runtime reports them.
    pub async fn handle(&self, event: Request) -> Result<Response<Body>, Error> {
        let body = String::from_utf8_lossy(event.body());
        let fields = parse_form_single_value(&body);
        let contact = match Contact::validate(&fields) {
            Ok(contact) => contact,
            Err(errors) => {
                info!("Rejected contact form submission: {errors}");
                return json_response(StatusCode::BAD_REQUEST, &errors);
            }
        };

        if let Err(error) = self.sender.send(&contact).await {
            error!("Error sending contact form notification: {error}");
            return Err(Box::new(error));
        }
        info!("Forwarded contact form submission from {}", contact.email());
        json_response(StatusCode::OK, &contact)
    }
}

fn json_response(status: StatusCode, value: &impl Serialize) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_string(value)?.into())?)
}
