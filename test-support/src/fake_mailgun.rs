use axum::{
    extract::{Form, State},
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use std::{borrow::Cow, collections::HashMap};
use tokio::{
    net::TcpListener,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};

const MESSAGES_PATH: &str = "/v3/example.com/messages";

/// Stand-in for the Mailgun messages API. Accepted messages are forwarded to the handle
/// returned by [`FakeMailgun::start`].
#[derive(Clone)]
pub struct FakeMailgun {
    required_api_key: Cow<'static, str>,
    reject_messages: bool,
}

pub struct FakeMailgunHandle {
    pub url: String,
    receiver: UnboundedReceiver<HashMap<String, String>>,
}

#[derive(Clone)]
struct AppState {
    fake: FakeMailgun,
    sender: UnboundedSender<HashMap<String, String>>,
}

#[derive(Serialize)]
struct MessagesResponsePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    message: String,
}

impl FakeMailgun {
    pub fn new(required_api_key: impl Into<Cow<'static, str>>) -> Self {
        Self {
            required_api_key: required_api_key.into(),
            reject_messages: false,
        }
    }

    pub fn reject_messages(self) -> Self {
        Self {
            reject_messages: true,
            ..self
        }
    }

    /// Serves on an ephemeral port of the loopback interface.
    pub async fn start(self) -> FakeMailgunHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = Router::new()
            .route(MESSAGES_PATH, post(messages))
            .with_state(AppState { fake: self, sender });
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        FakeMailgunHandle {
            url: format!("http://{address}{MESSAGES_PATH}"),
            receiver,
        }
    }

    fn expected_authorization(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("api:{}", self.required_api_key))
        )
    }
}

impl FakeMailgunHandle {
    pub async fn next_message(&mut self) -> Option<HashMap<String, String>> {
        self.receiver.recv().await
    }
}

async fn messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(payload): Form<HashMap<String, String>>,
) -> (StatusCode, Json<MessagesResponsePayload>) {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if authorization != Some(state.fake.expected_authorization().as_str()) {
        (
            StatusCode::UNAUTHORIZED,
            Json(MessagesResponsePayload {
                id: None,
                message: "Forbidden".into(),
            }),
        )
    } else if state.fake.reject_messages {
        (
            StatusCode::BAD_REQUEST,
            Json(MessagesResponsePayload {
                id: None,
                message: "'to' parameter is not a valid address. please check documentation"
                    .into(),
            }),
        )
    } else {
        let _ = state.sender.send(payload);
        (
            StatusCode::OK,
            Json(MessagesResponsePayload {
                id: Some("<20240101000000.1.ABCDEF@example.com>".into()),
                message: "Queued. Thank you.".into(),
            }),
        )
    }
}
