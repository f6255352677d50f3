//! REST access to the legacy FCM HTTP endpoint.

use std::sync::Arc;

use tracing::{debug, trace};

use pushbridge_core::events::EventSink;
use pushbridge_core::rest::{RequestDispatcher, RequestTarget, RestResponseReceiver, Verb};

const SERVER_ADDRESS: &str = "https://fcm.googleapis.com/fcm/send";

/// Both send paths answer under the same request id.
pub const REQ_SEND_MESSAGE: i32 = 1;

/// Client of the legacy FCM HTTP API.
///
/// Sends are immediate: while online they bypass the dispatcher queue,
/// offline they wait in it for the next online tick.
pub struct FcmRestApi {
    dispatcher: Arc<RequestDispatcher>,
    auth_key: String,
}

impl FcmRestApi {
    pub fn new(dispatcher: Arc<RequestDispatcher>) -> Self {
        Self {
            dispatcher,
            auth_key: String::new(),
        }
    }

    /// Server API key used in the `Authorization` header.
    pub fn set_auth_key(&mut self, key: &str) {
        self.auth_key = key.to_string();
    }

    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    /// Sends `data` to one device token. `data` must be a JSON document;
    /// it is embedded verbatim under the `data` field.
    pub async fn send_to_device(&self, token: &str, data: &[u8]) -> bool {
        let body = format!(
            "{{\"to\":\"{}\",\"data\":{}}}",
            token,
            String::from_utf8_lossy(data)
        );
        self.submit(body).await
    }

    /// Broadcasts `data` to a topic. The outer braces of `data` are
    /// stripped and its fields spliced next to the `to` field, matching
    /// what the endpoint expects for topic messages.
    pub async fn send_broadcast(&self, channel: &str, data: &[u8]) -> bool {
        let mut fields = String::from_utf8_lossy(data).into_owned();
        if fields.starts_with('{') {
            fields.remove(0);
        }
        if fields.ends_with('}') {
            fields.pop();
        }
        let body = format!("{{\"to\":\"/topics/{}\",{}}}", channel, fields);
        self.submit(body).await
    }

    async fn submit(&self, body: String) -> bool {
        trace!(bytes = body.len(), "posting to fcm");
        let target = RequestTarget::new(SERVER_ADDRESS)
            .with_header("Content-Type", "application/json")
            .with_header("Authorization", format!("key={}", self.auth_key));
        self.dispatcher
            .submit(Verb::Post, REQ_SEND_MESSAGE, target, body.into_bytes(), true, "")
            .await
    }
}

/// Drains HTTP outcomes: every response clears its dispatcher entry,
/// failures surface as transport-error events.
pub(crate) fn spawn_response_pump(
    dispatcher: Arc<RequestDispatcher>,
    mut responses: RestResponseReceiver,
    events: EventSink,
) {
    tokio::spawn(async move {
        while let Some(response) = responses.recv().await {
            dispatcher.clear(&response.correlation_id).await;
            match &response.error {
                Some(error) => events.transport_error(&error.to_string()),
                None => debug!(
                    status = response.status,
                    bytes = response.body.len(),
                    at = %chrono::Utc::now().to_rfc3339(),
                    "fcm delivery report"
                ),
            }
        }
    });
}
