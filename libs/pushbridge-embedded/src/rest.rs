//! REST access to the gateway backend.

use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::trace;

use pushbridge_core::events::EventSink;
use pushbridge_core::rest::{RequestDispatcher, RequestTarget, RestResponseReceiver, Verb};

// Payloads are raw device data, not JSON.
const CONTENT_TYPE: &str = "text/plain; charset=ISO-8859-1";

static SERVER_ADDRESS: Lazy<String> = Lazy::new(|| {
    std::env::var("PUSHBRIDGE_GATEWAY_URL")
        .unwrap_or_else(|_| "https://restapi.torqhub.io".to_string())
});

pub const REQ_GET_ALL_DEVICES: i32 = 1;
pub const REQ_SEND_DATA_TO_DEVICE: i32 = 2;
pub const REQ_SEND_BROADCAST: i32 = 3;

/// Client of the gateway REST backend. All sends are immediate.
pub struct EmbeddedRestApi {
    dispatcher: Arc<RequestDispatcher>,
    auth_key: String,
}

impl EmbeddedRestApi {
    pub fn new(dispatcher: Arc<RequestDispatcher>) -> Self {
        Self {
            dispatcher,
            auth_key: String::new(),
        }
    }

    /// API key appended to every request as the `ApiKey` query parameter.
    pub fn set_auth_key(&mut self, key: &str) {
        self.auth_key = key.to_string();
    }

    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    /// Lists every device identity registered with the backend. The body
    /// comes back asynchronously as a `RemoteClientsReceived` event.
    pub async fn get_all_devices(&self) -> bool {
        let url = format!("{}/rids/identities?ApiKey={}", *SERVER_ADDRESS, self.auth_key);
        self.submit(Verb::Get, REQ_GET_ALL_DEVICES, url, Vec::new()).await
    }

    /// Sends raw data to one device by its rid (the backend token).
    pub async fn send_data_to_device(&self, rid: &str, data: &[u8]) -> bool {
        let url = format!("{}/rids/{}?ApiKey={}", *SERVER_ADDRESS, rid, self.auth_key);
        self.submit(Verb::Post, REQ_SEND_DATA_TO_DEVICE, url, data.to_vec()).await
    }

    /// Broadcasts raw data to every device on a channel.
    pub async fn send_broadcast(&self, channel: &str, data: &[u8]) -> bool {
        let url = format!(
            "{}/rids/channel/{}?ApiKey={}",
            *SERVER_ADDRESS, channel, self.auth_key
        );
        self.submit(Verb::Post, REQ_SEND_BROADCAST, url, data.to_vec()).await
    }

    async fn submit(&self, verb: Verb, req_id: i32, url: String, payload: Vec<u8>) -> bool {
        trace!(req_id, %url, "gateway rest call");
        let target = RequestTarget::new(url).with_header("Content-Type", CONTENT_TYPE);
        self.dispatcher
            .submit(verb, req_id, target, payload, true, "")
            .await
    }
}

/// Drains HTTP outcomes: clears dispatcher entries, routes device
/// listings into `RemoteClientsReceived`, surfaces failures.
pub(crate) fn spawn_response_pump(
    dispatcher: Arc<RequestDispatcher>,
    mut responses: RestResponseReceiver,
    events: EventSink,
) {
    tokio::spawn(async move {
        while let Some(response) = responses.recv().await {
            dispatcher.clear(&response.correlation_id).await;
            if let Some(error) = &response.error {
                events.transport_error(&error.to_string());
                continue;
            }
            if response.req_id == REQ_GET_ALL_DEVICES {
                events.remote_clients_received(&String::from_utf8_lossy(&response.body));
            }
        }
    });
}
