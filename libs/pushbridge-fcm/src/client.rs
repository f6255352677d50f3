//! Local FCM endpoint: one application instance with its registration
//! token and topic subscriptions.

use async_trait::async_trait;
use tracing::debug;

use pushbridge_core::{ClientCore, PushClient};

/// FCM client endpoint.
///
/// The platform messaging SDK is out of scope, so the token arrives
/// through `set_client_token` instead of an SDK callback and client-side
/// sending is not available.
#[derive(Default)]
pub struct FcmClient {
    core: ClientCore,
}

impl FcmClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PushClient for FcmClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ClientCore {
        &mut self.core
    }

    async fn send_message(&mut self, _payload: &[u8], _client_token: &str, _channel: &str) -> bool {
        debug!(
            client_id = %self.core.client_id(),
            "client-side sending needs the platform messaging stack"
        );
        false
    }

    async fn flush_message_queue(&mut self) -> bool {
        true
    }

    async fn subscribe_to_channel(&mut self, channel: &str) -> bool {
        self.core.add_channel(channel)
    }

    async fn unsubscribe_from_channel(&mut self, channel: &str) -> bool {
        self.core.remove_channel(channel)
    }
}
