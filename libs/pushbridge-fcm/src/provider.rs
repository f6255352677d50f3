//! FCM provider: routes sends between local endpoints and the REST API.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use pushbridge_core::rest::{
    HttpTransport, RequestDispatcher, RequestTransport, RestResponseReceiver,
};
use pushbridge_core::{
    DispatcherConfig, EventSink, ParamMap, ProviderCore, PushClient, PushProvider, ServiceState,
};

use crate::client::FcmClient;
use crate::rest::{spawn_response_pump, FcmRestApi};

/// Firebase Cloud Messaging provider.
pub struct FcmProvider {
    core: ProviderCore,
    rest: FcmRestApi,
    responses: Option<RestResponseReceiver>,
}

impl FcmProvider {
    /// Builds the provider with the dispatcher timers from the
    /// `PUSHBRIDGE_*` environment overrides, defaults where unset.
    pub fn new() -> Self {
        let config = DispatcherConfig::from_env().unwrap_or_else(|err| {
            warn!(%err, "using default dispatcher timers");
            DispatcherConfig::default()
        });
        Self::with_config(config)
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        let (transport, responses) = HttpTransport::channel();
        let dispatcher = RequestDispatcher::new(config, transport);
        Self {
            core: ProviderCore::new(),
            rest: FcmRestApi::new(dispatcher),
            responses: Some(responses),
        }
    }

    /// Builds the provider over a custom transport. The caller owns the
    /// response handling; no pump is started.
    pub fn with_transport(config: DispatcherConfig, transport: Arc<dyn RequestTransport>) -> Self {
        Self {
            core: ProviderCore::new(),
            rest: FcmRestApi::new(RequestDispatcher::new(config, transport)),
            responses: None,
        }
    }
}

impl Default for FcmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    fn core(&self) -> &ProviderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProviderCore {
        &mut self.core
    }

    async fn register(
        &mut self,
        provider_id: &str,
        parameters: &ParamMap,
        events: EventSink,
    ) -> bool {
        self.core.begin_register(provider_id, events.clone());

        let key = parameters.get("SERVER_API_KEY").cloned().unwrap_or_default();
        self.rest.set_auth_key(&key);
        if let Some(responses) = self.responses.take() {
            spawn_response_pump(self.rest.dispatcher().clone(), responses, events);
        }

        info!(provider_id, "fcm provider registered");
        self.core.update_service_state(ServiceState::Registered);
        true
    }

    async fn connect_client(&mut self, client_id: &str, parameters: &ParamMap) -> String {
        if self.core.provider_id().is_empty() {
            return String::new();
        }
        self.core
            .connect_client_to_provider(client_id, parameters, Box::new(FcmClient::new()))
            .await
    }

    async fn send_message(
        &mut self,
        payload: &[u8],
        client_id: &str,
        client_token: &str,
        channel: &str,
    ) -> bool {
        // Local endpoint delivery.
        if !client_id.is_empty() && client_token.is_empty() && channel.is_empty() {
            if let Some(client) = self.core.client(client_id) {
                client.core().receive_message(payload);
                return true;
            }
        } else if !client_id.is_empty() && !client_token.is_empty() && !channel.is_empty() {
            // Outbound through one local endpoint (mobile-style send).
            if let Some(client) = self.core.client_mut(client_id) {
                return client.send_message(payload, client_token, channel).await;
            }
        } else {
            // Server-side send over the REST interface.
            if !channel.is_empty() {
                return self.rest.send_broadcast(channel, payload).await;
            }
            if !client_token.is_empty() {
                return self.rest.send_to_device(client_token, payload).await;
            }
        }
        false
    }

    async fn subscribe_to_channel(&mut self, channel: &str, client_id: &str) -> bool {
        if !client_id.is_empty() {
            return match self.core.client_mut(client_id) {
                Some(client) => client.subscribe_to_channel(channel).await,
                None => false,
            };
        }
        // Topic sends need no server-side subscription.
        true
    }

    async fn unsubscribe_from_channel(&mut self, channel: &str, client_id: &str) -> bool {
        if !client_id.is_empty() {
            return match self.core.client_mut(client_id) {
                Some(client) => client.unsubscribe_from_channel(channel).await,
                None => false,
            };
        }
        true
    }

    /// The legacy HTTP API has no client listing.
    async fn request_remote_clients(&mut self) -> bool {
        false
    }
}
