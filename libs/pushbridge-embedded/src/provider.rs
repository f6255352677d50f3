//! Embedded gateway provider: routes sends between local devices, the
//! gateway daemon and the REST backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use pushbridge_core::rest::{
    HttpTransport, RequestDispatcher, RequestTransport, RestResponseReceiver,
};
use pushbridge_core::{
    DispatcherConfig, EventSink, ParamMap, ProviderCore, PushClient, PushProvider, ServiceState,
};

use crate::client::{EmbeddedClient, LinkFactory};
use crate::rest::{spawn_response_pump, EmbeddedRestApi};

/// Gateway-backed provider for embedded devices.
pub struct EmbeddedProvider {
    core: ProviderCore,
    rest: EmbeddedRestApi,
    responses: Option<RestResponseReceiver>,
    link_factory: LinkFactory,
}

impl EmbeddedProvider {
    /// Builds the provider with the dispatcher timers from the
    /// `PUSHBRIDGE_*` environment overrides, defaults where unset.
    pub fn new(link_factory: LinkFactory) -> Self {
        let config = DispatcherConfig::from_env().unwrap_or_else(|err| {
            warn!(%err, "using default dispatcher timers");
            DispatcherConfig::default()
        });
        Self::with_config(config, link_factory)
    }

    pub fn with_config(config: DispatcherConfig, link_factory: LinkFactory) -> Self {
        let (transport, responses) = HttpTransport::channel();
        let dispatcher = RequestDispatcher::new(config, transport);
        Self {
            core: ProviderCore::new(),
            rest: EmbeddedRestApi::new(dispatcher),
            responses: Some(responses),
            link_factory,
        }
    }

    /// Builds the provider over a custom transport. The caller owns the
    /// response handling; no pump is started.
    pub fn with_transport(
        config: DispatcherConfig,
        transport: Arc<dyn RequestTransport>,
        link_factory: LinkFactory,
    ) -> Self {
        Self {
            core: ProviderCore::new(),
            rest: EmbeddedRestApi::new(RequestDispatcher::new(config, transport)),
            responses: None,
            link_factory,
        }
    }
}

#[async_trait]
impl PushProvider for EmbeddedProvider {
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

        let key = parameters.get("API_KEY").cloned().unwrap_or_default();
        self.rest.set_auth_key(&key);
        if let Some(responses) = self.responses.take() {
            spawn_response_pump(self.rest.dispatcher().clone(), responses, events);
        }

        info!(provider_id, "embedded provider registered");
        self.core.update_service_state(ServiceState::Registered);
        true
    }

    async fn connect_client(&mut self, client_id: &str, parameters: &ParamMap) -> String {
        if self.core.provider_id().is_empty() {
            return String::new();
        }
        let client = Box::new(EmbeddedClient::new(self.link_factory.clone()));
        self.core
            .connect_client_to_provider(client_id, parameters, client)
            .await
    }

    async fn send_message(
        &mut self,
        payload: &[u8],
        client_id: &str,
        client_token: &str,
        channel: &str,
    ) -> bool {
        if !client_id.is_empty() {
            // Local device delivery.
            if client_token.is_empty() {
                if let Some(client) = self.core.client(client_id) {
                    client.core().receive_message(payload);
                    return true;
                }
            }
        } else {
            // Upstream publish through the first local device's gateway.
            if !client_token.is_empty() && channel.is_empty() {
                let first = self.core.local_clients().into_iter().next();
                if let Some(id) = first {
                    if let Some(client) = self.core.client_mut(&id) {
                        return client.send_message(payload, client_token, "").await;
                    }
                }
            }
            // Directed send to a known device over REST.
            if !client_token.is_empty() && !channel.is_empty() {
                return self.rest.send_data_to_device(client_token, payload).await;
            }
            // Channel broadcast over REST.
            if client_token.is_empty() && !channel.is_empty() {
                return self.rest.send_broadcast(channel, payload).await;
            }
        }
        false
    }

    async fn request_remote_clients(&mut self) -> bool {
        self.rest.get_all_devices().await
    }
}
