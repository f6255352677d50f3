//! Top-level facade: the provider registry.
//!
//! One [`CloudMessaging`] instance owns every registered provider and is
//! the single entry point for the application. Each operation resolves a
//! provider by id and forwards; an unknown id yields a neutral failure
//! value (`false`, empty string, empty list), never an error.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::client::{ParamMap, PushClient};
use crate::events::{EventReceiver, EventSender, EventSink, PushEvent};
use crate::provider::{PushProvider, ServiceState};

/// Facade over all registered cloud-messaging providers.
pub struct CloudMessaging {
    providers: HashMap<String, Box<dyn PushProvider>>,
    events: EventSender,
}

impl CloudMessaging {
    /// Creates the facade together with the application's event receiver.
    pub fn new() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel::<PushEvent>();
        (
            Self {
                providers: HashMap::new(),
                events: tx,
            },
            rx,
        )
    }

    /// Registers a provider under `provider_id`.
    ///
    /// Registering an id that already exists is an idempotent no-op: the
    /// existing provider is kept untouched and the call reports whether it
    /// is currently registered, without re-running setup.
    pub async fn register_provider(
        &mut self,
        provider_id: &str,
        mut provider: Box<dyn PushProvider>,
        parameters: &ParamMap,
    ) -> bool {
        if let Some(existing) = self.providers.get(provider_id) {
            debug!(provider_id, "provider already registered");
            return existing.service_state() != ServiceState::NotRegistered;
        }

        info!(provider_id, "registering provider");
        let sink = EventSink::new(provider_id, self.events.clone());
        let registered = provider.register(provider_id, parameters, sink).await;
        self.providers.insert(provider_id.to_string(), provider);
        registered
    }

    /// Closes down the provider, disconnecting and removing its clients
    /// first, then discards it from the registry.
    pub async fn deregister_provider(&mut self, provider_id: &str) {
        if let Some(mut provider) = self.providers.remove(provider_id) {
            info!(provider_id, "deregistering provider");
            provider.deregister().await;
        }
    }

    /// Attaches a client to the provider. Returns the client id on
    /// success, an empty string otherwise.
    pub async fn connect_client(
        &mut self,
        provider_id: &str,
        client_id: &str,
        parameters: &ParamMap,
    ) -> String {
        match self.providers.get_mut(provider_id) {
            Some(provider) => provider.connect_client(client_id, parameters).await,
            None => String::new(),
        }
    }

    pub async fn disconnect_client(
        &mut self,
        provider_id: &str,
        client_id: &str,
        parameters: &ParamMap,
    ) {
        if let Some(provider) = self.providers.get_mut(provider_id) {
            provider.disconnect_client(client_id, parameters).await;
        }
    }

    pub async fn remove_client(&mut self, provider_id: &str, client_id: &str) {
        if let Some(provider) = self.providers.get_mut(provider_id) {
            provider.remove_client(client_id).await;
        }
    }

    /// Sends a message to a single client or a subscribed channel.
    /// Exactly one of `client_id`, `client_token`, `channel` selects the
    /// target.
    pub async fn send_message(
        &mut self,
        payload: &[u8],
        provider_id: &str,
        client_id: &str,
        client_token: &str,
        channel: &str,
    ) -> bool {
        match self.providers.get_mut(provider_id) {
            Some(provider) => {
                provider
                    .send_message(payload, client_id, client_token, channel)
                    .await
            }
            None => false,
        }
    }

    /// Subscribes to a broadcast channel, either through one client
    /// (non-empty `client_id`) or at provider level.
    pub async fn subscribe_to_channel(
        &mut self,
        channel: &str,
        provider_id: &str,
        client_id: &str,
    ) -> bool {
        let Some(provider) = self.providers.get_mut(provider_id) else {
            return false;
        };
        if !client_id.is_empty() {
            match provider.core_mut().client_mut(client_id) {
                Some(client) => client.subscribe_to_channel(channel).await,
                None => false,
            }
        } else {
            provider.subscribe_to_channel(channel, client_id).await
        }
    }

    pub async fn unsubscribe_from_channel(
        &mut self,
        channel: &str,
        provider_id: &str,
        client_id: &str,
    ) -> bool {
        let Some(provider) = self.providers.get_mut(provider_id) else {
            return false;
        };
        if !client_id.is_empty() {
            match provider.core_mut().client_mut(client_id) {
                Some(client) => client.unsubscribe_from_channel(channel).await,
                None => false,
            }
        } else {
            provider.unsubscribe_from_channel(channel, client_id).await
        }
    }

    /// Lists the client ids attached locally to the provider.
    pub fn local_clients(&self, provider_id: &str) -> Vec<String> {
        self.providers
            .get(provider_id)
            .map(|p| p.local_clients())
            .unwrap_or_default()
    }

    /// Asks the backend for its remote clients; the response arrives as a
    /// `RemoteClientsReceived` event.
    pub async fn request_remote_clients(&mut self, provider_id: &str) -> bool {
        match self.providers.get_mut(provider_id) {
            Some(provider) => provider.request_remote_clients().await,
            None => false,
        }
    }

    pub fn client_token(&self, provider_id: &str, client_id: &str) -> String {
        self.providers
            .get(provider_id)
            .map(|p| p.client_token(client_id))
            .unwrap_or_default()
    }

    pub fn set_client_token(&mut self, provider_id: &str, client_id: &str, token: &str) {
        if let Some(provider) = self.providers.get_mut(provider_id) {
            provider.set_client_token(client_id, token);
        }
    }

    /// Asks every client of the provider to flush its buffered messages.
    /// False for an unknown provider or one without clients.
    pub async fn flush_message_queue(&mut self, provider_id: &str) -> bool {
        match self.providers.get_mut(provider_id) {
            Some(provider) => provider.flush_message_queue().await,
            None => false,
        }
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}
