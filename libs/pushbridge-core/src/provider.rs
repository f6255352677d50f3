//! Provider capability contract and the per-provider client registry.
//!
//! A [`PushProvider`] is one registered messaging backend owning zero or
//! more clients. [`ProviderCore`] carries the registry and lifecycle
//! bookkeeping every binding shares: client ownership, event wiring,
//! the deregistration cascade.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{ParamMap, PushClient};
use crate::events::EventSink;

/// Registration state of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    NotRegistered,
    Registering,
    Registered,
}

/// State shared by every provider implementation: identity, registration
/// state and the exclusively-owned client map.
#[derive(Default)]
pub struct ProviderCore {
    provider_id: String,
    state: Option<ServiceState>,
    clients: HashMap<String, Box<dyn PushClient>>,
    events: Option<EventSink>,
}

impl ProviderCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records identity, keeps the event sink and moves the provider to
    /// `Registering`. Bindings call this first from `register`.
    pub fn begin_register(&mut self, provider_id: &str, events: EventSink) {
        self.provider_id = provider_id.to_string();
        self.events = Some(events);
        self.update_service_state(ServiceState::Registering);
    }

    /// Sets the state and announces it through the event channel.
    pub fn update_service_state(&mut self, state: ServiceState) {
        self.state = Some(state);
        if let Some(events) = &self.events {
            events.service_state_updated(state);
        }
    }

    pub fn service_state(&self) -> ServiceState {
        self.state.unwrap_or(ServiceState::NotRegistered)
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Attaches a concrete client under `client_id`: wires its event sink,
    /// runs its connect procedure and stores it in the registry.
    ///
    /// Returns the client id, or an empty string when the provider is not
    /// registered or the client id is empty. An existing entry under the
    /// same id is replaced without being disconnected first (inherited
    /// behavior, pinned by tests).
    pub async fn connect_client_to_provider(
        &mut self,
        client_id: &str,
        parameters: &ParamMap,
        mut client: Box<dyn PushClient>,
    ) -> String {
        if self.provider_id.is_empty() || client_id.is_empty() {
            return String::new();
        }
        let Some(events) = &self.events else {
            return String::new();
        };

        let connected = client.connect(client_id, parameters, events.clone()).await;
        if connected.is_empty() {
            debug!(provider_id = %self.provider_id, client_id, "client connect refused");
            return String::new();
        }

        self.clients.insert(client_id.to_string(), client);
        client_id.to_string()
    }

    pub async fn disconnect_client(&mut self, client_id: &str, _parameters: &ParamMap) {
        if self.provider_id.is_empty() {
            return;
        }
        if let Some(client) = self.clients.get_mut(client_id) {
            client.disconnect().await;
        }
    }

    /// Disconnects and removes one client. Returns false when unknown.
    pub async fn remove_client(&mut self, client_id: &str) -> bool {
        if self.provider_id.is_empty() || !self.clients.contains_key(client_id) {
            return false;
        }
        self.disconnect_client(client_id, &ParamMap::new()).await;
        self.clients.remove(client_id);
        true
    }

    /// Tears down every client through the normal disconnect+remove path,
    /// then drops to `NotRegistered` and announces it.
    ///
    /// A provider that never had clients emits no state-update event
    /// (inherited asymmetry, preserved as-is).
    pub async fn deregister(&mut self) {
        if self.clients.is_empty() {
            return;
        }
        let ids: Vec<String> = self.clients.keys().cloned().collect();
        for id in ids {
            self.remove_client(&id).await;
        }
        self.update_service_state(ServiceState::NotRegistered);
    }

    /// Asks every client to flush its buffered messages.
    /// Returns false when the provider has no clients.
    pub async fn flush_message_queue(&mut self) -> bool {
        if self.clients.is_empty() {
            return false;
        }
        for client in self.clients.values_mut() {
            client.flush_message_queue().await;
        }
        true
    }

    pub fn client_token(&self, client_id: &str) -> String {
        if self.provider_id.is_empty() {
            return String::new();
        }
        self.clients
            .get(client_id)
            .map(|c| c.client_token())
            .unwrap_or_default()
    }

    pub fn client(&self, client_id: &str) -> Option<&dyn PushClient> {
        self.clients.get(client_id).map(|c| c.as_ref())
    }

    pub fn client_mut(&mut self, client_id: &str) -> Option<&mut dyn PushClient> {
        self.clients.get_mut(client_id).map(|c| &mut **c as &mut dyn PushClient)
    }

    pub fn local_clients(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }
}

/// Capability contract a concrete messaging provider must implement.
#[async_trait]
pub trait PushProvider: Send + Sync {
    fn core(&self) -> &ProviderCore;
    fn core_mut(&mut self) -> &mut ProviderCore;

    /// Registers the provider with the backend. Implementations call
    /// [`ProviderCore::begin_register`] and then complete their own setup.
    async fn register(&mut self, provider_id: &str, parameters: &ParamMap, events: EventSink)
        -> bool;

    async fn deregister(&mut self) {
        self.core_mut().deregister().await;
    }

    /// Creates and attaches the backend-specific client for `client_id`.
    /// Returns the client id on success, an empty string otherwise.
    async fn connect_client(&mut self, client_id: &str, parameters: &ParamMap) -> String;

    async fn disconnect_client(&mut self, client_id: &str, parameters: &ParamMap) {
        self.core_mut().disconnect_client(client_id, parameters).await;
    }

    async fn remove_client(&mut self, client_id: &str) -> bool {
        self.core_mut().remove_client(client_id).await
    }

    /// Sends a message to a local client, a remote token or a channel.
    /// Exactly one of the three target arguments should be non-empty.
    async fn send_message(
        &mut self,
        payload: &[u8],
        client_id: &str,
        client_token: &str,
        channel: &str,
    ) -> bool;

    async fn subscribe_to_channel(&mut self, channel: &str, client_id: &str) -> bool {
        match self.core_mut().client_mut(client_id) {
            Some(client) => client.subscribe_to_channel(channel).await,
            None => false,
        }
    }

    async fn unsubscribe_from_channel(&mut self, channel: &str, client_id: &str) -> bool {
        match self.core_mut().client_mut(client_id) {
            Some(client) => client.unsubscribe_from_channel(channel).await,
            None => false,
        }
    }

    /// Requests the list of remote clients from the backend; the response
    /// arrives asynchronously as a `RemoteClientsReceived` event.
    async fn request_remote_clients(&mut self) -> bool;

    async fn flush_message_queue(&mut self) -> bool {
        self.core_mut().flush_message_queue().await
    }

    fn client_token(&self, client_id: &str) -> String {
        self.core().client_token(client_id)
    }

    fn set_client_token(&mut self, client_id: &str, token: &str) {
        if let Some(client) = self.core_mut().client_mut(client_id) {
            client.set_client_token(token);
        }
    }

    fn local_clients(&self) -> Vec<String> {
        self.core().local_clients()
    }

    fn service_state(&self) -> ServiceState {
        self.core().service_state()
    }

    fn provider_id(&self) -> String {
        self.core().provider_id().to_string()
    }
}
