//! Client capability contract and shared client state.
//!
//! A [`PushClient`] is one logical endpoint (device or app) attached to a
//! provider. Concrete backends implement the trait; the common lifecycle
//! bookkeeping lives in [`ClientCore`] so every binding reports state,
//! tokens and received messages the same way.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::events::EventSink;

/// Opaque string-keyed configuration handed through connect/register calls.
pub type ParamMap = HashMap<String, String>;

/// Connection state of a single client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Disconnecting,
    Offline,
    Online,
}

/// State shared by every client implementation.
#[derive(Debug, Default)]
pub struct ClientCore {
    client_id: String,
    provider_id: String,
    state: Option<ClientState>,
    token: String,
    parameters: ParamMap,
    subscribed_channels: HashSet<String>,
    events: Option<EventSink>,
}

impl ClientCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records identity, parameters and the event sink, and moves the
    /// client to `Connecting`. Bindings call this first from `connect`.
    pub fn begin_connect(&mut self, client_id: &str, parameters: &ParamMap, events: EventSink) {
        self.client_id = client_id.to_string();
        self.provider_id = events.provider_id().to_string();
        self.parameters = parameters.clone();
        self.events = Some(events);
        self.set_state(ClientState::Connecting);
    }

    /// Moves the client to `Disconnecting` and drops its event sink so no
    /// further events can escape a removed client.
    pub fn begin_disconnect(&mut self) {
        self.set_state(ClientState::Disconnecting);
        self.events = None;
    }

    pub fn set_state(&mut self, state: ClientState) {
        self.state = Some(state);
        if let Some(events) = &self.events {
            events.client_state_changed(&self.client_id, state);
        }
    }

    pub fn state(&self) -> ClientState {
        self.state.unwrap_or(ClientState::Disconnected)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn parameters(&self) -> &ParamMap {
        &self.parameters
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Stores a backend-issued token and announces it.
    pub fn set_token(&mut self, token: &str) {
        self.token = token.to_string();
        if let Some(events) = &self.events {
            events.client_token_received(token);
        }
    }

    /// Delivers an inbound message to the application.
    pub fn receive_message(&self, payload: &[u8]) {
        if let Some(events) = &self.events {
            events.message_received(&self.client_id, payload);
        }
    }

    pub fn add_channel(&mut self, channel: &str) -> bool {
        self.subscribed_channels.insert(channel.to_string())
    }

    pub fn remove_channel(&mut self, channel: &str) -> bool {
        self.subscribed_channels.remove(channel)
    }

    pub fn subscribed_channels(&self) -> &HashSet<String> {
        &self.subscribed_channels
    }

    pub fn events(&self) -> Option<&EventSink> {
        self.events.as_ref()
    }
}

/// Capability contract a concrete messaging client must implement.
#[async_trait]
pub trait PushClient: Send + Sync {
    fn core(&self) -> &ClientCore;
    fn core_mut(&mut self) -> &mut ClientCore;

    /// Connects the client. Returns the client id on success, an empty
    /// string otherwise.
    async fn connect(&mut self, client_id: &str, parameters: &ParamMap, events: EventSink)
        -> String {
        self.core_mut().begin_connect(client_id, parameters, events);
        client_id.to_string()
    }

    async fn disconnect(&mut self) {
        self.core_mut().begin_disconnect();
    }

    /// Sends a message either straight to a token or to a channel.
    async fn send_message(&mut self, payload: &[u8], client_token: &str, channel: &str) -> bool;

    /// Flushes messages the client buffered while the application was busy.
    async fn flush_message_queue(&mut self) -> bool;

    async fn subscribe_to_channel(&mut self, channel: &str) -> bool;

    async fn unsubscribe_from_channel(&mut self, channel: &str) -> bool;

    fn client_token(&self) -> String {
        self.core().token().to_string()
    }

    fn set_client_token(&mut self, token: &str) {
        self.core_mut().set_token(token);
    }

    fn client_id(&self) -> String {
        self.core().client_id().to_string()
    }

    fn client_state(&self) -> ClientState {
        self.core().state()
    }
}
