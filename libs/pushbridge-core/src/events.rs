//! Event fan-out for providers and clients.
//!
//! Every facade owns one unbounded channel; providers and clients hold
//! cheap [`EventSink`] clones that feed it. A sink dies with the entity
//! that holds it, so subscriptions never outlive a client or provider.

use tokio::sync::mpsc;

use crate::client::ClientState;
use crate::provider::ServiceState;

/// Sender half of the facade event channel.
pub type EventSender = mpsc::UnboundedSender<PushEvent>;
/// Receiver half handed to the application by [`crate::CloudMessaging::new`].
pub type EventReceiver = mpsc::UnboundedReceiver<PushEvent>;

/// Events surfaced to the application through the facade channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// A message arrived for a local client.
    MessageReceived {
        provider_id: String,
        client_id: String,
        payload: Vec<u8>,
    },
    /// The backend issued or refreshed a client token.
    ClientTokenReceived { token: String },
    /// Response body for a remote-clients listing request.
    RemoteClientsReceived { body: String },
    /// Provider registration state changed.
    ServiceStateUpdated { state: ServiceState },
    /// A client connection state changed.
    ClientStateChanged {
        client_id: String,
        state: ClientState,
    },
    /// Transport-level failure, forwarded as-is from the REST layer.
    TransportError { message: String },
}

/// Handle through which one provider (and its clients) emits events.
///
/// Emitting never fails from the caller's point of view: if the
/// application dropped the receiver the event is discarded.
#[derive(Debug, Clone)]
pub struct EventSink {
    provider_id: String,
    tx: EventSender,
}

impl EventSink {
    pub fn new(provider_id: impl Into<String>, tx: EventSender) -> Self {
        Self {
            provider_id: provider_id.into(),
            tx,
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn emit(&self, event: PushEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!(provider_id = %self.provider_id, "event receiver dropped");
        }
    }

    pub fn message_received(&self, client_id: &str, payload: &[u8]) {
        self.emit(PushEvent::MessageReceived {
            provider_id: self.provider_id.clone(),
            client_id: client_id.to_string(),
            payload: payload.to_vec(),
        });
    }

    pub fn client_token_received(&self, token: &str) {
        self.emit(PushEvent::ClientTokenReceived {
            token: token.to_string(),
        });
    }

    pub fn remote_clients_received(&self, body: &str) {
        self.emit(PushEvent::RemoteClientsReceived {
            body: body.to_string(),
        });
    }

    pub fn service_state_updated(&self, state: ServiceState) {
        self.emit(PushEvent::ServiceStateUpdated { state });
    }

    pub fn client_state_changed(&self, client_id: &str, state: ClientState) {
        self.emit(PushEvent::ClientStateChanged {
            client_id: client_id.to_string(),
            state,
        });
    }

    pub fn transport_error(&self, message: &str) {
        tracing::warn!(provider_id = %self.provider_id, "transport error: {}", message);
        self.emit(PushEvent::TransportError {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_forwards_events_with_provider_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new("fcm", tx);

        sink.message_received("dev1", b"hello");

        match rx.recv().await {
            Some(PushEvent::MessageReceived {
                provider_id,
                client_id,
                payload,
            }) => {
                assert_eq!(provider_id, "fcm");
                assert_eq!(client_id, "dev1");
                assert_eq!(payload, b"hello");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn emitting_without_receiver_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let sink = EventSink::new("fcm", tx);
        sink.client_token_received("tok-1");
    }
}
