//! Gateway daemon link and its background poller task.
//!
//! A [`GatewayLink`] is owned exclusively by one spawned task: the
//! immutable registration crosses in at spawn time, inbound traffic
//! crosses out through an mpsc channel into the client's event sink.
//! Nothing else ever touches the link, so the engine needs no locking.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use pushbridge_core::{ClientState, EventSink};

/// Identity a device registers with at the gateway.
#[derive(Debug, Clone)]
pub struct GatewayRegistration {
    pub client_id: String,
    pub address: String,
    pub version: String,
    pub customer_id: String,
    pub channels: Vec<String>,
}

/// Traffic the gateway pushes up to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// The gateway issued or refreshed the device token.
    TokenReceived(String),
    /// An inbound message for the device.
    MessageReceived(Vec<u8>),
    /// Daemon connection state changed.
    StateChanged(ClientState),
}

/// Sender half the link pushes its events into.
pub type GatewayMailbox = mpsc::UnboundedSender<GatewayEvent>;

/// One connection to the local gateway daemon.
///
/// Implementations are single-threaded by construction: the poller task
/// is the only caller.
#[async_trait]
pub trait GatewayLink: Send + 'static {
    /// Connects and registers the device. Events flow through `mailbox`
    /// for the lifetime of the link.
    async fn connect(&mut self, registration: &GatewayRegistration, mailbox: GatewayMailbox)
        -> bool;

    /// One engine pass; called on every poll interval.
    async fn run_once(&mut self);

    /// Publishes a payload upstream through the daemon.
    async fn publish(&mut self, payload: &[u8]) -> bool;

    /// Unregisters and tears the connection down.
    async fn disconnect(&mut self, registration: &GatewayRegistration, token: &str);
}

/// Commands the owning client sends to its poller task.
#[derive(Debug)]
pub(crate) enum GatewayCommand {
    Publish(Vec<u8>),
    Disconnect,
}

/// Spawns the poller task owning `link`. Returns the command handle;
/// dropping it (or sending `Disconnect`) ends the task.
pub(crate) fn spawn_gateway_task(
    mut link: Box<dyn GatewayLink>,
    registration: GatewayRegistration,
    events: EventSink,
    poll_interval: Duration,
) -> mpsc::UnboundedSender<GatewayCommand> {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (gw_tx, mut gw_rx) = mpsc::unbounded_channel();
        if !link.connect(&registration, gw_tx).await {
            warn!(client_id = %registration.client_id, "gateway connect failed");
            events.transport_error("gateway connect failed");
            return;
        }
        events.client_state_changed(&registration.client_id, ClientState::Online);

        let mut token = String::new();
        loop {
            tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(GatewayCommand::Publish(payload)) => {
                        link.publish(&payload).await;
                    }
                    Some(GatewayCommand::Disconnect) | None => break,
                },
                event = gw_rx.recv() => {
                    let Some(event) = event else { break };
                    match event {
                        GatewayEvent::TokenReceived(rid) => {
                            token = rid.clone();
                            events.client_token_received(&rid);
                        }
                        GatewayEvent::MessageReceived(payload) => {
                            events.message_received(&registration.client_id, &payload);
                        }
                        GatewayEvent::StateChanged(state) => {
                            events.client_state_changed(&registration.client_id, state);
                        }
                    }
                }
                _ = tokio::time::sleep(poll_interval) => {
                    link.run_once().await;
                }
            }
        }

        debug!(client_id = %registration.client_id, "gateway task shutting down");
        link.disconnect(&registration, &token).await;
    });

    cmd_tx
}
