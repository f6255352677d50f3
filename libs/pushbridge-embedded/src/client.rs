//! Device-side client of the gateway daemon.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use pushbridge_core::{ClientCore, EventSink, ParamMap, PushClient};

use crate::gateway::{spawn_gateway_task, GatewayCommand, GatewayLink, GatewayRegistration};

/// Builds a fresh gateway link for every (re)connection.
pub type LinkFactory = Arc<dyn Fn() -> Box<dyn GatewayLink> + Send + Sync>;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One device attached to the local gateway daemon.
///
/// Connection parameters: `address` (device address, returned from
/// `connect`), `version`, `customer_id` and `channels` (comma-separated
/// channel list). Changing the channel set restarts the gateway link,
/// which is how the daemon re-registers a device.
pub struct EmbeddedClient {
    core: ClientCore,
    link_factory: LinkFactory,
    commands: Option<mpsc::UnboundedSender<GatewayCommand>>,
    poll_interval: Duration,
    address: String,
    version: String,
    customer_id: String,
}

impl EmbeddedClient {
    pub fn new(link_factory: LinkFactory) -> Self {
        Self {
            core: ClientCore::new(),
            link_factory,
            commands: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            address: String::new(),
            version: String::new(),
            customer_id: String::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn registration(&self) -> GatewayRegistration {
        let mut channels: Vec<String> = self.core.subscribed_channels().iter().cloned().collect();
        channels.sort();
        GatewayRegistration {
            client_id: self.core.client_id().to_string(),
            address: self.address.clone(),
            version: self.version.clone(),
            customer_id: self.customer_id.clone(),
            channels,
        }
    }

    fn stop_gateway(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(GatewayCommand::Disconnect);
        }
    }

    /// Spawns a fresh gateway task for the current registration.
    fn start_gateway(&mut self, events: EventSink) {
        let link = (self.link_factory)();
        self.commands = Some(spawn_gateway_task(
            link,
            self.registration(),
            events,
            self.poll_interval,
        ));
    }

    /// Tears the running link down and brings a new one up, picking up
    /// the current channel set.
    fn restart_gateway(&mut self) {
        self.stop_gateway();
        if let Some(events) = self.core.events().cloned() {
            self.start_gateway(events);
        }
    }
}

#[async_trait]
impl PushClient for EmbeddedClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ClientCore {
        &mut self.core
    }

    async fn connect(
        &mut self,
        client_id: &str,
        parameters: &ParamMap,
        events: EventSink,
    ) -> String {
        self.core.begin_connect(client_id, parameters, events.clone());

        self.address = parameters.get("address").cloned().unwrap_or_default();
        self.version = parameters.get("version").cloned().unwrap_or_default();
        self.customer_id = parameters.get("customer_id").cloned().unwrap_or_default();
        if let Some(channels) = parameters.get("channels") {
            for channel in channels.split(',').filter(|c| !c.is_empty()) {
                self.core.add_channel(channel);
            }
        }

        // The id doubles as the token until the gateway issues a rid.
        self.core.set_token(client_id);

        if self.address.is_empty() {
            debug!(client_id, "refusing connect without a device address");
            return String::new();
        }

        self.start_gateway(events);
        self.address.clone()
    }

    async fn disconnect(&mut self) {
        self.stop_gateway();
        self.core.begin_disconnect();
    }

    /// Publishes through the gateway daemon; the token and channel
    /// arguments are unused on this transport.
    async fn send_message(&mut self, payload: &[u8], _client_token: &str, _channel: &str) -> bool {
        match &self.commands {
            Some(commands) => commands
                .send(GatewayCommand::Publish(payload.to_vec()))
                .is_ok(),
            None => false,
        }
    }

    async fn flush_message_queue(&mut self) -> bool {
        true
    }

    async fn subscribe_to_channel(&mut self, channel: &str) -> bool {
        if !self.core.add_channel(channel) {
            return false;
        }
        self.restart_gateway();
        true
    }

    async fn unsubscribe_from_channel(&mut self, channel: &str) -> bool {
        if !self.core.remove_channel(channel) {
            return false;
        }
        self.restart_gateway();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayMailbox;
    use pushbridge_core::PushEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct NullLink {
        published: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    #[async_trait]
    impl GatewayLink for NullLink {
        async fn connect(
            &mut self,
            _registration: &GatewayRegistration,
            _mailbox: GatewayMailbox,
        ) -> bool {
            true
        }

        async fn run_once(&mut self) {}

        async fn publish(&mut self, payload: &[u8]) -> bool {
            self.published.lock().unwrap().push(payload.to_vec());
            true
        }

        async fn disconnect(&mut self, _registration: &GatewayRegistration, _token: &str) {}
    }

    fn null_factory() -> LinkFactory {
        Arc::new(|| Box::new(NullLink::default()) as Box<dyn GatewayLink>)
    }

    fn params() -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("address".into(), "00:11:22".into());
        params.insert("version".into(), "1.0".into());
        params.insert("customer_id".into(), "acme".into());
        params.insert("channels".into(), "alerts,news".into());
        params
    }

    #[tokio::test]
    async fn connect_returns_the_device_address() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut client = EmbeddedClient::new(null_factory());

        let result = client
            .connect("dev1", &params(), EventSink::new("embedded", tx))
            .await;

        assert_eq!(result, "00:11:22");
        assert_eq!(client.client_token(), "dev1");
        assert!(client.core().subscribed_channels().contains("alerts"));
        assert!(client.core().subscribed_channels().contains("news"));
    }

    #[tokio::test]
    async fn connect_without_address_is_refused() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut client = EmbeddedClient::new(null_factory());

        let result = client
            .connect("dev1", &ParamMap::new(), EventSink::new("embedded", tx))
            .await;

        assert_eq!(result, "");
    }

    #[tokio::test]
    async fn send_publishes_through_the_gateway_task() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let published = Arc::new(Mutex::new(Vec::new()));
        let sink = published.clone();
        let mut client = EmbeddedClient::new(Arc::new(move || {
            Box::new(NullLink {
                published: sink.clone(),
            }) as Box<dyn GatewayLink>
        }));
        client
            .connect("dev1", &params(), EventSink::new("embedded", tx))
            .await;

        assert!(client.send_message(b"up", "", "").await);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(published.lock().unwrap().as_slice(), &[b"up".to_vec()]);
    }

    #[tokio::test]
    async fn changing_the_channel_set_restarts_the_link() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let links = Arc::new(AtomicUsize::new(0));
        let counter = links.clone();
        let mut client = EmbeddedClient::new(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(NullLink::default()) as Box<dyn GatewayLink>
        }));
        client
            .connect("dev1", &params(), EventSink::new("embedded", tx))
            .await;

        assert!(client.subscribe_to_channel("extra").await);
        assert!(!client.subscribe_to_channel("extra").await);
        assert!(client.unsubscribe_from_channel("extra").await);
        assert!(!client.unsubscribe_from_channel("missing").await);

        // Initial connect plus one restart per accepted change.
        assert_eq!(links.load(Ordering::SeqCst), 3);

        // Each successful connect reports the client online.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut online = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(
                event,
                PushEvent::ClientStateChanged {
                    state: pushbridge_core::ClientState::Online,
                    ..
                }
            ) {
                online += 1;
            }
        }
        assert_eq!(online, 3);
    }

    #[tokio::test]
    async fn send_before_connect_fails() {
        let mut client = EmbeddedClient::new(null_factory());
        assert!(!client.send_message(b"up", "", "").await);
    }
}
