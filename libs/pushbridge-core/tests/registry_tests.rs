//! End-to-end registry behavior through the facade, using an in-process
//! test backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pushbridge_core::{
    ClientCore, ClientState, CloudMessaging, EventReceiver, EventSink, ParamMap, ProviderCore,
    PushClient, PushEvent, PushProvider, ServiceState,
};

struct TestClient {
    core: ClientCore,
}

impl TestClient {
    fn boxed() -> Box<dyn PushClient> {
        Box::new(Self {
            core: ClientCore::new(),
        })
    }
}

#[async_trait]
impl PushClient for TestClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ClientCore {
        &mut self.core
    }

    async fn send_message(&mut self, payload: &[u8], _client_token: &str, _channel: &str) -> bool {
        self.core.receive_message(payload);
        true
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

struct TestProvider {
    core: ProviderCore,
    register_calls: Arc<AtomicUsize>,
}

impl TestProvider {
    fn boxed(register_calls: Arc<AtomicUsize>) -> Box<dyn PushProvider> {
        Box::new(Self {
            core: ProviderCore::new(),
            register_calls,
        })
    }
}

#[async_trait]
impl PushProvider for TestProvider {
    fn core(&self) -> &ProviderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProviderCore {
        &mut self.core
    }

    async fn register(
        &mut self,
        provider_id: &str,
        _parameters: &ParamMap,
        events: EventSink,
    ) -> bool {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.core.begin_register(provider_id, events);
        self.core.update_service_state(ServiceState::Registered);
        true
    }

    async fn connect_client(&mut self, client_id: &str, parameters: &ParamMap) -> String {
        self.core
            .connect_client_to_provider(client_id, parameters, TestClient::boxed())
            .await
    }

    async fn send_message(
        &mut self,
        payload: &[u8],
        client_id: &str,
        client_token: &str,
        _channel: &str,
    ) -> bool {
        if !client_id.is_empty() && client_token.is_empty() {
            if let Some(client) = self.core.client(client_id) {
                client.core().receive_message(payload);
                return true;
            }
        }
        false
    }

    async fn request_remote_clients(&mut self) -> bool {
        false
    }
}

fn drain(rx: &mut EventReceiver) -> Vec<PushEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn facade_with_provider() -> (CloudMessaging, EventReceiver, Arc<AtomicUsize>) {
    let (mut facade, rx) = CloudMessaging::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut params = ParamMap::new();
    params.insert("API_KEY".into(), "x".into());
    assert!(
        facade
            .register_provider("fcm", TestProvider::boxed(calls.clone()), &params)
            .await
    );
    (facade, rx, calls)
}

#[tokio::test]
async fn client_lifecycle_end_to_end() {
    let (mut facade, mut rx, _) = facade_with_provider().await;
    drain(&mut rx);

    assert_eq!(
        facade.connect_client("fcm", "dev1", &ParamMap::new()).await,
        "dev1"
    );
    assert_eq!(facade.local_clients("fcm"), vec!["dev1".to_string()]);
    assert!(facade.flush_message_queue("fcm").await);

    assert!(facade.send_message(b"ping", "fcm", "dev1", "", "").await);
    let events = drain(&mut rx);
    assert!(events.contains(&PushEvent::MessageReceived {
        provider_id: "fcm".into(),
        client_id: "dev1".into(),
        payload: b"ping".to_vec(),
    }));

    facade
        .disconnect_client("fcm", "dev1", &ParamMap::new())
        .await;
    let events = drain(&mut rx);
    assert!(events.contains(&PushEvent::ClientStateChanged {
        client_id: "dev1".into(),
        state: ClientState::Disconnecting,
    }));

    facade.remove_client("fcm", "dev1").await;
    assert!(facade.local_clients("fcm").is_empty());
}

#[tokio::test]
async fn duplicate_registration_is_an_idempotent_no_op() {
    let (mut facade, _rx, calls) = facade_with_provider().await;

    let second = Arc::new(AtomicUsize::new(0));
    assert!(
        facade
            .register_provider("fcm", TestProvider::boxed(second.clone()), &ParamMap::new())
            .await
    );

    // The original instance stays; setup ran exactly once.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);
    assert_eq!(facade.provider_ids(), vec!["fcm".to_string()]);
}

#[tokio::test]
async fn deregistration_cascades_through_all_clients() {
    let (mut facade, mut rx, _) = facade_with_provider().await;
    facade.connect_client("fcm", "a", &ParamMap::new()).await;
    facade.connect_client("fcm", "b", &ParamMap::new()).await;
    drain(&mut rx);

    facade.deregister_provider("fcm").await;

    let events = drain(&mut rx);
    for id in ["a", "b"] {
        assert!(
            events.contains(&PushEvent::ClientStateChanged {
                client_id: id.into(),
                state: ClientState::Disconnecting,
            }),
            "client {id} was not disconnected"
        );
    }
    assert!(events.contains(&PushEvent::ServiceStateUpdated {
        state: ServiceState::NotRegistered,
    }));

    // The provider id no longer resolves.
    assert!(facade.local_clients("fcm").is_empty());
    assert!(!facade.send_message(b"x", "fcm", "a", "", "").await);
}

#[tokio::test]
async fn deregistering_without_clients_emits_no_state_event() {
    let (mut facade, mut rx, _) = facade_with_provider().await;
    drain(&mut rx);

    facade.deregister_provider("fcm").await;

    assert!(facade.provider_ids().is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn reconnecting_a_client_id_replaces_silently() {
    // Pins the inherited last-write-wins behavior: no uniqueness check,
    // no disconnect of the replaced client.
    let (mut facade, mut rx, _) = facade_with_provider().await;
    facade.connect_client("fcm", "dev1", &ParamMap::new()).await;
    facade.set_client_token("fcm", "dev1", "token-old");
    drain(&mut rx);

    assert_eq!(
        facade.connect_client("fcm", "dev1", &ParamMap::new()).await,
        "dev1"
    );

    assert_eq!(facade.local_clients("fcm"), vec!["dev1".to_string()]);
    // The fresh instance has no token; the old one was dropped untouched.
    assert_eq!(facade.client_token("fcm", "dev1"), "");
    let events = drain(&mut rx);
    assert!(!events.contains(&PushEvent::ClientStateChanged {
        client_id: "dev1".into(),
        state: ClientState::Disconnecting,
    }));
}

#[tokio::test]
async fn empty_client_id_is_refused() {
    let (mut facade, _rx, _) = facade_with_provider().await;
    assert_eq!(facade.connect_client("fcm", "", &ParamMap::new()).await, "");
    assert!(facade.local_clients("fcm").is_empty());
}

#[tokio::test]
async fn unknown_identifiers_yield_neutral_failures() {
    let (mut facade, _rx, _) = facade_with_provider().await;

    assert_eq!(
        facade.connect_client("nope", "dev1", &ParamMap::new()).await,
        ""
    );
    assert!(!facade.send_message(b"x", "nope", "dev1", "", "").await);
    assert!(facade.local_clients("nope").is_empty());
    assert_eq!(facade.client_token("nope", "dev1"), "");
    assert_eq!(facade.client_token("fcm", "ghost"), "");
    assert!(!facade.subscribe_to_channel("news", "nope", "").await);
    assert!(!facade.subscribe_to_channel("news", "fcm", "ghost").await);
    assert!(!facade.request_remote_clients("nope").await);
    assert!(!facade.flush_message_queue("nope").await);
    // Known provider, but no clients to flush.
    assert!(!facade.flush_message_queue("fcm").await);
}

#[tokio::test]
async fn channel_subscriptions_route_to_the_client() {
    let (mut facade, _rx, _) = facade_with_provider().await;
    facade.connect_client("fcm", "dev1", &ParamMap::new()).await;

    assert!(facade.subscribe_to_channel("news", "fcm", "dev1").await);
    // Already subscribed.
    assert!(!facade.subscribe_to_channel("news", "fcm", "dev1").await);
    assert!(facade.unsubscribe_from_channel("news", "fcm", "dev1").await);
    assert!(!facade.unsubscribe_from_channel("news", "fcm", "dev1").await);
}

#[tokio::test]
async fn tokens_are_set_and_read_through_the_facade() {
    let (mut facade, mut rx, _) = facade_with_provider().await;
    facade.connect_client("fcm", "dev1", &ParamMap::new()).await;
    drain(&mut rx);

    facade.set_client_token("fcm", "dev1", "rid-7");
    assert_eq!(facade.client_token("fcm", "dev1"), "rid-7");
    assert!(drain(&mut rx).contains(&PushEvent::ClientTokenReceived {
        token: "rid-7".into()
    }));
}
