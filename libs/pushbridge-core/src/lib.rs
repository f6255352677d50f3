//! Pushbridge core: a uniform facade over cloud push-messaging backends.
//!
//! The crate has three layers:
//! - [`CloudMessaging`], the provider registry the application talks to;
//! - the capability contracts ([`PushProvider`], [`PushClient`]) concrete
//!   backend bindings implement, with the shared client registry and
//!   lifecycle bookkeeping in [`ProviderCore`]/[`ClientCore`];
//! - the [`rest`] module: an ordered retry queue and a reliable request
//!   dispatcher that deliver REST calls across offline windows and
//!   transient failures.
//!
//! Backend bindings (FCM, embedded gateways) live in their own crates and
//! plug in through the contracts.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod messaging;
pub mod provider;
pub mod rest;

pub use client::{ClientCore, ClientState, ParamMap, PushClient};
pub use config::DispatcherConfig;
pub use error::{PushError, Result};
pub use events::{EventReceiver, EventSink, PushEvent};
pub use messaging::CloudMessaging;
pub use provider::{ProviderCore, PushProvider, ServiceState};
pub use rest::{
    HttpTransport, RequestContext, RequestDispatcher, RequestTarget, RequestTransport,
    RestResponse, Verb,
};
