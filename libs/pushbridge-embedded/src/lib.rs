//! Embedded/IoT gateway binding.
//!
//! Devices talk to a local gateway daemon through a [`GatewayLink`];
//! server-side operations (device listing, directed sends, channel
//! broadcasts) go through [`EmbeddedRestApi`] over the shared reliable
//! dispatcher. Each connected client runs its gateway link on a
//! dedicated background task; see [`gateway`].

pub mod client;
pub mod gateway;
pub mod provider;
pub mod rest;

pub use client::EmbeddedClient;
pub use gateway::{GatewayEvent, GatewayLink, GatewayRegistration};
pub use provider::EmbeddedProvider;
pub use rest::EmbeddedRestApi;
