//! Firebase Cloud Messaging binding (legacy HTTP API).
//!
//! Server-side sends go through [`FcmRestApi`] over the shared reliable
//! dispatcher; [`FcmProvider`] plugs the binding into the messaging
//! facade and [`FcmClient`] represents one local application endpoint
//! holding its registration token and topic subscriptions.

pub mod client;
pub mod provider;
pub mod rest;

pub use client::FcmClient;
pub use provider::FcmProvider;
pub use rest::FcmRestApi;
