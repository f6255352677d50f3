use thiserror::Error;

/// Error taxonomy below the facade.
///
/// Registry and facade operations never raise these: unknown identifiers
/// come back as neutral failure values. Errors exist where something can
/// genuinely go wrong (the HTTP exchange, configuration parsing) and
/// reach the application formatted into `TransportError` events.
#[derive(Error, Debug, Clone)]
pub enum PushError {
    /// Network transport failure (connection refused, DNS, TLS, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote endpoint answered with a non-success status
    #[error("request failed with status {0}")]
    Status(u16),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PushError>;
