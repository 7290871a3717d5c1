//! Common error types for route-registrar components.

use std::fmt;

/// A specialized Result type for route-registrar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for route-registrar operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message bus error: {0}")]
    MessageBus(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Routing API error: {0}")]
    RoutingApi(String),

    #[error("Router group '{0}' not found")]
    RouterGroupNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new message bus error.
    pub fn message_bus(msg: impl fmt::Display) -> Self {
        Error::MessageBus(msg.to_string())
    }

    /// Create a new TLS error.
    pub fn tls(msg: impl fmt::Display) -> Self {
        Error::Tls(msg.to_string())
    }

    /// Create a new token error.
    pub fn token(msg: impl fmt::Display) -> Self {
        Error::Token(msg.to_string())
    }

    /// Create a new routing API error.
    pub fn routing_api(msg: impl fmt::Display) -> Self {
        Error::RoutingApi(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_group_not_found_message() {
        let err = Error::RouterGroupNotFound("default-tcp".to_string());
        assert_eq!(err.to_string(), "Router group 'default-tcp' not found");
    }

    #[test]
    fn test_constructors_wrap_display() {
        assert_eq!(
            Error::routing_api("status 502").to_string(),
            "Routing API error: status 502"
        );
        assert!(matches!(Error::token("denied"), Error::Token(msg) if msg == "denied"));
    }

    #[test]
    fn test_transport_constructors() {
        assert!(matches!(Error::message_bus("closed"), Error::MessageBus(msg) if msg == "closed"));
        assert!(matches!(Error::tls("bad ca"), Error::Tls(msg) if msg == "bad ca"));
    }
}
