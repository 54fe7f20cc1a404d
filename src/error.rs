//! Error types for wg-bridge
//!
//! This module defines the error hierarchy for the tunnel bridge.
//! All errors are categorized by subsystem and include recovery hints.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Top-level error type for wg-bridge
#[derive(Debug, Error)]
pub enum WgBridgeError {
    /// Configuration errors (file parsing, validation)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport socket errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Virtual-interface bridge errors
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Tunnel engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// IPC communication errors
    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    /// I/O errors not covered by other categories
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WgBridgeError {
    /// Check if this error is recoverable (can retry operation)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Transport(e) => e.is_recoverable(),
            Self::Bridge(e) => e.is_recoverable(),
            Self::Engine(e) => e.is_recoverable(),
            Self::Ipc(e) => e.is_recoverable(),
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
            ),
        }
    }
}

/// Transport socket errors
///
/// Socket creation and bind failures are fatal to startup; the pipeline
/// does not retry them. A closed socket is a normal termination reason for
/// the receive loop, not a failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to create the datagram socket
    #[error("Failed to create UDP socket: {0}")]
    SocketCreation(#[source] io::Error),

    /// Failed to bind to address
    #[error("Failed to bind UDP socket to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Socket has been closed (or was never bound)
    #[error("Transport endpoint is closed")]
    Closed,

    /// Receive-side I/O error
    #[error("Transport I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl TransportError {
    /// Check if this error is recoverable
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::SocketCreation(_) | Self::Bind { .. } | Self::Closed => false,
            Self::IoError(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
        }
    }

    /// Create a bind error
    pub fn bind(addr: SocketAddr, source: io::Error) -> Self {
        Self::Bind { addr, source }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found or inaccessible
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Validation error (invalid values, missing required fields)
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// Environment variable error
    #[error("Environment variable error: {name}: {reason}")]
    EnvError { name: String, reason: String },

    /// I/O error while reading config
    #[error("I/O error reading configuration: {0}")]
    IoError(#[from] io::Error),
}

impl ConfigError {
    /// Config errors are not recoverable without user intervention
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        false
    }
}

/// Virtual-interface bridge errors
///
/// These are per-packet: the offending packet is dropped and the pipeline
/// keeps running.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The tunnel device has no attached physical-link interface
    #[error("Virtual interface is not attached to a physical link")]
    NotAttached,

    /// Outbound packet is too short to carry an IPv4 header
    #[error("Packet too short for an IPv4 header: {len} bytes")]
    Truncated { len: usize },
}

impl BridgeError {
    /// Check if this error is recoverable
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        true
    }
}

/// Tunnel engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Key decode failure (invalid base64 or wrong length)
    #[error("Key error: {0}")]
    Key(String),

    /// Invalid engine configuration
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// The transport endpoint is not available for sending
    #[error("Engine has no transport endpoint to send through")]
    NotReady,

    /// Protocol-level failure reported by the tunnel implementation
    #[error("Tunnel protocol error: {0}")]
    Protocol(String),

    /// I/O error during transmit
    #[error("Engine I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl EngineError {
    /// Check if this error is recoverable
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Key(_) | Self::InvalidConfig(_) => false,
            Self::NotReady | Self::Protocol(_) => true,
            Self::IoError(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
            ),
        }
    }
}

/// IPC communication errors
#[derive(Debug, Error)]
pub enum IpcError {
    /// Failed to create Unix socket
    #[error("Failed to create IPC socket at {path}: {reason}")]
    SocketCreation { path: String, reason: String },

    /// Failed to bind Unix socket
    #[error("Failed to bind IPC socket to {path}: {reason}")]
    BindError { path: String, reason: String },

    /// Connection error
    #[error("IPC connection error: {0}")]
    ConnectionError(String),

    /// Protocol error (invalid message format)
    #[error("IPC protocol error: {0}")]
    ProtocolError(String),

    /// Serialization error
    #[error("IPC serialization error: {0}")]
    SerializationError(String),

    /// I/O error
    #[error("IPC I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl IpcError {
    /// Check if this error is recoverable
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::SocketCreation { .. } | Self::BindError { .. } => false,
            Self::ConnectionError(_) | Self::ProtocolError(_) => true,
            Self::SerializationError(_) => false,
            Self::IoError(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
            ),
        }
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolError(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }
}

/// Type alias for Result with `WgBridgeError`
pub type Result<T> = std::result::Result<T, WgBridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_recovery_classification() {
        let config_err = ConfigError::ValidationError("test".into());
        assert!(!config_err.is_recoverable());

        let bind_err = TransportError::bind(
            "0.0.0.0:52840".parse().unwrap(),
            io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        );
        assert!(!bind_err.is_recoverable());

        // Per-packet bridge errors never escalate
        assert!(BridgeError::NotAttached.is_recoverable());

        let key_err = EngineError::Key("bad base64".into());
        assert!(!key_err.is_recoverable());

        assert!(EngineError::NotReady.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::NotAttached;
        assert!(err.to_string().contains("not attached"));

        let err = TransportError::bind(
            "0.0.0.0:52840".parse().unwrap(),
            io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        );
        let msg = err.to_string();
        assert!(msg.contains("0.0.0.0:52840"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::TimedOut, "timeout");
        let bridge_err: WgBridgeError = io_err.into();
        assert!(bridge_err.is_recoverable());

        let config_err = ConfigError::ValidationError("invalid".into());
        let bridge_err: WgBridgeError = config_err.into();
        assert!(!bridge_err.is_recoverable());
    }
}
