//! IPC protocol definitions
//!
//! Command and response types exchanged with the control client over the
//! Unix socket. Messages are length-prefixed JSON: a 4-byte big-endian
//! length followed by the serialized message.

use serde::{Deserialize, Serialize};

/// Hard cap on a single IPC message.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Commands accepted by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcCommand {
    /// Check whether the bridge is alive.
    Ping,

    /// Query lifecycle phase, connectivity, and traffic totals.
    Status,

    /// Request shutdown of the data path.
    Quit,
}

/// Responses sent back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Ping response.
    Pong,

    /// Status response.
    Status(StatusInfo),

    /// Success response for commands that return no data.
    Success {
        /// Optional message
        message: Option<String>,
    },

    /// Error response.
    Error {
        /// Error code
        code: ErrorCode,
        /// Error message
        message: String,
    },
}

impl IpcResponse {
    /// Create a success response with no message.
    pub fn success() -> Self {
        Self::Success { message: None }
    }

    /// Create a success response with a message.
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success {
            message: Some(msg.into()),
        }
    }

    /// Create an error response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// Check if this is an error response.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Bridge status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    /// Bridge version
    pub version: String,
    /// Lifecycle phase name
    pub phase: String,
    /// Whether the physical link is currently up
    pub connected: bool,
    /// Total bytes received on the tunnel socket since startup
    pub rx_bytes_total: u64,
    /// Bytes received since the last stats report
    pub rx_bytes_pending: u64,
}

/// Error codes for IPC responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Invalid command
    InvalidCommand,
    /// Invalid parameters
    InvalidParameters,
    /// Internal error
    InternalError,
}

/// Encode a message with length prefix.
pub fn encode_message<T: Serialize>(msg: &T) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(msg)?;
    let len = json.len() as u32;

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + json.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&json);

    Ok(buf)
}

/// Decode a length-prefixed message body.
pub fn decode_message<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = IpcCommand::Ping;
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"ping\""));

        let cmd = IpcCommand::Quit;
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"quit\""));
    }

    #[test]
    fn test_response_serialization() {
        let resp = IpcResponse::Pong;
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"type\":\"pong\""));

        let resp = IpcResponse::error(ErrorCode::InvalidCommand, "bad command");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("INVALID_COMMAND"));
    }

    #[test]
    fn test_status_round_trip() {
        let status = StatusInfo {
            version: "0.1.0".into(),
            phase: "running".into(),
            connected: true,
            rx_bytes_total: 123_456,
            rx_bytes_pending: 789,
        };
        let json = serde_json::to_string(&IpcResponse::Status(status)).unwrap();
        assert!(json.contains("\"type\":\"status\""));
        assert!(json.contains("\"rx_bytes_total\":123456"));

        let parsed: IpcResponse = serde_json::from_str(&json).unwrap();
        if let IpcResponse::Status(s) = parsed {
            assert_eq!(s.phase, "running");
            assert!(s.connected);
            assert_eq!(s.rx_bytes_pending, 789);
        } else {
            panic!("Expected Status response");
        }
    }

    #[test]
    fn test_encode_decode() {
        let cmd = IpcCommand::Status;
        let encoded = encode_message(&cmd).unwrap();

        // First 4 bytes are length
        let len = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;
        assert_eq!(len, encoded.len() - LENGTH_PREFIX_SIZE);

        let decoded: IpcCommand = decode_message(&encoded[LENGTH_PREFIX_SIZE..]).unwrap();
        assert!(matches!(decoded, IpcCommand::Status));
    }

    #[test]
    fn test_response_helpers() {
        assert!(!IpcResponse::success().is_error());
        assert!(!IpcResponse::success_with_message("stopping").is_error());
        assert!(IpcResponse::error(ErrorCode::InternalError, "test").is_error());
    }
}
