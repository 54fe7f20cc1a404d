//! IPC control surface
//!
//! A Unix-socket command channel for operators: ping for liveness, status
//! for a lifecycle snapshot, quit to stop the data path. The protocol is
//! length-prefixed JSON.

mod handler;
mod protocol;
mod server;

pub use handler::IpcHandler;
pub use protocol::{
    decode_message, encode_message, ErrorCode, IpcCommand, IpcResponse, StatusInfo,
    LENGTH_PREFIX_SIZE, MAX_MESSAGE_SIZE,
};
pub use server::{IpcClient, IpcServer};
