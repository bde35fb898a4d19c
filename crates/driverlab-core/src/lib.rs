//! Core types for DriverLab sessions.
//!
//! A DriverLab session is one WebSocket between a client and a server that
//! hosts a driver process. This crate holds the vocabulary both ends agree
//! on: targets, run modes, frames and driver metadata. The session state
//! machine lives in `driverlab-client`.

mod frame;
mod meta;
mod params;
mod target;

pub use frame::{
    ClientFrame, ExitInfo, ExitStatus, InboundFrame, MetaFrame, ResponseStatus, ServerMessage,
};
pub use meta::{CommandMeta, DriverInfo, DriverMeta, EventMeta, FieldMeta, ReturnMeta};
pub use params::{ConnectParams, EndpointError, ROUTE, normalize_base};
pub use target::{RunMode, RunModeParseError, TargetId, TargetParseError};

use serde::{Deserialize, Serialize};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No transport, or the transport closed.
    #[default]
    Disconnected,
    /// Transport requested, not yet open.
    Connecting,
    /// Transport open.
    Connected,
    /// Transport failed; a new connect is needed.
    Error,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}
