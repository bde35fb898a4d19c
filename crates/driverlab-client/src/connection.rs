//! The live connection record.
//!
//! [`Connection`] is a plain value. Each lifecycle step consumes it and
//! returns the next value, so the controller never mutates fields in place.

use chrono::{DateTime, Utc};
use driverlab_core::{ConnectParams, ConnectionStatus, DriverMeta, RunMode, TargetId};
use serde::Serialize;

/// `last_error` after a transport failure.
pub const TRANSPORT_ERROR: &str = "transport error";

/// `last_error` for an `error` frame without a message.
pub const DRIVER_ERROR: &str = "driver error";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    status: ConnectionStatus,
    target: Option<TargetId>,
    run_mode: RunMode,
    pid: Option<u32>,
    connected_at: Option<DateTime<Utc>>,
    meta: Option<DriverMeta>,
    last_error: Option<String>,
}

impl Connection {
    /// A fresh record for a connection being opened.
    pub fn connecting(params: &ConnectParams) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            target: Some(params.target.clone()),
            run_mode: params.run_mode,
            ..Self::default()
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn target(&self) -> Option<&TargetId> {
        self.target.as_ref()
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    pub fn meta(&self) -> Option<&DriverMeta> {
        self.meta.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The transport opened. Only meaningful while connecting.
    #[must_use]
    pub fn opened(self, at: DateTime<Utc>) -> Self {
        if self.status != ConnectionStatus::Connecting {
            return self;
        }
        Self {
            status: ConnectionStatus::Connected,
            connected_at: Some(at),
            ..self
        }
    }

    #[must_use]
    pub fn transport_failed(self) -> Self {
        match self.status {
            ConnectionStatus::Connecting | ConnectionStatus::Connected => Self {
                status: ConnectionStatus::Error,
                last_error: Some(TRANSPORT_ERROR.to_string()),
                ..self
            },
            ConnectionStatus::Disconnected | ConnectionStatus::Error => self,
        }
    }

    /// The transport closed. Process and catalog fields stay as last seen.
    #[must_use]
    pub fn closed(self) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            ..self
        }
    }

    /// The caller hung up.
    #[must_use]
    pub fn disconnected(self) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            pid: None,
            connected_at: None,
            ..self
        }
    }

    #[must_use]
    pub fn process_started(self, pid: Option<u32>) -> Self {
        Self { pid, ..self }
    }

    #[must_use]
    pub fn catalog_received(self, meta: Option<DriverMeta>) -> Self {
        Self { meta, ..self }
    }

    /// The driver process ended. A keepalive session is lost with it; a
    /// oneshot session stays connected for the next command.
    #[must_use]
    pub fn process_exited(self) -> Self {
        let status = if self.run_mode.is_keepalive() {
            ConnectionStatus::Disconnected
        } else {
            self.status
        };
        Self {
            status,
            pid: None,
            ..self
        }
    }

    /// An application-level error. The status is left alone.
    #[must_use]
    pub fn app_error(self, message: impl Into<String>) -> Self {
        Self {
            last_error: Some(message.into()),
            ..self
        }
    }
}
