//! Client-side session engine for DriverLab.
//!
//! A [`SessionController`] owns at most one transport to a driver hosted by
//! the server, rebuilds the driver's lifecycle and command catalog from the
//! frames it receives, and records every frame in a bounded
//! [`MessageLog`].
//!
//! ```ignore
//! use driverlab_client::{Applied, SessionConfig, SessionController, WsConnector};
//! use driverlab_core::{ConnectParams, RunMode};
//!
//! let connector = WsConnector::new("ws://127.0.0.1:6200")?;
//! let mut session = SessionController::new(connector, SessionConfig::default());
//! session.connect(ConnectParams::new("calc".parse()?, RunMode::Oneshot));
//!
//! while let Some(applied) = session.next_event().await {
//!     match applied {
//!         Applied::Opened => {
//!             session.exec("add", serde_json::json!({ "a": 1, "b": 2 }));
//!         }
//!         Applied::Frame(entry) => println!("{} {}", entry.kind, entry.payload),
//!         _ => {}
//!     }
//! }
//! ```

mod catalog;
mod config;
mod connection;
mod log;
mod session;
mod transport;
mod ws;

pub use catalog::CommandCatalog;
pub use config::{ConfigError, OverlapPolicy, SessionConfig};
pub use connection::{Connection, DRIVER_ERROR, TRANSPORT_ERROR};
pub use log::{DEFAULT_CAPACITY, Direction, EntryId, MAX_CAPACITY, MessageEntry, MessageLog};
pub use session::{Applied, Dispatch, SessionController};
pub use transport::{Connector, EventSink, SessionEvent, Transport, TransportEvent};
pub use ws::{ConnectorError, WsConnector, WsTransport};
