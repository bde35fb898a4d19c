//! Session controller.
//!
//! ```text
//! disconnected/error/any --connect--> connecting
//! connecting --opened--> connected
//! connecting|connected --transport error--> error
//! any --closed--> disconnected
//! connected --driver.exited (keepalive)--> disconnected
//! any --disconnect--> disconnected
//! ```
//!
//! All inputs are serialized through `&mut self`: the public operations
//! and the transport events pulled from the controller's queue by
//! [`SessionController::next_event`] or [`SessionController::drain_events`].

use chrono::Utc;
use driverlab_core::{ClientFrame, ConnectParams, InboundFrame, ResponseStatus, ServerMessage};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::catalog::CommandCatalog;
use crate::config::{OverlapPolicy, SessionConfig};
use crate::connection::{Connection, DRIVER_ERROR};
use crate::log::{MessageEntry, MessageLog};
use crate::transport::{Connector, EventSink, SessionEvent, Transport, TransportEvent};

/// What happened to an `exec` or `cancel` request.
///
/// Only informational; none of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent,
    /// No transport to send on.
    NoTransport,
    /// The transport is not connected yet, or any more.
    NotConnected,
    /// A command is in flight and the overlap policy is `reject`.
    Busy,
}

impl Dispatch {
    pub fn is_sent(&self) -> bool {
        matches!(self, Dispatch::Sent)
    }
}

/// A transport event after the controller applied it.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Opened,
    /// A frame arrived; this is the entry it was logged as.
    Frame(MessageEntry),
    TransportError(String),
    Closed,
}

/// Drives one driver session at a time.
pub struct SessionController<C: Connector> {
    connector: C,
    config: SessionConfig,
    connection: Connection,
    catalog: CommandCatalog,
    log: MessageLog,
    executing: bool,
    transport: Option<C::Transport>,
    /// Generation of the live transport, if any.
    live: Option<u64>,
    generation: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<C: Connector> SessionController<C> {
    /// Create an idle controller. `config` is used as given; call
    /// [`SessionConfig::validate`] first to reject bad settings. A
    /// `log_capacity` of zero is raised to one.
    pub fn new(connector: C, config: SessionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            log: MessageLog::new(config.log_capacity),
            config,
            connection: Connection::default(),
            catalog: CommandCatalog::new(),
            executing: false,
            transport: None,
            live: None,
            generation: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn catalog(&self) -> &CommandCatalog {
        &self.catalog
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether a command is in flight.
    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Open a session, superseding any current one.
    ///
    /// The previous transport is closed before the new one is opened, and
    /// the log, catalog and execution flag start empty.
    pub fn connect(&mut self, params: ConnectParams) {
        self.close_transport();

        self.generation += 1;
        self.connection = Connection::connecting(&params);
        self.log.clear();
        self.catalog.clear();
        self.executing = false;

        tracing::debug!(
            "connecting to {} ({}), generation {}",
            params.target,
            params.run_mode,
            self.generation
        );
        let sink = EventSink::new(self.generation, self.events_tx.clone());
        self.transport = Some(self.connector.open(&params, sink));
        self.live = Some(self.generation);
    }

    /// Run `command` with `params` on the driver.
    ///
    /// Requires a connected transport. The result arrives later as
    /// `stdout` frames; the execution flag stays set until a terminal one.
    pub fn exec(&mut self, command: impl Into<String>, params: Value) -> Dispatch {
        let Some(transport) = self.transport.as_mut() else {
            return Dispatch::NoTransport;
        };
        if !self.connection.status().is_connected() {
            return Dispatch::NotConnected;
        }
        if self.executing {
            if self.config.overlap == OverlapPolicy::Reject {
                return Dispatch::Busy;
            }
            tracing::debug!("exec while a command is still in flight");
        }

        let frame = ClientFrame::exec(command, params);
        transport.send(&frame);
        self.log.append(MessageEntry::sent(&frame));
        self.executing = true;
        Dispatch::Sent
    }

    /// Ask the driver to stop the running command.
    ///
    /// Releases the execution flag immediately; the driver may still send
    /// output for the cancelled command. Like `exec`, nothing is sent or
    /// logged unless the transport is connected.
    pub fn cancel(&mut self) -> Dispatch {
        self.executing = false;
        let Some(transport) = self.transport.as_mut() else {
            return Dispatch::NoTransport;
        };
        if !self.connection.status().is_connected() {
            return Dispatch::NotConnected;
        }
        let frame = ClientFrame::Cancel;
        transport.send(&frame);
        self.log.append(MessageEntry::sent(&frame));
        Dispatch::Sent
    }

    /// Close the session. Nothing reconnects afterwards.
    pub fn disconnect(&mut self) {
        self.close_transport();
        self.update(Connection::disconnected);
        self.executing = false;
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Apply one transport event. Events from a superseded transport are
    /// discarded and yield `None`.
    pub fn handle(&mut self, event: SessionEvent) -> Option<Applied> {
        if self.live != Some(event.generation) {
            tracing::trace!("dropping event from stale transport {}", event.generation);
            return None;
        }

        let applied = match event.event {
            TransportEvent::Opened => {
                self.update(|c| c.opened(Utc::now()));
                Applied::Opened
            }
            TransportEvent::Frame(frame) => Applied::Frame(self.on_frame(frame)),
            TransportEvent::Error(detail) => {
                tracing::warn!("transport error: {}", detail);
                self.update(Connection::transport_failed);
                self.executing = false;
                Applied::TransportError(detail)
            }
            TransportEvent::Closed => {
                tracing::debug!("transport closed");
                self.update(Connection::closed);
                self.executing = false;
                self.transport = None;
                self.live = None;
                Applied::Closed
            }
        };
        Some(applied)
    }

    /// Wait for the next event of the live transport and apply it.
    ///
    /// Returns `None` once there is no live transport left to hear from.
    pub async fn next_event(&mut self) -> Option<Applied> {
        loop {
            let event = if self.live.is_some() {
                self.events_rx.recv().await?
            } else {
                self.events_rx.try_recv().ok()?
            };
            if let Some(applied) = self.handle(event) {
                return Some(applied);
            }
        }
    }

    /// Apply every event already queued, without waiting.
    pub fn drain_events(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            applied.extend(self.handle(event));
        }
        applied
    }

    fn on_frame(&mut self, frame: InboundFrame) -> MessageEntry {
        let entry = MessageEntry::received(&frame);
        self.log.append(entry.clone());

        match frame.into_message() {
            ServerMessage::DriverStarted { pid } | ServerMessage::DriverRestarted { pid, .. } => {
                self.update(|c| c.process_started(pid));
            }
            ServerMessage::Meta(meta) => {
                self.catalog.replace(meta.meta.as_ref());
                self.update(|c| c.catalog_received(meta.meta));
            }
            ServerMessage::Stdout { message } => {
                if ResponseStatus::of(&message).is_some_and(|s| s.is_terminal()) {
                    self.executing = false;
                }
            }
            ServerMessage::DriverExited(exit) => {
                tracing::debug!(
                    "driver exited (code {:?}, {:?})",
                    exit.exit_code,
                    exit.exit_status
                );
                self.update(Connection::process_exited);
                self.executing = false;
            }
            ServerMessage::Error { message } => {
                let message = message.unwrap_or_else(|| DRIVER_ERROR.to_string());
                self.update(|c| c.app_error(message));
            }
            ServerMessage::Unknown(kind) => {
                tracing::trace!("unhandled frame type {}", kind);
            }
        }
        entry
    }

    fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.live = None;
    }

    fn update(&mut self, step: impl FnOnce(Connection) -> Connection) {
        self.connection = step(std::mem::take(&mut self.connection));
    }
}
