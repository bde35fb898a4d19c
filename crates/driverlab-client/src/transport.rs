//! Transport seam.
//!
//! A [`Connector`] opens one [`Transport`] per `connect`. The transport
//! reports its lifecycle by pushing [`TransportEvent`]s into an
//! [`EventSink`]; the controller consumes them from a single queue, one at
//! a time. Each sink is stamped with the generation of the connect that
//! created it so events from a superseded transport can be recognised.
//!
//! When the last clone of a sink is dropped without having reported
//! `Closed`, it reports `Closed` itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use driverlab_core::{ClientFrame, ConnectParams, InboundFrame};
use tokio::sync::mpsc;

/// Lifecycle of one transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Frame(InboundFrame),
    /// The transport failed; the detail is for diagnostics only.
    Error(String),
    Closed,
}

/// A [`TransportEvent`] tagged with the generation of its transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

/// Where a transport reports its events.
#[derive(Debug, Clone)]
pub struct EventSink {
    inner: Arc<SinkInner>,
}

#[derive(Debug)]
struct SinkInner {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
    closed: AtomicBool,
}

impl SinkInner {
    fn send(&self, event: TransportEvent) -> bool {
        if matches!(event, TransportEvent::Closed) {
            self.closed.store(true, Ordering::Release);
        }
        self.tx
            .send(SessionEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

impl Drop for SinkInner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            self.send(TransportEvent::Closed);
        }
    }
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                generation,
                tx,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    /// Returns `false` once the controller is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.inner.send(event)
    }

    pub fn opened(&self) -> bool {
        self.emit(TransportEvent::Opened)
    }

    pub fn frame(&self, frame: InboundFrame) -> bool {
        self.emit(TransportEvent::Frame(frame))
    }

    pub fn error(&self, detail: impl Into<String>) -> bool {
        self.emit(TransportEvent::Error(detail.into()))
    }

    pub fn closed(&self) -> bool {
        self.emit(TransportEvent::Closed)
    }
}

/// One duplex connection to a driver endpoint.
pub trait Transport {
    /// Send a frame. Does nothing unless the transport is open.
    fn send(&mut self, frame: &ClientFrame);

    /// Begin closing. A `Closed` event follows unless one was already sent.
    fn close(&mut self);
}

/// Opens transports.
pub trait Connector {
    type Transport: Transport;

    /// Start opening a transport for `params`. Must not block; the outcome
    /// is reported through `events`, which should end with `Closed`.
    /// Dropping every clone of `events` counts as `Closed`.
    fn open(&mut self, params: &ConnectParams, events: EventSink) -> Self::Transport;
}
