//! WebSocket transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use driverlab_core::{ClientFrame, ConnectParams, EndpointError, InboundFrame, normalize_base};
use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::transport::{Connector, EventSink, Transport};

/// Error creating a [`WsConnector`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("no tokio runtime to drive the transport")]
    NoRuntime,
}

/// Opens [`WsTransport`]s against one server.
#[derive(Debug, Clone)]
pub struct WsConnector {
    base: Url,
    runtime: Handle,
}

impl WsConnector {
    /// Connector for `base` (`ws`, `wss`, `http` or `https`), driven by the
    /// current tokio runtime.
    pub fn new(base: &str) -> Result<Self, ConnectorError> {
        let base = Url::parse(base).map_err(EndpointError::from)?;
        let runtime = Handle::try_current().map_err(|_| ConnectorError::NoRuntime)?;
        Self::with_handle(&base, runtime)
    }

    pub fn with_handle(base: &Url, runtime: Handle) -> Result<Self, ConnectorError> {
        Ok(Self {
            base: normalize_base(base)?,
            runtime,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    fn open(&mut self, params: &ConnectParams, events: EventSink) -> WsTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        match params.endpoint(&self.base) {
            Ok(url) => {
                self.runtime.spawn(run(url, rx, open.clone(), events));
            }
            Err(e) => {
                tracing::warn!("cannot build endpoint for {}: {}", params.target, e);
                events.error(e.to_string());
                events.closed();
            }
        }

        WsTransport { outbound: tx, open }
    }
}

#[derive(Debug)]
enum Outbound {
    Text(String),
    Close,
}

/// Handle to one WebSocket driven by a background task.
///
/// Dropping the handle closes the socket.
#[derive(Debug)]
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
}

impl WsTransport {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Transport for WsTransport {
    fn send(&mut self, frame: &ClientFrame) {
        if !self.is_open() {
            tracing::trace!("not open, dropping {} frame", frame.kind());
            return;
        }
        match serde_json::to_string(frame) {
            Ok(text) => {
                let _ = self.outbound.send(Outbound::Text(text));
            }
            Err(e) => tracing::warn!("Failed to serialize {} frame: {}", frame.kind(), e),
        }
    }

    fn close(&mut self) {
        self.open.store(false, Ordering::Release);
        let _ = self.outbound.send(Outbound::Close);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run(
    url: Url,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    open: Arc<AtomicBool>,
    events: EventSink,
) {
    tracing::debug!("Connecting to {}", url);

    let ws = tokio::select! {
        res = tokio_tungstenite::connect_async(url.as_str()) => match res {
            Ok((ws, _response)) => ws,
            Err(e) => {
                tracing::warn!("WebSocket connect error for {}: {}", url, e);
                events.error(e.to_string());
                events.closed();
                return;
            }
        },
        // Closed (or dropped) before the handshake finished.
        _ = outbound.recv() => {
            events.closed();
            return;
        }
    };

    open.store(true, Ordering::Release);
    events.opened();
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            cmd = outbound.recv() => match cmd {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        tracing::warn!("WebSocket send error: {}", e);
                        events.error(e.to_string());
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },

            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => match InboundFrame::decode(&text) {
                    Some(frame) => {
                        if !events.frame(frame) {
                            break;
                        }
                    }
                    None => tracing::trace!("Dropping malformed frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!("WebSocket error: {}", e);
                    events.error(e.to_string());
                    break;
                }
            },
        }
    }

    open.store(false, Ordering::Release);
    events.closed();
    tracing::debug!("Connection closed: {}", url);
}
