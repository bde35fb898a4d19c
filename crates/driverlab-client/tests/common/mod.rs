//! In-process stand-in for the DriverLab server.
//!
//! Every connection hosts a fake `calc` driver:
//! - `add {a, b}` answers `done` with the sum
//! - `stream {n}` sends `n` events, then `done`
//! - `hang` never answers
//! - `crash` makes the driver exit abnormally
//!
//! In oneshot mode the driver exits after each answer and is restarted on
//! the next `exec`. In keepalive mode a driver exit closes the socket.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;

pub const FIRST_PID: u32 = 4242;

pub struct MockServer {
    pub addr: SocketAddr,
    uris: mpsc::UnboundedReceiver<String>,
    frames: mpsc::UnboundedReceiver<Value>,
    live: Arc<AtomicUsize>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (uri_tx, uris) = mpsc::unbounded_channel();
        let (frame_tx, frames) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicUsize::new(0));

        let conn_live = live.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let uri_tx = uri_tx.clone();
                let frame_tx = frame_tx.clone();
                let live = conn_live.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, uri_tx, frame_tx, live).await;
                });
            }
        });

        Self {
            addr,
            uris,
            frames,
            live,
        }
    }

    pub fn base_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Request URI of the next accepted connection.
    pub async fn next_uri(&mut self) -> String {
        timeout(Duration::from_secs(5), self.uris.recv())
            .await
            .expect("no connection")
            .unwrap()
    }

    /// Next frame a client sent.
    pub async fn next_frame(&mut self) -> Value {
        timeout(Duration::from_secs(5), self.frames.recv())
            .await
            .expect("no frame")
            .unwrap()
    }

    /// Connections currently open.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Wait until exactly `n` connections are open.
    pub async fn until_live(&self, n: usize) {
        timeout(Duration::from_secs(5), async {
            while self.live() != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {n} live connections, have {}", self.live()));
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

type Ws = WebSocketStream<TcpStream>;
type WsResult<T> = Result<T, tokio_tungstenite::tungstenite::Error>;

async fn send(ws: &mut Ws, frame: Value) -> WsResult<()> {
    ws.send(Message::Text(frame.to_string().into())).await
}

async fn handle_connection(
    stream: TcpStream,
    uri_tx: mpsc::UnboundedSender<String>,
    frame_tx: mpsc::UnboundedSender<Value>,
    live: Arc<AtomicUsize>,
) -> WsResult<()> {
    let uri = Arc::new(Mutex::new(String::new()));
    let seen = uri.clone();
    let mut ws = tokio_tungstenite::accept_hdr_async(
        stream,
        move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            *seen.lock().unwrap() = req.uri().to_string();
            Ok(resp)
        },
    )
    .await?;

    live.fetch_add(1, Ordering::SeqCst);
    let _guard = LiveGuard(live);

    let uri = uri.lock().unwrap().clone();
    let _ = uri_tx.send(uri.clone());
    let url = Url::parse(&format!("ws://mock{uri}")).unwrap();
    let run_mode = url
        .query_pairs()
        .find(|(k, _)| k == "runMode")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| "oneshot".into());
    let keepalive = run_mode == "keepalive";
    let driver_id = url.path_segments().and_then(|s| s.last()).unwrap_or("").to_string();

    let mut pid = FIRST_PID;
    let mut running = true;

    send(&mut ws, json!({ "type": "driver.started", "pid": pid })).await?;
    send(
        &mut ws,
        json!({
            "type": "meta",
            "driverId": driver_id,
            "pid": pid,
            "runMode": run_mode,
            "meta": {
                "schemaVersion": "1",
                "info": { "name": "Calc", "version": "1.0" },
                "commands": [
                    {
                        "name": "add",
                        "params": [
                            { "name": "a", "type": "int", "required": true },
                            { "name": "b", "type": "int", "required": true }
                        ],
                        "returns": { "type": "object" }
                    },
                    { "name": "stream", "params": [{ "name": "n", "type": "int" }] },
                    { "name": "hang" },
                    { "name": "crash" }
                ]
            }
        }),
    )
    .await?;
    // Noise the client must ignore.
    ws.send(Message::Text("{ not json".to_string().into())).await?;
    ws.send(Message::Binary(vec![1u8, 2, 3].into())).await?;

    while let Some(msg) = ws.next().await {
        let Message::Text(text) = msg? else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            send(&mut ws, json!({ "type": "error", "message": "invalid JSON" })).await?;
            continue;
        };
        let _ = frame_tx.send(frame.clone());

        match frame["type"].as_str() {
            Some("exec") => {
                if !running {
                    pid += 1;
                    running = true;
                    send(
                        &mut ws,
                        json!({ "type": "driver.restarted", "pid": pid, "reason": "oneshot auto-restart" }),
                    )
                    .await?;
                }
                let data = &frame["data"];
                match frame["cmd"].as_str().unwrap_or_default() {
                    "add" => {
                        let sum = data["a"].as_i64().unwrap_or(0) + data["b"].as_i64().unwrap_or(0);
                        let done = json!({ "status": "done", "code": 0, "data": { "result": sum } });
                        send(&mut ws, json!({ "type": "stdout", "message": done })).await?;
                    }
                    "stream" => {
                        for i in 0..data["n"].as_u64().unwrap_or(1) {
                            let event = json!({ "status": "event", "data": { "i": i } });
                            send(&mut ws, json!({ "type": "stdout", "message": event })).await?;
                        }
                        let done = json!({ "status": "done", "code": 0, "data": {} });
                        send(&mut ws, json!({ "type": "stdout", "message": done })).await?;
                    }
                    "hang" => continue,
                    "crash" => {
                        running = false;
                        send(
                            &mut ws,
                            json!({
                                "type": "driver.exited",
                                "exitCode": 1,
                                "exitStatus": "crash",
                                "reason": "driver crashed"
                            }),
                        )
                        .await?;
                        if keepalive {
                            ws.close(None).await?;
                            break;
                        }
                        continue;
                    }
                    _ => {
                        let err = json!({ "status": "error", "code": 404, "data": { "message": "unknown command" } });
                        send(&mut ws, json!({ "type": "stdout", "message": err })).await?;
                    }
                }
                if !keepalive {
                    running = false;
                    send(
                        &mut ws,
                        json!({
                            "type": "driver.exited",
                            "exitCode": 0,
                            "exitStatus": "normal",
                            "reason": "driver exited normally"
                        }),
                    )
                    .await?;
                }
            }
            Some("cancel") => {}
            other => {
                let message = format!("unknown message type: {}", other.unwrap_or_default());
                send(&mut ws, json!({ "type": "error", "message": message })).await?;
            }
        }
    }

    Ok(())
}
