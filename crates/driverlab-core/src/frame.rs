//! Protocol frames.
//!
//! Every frame is one JSON object with a `type` discriminator. Clients send
//! [`ClientFrame`]s; the server sends frames decoded into [`InboundFrame`].
//! Inbound decoding never fails loudly: payloads that are not objects or
//! lack a string `type` yield `None` and are expected to be dropped. A frame
//! with a known `type` but wrongly typed fields still decodes; the fields
//! that could not be read are left empty.

use crate::DriverMeta;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Frames sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Run a driver command.
    Exec { cmd: String, data: Value },
    /// Abort the running command (best effort).
    Cancel,
}

impl ClientFrame {
    pub fn exec(cmd: impl Into<String>, data: Value) -> Self {
        ClientFrame::Exec {
            cmd: cmd.into(),
            data,
        }
    }

    /// The discriminator as written on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::Exec { .. } => "exec",
            ClientFrame::Cancel => "cancel",
        }
    }

    /// The body without the envelope, as shown in a message log.
    pub fn payload(&self) -> Value {
        match self {
            ClientFrame::Exec { cmd, data } => {
                serde_json::json!({ "cmd": cmd, "data": data })
            }
            ClientFrame::Cancel => Value::Null,
        }
    }
}

/// Frames sent from server to client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// The driver process is up.
    DriverStarted { pid: Option<u32> },
    /// A oneshot driver was relaunched for the next command.
    DriverRestarted {
        pid: Option<u32>,
        reason: Option<String>,
    },
    /// The driver's self-description.
    Meta(MetaFrame),
    /// One line of driver output.
    Stdout { message: Value },
    /// The driver process ended.
    DriverExited(ExitInfo),
    /// An application-level error; the transport stays up.
    Error { message: Option<String> },
    /// A frame with a discriminator this client does not know.
    Unknown(String),
}

/// Body of a `meta` frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetaFrame {
    pub driver_id: Option<String>,
    pub pid: Option<u32>,
    pub run_mode: Option<String>,
    /// `None` when the server relayed `"meta": null`.
    #[serde(skip)]
    pub meta: Option<DriverMeta>,
}

/// Body of a `driver.exited` frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExitInfo {
    pub exit_code: Option<i32>,
    pub exit_status: Option<ExitStatus>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitStatus {
    Normal,
    Crash,
    #[serde(other)]
    Unknown,
}

/// Status of a driver response carried in `stdout.message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStatus {
    /// Intermediate output; more follows.
    Event,
    Done,
    Error,
    Other(String),
}

impl ResponseStatus {
    /// Read the status of a driver response. Bare text lines have none.
    pub fn of(message: &Value) -> Option<Self> {
        let status = message.get("status")?.as_str()?;
        Some(match status {
            "event" => ResponseStatus::Event,
            "done" => ResponseStatus::Done,
            "error" => ResponseStatus::Error,
            other => ResponseStatus::Other(other.to_string()),
        })
    }

    /// `done` and `error` end a command.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResponseStatus::Done | ResponseStatus::Error)
    }
}

/// A decoded server frame together with the object it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    kind: String,
    raw: Map<String, Value>,
    message: ServerMessage,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ProcessFields {
    #[serde(alias = "processId")]
    pid: Option<u32>,
    reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct StdoutFields {
    message: Value,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorFields {
    message: Option<String>,
}

impl InboundFrame {
    /// Decode one text payload.
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str::<Value>(text)
            .ok()
            .and_then(Self::from_value)
    }

    /// Decode an already parsed JSON value.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(raw) = value else {
            return None;
        };
        let kind = raw.get("type")?.as_str()?.to_string();

        let message = match kind.as_str() {
            "driver.started" => {
                let f: ProcessFields = fields(&raw);
                ServerMessage::DriverStarted { pid: f.pid }
            }
            "driver.restarted" => {
                let f: ProcessFields = fields(&raw);
                ServerMessage::DriverRestarted {
                    pid: f.pid,
                    reason: f.reason,
                }
            }
            "meta" => {
                let mut frame: MetaFrame = fields(&raw);
                frame.meta = match meta_body(&raw) {
                    Value::Null => None,
                    body => serde_json::from_value(body).ok(),
                };
                ServerMessage::Meta(frame)
            }
            "stdout" => {
                let f: StdoutFields = fields(&raw);
                ServerMessage::Stdout { message: f.message }
            }
            "driver.exited" => ServerMessage::DriverExited(fields(&raw)),
            "error" => {
                let f: ErrorFields = fields(&raw);
                ServerMessage::Error { message: f.message }
            }
            _ => ServerMessage::Unknown(kind.clone()),
        };

        Some(Self { kind, raw, message })
    }

    /// The `type` discriminator.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &ServerMessage {
        &self.message
    }

    /// The frame exactly as received.
    pub fn raw(&self) -> Value {
        Value::Object(self.raw.clone())
    }

    /// The semantically relevant part of the frame.
    ///
    /// `stdout` and `error` yield their nested `message`, `meta` its
    /// metadata document; every other frame is returned whole.
    pub fn payload(&self) -> Value {
        match self.message {
            ServerMessage::Stdout { .. } | ServerMessage::Error { .. } => {
                self.raw.get("message").cloned().unwrap_or(Value::Null)
            }
            ServerMessage::Meta(_) => meta_body(&self.raw),
            _ => self.raw(),
        }
    }

    pub fn into_message(self) -> ServerMessage {
        self.message
    }
}

/// Read the typed fields of a frame, falling back to each field on its own
/// and then to the default when the whole object does not fit.
fn fields<T: DeserializeOwned + Default>(raw: &Map<String, Value>) -> T {
    if let Ok(all) = serde_json::from_value(Value::Object(raw.clone())) {
        return all;
    }
    let mut usable = Map::new();
    for (key, value) in raw {
        let mut one = Map::new();
        one.insert(key.clone(), value.clone());
        if serde_json::from_value::<T>(Value::Object(one)).is_ok() {
            usable.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(Value::Object(usable)).unwrap_or_default()
}

/// The nested `meta` object, or the rest of the frame when it has none.
fn meta_body(raw: &Map<String, Value>) -> Value {
    match raw.get("meta") {
        Some(meta) => meta.clone(),
        None => {
            let mut body = raw.clone();
            body.remove("type");
            Value::Object(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: Value) -> InboundFrame {
        InboundFrame::from_value(v).expect("frame should decode")
    }

    #[test]
    fn client_frames_on_the_wire() {
        let exec = ClientFrame::exec("add", json!({ "a": 1, "b": 2 }));
        assert_eq!(
            serde_json::to_value(&exec).unwrap(),
            json!({ "type": "exec", "cmd": "add", "data": { "a": 1, "b": 2 } })
        );
        assert_eq!(
            serde_json::to_value(ClientFrame::Cancel).unwrap(),
            json!({ "type": "cancel" })
        );
        assert_eq!(exec.payload(), json!({ "cmd": "add", "data": { "a": 1, "b": 2 } }));
        assert_eq!(ClientFrame::Cancel.payload(), Value::Null);
    }

    #[test]
    fn drops_malformed_payloads() {
        assert!(InboundFrame::decode("not json").is_none());
        assert!(InboundFrame::decode("[1, 2]").is_none());
        assert!(InboundFrame::decode(r#"{"pid": 3}"#).is_none());
        assert!(InboundFrame::decode(r#"{"type": 7}"#).is_none());
    }

    #[test]
    fn mistyped_fields_are_left_empty() {
        let f = decode(json!({ "type": "driver.started", "pid": -1 }));
        assert_eq!(f.message(), &ServerMessage::DriverStarted { pid: None });

        let f = decode(json!({ "type": "driver.restarted", "pid": "x", "reason": "relaunch" }));
        assert_eq!(
            f.into_message(),
            ServerMessage::DriverRestarted {
                pid: None,
                reason: Some("relaunch".into())
            }
        );

        let f = decode(json!({ "type": "driver.exited", "exitCode": "one", "exitStatus": "crash" }));
        assert_eq!(
            f.into_message(),
            ServerMessage::DriverExited(ExitInfo {
                exit_code: None,
                exit_status: Some(ExitStatus::Crash),
                reason: None,
            })
        );

        let f = decode(json!({ "type": "error", "message": 5 }));
        assert_eq!(f.message(), &ServerMessage::Error { message: None });
        assert_eq!(f.payload(), json!(5));
    }

    #[test]
    fn mistyped_meta_document_decodes_without_catalog() {
        let body = json!({ "info": { "name": "X", "version": 2 }, "commands": [{ "name": "ping" }] });
        let f = decode(json!({ "type": "meta", "driverId": "x", "meta": body.clone() }));
        assert_eq!(f.payload(), body);
        let ServerMessage::Meta(meta) = f.message() else {
            panic!("expected meta");
        };
        assert_eq!(meta.driver_id.as_deref(), Some("x"));
        assert_eq!(meta.meta, None);
    }

    #[test]
    fn process_frames() {
        let f = decode(json!({ "type": "driver.started", "pid": 1234 }));
        assert_eq!(f.message(), &ServerMessage::DriverStarted { pid: Some(1234) });
        assert_eq!(f.payload(), json!({ "type": "driver.started", "pid": 1234 }));

        let f = decode(json!({ "type": "driver.restarted", "processId": 9, "reason": "oneshot auto-restart" }));
        assert_eq!(
            f.into_message(),
            ServerMessage::DriverRestarted {
                pid: Some(9),
                reason: Some("oneshot auto-restart".into())
            }
        );
    }

    #[test]
    fn stdout_payload_is_the_driver_response() {
        let f = decode(json!({
            "type": "stdout",
            "message": { "status": "done", "code": 0, "data": { "ok": 42 } }
        }));
        assert_eq!(f.payload(), json!({ "status": "done", "code": 0, "data": { "ok": 42 } }));
        let ServerMessage::Stdout { message } = f.message() else {
            panic!("expected stdout");
        };
        assert_eq!(ResponseStatus::of(message), Some(ResponseStatus::Done));
    }

    #[test]
    fn response_status_terminality() {
        assert!(ResponseStatus::of(&json!({ "status": "error" })).unwrap().is_terminal());
        assert!(!ResponseStatus::of(&json!({ "status": "event" })).unwrap().is_terminal());
        assert!(!ResponseStatus::of(&json!({ "status": "weird" })).unwrap().is_terminal());
        assert_eq!(ResponseStatus::of(&json!("plain text line")), None);
    }

    #[test]
    fn meta_payload_is_the_document() {
        let f = decode(json!({
            "type": "meta",
            "driverId": "calc",
            "pid": 77,
            "runMode": "oneshot",
            "meta": { "schemaVersion": "1", "commands": [{ "name": "add" }] }
        }));
        assert_eq!(f.payload(), json!({ "schemaVersion": "1", "commands": [{ "name": "add" }] }));
        let ServerMessage::Meta(meta) = f.message() else {
            panic!("expected meta");
        };
        assert_eq!(meta.driver_id.as_deref(), Some("calc"));
        assert_eq!(meta.meta.as_ref().unwrap().commands[0].name, "add");
    }

    #[test]
    fn meta_without_nested_document() {
        let f = decode(json!({ "type": "meta", "commands": [{ "name": "ping" }] }));
        assert_eq!(f.payload(), json!({ "commands": [{ "name": "ping" }] }));
        let ServerMessage::Meta(meta) = f.message() else {
            panic!("expected meta");
        };
        assert_eq!(meta.meta.as_ref().unwrap().commands.len(), 1);
    }

    #[test]
    fn null_meta_is_kept_as_none() {
        let f = decode(json!({ "type": "meta", "meta": null }));
        assert_eq!(f.message(), &ServerMessage::Meta(MetaFrame::default()));
    }

    #[test]
    fn exited_and_error_frames() {
        let f = decode(json!({
            "type": "driver.exited", "exitCode": 1, "exitStatus": "crash", "reason": "driver crashed"
        }));
        assert_eq!(
            f.into_message(),
            ServerMessage::DriverExited(ExitInfo {
                exit_code: Some(1),
                exit_status: Some(ExitStatus::Crash),
                reason: Some("driver crashed".into()),
            })
        );

        let f = decode(json!({ "type": "driver.exited" }));
        assert_eq!(f.into_message(), ServerMessage::DriverExited(ExitInfo::default()));

        let f = decode(json!({ "type": "error", "message": "meta query timeout" }));
        assert_eq!(f.payload(), json!("meta query timeout"));
        assert_eq!(
            f.into_message(),
            ServerMessage::Error { message: Some("meta query timeout".into()) }
        );
    }

    #[test]
    fn unknown_kinds_still_decode() {
        let f = decode(json!({ "type": "driver.paused", "x": 1 }));
        assert_eq!(f.kind(), "driver.paused");
        assert_eq!(f.message(), &ServerMessage::Unknown("driver.paused".into()));
    }
}
