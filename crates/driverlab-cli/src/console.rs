//! The interactive loop.
//!
//! Reads one command per stdin line while applying session events as they
//! arrive. Received frames are echoed to stdout as JSON lines; diagnostics
//! go through `tracing` on stderr.

use std::io::Write;
use std::str::FromStr;

use driverlab_client::{Applied, Connector, Dispatch, SessionController, WsConnector};
use driverlab_core::ConnectParams;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Exec { name: String, params: Value },
    Cancel,
    Disconnect,
    Reconnect,
    Clear,
    Commands,
    Status,
    Log(usize),
    Help,
    Quit,
}

const DEFAULT_LOG_LINES: usize = 20;

const HELP: &str = "\
commands:
  exec <command> [json-object]   run a driver command
  cancel                         cancel the running command
  commands                       list the driver's commands
  status                         show the connection
  log [n]                        show the last n log entries
  clear                          clear the log
  disconnect | reconnect
  quit";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: {0} (try 'help')")]
    Unknown(String),
    #[error("usage: exec <command> [json-object]")]
    MissingName,
    #[error("params must be a JSON object: {0}")]
    BadParams(String),
    #[error("usage: log [n]")]
    BadCount,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map(|(w, r)| (w, r.trim()))
            .unwrap_or((line, ""));

        match word {
            "exec" => {
                let (name, params) = rest
                    .split_once(char::is_whitespace)
                    .map(|(n, p)| (n, p.trim()))
                    .unwrap_or((rest, ""));
                if name.is_empty() {
                    return Err(CommandError::MissingName);
                }
                Ok(Command::Exec {
                    name: name.to_string(),
                    params: parse_params(params)?,
                })
            }
            "cancel" => Ok(Command::Cancel),
            "disconnect" => Ok(Command::Disconnect),
            "reconnect" => Ok(Command::Reconnect),
            "clear" => Ok(Command::Clear),
            "commands" => Ok(Command::Commands),
            "status" => Ok(Command::Status),
            "log" if rest.is_empty() => Ok(Command::Log(DEFAULT_LOG_LINES)),
            "log" => rest.parse().map(Command::Log).map_err(|_| CommandError::BadCount),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_params(text: &str) -> Result<Value, CommandError> {
    if text.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(CommandError::BadParams(format!("got {other}"))),
        Err(e) => Err(CommandError::BadParams(e.to_string())),
    }
}

/// Whether the loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Carry out one console command.
pub fn execute<C: Connector>(
    session: &mut SessionController<C>,
    params: &ConnectParams,
    command: Command,
    out: &mut impl Write,
) -> std::io::Result<Flow> {
    match command {
        Command::Exec { name, params } => report(out, "exec", session.exec(name, params))?,
        Command::Cancel => report(out, "cancel", session.cancel())?,
        Command::Disconnect => session.disconnect(),
        Command::Reconnect => session.connect(params.clone()),
        Command::Clear => session.clear_log(),
        Command::Commands => {
            for cmd in session.catalog().list() {
                match &cmd.description {
                    Some(desc) => writeln!(out, "{:<24} {}", cmd.name, desc)?,
                    None => writeln!(out, "{}", cmd.name)?,
                }
            }
        }
        Command::Status => {
            let status = serde_json::json!({
                "connection": session.connection(),
                "executing": session.is_executing(),
                "logged": session.log().len(),
            });
            writeln!(out, "{status}")?;
        }
        Command::Log(n) => {
            for entry in session.log().tail(n) {
                writeln!(out, "{}", serde_json::to_string(entry)?)?;
            }
        }
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => {
            session.disconnect();
            return Ok(Flow::Quit);
        }
    }
    Ok(Flow::Continue)
}

fn report(out: &mut impl Write, what: &str, dispatch: Dispatch) -> std::io::Result<()> {
    let reason = match dispatch {
        Dispatch::Sent => return Ok(()),
        Dispatch::NoTransport => "no session (try 'reconnect')",
        Dispatch::NotConnected => "not connected",
        Dispatch::Busy => "a command is still running (try 'cancel')",
    };
    writeln!(out, "{what} not sent: {reason}")
}

/// Run the console until `quit` or end of input.
pub async fn run(config: Config, params: ConnectParams) -> anyhow::Result<()> {
    let connector = WsConnector::new(&config.server)?;
    let mut session = SessionController::new(connector, config.session);
    tracing::info!("Connecting to {} on {}", params.target, config.server);
    session.connect(params.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut live = true;

    let mut out = std::io::stdout();

    loop {
        tokio::select! {
            applied = session.next_event(), if live => match applied {
                Some(Applied::Opened) => tracing::info!("Connected"),
                Some(Applied::Frame(entry)) => writeln!(out, "{}", serde_json::to_string(&entry)?)?,
                // Already logged by the session.
                Some(Applied::TransportError(_)) => {}
                Some(Applied::Closed) | None => {
                    tracing::info!("Session closed");
                    live = false;
                }
            },

            line = lines.next_line() => {
                let Some(line) = line? else {
                    session.disconnect();
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<Command>() {
                    Ok(command) => command,
                    Err(e) => {
                        writeln!(out, "{e}")?;
                        continue;
                    }
                };
                let reconnecting = command == Command::Reconnect;
                if execute(&mut session, &params, command, &mut out)? == Flow::Quit {
                    break;
                }
                if reconnecting {
                    live = true;
                }
            }
        }
    }

    Ok(())
}
