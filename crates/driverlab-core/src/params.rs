//! Connection parameters and endpoint URLs.
//!
//! The server exposes one WebSocket route per driver:
//! `{base}/api/driverlab/{target}?runMode={mode}&args={a,b,...}`

use crate::{RunMode, TargetId};
use serde::{Deserialize, Serialize};
use url::Url;

/// Route prefix under which the server accepts driver sessions.
pub const ROUTE: [&str; 2] = ["api", "driverlab"];

/// What a session asks the server to launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub target: TargetId,
    pub run_mode: RunMode,
    /// Extra driver arguments, in order.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ConnectParams {
    pub fn new(target: TargetId, run_mode: RunMode) -> Self {
        Self {
            target,
            run_mode,
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Build the session URL below `base`.
    ///
    /// The target is pushed as one path segment, so reserved characters
    /// (`/`, `?`, `#`, spaces) are percent-encoded. Arguments are joined with
    /// commas into a single `args` query value and omitted when empty.
    pub fn endpoint(&self, base: &Url) -> Result<Url, EndpointError> {
        let mut url = normalize_base(base)?;
        url.path_segments_mut()
            .map_err(|()| EndpointError::CannotBeABase(base.to_string()))?
            .pop_if_empty()
            .extend(ROUTE)
            .push(self.target.as_str());
        {
            let mut query = url.query_pairs_mut();
            query.clear().append_pair("runMode", self.run_mode.as_str());
            if !self.args.is_empty() {
                query.append_pair("args", &self.args.join(","));
            }
        }
        Ok(url)
    }
}

/// Map an http(s) base onto ws(s) and reject anything else.
///
/// - `http://localhost:6200` -> `ws://localhost:6200`
/// - `https://lab.example.com` -> `wss://lab.example.com`
pub fn normalize_base(base: &Url) -> Result<Url, EndpointError> {
    let scheme = match base.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
    };
    if base.cannot_be_a_base() {
        return Err(EndpointError::CannotBeABase(base.to_string()));
    }
    let mut url = base.clone();
    if url.scheme() != scheme {
        // Swapping between special schemes always succeeds.
        url.set_scheme(scheme)
            .map_err(|()| EndpointError::UnsupportedScheme(base.scheme().to_string()))?;
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Error building a session endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid endpoint url: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported endpoint scheme: {0} (expected ws, wss, http or https)")]
    UnsupportedScheme(String),
    #[error("endpoint url cannot carry a path: {0}")]
    CannotBeABase(String),
}
