//! Per-network resource addressing relative to the coordinator's base URL.
//!
//! Addressing is pure: any network name and any path parts map to a
//! well-formed URL. Nothing is rejected, only normalized.

use std::fmt;

use reqwest::Url;

use crate::cursor::Cursor;
use crate::error::{RemoteError, RemoteResult};

/// API version prefix appended to a bare listen address.
pub const DEFAULT_API_VERSION: &str = "v1";

/// Path segment standing in for "no specific network".
pub const NO_NETWORK: &str = "_";

/// Query parameter carrying the watch cursor.
const CURSOR_PARAM: &str = "next";

/// Immutable base address of the coordinator: scheme, host, port and API
/// version prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Parse an absolute `http`/`https` base URL such as
    /// `http://10.0.0.1:8888/v1`. Query and fragment are discarded.
    pub fn new(base: &str) -> RemoteResult<Self> {
        let invalid = |reason: String| RemoteError::InvalidEndpoint {
            endpoint: base.to_owned(),
            reason,
        };
        let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(invalid("not a base url".into()));
        }
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self { base: url })
    }

    /// Base for a coordinator listening on `listen_addr` (`host:port`), using
    /// plain http and the default API version.
    pub fn from_listen_addr(listen_addr: &str) -> RemoteResult<Self> {
        Self::new(&format!("http://{listen_addr}/{DEFAULT_API_VERSION}"))
    }

    /// The base URL.
    pub fn as_url(&self) -> &Url {
        &self.base
    }

    /// Build the URL of `parts` under `network`.
    ///
    /// An empty network maps to [`NO_NETWORK`]. The network and parts are
    /// joined with path cleaning (empty and `.` segments dropped, `..` pops),
    /// and a trailing `/` on the last part is kept.
    pub fn url(&self, network: &str, parts: &[&str]) -> Url {
        let network = network_segment(network);
        let mut path = join_clean(std::iter::once(network.as_str()).chain(parts.iter().copied()));
        let trailing = parts.last().is_some_and(|p| p.ends_with('/'));
        if trailing && path != "/" {
            path.push('/');
        }

        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{path}"));
        url
    }

    /// URL of the lease watch resource, resuming from `cursor` when it holds
    /// a token.
    pub fn watch_url(&self, network: &str, cursor: &Cursor) -> Url {
        let mut url = self.url(network, &["leases"]);
        if let Some(token) = cursor.token() {
            url.query_pairs_mut().append_pair(CURSOR_PARAM, token);
        }
        url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)
    }
}

fn network_segment(network: &str) -> String {
    if network.is_empty() {
        return format!("/{NO_NETWORK}");
    }
    if network.starts_with('/') {
        network.to_owned()
    } else {
        format!("/{network}")
    }
}

/// Rooted, cleaned join of all segments. Never ends in `/` unless it is the
/// root itself.
fn join_clean<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut out: Vec<&str> = Vec::new();
    for seg in segments.flat_map(|s| s.split('/')) {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            seg => out.push(seg),
        }
    }
    format!("/{}", out.join("/"))
}
