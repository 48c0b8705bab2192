//! Typed models and codecs for coordinator payloads.
//!
//! Field names follow the coordinator's JSON contract (`Network`, `PublicIP`,
//! `Expiration`, ...), so these records round-trip against an existing
//! server unchanged.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cursor::Cursor;
use crate::error::{RemoteError, RemoteResult};

/// Backend assumed when the network config does not name one.
pub const DEFAULT_BACKEND_TYPE: &str = "udp";

// ---------------------------------------------------------------------------
// Network config
// ---------------------------------------------------------------------------

/// Server-defined configuration of a named network.
///
/// Only `Network` is required; the rest is carried through without
/// interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Overall address range subnets are carved from.
    #[serde(rename = "Network")]
    pub network: Ipv4Net,
    /// Lowest subnet the coordinator may hand out.
    #[serde(rename = "SubnetMin", default, skip_serializing_if = "Option::is_none")]
    pub subnet_min: Option<Ipv4Addr>,
    /// Highest subnet the coordinator may hand out.
    #[serde(rename = "SubnetMax", default, skip_serializing_if = "Option::is_none")]
    pub subnet_max: Option<Ipv4Addr>,
    /// Prefix length of each leased subnet.
    #[serde(rename = "SubnetLen", default, skip_serializing_if = "Option::is_none")]
    pub subnet_len: Option<u8>,
    /// Raw backend section.
    #[serde(rename = "Backend", default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<Value>,
}

impl NetworkConfig {
    /// `Backend.Type`, or [`DEFAULT_BACKEND_TYPE`] when absent.
    pub fn backend_type(&self) -> &str {
        self.backend
            .as_ref()
            .and_then(|backend| backend.get("Type"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_BACKEND_TYPE)
    }
}

// ---------------------------------------------------------------------------
// Leases
// ---------------------------------------------------------------------------

/// Attributes a node attaches to the lease it requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseAttrs {
    /// Address other nodes use to reach this one.
    #[serde(rename = "PublicIP", default = "unspecified")]
    pub public_ip: Ipv4Addr,
    /// Backend that will carry traffic for the subnet.
    #[serde(rename = "BackendType", default, skip_serializing_if = "String::is_empty")]
    pub backend_type: String,
    /// Backend-specific data, passed through as raw JSON.
    #[serde(rename = "BackendData", default, skip_serializing_if = "Option::is_none")]
    pub backend_data: Option<Value>,
}

fn unspecified() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

impl LeaseAttrs {
    /// Attributes with only a public IP set.
    pub fn new(public_ip: Ipv4Addr) -> Self {
        Self {
            public_ip,
            ..Self::default()
        }
    }
}

impl Default for LeaseAttrs {
    fn default() -> Self {
        Self {
            public_ip: unspecified(),
            backend_type: String::new(),
            backend_data: None,
        }
    }
}

/// A subnet lease held by one node.
///
/// Fields missing from a decoded body take their defaults, so a decoded lease
/// never carries stale values over from anywhere else.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Lease {
    /// The leased subnet.
    #[serde(rename = "Subnet")]
    pub subnet: Ipv4Net,
    /// Attributes supplied by the holder.
    #[serde(rename = "Attrs")]
    pub attrs: LeaseAttrs,
    /// When the lease lapses unless renewed.
    #[serde(rename = "Expiration")]
    pub expiration: DateTime<Utc>,
}

impl Lease {
    /// Stable key used to address this lease on the coordinator.
    pub fn key(&self) -> String {
        subnet_key(&self.subnet)
    }

    /// Returns true if the lease has lapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }

    /// Time left before expiry at `now`, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.expiration - now).to_std().unwrap_or_default()
    }
}

/// Key form of a subnet: `10.1.2.0/24` becomes `10.1.2.0-24`.
pub fn subnet_key(subnet: &Ipv4Net) -> String {
    format!("{}-{}", subnet.addr(), subnet.prefix_len())
}

/// Inverse of [`subnet_key`].
pub fn parse_subnet_key(key: &str) -> Option<Ipv4Net> {
    let (addr, len) = key.rsplit_once('-')?;
    Ipv4Net::new(addr.parse().ok()?, len.parse().ok()?).ok()
}

// ---------------------------------------------------------------------------
// Watch results
// ---------------------------------------------------------------------------

/// Kind of lease change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Added,
    Removed,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Added => write!(f, "added"),
            EventType::Removed => write!(f, "removed"),
        }
    }
}

/// One lease change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub lease: Lease,
}

impl Event {
    /// An `added` event for `lease`.
    pub fn added(lease: Lease) -> Self {
        Self {
            event_type: EventType::Added,
            lease,
        }
    }

    /// A `removed` event for `lease`.
    pub fn removed(lease: Lease) -> Self {
        Self {
            event_type: EventType::Removed,
            lease,
        }
    }
}

/// Payload of one watch response.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaseUpdate {
    /// Every lease currently held in the network.
    Snapshot(Vec<Lease>),
    /// Changes since the cursor the watch was issued with.
    Events(Vec<Event>),
}

/// Result of a lease watch: a snapshot or an event batch, plus where to
/// resume from. A decoded result always holds a [`Cursor::Token`].
#[derive(Debug, Clone, PartialEq)]
pub struct WatchResult {
    pub update: LeaseUpdate,
    pub cursor: Cursor,
}

#[derive(Debug, Deserialize)]
struct WireWatchResult {
    #[serde(default)]
    events: Option<Vec<Event>>,
    #[serde(default)]
    snapshot: Option<Vec<Lease>>,
    #[serde(default)]
    cursor: Value,
}

impl WatchResult {
    /// Decode a watch response body.
    ///
    /// A structurally bad body is a [`RemoteError::Decode`]; a well-formed
    /// body whose cursor is not a string is a [`RemoteError::Protocol`].
    pub fn from_slice(data: &[u8]) -> RemoteResult<Self> {
        let wire: WireWatchResult = decode(data)?;
        let cursor = Cursor::from_response(wire.cursor)?;
        let update = match wire.snapshot {
            Some(leases) => LeaseUpdate::Snapshot(leases),
            None => LeaseUpdate::Events(wire.events.unwrap_or_default()),
        };
        Ok(Self { update, cursor })
    }
}

// ---------------------------------------------------------------------------
// Codec helpers
// ---------------------------------------------------------------------------

/// Encode a request record to JSON bytes.
pub fn encode<T: Serialize>(value: &T) -> RemoteResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(RemoteError::Encode)
}

/// Decode a response body into a typed record.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> RemoteResult<T> {
    serde_json::from_slice(data).map_err(RemoteError::Decode)
}
