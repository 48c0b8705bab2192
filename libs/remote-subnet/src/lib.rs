//! # remote-subnet
//!
//! Client side of a distributed subnet-allocation protocol. A node uses it
//! to talk to a remote coordinator over HTTP/JSON and:
//! - fetch the configuration of a network,
//! - acquire a subnet lease,
//! - renew that lease before it expires,
//! - watch for leases issued to other nodes.
//!
//! Every call takes a [`Context`] and stops waiting as soon as it is
//! cancelled or its deadline passes, without leaving work running behind it.
//! Calls make exactly one network attempt; retry policy belongs to the caller.
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod client;
pub mod context;
pub mod cursor;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod manager;
pub mod models;
pub mod transport;
pub mod watch;

pub use client::RemoteManager;
pub use context::Context;
pub use cursor::Cursor;
pub use endpoint::Endpoint;
pub use error::{BoxError, RemoteError, RemoteResult};
pub use manager::SubnetManager;
pub use models::{
    Event, EventType, Lease, LeaseAttrs, LeaseUpdate, NetworkConfig, WatchResult,
};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport};
pub use watch::LeaseWatcher;
