//! Abstract subnet manager interface.
//!
//! `RemoteManager` implements this against a coordinator over HTTP; the lease
//! watcher and tests only depend on the trait.

use async_trait::async_trait;

use crate::context::Context;
use crate::cursor::Cursor;
use crate::error::RemoteResult;
use crate::models::{Lease, LeaseAttrs, NetworkConfig, WatchResult};

/// Operations a node uses to take part in subnet allocation.
///
/// Every operation makes at most one attempt and stops waiting as soon as
/// `ctx` is done.
#[async_trait]
pub trait SubnetManager: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch the configuration of `network`. An empty name means "no specific
    /// network".
    async fn get_network_config(&self, ctx: &Context, network: &str)
    -> RemoteResult<NetworkConfig>;

    /// Ask the coordinator for a new subnet lease carrying `attrs`.
    async fn acquire_lease(
        &self,
        ctx: &Context,
        network: &str,
        attrs: &LeaseAttrs,
    ) -> RemoteResult<Lease>;

    /// Renew `lease`, replacing it with the coordinator's copy on success and
    /// leaving it untouched on failure.
    ///
    /// The caller must not renew the same lease concurrently. `&mut` enforces
    /// this within safe code, but a lease shared behind a lock must have its
    /// renewals serialized by the caller.
    async fn renew_lease(&self, ctx: &Context, network: &str, lease: &mut Lease)
    -> RemoteResult<()>;

    /// Wait for lease changes after `cursor`. [`Cursor::Start`] yields a full
    /// snapshot.
    async fn watch_leases(
        &self,
        ctx: &Context,
        network: &str,
        cursor: &Cursor,
    ) -> RemoteResult<WatchResult>;
}
