//! Folds successive watch results into a local view of the network's leases.
//!
//! A snapshot is diffed against what is already known; an event batch is
//! applied directly. Either way the caller gets back the added/removed events
//! that actually change its view. The node's own lease is never reported.

use std::collections::BTreeMap;

use ipnet::Ipv4Net;
use tracing::debug;

use crate::context::Context;
use crate::cursor::Cursor;
use crate::error::RemoteResult;
use crate::manager::SubnetManager;
use crate::models::{Event, EventType, Lease, LeaseUpdate};

/// Tracks the leases of one network through a [`SubnetManager`].
#[derive(Debug)]
pub struct LeaseWatcher<M> {
    manager: M,
    network: String,
    own_subnet: Option<Ipv4Net>,
    cursor: Cursor,
    leases: BTreeMap<Ipv4Net, Lease>,
}

impl<M: SubnetManager> LeaseWatcher<M> {
    /// Watch `network`, starting from a full snapshot.
    pub fn new(manager: M, network: impl Into<String>) -> Self {
        Self {
            manager,
            network: network.into(),
            own_subnet: None,
            cursor: Cursor::Start,
            leases: BTreeMap::new(),
        }
    }

    /// Ignore changes to `subnet`, the lease this node holds itself.
    pub fn with_own_subnet(mut self, subnet: Ipv4Net) -> Self {
        self.own_subnet = Some(subnet);
        self
    }

    /// Cursor the next watch resumes from.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Leases currently known, ordered by subnet.
    pub fn leases(&self) -> impl Iterator<Item = &Lease> {
        self.leases.values()
    }

    /// Issue one watch and return the resulting changes.
    ///
    /// On error nothing changes, so calling again resumes from the same
    /// cursor. No retry happens here.
    pub async fn next_batch(&mut self, ctx: &Context) -> RemoteResult<Vec<Event>> {
        let result = self
            .manager
            .watch_leases(ctx, &self.network, &self.cursor)
            .await?;

        let batch = match result.update {
            LeaseUpdate::Snapshot(leases) => self.reset(leases),
            LeaseUpdate::Events(events) => self.apply(events),
        };
        debug!(
            network = %self.network,
            cursor = %result.cursor,
            changes = batch.len(),
            "lease watch advanced"
        );
        self.cursor = result.cursor;
        Ok(batch)
    }

    fn is_own(&self, lease: &Lease) -> bool {
        self.own_subnet == Some(lease.subnet)
    }

    /// Replace the known set with `leases`, reporting what appeared and what
    /// disappeared.
    fn reset(&mut self, leases: Vec<Lease>) -> Vec<Event> {
        let mut previous = std::mem::take(&mut self.leases);
        let mut batch = Vec::new();

        for lease in leases {
            if self.is_own(&lease) {
                continue;
            }
            if previous.remove(&lease.subnet).is_none() {
                batch.push(Event::added(lease.clone()));
            }
            self.leases.insert(lease.subnet, lease);
        }

        // anything left was not in the snapshot
        batch.extend(previous.into_values().map(Event::removed));
        batch
    }

    fn apply(&mut self, events: Vec<Event>) -> Vec<Event> {
        let mut batch = Vec::with_capacity(events.len());
        for event in events {
            if self.is_own(&event.lease) {
                continue;
            }
            match event.event_type {
                EventType::Added => {
                    self.leases.insert(event.lease.subnet, event.lease.clone());
                }
                EventType::Removed => {
                    self.leases.remove(&event.lease.subnet);
                }
            }
            batch.push(event);
        }
        batch
    }
}
