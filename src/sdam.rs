//! Contains the types a cluster topology exposes to the dispatcher: a snapshot of the server
//! chosen for an operation and the capability to lease connections to it.
//!
//! Topology monitoring and the server selection algorithm live outside this crate; they are
//! consumed through the [`Topology`] and [`ConnectionSource`] traits.

use std::sync::Arc;

use derive_where::derive_where;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::{
    cmap::{Connection, ConnectionLease},
    error::Result,
    selection_criteria::SelectionCriteria,
    trace::CONNECTION_TRACING_EVENT_TARGET,
};

/// The possible types for a server.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum ServerType {
    /// A single, non-replica set mongod.
    Standalone,

    /// A router used in sharded deployments.
    Mongos,

    /// The primary node in a replica set.
    #[serde(rename = "RSPrimary")]
    RsPrimary,

    /// A secondary node in a replica set.
    #[serde(rename = "RSSecondary")]
    RsSecondary,

    /// A non-data bearing node in a replica set which can participate in elections.
    #[serde(rename = "RSArbiter")]
    RsArbiter,

    /// Hidden, starting up, or recovering nodes in a replica set.
    #[serde(rename = "RSOther")]
    RsOther,

    /// A member of an uninitialized replica set or a member that has been removed from the replica
    /// set config.
    #[serde(rename = "RSGhost")]
    RsGhost,

    /// A load-balancing proxy between the driver and the MongoDB deployment.
    LoadBalancer,

    /// A server that the driver hasn't yet communicated with or can't connect to.
    #[default]
    Unknown,
}

impl ServerType {
    /// Whether writes can be routed to a server of this type.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            ServerType::Standalone
                | ServerType::RsPrimary
                | ServerType::Mongos
                | ServerType::LoadBalancer
        )
    }
}

/// An immutable snapshot of the server chosen for an operation.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct ServerDescription {
    /// The address of the server, in `host:port` form.
    pub address: String,

    /// The type of the server.
    pub server_type: ServerType,

    /// The minimum wire version that the server understands.
    pub min_wire_version: Option<i32>,

    /// The maximum wire version that the server understands.
    pub max_wire_version: Option<i32>,

    /// The maximum permitted size of a BSON wire protocol message.
    pub max_message_size_bytes: i32,
}

impl ServerDescription {
    /// Constructs a description of a server at `address` with the given type and default limits.
    pub fn new(address: impl Into<String>, server_type: ServerType) -> Self {
        Self {
            address: address.into(),
            server_type,
            min_wire_version: None,
            max_wire_version: None,
            max_message_size_bytes: DEFAULT_MAX_MESSAGE_SIZE_BYTES,
        }
    }

    /// Sets the wire version range that the server understands.
    pub fn with_wire_versions(mut self, min: i32, max: i32) -> Self {
        self.min_wire_version = Some(min);
        self.max_wire_version = Some(max);
        self
    }

    /// Gets a description of a 4.4 standalone server for tests.
    #[cfg(test)]
    pub(crate) fn new_testing() -> Self {
        Self::new("localhost:27017", ServerType::Standalone).with_wire_versions(0, 9)
    }
}

pub(crate) const DEFAULT_MAX_MESSAGE_SIZE_BYTES: i32 = 48 * 1024 * 1024;

/// A view of the cluster capable of choosing a server for an operation.
///
/// Implementations may block until a suitable server becomes available; the dispatcher races this
/// against the operation's cancellation token and deadline.
pub trait Topology: Send + Sync {
    /// Selects a server matching `criteria`.
    fn select_server<'a>(
        &'a self,
        criteria: &'a SelectionCriteria,
    ) -> BoxFuture<'a, Result<SelectedServer>>;
}

/// The capability to lease connections to a single server.
pub trait ConnectionSource: Send + Sync {
    /// Leases a connection. The connection's [`Connection::release`] will be called exactly once
    /// when the lease ends.
    fn check_out(&self) -> BoxFuture<'_, Result<Box<dyn Connection>>>;
}

/// A server chosen by a [`Topology`], paired with the capability to lease connections to it.
#[derive(Clone)]
#[derive_where(Debug)]
pub struct SelectedServer {
    description: ServerDescription,

    #[derive_where(skip)]
    source: Arc<dyn ConnectionSource>,
}

impl SelectedServer {
    /// Pairs a server description with the source of connections to that server.
    pub fn new(description: ServerDescription, source: Arc<dyn ConnectionSource>) -> Self {
        Self {
            description,
            source,
        }
    }

    /// The description of the selected server.
    pub fn description(&self) -> &ServerDescription {
        &self.description
    }

    /// Leases a connection to the selected server.
    pub(crate) async fn checkout_connection(&self) -> Result<ConnectionLease> {
        let connection = self.source.check_out().await?;
        tracing::trace!(
            target: CONNECTION_TRACING_EVENT_TARGET,
            serverHost = self.description.address.as_str(),
            "Connection checked out"
        );
        Ok(ConnectionLease::new(
            connection,
            self.description.address.clone(),
        ))
    }
}
