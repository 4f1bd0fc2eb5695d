use std::sync::Arc;

use derive_where::derive_where;
use serde::{Deserialize, Serialize};

use crate::{
    bson::{doc, Document},
    sdam::{ServerDescription, ServerType},
};

/// Describes which servers are suitable for a given operation.
#[derive(Clone, derive_more::Display)]
#[derive_where(Debug)]
#[non_exhaustive]
pub enum SelectionCriteria {
    /// A read preference that describes the suitable servers based on the server type.
    ///
    /// See the documentation [here](https://www.mongodb.com/docs/manual/core/read-preference/) for more details.
    #[display("ReadPreference {_0}")]
    ReadPreference(ReadPreference),

    /// A predicate used to filter servers that are considered suitable. A `server` will be
    /// considered suitable by a `predicate` if `predicate(server)` returns true.
    #[display("Custom predicate")]
    Predicate(#[derive_where(skip)] Predicate),
}

impl PartialEq for SelectionCriteria {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::ReadPreference(r1), Self::ReadPreference(r2)) => r1 == r2,
            _ => false,
        }
    }
}

impl From<ReadPreference> for SelectionCriteria {
    fn from(read_pref: ReadPreference) -> Self {
        Self::ReadPreference(read_pref)
    }
}

impl SelectionCriteria {
    /// The criteria used for operations that must be routed to a write-capable member.
    pub fn writable() -> Self {
        Self::ReadPreference(ReadPreference::Primary)
    }

    /// Creates criteria from an arbitrary predicate over server descriptions.
    pub fn predicate(f: impl Fn(&ServerDescription) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    pub(crate) fn as_read_pref(&self) -> Option<&ReadPreference> {
        match self {
            Self::ReadPreference(ref read_pref) => Some(read_pref),
            Self::Predicate(..) => None,
        }
    }

    /// Whether `server` is eligible under these criteria, ignoring latency and staleness. This is
    /// a coarse filter intended for topology implementations; it is not a full selection
    /// algorithm.
    pub fn is_suitable(&self, server: &ServerDescription) -> bool {
        match self {
            Self::ReadPreference(read_pref) => read_pref.is_suitable(server.server_type),
            Self::Predicate(predicate) => predicate(server),
        }
    }
}

/// A predicate used to filter servers that are considered suitable.
pub type Predicate = Arc<dyn Send + Sync + Fn(&ServerDescription) -> bool>;

/// Specifies how the driver should route a read operation to members of a replica set.
///
/// If applicable, `tag_sets` can be used to target specific nodes in a replica set, and
/// `max_staleness` specifies the maximum lag behind the primary that a secondary can be to remain
/// eligible for the operation; neither is modelled here, as they only affect the selection
/// algorithm itself.
///
/// See the [MongoDB docs](https://www.mongodb.com/docs/manual/core/read-preference) for more details.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum ReadPreference {
    /// Only route this operation to the primary.
    #[display("primary")]
    Primary,

    /// Only route this operation to a secondary.
    #[display("secondary")]
    Secondary,

    /// Route this operation to the primary if it's available, but fall back to the secondaries if
    /// not.
    #[display("primaryPreferred")]
    PrimaryPreferred,

    /// Route this operation to a secondary if one is available, but fall back to the primary if
    /// not.
    #[display("secondaryPreferred")]
    SecondaryPreferred,

    /// Route this operation to the node with the least network latency regardless of whether it's
    /// the primary or a secondary.
    #[display("nearest")]
    Nearest,
}

impl ReadPreference {
    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::PrimaryPreferred => "primaryPreferred",
            Self::SecondaryPreferred => "secondaryPreferred",
            Self::Nearest => "nearest",
        }
    }

    /// The `$readPreference` document sent to a mongos.
    pub(crate) fn to_document(self) -> Document {
        doc! { "mode": self.mode() }
    }

    fn is_suitable(&self, server_type: ServerType) -> bool {
        match server_type {
            ServerType::Standalone | ServerType::Mongos | ServerType::LoadBalancer => true,
            ServerType::RsPrimary => !matches!(self, Self::Secondary),
            ServerType::RsSecondary => !matches!(self, Self::Primary),
            _ => false,
        }
    }
}

