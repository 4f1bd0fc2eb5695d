//! Contains the read and write concerns a [`Client`](crate::Client) derives options from.

#[cfg(test)]
mod test;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use typed_builder::TypedBuilder;

use crate::{
    bson::{self, serde_helpers},
    error::{Error, Result},
    options::CommandOption,
    serde_util,
};

/// The consistency and isolation level requested for reads.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[non_exhaustive]
pub struct ReadConcern {
    /// The level of the read concern.
    pub level: ReadConcernLevel,
}

impl ReadConcern {
    /// Creates a read concern at `level`.
    pub fn new(level: ReadConcernLevel) -> Self {
        Self { level }
    }

    /// The `readConcern` option carrying this read concern.
    pub(crate) fn to_option(&self) -> Result<CommandOption> {
        Ok(CommandOption::ReadConcern(bson::to_document(self)?))
    }
}

impl From<ReadConcernLevel> for ReadConcern {
    fn from(level: ReadConcernLevel) -> Self {
        Self::new(level)
    }
}

/// The level of a [`ReadConcern`]. Levels unknown to this crate round-trip through `Custom`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ReadConcernLevel {
    /// `"local"`.
    Local,
    /// `"majority"`.
    Majority,
    /// `"linearizable"`.
    Linearizable,
    /// `"available"`.
    Available,
    /// `"snapshot"`.
    Snapshot,
    /// Any other level, sent as given.
    #[serde(untagged)]
    Custom(String),
}

/// The acknowledgement requested from the server for a write.
///
/// An empty write concern (no field set) defers to the server's default and derives no option.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, TypedBuilder, Serialize, Deserialize)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct WriteConcern {
    /// How many, or which, servers must have the write before the server replies.
    pub w: Option<Acknowledgment>,

    /// How long the server waits for `w` to be satisfied.
    #[serde(rename = "wtimeout", alias = "wtimeoutMS", default)]
    #[serde(serialize_with = "serde_util::serialize_duration_option_as_int_millis")]
    #[serde(deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis")]
    pub w_timeout: Option<Duration>,

    /// Whether the write must reach the on-disk journal.
    #[serde(rename = "j", alias = "journal")]
    pub journal: Option<bool>,
}

impl WriteConcern {
    /// `w: <nodes>`.
    pub fn nodes(nodes: u32) -> Self {
        Acknowledgment::Nodes(nodes).into()
    }

    /// `w: "majority"`.
    pub fn majority() -> Self {
        Acknowledgment::Majority.into()
    }

    /// `w: 0`. Writes under this concern are dispatched without waiting for a reply.
    pub fn unacknowledged() -> Self {
        Self::nodes(0)
    }

    /// Whether the server replies to writes under this concern. A journaled write is always
    /// acknowledged.
    pub fn is_acknowledged(&self) -> bool {
        self.w != Some(Acknowledgment::Nodes(0)) || self.journal == Some(true)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.w.is_none() && self.w_timeout.is_none() && self.journal.is_none()
    }

    /// `w: 0` together with `j: true` is rejected.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.w == Some(Acknowledgment::Nodes(0)) && self.journal == Some(true) {
            return Err(Error::invalid_argument(
                "write concern cannot have w=0 and j=true",
            ));
        }
        Ok(())
    }

    /// The `writeConcern` option carrying this write concern and its acknowledgement, or `None`
    /// if the write concern is empty.
    pub(crate) fn to_option(&self) -> Result<Option<CommandOption>> {
        self.validate()?;
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(CommandOption::WriteConcern {
            write_concern: bson::to_document(self)?,
            acknowledged: self.is_acknowledged(),
        }))
    }
}

impl From<Acknowledgment> for WriteConcern {
    fn from(w: Acknowledgment) -> Self {
        Self::builder().w(w).build()
    }
}

/// The `w` field of a [`WriteConcern`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "W", into = "W")]
#[non_exhaustive]
pub enum Acknowledgment {
    /// The write must reach this many servers. `0` requests no acknowledgement at all.
    Nodes(u32),

    /// The write must reach a majority of voting servers.
    Majority,

    /// The write must satisfy the server-side custom write concern with this name.
    Custom(String),
}

/// Wire form of [`Acknowledgment`]: a number, or a tag name where `"majority"` is reserved.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum W {
    Nodes(#[serde(serialize_with = "serde_helpers::serialize_u32_as_i32")] u32),
    Tag(String),
}

impl From<W> for Acknowledgment {
    fn from(w: W) -> Self {
        match w {
            W::Nodes(nodes) => Self::Nodes(nodes),
            W::Tag(tag) if tag == "majority" => Self::Majority,
            W::Tag(tag) => Self::Custom(tag),
        }
    }
}

impl From<Acknowledgment> for W {
    fn from(w: Acknowledgment) -> Self {
        match w {
            Acknowledgment::Nodes(nodes) => Self::Nodes(nodes),
            Acknowledgment::Majority => Self::Tag("majority".to_string()),
            Acknowledgment::Custom(tag) => Self::Tag(tag),
        }
    }
}
