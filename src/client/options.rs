
use std::time::Duration;

use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::{
    concern::{ReadConcern, WriteConcern},
    selection_criteria::ReadPreference,
    serde_util,
};

/// Contains the options that can be used to create a new [`Client`](crate::Client).
///
/// Options can be built programmatically or deserialized from a configuration document whose
/// keys follow the connection string option names, e.g.
/// `{ "w": ..., "readPreference": "secondary", "serverSelectionTimeoutMS": 500 }`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ClientOptions {
    /// The default write concern for write operations. A write concern supplied on an individual
    /// operation takes precedence over this one.
    #[serde(default)]
    pub write_concern: Option<WriteConcern>,

    /// The default read concern for `find`, used when the operation specifies none.
    #[serde(default)]
    pub read_concern: Option<ReadConcern>,

    /// The read preference used to route reads. Reads go to a primary if this is unset.
    #[serde(default)]
    pub read_preference: Option<ReadPreference>,

    /// The amount of time to wait for a suitable server before failing an operation.
    ///
    /// The default value is 30 seconds.
    #[serde(
        default,
        rename = "serverSelectionTimeoutMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub server_selection_timeout: Option<Duration>,

    /// The maximum amount of time an operation may take, covering selection, checkout and every
    /// network exchange. Operations are not bounded if this is unset.
    #[serde(
        default,
        rename = "timeoutMS",
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub timeout: Option<Duration>,
}
