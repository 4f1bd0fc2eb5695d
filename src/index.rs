use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use typed_builder::TypedBuilder;

use crate::{
    bson::{Bson, Document},
    serde_util,
};

/// Specifies an index to create with a `createIndexes` command.
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder, Serialize, PartialEq)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct IndexModel {
    /// Specifies the index's fields. For each field, specify a key-value pair in which the key is
    /// the name of the field to index and the value is index type.
    #[serde(rename = "key")]
    pub keys: Document,

    /// The options for the index.
    #[serde(flatten)]
    pub options: Option<IndexOptions>,
}

impl IndexModel {
    /// If the client did not specify a name, generate and set it. Otherwise, do nothing.
    pub(crate) fn update_name(&mut self) {
        if self.get_name().is_none() {
            let key_names: Vec<String> = self
                .keys
                .iter()
                .map(|(k, v)| match v {
                    Bson::String(s) => format!("{}_{}", k, s),
                    other => format!("{}_{}", k, other),
                })
                .collect();
            self.options.get_or_insert_with(IndexOptions::default).name = Some(key_names.join("_"));
        }
    }

    pub(crate) fn get_name(&self) -> Option<String> {
        self.options.as_ref().and_then(|o| o.name.as_ref()).cloned()
    }
}

/// The options for an [`IndexModel`].
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize, TypedBuilder, PartialEq)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct IndexOptions {
    /// Specifies a name outside the default generated name, which has the form
    /// `<field>_<direction>`.
    pub name: Option<String>,

    /// Creates a unique index so that the collection will not accept insertion or update of
    /// documents where the index key value matches an existing value in the index.
    pub unique: Option<bool>,

    /// If true, the index only references documents with the specified field.
    pub sparse: Option<bool>,

    /// Specifies how long documents in a TTL index are retained.
    #[serde(
        rename = "expireAfterSeconds",
        default,
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_seconds",
        serialize_with = "serde_util::serialize_duration_option_as_int_secs"
    )]
    pub expire_after: Option<Duration>,

    /// Restricts the index to documents matching this filter.
    pub partial_filter_expression: Option<Document>,

    /// Whether the index is hidden from the query planner.
    pub hidden: Option<bool>,
}
