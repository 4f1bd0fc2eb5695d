//! Contains the types of results returned by dispatched operations.

use serde::{Deserialize, Serialize};

use crate::bson::{Bson, Document};

/// The result of a `findAndModify` command.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct FindAndModifyResult {
    /// The located document, before or after modification depending on the `new` option. `None`
    /// if no document matched.
    #[serde(default)]
    pub value: Option<Document>,

    /// Details about the modification performed.
    #[serde(default)]
    pub last_error_object: Option<LastErrorObject>,
}

/// The `lastErrorObject` returned by a `findAndModify` command.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct LastErrorObject {
    /// The number of documents matched by the query.
    #[serde(default)]
    pub n: i64,

    /// Whether an existing document was updated.
    #[serde(default)]
    pub updated_existing: Option<bool>,

    /// The `_id` of a document inserted by an upsert.
    #[serde(default)]
    pub upserted: Option<Bson>,
}

/// The result of a `createIndexes` command.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct CreateIndexesResult {
    /// The names of the indexes that were requested, in request order.
    pub index_names: Vec<String>,

    /// If true, then the collection didn't exist and was created in the process of creating the
    /// index.
    pub created_collection_automatically: Option<bool>,

    /// The number of indexes at the start of the command.
    pub indexes_before: Option<i64>,

    /// The number of indexes at the end of the command.
    pub indexes_after: Option<i64>,
}

/// The result of a `listDatabases` command.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListDatabasesResult {
    /// The databases on the server.
    pub databases: Vec<DatabaseSpecification>,

    /// The combined size of every database on disk, in bytes. Omitted by the server when only
    /// names were requested.
    #[serde(default)]
    pub total_size: Option<i64>,
}

/// Information about a database.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct DatabaseSpecification {
    /// The name of the database.
    pub name: String,

    /// The amount of disk space in bytes that is consumed by the database.
    #[serde(default, deserialize_with = "crate::serde_util::deserialize_i64_from_number")]
    pub size_on_disk: i64,

    /// Whether the database has any data.
    #[serde(default)]
    pub empty: bool,
}
