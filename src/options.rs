//! Contains the types needed to specify options to operations dispatched through this crate.
//!
//! Per-operation modifiers are expressed as an ordered sequence of [`CommandOption`]s. Each option
//! writes a single field of the request document, and options are applied in sequence order, so a
//! later option overwrites a field set by an earlier one. Write concerns are the exception: the
//! first write-concern option in the sequence decides both the `writeConcern` field and whether the
//! write is acknowledged, so that an explicitly supplied write concern is never overridden by one
//! derived from the client configuration.


use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use crate::{
    client::options::ClientOptions,
    concern::{Acknowledgment, ReadConcern, ReadConcernLevel, WriteConcern},
    index::{IndexModel, IndexOptions},
    selection_criteria::{Predicate, ReadPreference, SelectionCriteria},
};
use crate::{
    bson::{Bson, Document},
    bson_util,
    error::Result,
};

/// A single modifier applied to the request document of an operation.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum CommandOption {
    /// Sets `writeConcern`. `acknowledged` records whether the server will reply to the write.
    WriteConcern {
        /// The serialized write concern.
        write_concern: Document,
        /// Whether the write concern requests acknowledgement.
        acknowledged: bool,
    },

    /// Sets `readConcern`.
    ReadConcern(Document),

    /// Sets `collation`.
    Collation(Document),

    /// Sets `maxTimeMS`.
    MaxTime(Duration),

    /// Sets `sort`.
    Sort(Document),

    /// Sets `fields`, the projection of a findAndModify.
    Fields(Document),

    /// Sets `projection`, the projection of a find.
    Projection(Document),

    /// Sets `upsert`.
    Upsert(bool),

    /// Sets `new`.
    ReturnDocument(ReturnDocument),

    /// Sets `bypassDocumentValidation`.
    BypassDocumentValidation(bool),

    /// Sets `arrayFilters`.
    ArrayFilters(Vec<Document>),

    /// Sets `hint`.
    Hint(Hint),

    /// Sets `limit`.
    Limit(i64),

    /// Sets `skip`.
    Skip(u64),

    /// Sets `batchSize`.
    BatchSize(u32),

    /// Sets `allowDiskUse`.
    AllowDiskUse(bool),

    /// Sets `comment`.
    Comment(String),

    /// Sets `nameOnly`.
    NameOnly(bool),

    /// Sets `authorizedDatabases`.
    AuthorizedDatabases(bool),
}

impl CommandOption {
    /// Converts a write concern into an option. Returns `None` for an empty write concern, which
    /// defers to the server's default.
    pub fn from_write_concern(write_concern: &WriteConcern) -> Result<Option<Self>> {
        write_concern.to_option()
    }

    /// Converts a read concern into an option.
    pub fn from_read_concern(read_concern: &ReadConcern) -> Result<Self> {
        read_concern.to_option()
    }

    /// The request field written by this option.
    pub(crate) fn key(&self) -> &'static str {
        match self {
            Self::WriteConcern { .. } => "writeConcern",
            Self::ReadConcern(_) => "readConcern",
            Self::Collation(_) => "collation",
            Self::MaxTime(_) => "maxTimeMS",
            Self::Sort(_) => "sort",
            Self::Fields(_) => "fields",
            Self::Projection(_) => "projection",
            Self::Upsert(_) => "upsert",
            Self::ReturnDocument(_) => "new",
            Self::BypassDocumentValidation(_) => "bypassDocumentValidation",
            Self::ArrayFilters(_) => "arrayFilters",
            Self::Hint(_) => "hint",
            Self::Limit(_) => "limit",
            Self::Skip(_) => "skip",
            Self::BatchSize(_) => "batchSize",
            Self::AllowDiskUse(_) => "allowDiskUse",
            Self::Comment(_) => "comment",
            Self::NameOnly(_) => "nameOnly",
            Self::AuthorizedDatabases(_) => "authorizedDatabases",
        }
    }

    fn value(&self) -> Bson {
        match self {
            Self::WriteConcern { write_concern, .. } => Bson::Document(write_concern.clone()),
            Self::ReadConcern(doc)
            | Self::Collation(doc)
            | Self::Sort(doc)
            | Self::Fields(doc)
            | Self::Projection(doc) => Bson::Document(doc.clone()),
            Self::MaxTime(duration) => {
                Bson::Int64(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
            }
            Self::Upsert(b)
            | Self::BypassDocumentValidation(b)
            | Self::AllowDiskUse(b)
            | Self::NameOnly(b)
            | Self::AuthorizedDatabases(b) => Bson::Boolean(*b),
            Self::ReturnDocument(return_document) => Bson::Boolean(return_document.is_after()),
            Self::ArrayFilters(filters) => bson_util::to_bson_array(filters),
            Self::Hint(hint) => hint.to_bson(),
            Self::Limit(limit) => Bson::Int64(*limit),
            Self::Skip(skip) => Bson::Int64(i64::try_from(*skip).unwrap_or(i64::MAX)),
            Self::BatchSize(batch_size) => Bson::Int64(i64::from(*batch_size)),
            Self::Comment(comment) => Bson::String(comment.clone()),
        }
    }

    /// Writes this option into `document`, overwriting any existing value for the same field.
    pub fn apply(&self, document: &mut Document) {
        document.insert(self.key(), self.value());
    }
}

/// Applies `options` to `document` in sequence order. Only the first write-concern option is
/// applied; subsequent ones are ignored.
pub(crate) fn apply_all<'a>(
    options: impl IntoIterator<Item = &'a CommandOption>,
    document: &mut Document,
) {
    let mut write_concern_applied = false;
    for option in options {
        if let CommandOption::WriteConcern { .. } = option {
            if write_concern_applied {
                continue;
            }
            write_concern_applied = true;
        }
        option.apply(document);
    }
}

/// Whether a write carrying `options` will be acknowledged by the server. The first write-concern
/// option in sequence order decides; with no write-concern option the write is acknowledged.
pub(crate) fn is_acknowledged(options: &[CommandOption]) -> bool {
    options
        .iter()
        .find_map(|option| match option {
            CommandOption::WriteConcern { acknowledged, .. } => Some(*acknowledged),
            _ => None,
        })
        .unwrap_or(true)
}

/// Whether `options` contains an explicit read concern.
pub(crate) fn has_read_concern(options: &[CommandOption]) -> bool {
    options
        .iter()
        .any(|option| matches!(option, CommandOption::ReadConcern(_)))
}

/// Specifies whether a findAndModify operation should return the document before or after
/// modification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum ReturnDocument {
    /// Return the document after modification.
    After,
    /// Return the document before modification.
    #[default]
    Before,
}

impl ReturnDocument {
    pub(crate) fn is_after(&self) -> bool {
        matches!(self, ReturnDocument::After)
    }
}

/// Specifies the index to use for an operation.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum Hint {
    /// Specifies the keys of the index to use.
    Keys(Document),
    /// Specifies the name of the index to use.
    Name(String),
}

impl Hint {
    pub(crate) fn to_bson(&self) -> Bson {
        match self {
            Hint::Keys(ref d) => Bson::Document(d.clone()),
            Hint::Name(ref s) => Bson::String(s.clone()),
        }
    }
}

impl From<Document> for Hint {
    fn from(keys: Document) -> Self {
        Self::Keys(keys)
    }
}

impl From<&str> for Hint {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}
