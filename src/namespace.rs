
use std::{fmt, str::FromStr};

use serde::{
    de::{Error as SerdeDeError, Unexpected},
    Deserialize,
    Deserializer,
    Serialize,
};

use crate::error::{Error, Result};

/// A struct modeling the canonical name for a collection in MongoDB.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// The name of the database associated with this namespace.
    pub db: String,

    /// The name of the collection this namespace corresponds to.
    pub coll: String,
}

impl Namespace {
    /// Construct a `Namespace` with the given database and collection.
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }

    /// Checks that both the database and collection names are non-empty. This is enforced before
    /// any server is selected for an operation targeting the namespace.
    pub fn validate(&self) -> Result<()> {
        if self.db.is_empty() {
            return Err(Error::invalid_argument(
                "namespace must have a non-empty database name",
            ));
        }
        if self.coll.is_empty() {
            return Err(Error::invalid_argument(
                "namespace must have a non-empty collection name",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}.{}", self.db, self.coll)
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (db, coll) = s.split_once('.').ok_or_else(|| {
            Error::invalid_argument(format!("missing one or more fields in namespace {:?}", s))
        })?;
        let ns = Self::new(db, coll);
        ns.validate()?;
        Ok(ns)
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        Self::from_str(&s)
            .map_err(|_| D::Error::invalid_value(Unexpected::Str(&s), &"a `db.collection` string"))
    }
}

impl Serialize for Namespace {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
