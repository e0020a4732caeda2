//! Stored record model.
//!
//! A record is a string-keyed tree: every node is either a leaf string or a
//! mapping of child nodes. The wire format is a JSON object whose values are
//! strings or nested objects. The root always carries a `timestamp` leaf
//! after a write.
//!
//! - [`merge`] applies a flat update at a `/`-separated path.
//! - [`traverse`] resolves a `/`-separated field path.

mod merge;
mod traverse;

pub use merge::merge;

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::TIMESTAMP_KEY;
use crate::error::{Error, Result};

/// Child mapping of a node.
pub type Fields = BTreeMap<String, Value>;

/// Flat key/value update, as delivered by upload and patch requests.
pub type Params = BTreeMap<String, String>;

/// A node of the record tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Leaf string value.
    Leaf(String),
    /// Named mapping to child nodes.
    Node(Fields),
}

impl Value {
    /// Returns the leaf string, if this is a leaf.
    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            Self::Leaf(s) => Some(s),
            Self::Node(_) => None,
        }
    }

    /// Returns the child mapping, if this is a node.
    pub fn as_node(&self) -> Option<&Fields> {
        match self {
            Self::Node(fields) => Some(fields),
            Self::Leaf(_) => None,
        }
    }

    /// Plain-text rendering: leaves verbatim, nodes as compact JSON.
    pub fn to_plain(&self) -> String {
        match self {
            Self::Leaf(s) => s.clone(),
            Self::Node(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Leaf(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Leaf(s)
    }
}

/// Root of a stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Fields,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record whose top level is exactly `params`.
    pub fn from_params(params: &Params) -> Self {
        let fields = params
            .iter()
            .map(|(k, v)| (k.clone(), Value::Leaf(v.clone())))
            .collect();
        Self { fields }
    }

    /// Top-level fields.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Top-level lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Insert or overwrite a top-level value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overwrite the reserved root `timestamp` with `at`.
    pub fn stamp(&mut self, at: DateTime<Utc>) {
        self.fields.insert(
            TIMESTAMP_KEY.to_string(),
            Value::Leaf(format_timestamp(at)),
        );
    }

    /// The root `timestamp`, if present and parseable.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.fields.get(TIMESTAMP_KEY)?.as_leaf()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Serialize to the JSON wire format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::Encode)
    }

    /// Parse the JSON wire format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for anything but an object of strings and
    /// nested objects.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Error::Decode)
    }
}

/// RFC 3339 UTC with second precision, e.g. `2024-01-02T03:04:05Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
