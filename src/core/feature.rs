use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::core::types::{OneBasedSpan, Strand};

/// Value of a feature qualifier.
///
/// A key seen once holds a single string; a key repeated within the same
/// feature becomes a list holding every value in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QualifierValue {
    Single(String),
    Multiple(Vec<String>),
}

impl QualifierValue {
    /// First value, regardless of shape
    #[must_use]
    pub fn first(&self) -> &str {
        match self {
            Self::Single(v) => v,
            Self::Multiple(values) => values.first().map_or("", String::as_str),
        }
    }

    /// All values in file order
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Multiple(vec![first, value]);
            }
            Self::Multiple(values) => values.push(value),
        }
    }
}

/// Qualifier map of a feature (GenBank qualifiers, GFF attributes, BED track metadata)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Qualifiers(BTreeMap<String, QualifierValue>);

impl Qualifiers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value under `key`. Repeated keys accumulate into a list rather than overwrite.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.0.entry(key.into()) {
            Entry::Occupied(mut entry) => entry.get_mut().push(value),
            Entry::Vacant(entry) => {
                entry.insert(QualifierValue::Single(value));
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&QualifierValue> {
        self.0.get(key)
    }

    /// First value stored under `key`
    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(QualifierValue::first)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QualifierValue)> {
        self.0.iter()
    }
}

/// An annotated interval (gene, CDS, BED region, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature type (GenBank feature key, GFF column 3)
    #[serde(rename = "type")]
    pub kind: String,

    /// 1-based inclusive location
    pub span: OneBasedSpan,

    pub strand: Strand,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Producer of the feature (GFF column 2, or the decoder name)
    pub source: String,

    /// Display name derived from the qualifiers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Qualifiers::is_empty")]
    pub qualifiers: Qualifiers,
}

impl Feature {
    pub fn new(kind: impl Into<String>, span: OneBasedSpan, strand: Strand) -> Self {
        Self {
            kind: kind.into(),
            span,
            strand,
            score: None,
            source: String::new(),
            name: None,
            qualifiers: Qualifiers::new(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// 1-based start
    #[must_use]
    pub fn start(&self) -> u64 {
        self.span.start
    }

    /// 1-based inclusive end
    #[must_use]
    pub fn end(&self) -> u64 {
        self.span.end
    }

    /// Derive `name` from the first non-empty qualifier among `keys`
    pub fn derive_name(&mut self, keys: &[&str]) {
        if self.name.is_some() {
            return;
        }
        self.name = keys
            .iter()
            .find_map(|key| self.qualifiers.first(key).filter(|v| !v.is_empty()))
            .map(str::to_string);
    }
}
