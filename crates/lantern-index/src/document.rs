//! Request and response types exchanged with an index.
//!
//! These are the engine-neutral shapes of documents, searches and index
//! statistics. An engine encodes a [`DocumentUpdateRequest`] into its own
//! document representation and decodes stored values back into
//! [`SearchHit::fields`].

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::IndexError;

/// Default number of hits returned by a search.
pub const DEFAULT_SEARCH_LIMIT: usize = 25;

/// Default number of labels returned per counted field.
pub const DEFAULT_TOP_N: usize = 10;

/// Facet results: label counts keyed by field name.
pub type FacetCounts = BTreeMap<String, BTreeMap<String, u64>>;

/// A single field of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocField {
    /// Indexed verbatim as a single token.
    String {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
        /// Whether the value is returned with search hits.
        #[serde(default)]
        store: bool,
    },
    /// Analyzed full text.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
        /// Whether the value is returned with search hits.
        #[serde(default)]
        store: bool,
    },
    /// Numeric value usable in range queries.
    Double {
        /// Field name.
        name: String,
        /// Field value.
        value: f64,
        /// Whether the value is returned with search hits.
        #[serde(default)]
        store: bool,
    },
    /// Stored only, never indexed.
    Stored {
        /// Field name.
        name: String,
        /// Arbitrary JSON value.
        value: Value,
    },
}

impl DocField {
    /// Returns the field name.
    pub fn name(&self) -> &str {
        match self {
            Self::String { name, .. }
            | Self::Text { name, .. }
            | Self::Double { name, .. }
            | Self::Stored { name, .. } => name,
        }
    }

    /// Field names beginning with an underscore are reserved for the engine.
    pub fn is_reserved(&self) -> bool {
        self.name().starts_with('_')
    }
}

/// Insert or replace a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdateRequest {
    /// Ordering token; must exceed the index's current update sequence.
    pub seq: u64,
    /// Optional partition the document belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    /// Document fields.
    #[serde(default)]
    pub fields: Vec<DocField>,
}

/// Remove a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDeleteRequest {
    /// Ordering token; must exceed the index's current update sequence.
    pub seq: u64,
}

/// A search against one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query string in the engine's query language.
    pub query: String,
    /// Maximum number of hits to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Restrict hits to a single partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    /// Sort order; relevance then document id when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortField>,
    /// Resume after the hit whose [`SearchHit::order`] this is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Vec<SortValue>>,
    /// String fields whose distinct values are counted over all matches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub counts: Vec<String>,
    /// Double fields whose values are counted into labelled ranges.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ranges: BTreeMap<String, Vec<DoubleRange>>,
    /// Number of labels kept per field in `counts`.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl SearchRequest {
    /// Creates a request with the default limit and no partition, sort or
    /// facets.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: DEFAULT_SEARCH_LIMIT,
            partition: None,
            sort: Vec::new(),
            after: None,
            counts: Vec::new(),
            ranges: BTreeMap::new(),
            top_n: DEFAULT_TOP_N,
        }
    }

    /// True if the request asks for any facet.
    pub fn has_facets(&self) -> bool {
        !self.counts.is_empty() || !self.ranges.is_empty()
    }
}

/// Serde default for [`SearchRequest::limit`].
fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

/// Serde default for [`SearchRequest::top_n`].
fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

/// How a sort field's values are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKind {
    /// Numeric values from `double` fields.
    #[default]
    Double,
    /// Raw values from `string` fields.
    String,
}

/// One sort criterion, written `[-|+]name[<double|string>]`.
///
/// A leading `-` sorts descending. The kind defaults to `double`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortField {
    /// Field name.
    pub field: String,
    /// Value kind.
    pub kind: SortKind,
    /// Largest first.
    pub descending: bool,
}

impl SortField {
    /// Ascending sort on `field`.
    pub fn new(field: impl Into<String>, kind: SortKind) -> Self {
        Self {
            field: field.into(),
            kind,
            descending: false,
        }
    }

    /// Reverses the direction.
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}

impl FromStr for SortField {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| IndexError::Sort {
            sort: s.to_string(),
            message: message.to_string(),
        };

        let (descending, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (field, kind) = match rest.strip_suffix('>').and_then(|r| r.split_once('<')) {
            Some((field, "double")) => (field, SortKind::Double),
            Some((field, "string")) => (field, SortKind::String),
            Some(_) => return Err(invalid("type must be <double> or <string>")),
            None => (rest, SortKind::default()),
        };
        let valid_name = !field.is_empty()
            && field
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
        if !valid_name {
            return Err(invalid("field names contain only letters, digits, '_' and '.'"));
        }
        Ok(Self {
            field: field.to_string(),
            kind,
            descending,
        })
    }
}

impl TryFrom<String> for SortField {
    type Error = IndexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortField> for String {
    fn from(value: SortField) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.descending { "-" } else { "" };
        let kind = match self.kind {
            SortKind::Double => "double",
            SortKind::String => "string",
        };
        write!(f, "{sign}{}<{kind}>", self.field)
    }
}

/// One component of a hit's position in the sort order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortValue {
    /// A relevance score or double field value.
    Number(f64),
    /// A document id or string field value.
    Text(String),
    /// The document has no value for the field; serialized as `null`.
    Missing,
}

/// A labelled interval of doubles counted by a range facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleRange {
    /// Label the count is reported under.
    pub label: String,
    /// Lower bound.
    pub min: f64,
    /// Whether `min` itself is in the range.
    #[serde(default = "inclusive")]
    pub min_inclusive: bool,
    /// Upper bound.
    pub max: f64,
    /// Whether `max` itself is in the range.
    #[serde(default = "inclusive")]
    pub max_inclusive: bool,
}

/// Serde default for the bounds of a [`DoubleRange`].
fn inclusive() -> bool {
    true
}

impl DoubleRange {
    /// Range from `min` to `max`, both inclusive.
    pub fn new(label: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            label: label.into(),
            min,
            min_inclusive: true,
            max,
            max_inclusive: true,
        }
    }

    /// True if `value` falls in the range.
    pub fn contains(&self, value: f64) -> bool {
        let above = if self.min_inclusive {
            value >= self.min
        } else {
            value > self.min
        };
        let below = if self.max_inclusive {
            value <= self.max
        } else {
            value < self.max
        };
        above && below
    }
}

/// One matching document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document id.
    pub id: String,
    /// Relevance score.
    pub score: f32,
    /// Stored field values.
    pub fields: Map<String, Value>,
    /// Position in the sort order; pass as [`SearchRequest::after`] to fetch
    /// the hits that follow this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<SortValue>,
}

/// Result of a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Number of matching documents, which may exceed `hits.len()`.
    pub total_hits: usize,
    /// Top hits in sort order.
    pub hits: Vec<SearchHit>,
    /// Distinct value counts per field named in [`SearchRequest::counts`].
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counts: FacetCounts,
    /// Range counts per field named in [`SearchRequest::ranges`].
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ranges: FacetCounts,
}

/// Point-in-time statistics of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Most recently applied update sequence.
    pub update_seq: u64,
    /// Number of searchable documents.
    pub num_docs: u64,
}
