//! Sort orders for search hits.
//!
//! Hits are ranked by a list of criteria that always ends with the document
//! id, so every hit has a distinct position and an `after` cursor resumes
//! exactly where the previous page stopped. Within one criterion a missing
//! value ranks below any number, and numbers rank below text.

use std::{cmp::Ordering, sync::Arc};

use tantivy::{
    DocId, Score, SegmentReader,
    collector::{ScoreSegmentTweaker, ScoreTweaker},
    columnar::StrColumn,
};

use super::columns::{Numbers, column_path, first_text, open_text};
use crate::{IndexError, SearchRequest, SortKind, SortValue, schema::names};

/// What one criterion ranks by.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Criterion {
    /// Query relevance.
    Relevance,
    /// A fast field column.
    Column {
        /// Resolved column path.
        path: String,
        /// Which column type to read.
        kind: SortKind,
    },
}

impl Criterion {
    /// The document id tie-break.
    fn id() -> Self {
        Self::Column {
            path: names::ID.to_string(),
            kind: SortKind::String,
        }
    }
}

/// Validated sort order of one search, with its optional resume cursor.
///
/// Used as a tantivy score tweaker: each collected document gets a
/// [`SortKey`], or `None` if it does not rank after the cursor.
#[derive(Debug, Clone)]
pub struct SortOrder {
    /// Criteria, most significant first.
    criteria: Arc<[Criterion]>,
    /// Direction of each criterion.
    descending: Arc<[bool]>,
    /// Only documents ranked after this key are kept.
    after: Option<SortKey>,
}

impl SortOrder {
    /// Builds the order requested by `request`.
    ///
    /// Without an explicit sort, hits rank by relevance. A document id
    /// criterion is appended unless the sort already ends with one.
    pub fn for_request(request: &SearchRequest) -> Result<Self, IndexError> {
        let sort_text = || {
            if request.sort.is_empty() {
                "relevance".to_string()
            } else {
                let parts: Vec<String> = request.sort.iter().map(ToString::to_string).collect();
                parts.join(",")
            }
        };
        let invalid = |message: String| IndexError::Sort {
            sort: sort_text(),
            message,
        };

        let mut ranks = Vec::with_capacity(request.sort.len() + 1);
        if request.sort.is_empty() {
            ranks.push((Criterion::Relevance, true));
        }
        for sort in &request.sort {
            if sort.field.starts_with('_') && sort.field != names::ID {
                return Err(invalid(format!("{} is not sortable", sort.field)));
            }
            if sort.field == names::ID && sort.kind != SortKind::String {
                return Err(invalid(format!("{} sorts as <string>", names::ID)));
            }
            let criterion = Criterion::Column {
                path: column_path(&sort.field),
                kind: sort.kind,
            };
            ranks.push((criterion, sort.descending));
        }
        if ranks.last().map(|(criterion, _)| criterion) != Some(&Criterion::id()) {
            ranks.push((Criterion::id(), false));
        }

        let (criteria, descending): (Vec<_>, Vec<_>) = ranks.into_iter().unzip();
        let descending: Arc<[bool]> = descending.into();
        let after = match &request.after {
            Some(values) if values.len() != criteria.len() => {
                return Err(invalid(format!(
                    "after has {} values but the sort has {}",
                    values.len(),
                    criteria.len()
                )));
            }
            Some(values) => Some(SortKey {
                values: values.clone(),
                score: 0.0,
                descending: Arc::clone(&descending),
            }),
            None => None,
        };

        Ok(Self {
            criteria: criteria.into(),
            descending,
            after,
        })
    }
}

impl ScoreTweaker<Option<SortKey>> for SortOrder {
    type Child = SegmentOrder;

    fn segment_tweaker(&self, segment_reader: &SegmentReader) -> tantivy::Result<SegmentOrder> {
        let fast = segment_reader.fast_fields();
        let mut columns = Vec::with_capacity(self.criteria.len());
        for criterion in self.criteria.iter() {
            columns.push(match criterion {
                Criterion::Relevance => SortColumn::Relevance,
                Criterion::Column {
                    path,
                    kind: SortKind::Double,
                } => Numbers::open(fast, path)?.map_or(SortColumn::Absent, SortColumn::Numbers),
                Criterion::Column {
                    path,
                    kind: SortKind::String,
                } => open_text(fast, path)?.map_or(SortColumn::Absent, SortColumn::Text),
            });
        }
        Ok(SegmentOrder {
            columns,
            descending: Arc::clone(&self.descending),
            after: self.after.clone(),
        })
    }
}

/// Where one criterion's values come from within a segment.
enum SortColumn {
    /// The query score.
    Relevance,
    /// A numeric column.
    Numbers(Numbers),
    /// A text column.
    Text(StrColumn),
    /// The segment has no column for this criterion.
    Absent,
}

impl SortColumn {
    /// Value of `doc` for this criterion.
    fn value(&self, doc: DocId, score: Score) -> SortValue {
        match self {
            Self::Relevance => SortValue::Number(f64::from(score)),
            Self::Numbers(column) => column.first(doc).map_or(SortValue::Missing, SortValue::Number),
            Self::Text(column) => first_text(column, doc).map_or(SortValue::Missing, SortValue::Text),
            Self::Absent => SortValue::Missing,
        }
    }
}

/// A [`SortOrder`] bound to the columns of one segment.
pub struct SegmentOrder {
    /// One column per criterion.
    columns: Vec<SortColumn>,
    /// Direction of each criterion.
    descending: Arc<[bool]>,
    /// Resume cursor.
    after: Option<SortKey>,
}

impl ScoreSegmentTweaker<Option<SortKey>> for SegmentOrder {
    fn score(&mut self, doc: DocId, score: Score) -> Option<SortKey> {
        let key = SortKey {
            values: self.columns.iter().map(|c| c.value(doc, score)).collect(),
            score,
            descending: Arc::clone(&self.descending),
        };
        match &self.after {
            Some(after) if key.rank(after) != Ordering::Less => None,
            _ => Some(key),
        }
    }
}

/// A document's position under a [`SortOrder`]. Greater keys rank first.
#[derive(Debug, Clone)]
pub struct SortKey {
    /// One value per criterion.
    values: Vec<SortValue>,
    /// Relevance score, reported with the hit.
    score: Score,
    /// Direction of each criterion.
    descending: Arc<[bool]>,
}

impl SortKey {
    /// Orders `self` against `other`; `Greater` means `self` ranks first.
    fn rank(&self, other: &Self) -> Ordering {
        self.values
            .iter()
            .zip(&other.values)
            .zip(self.descending.iter())
            .map(|((a, b), &descending)| {
                let ord = compare(a, b);
                if descending { ord } else { ord.reverse() }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Splits the key into the hit's sort values and relevance score.
    pub fn into_parts(self) -> (Vec<SortValue>, Score) {
        (self.values, self.score)
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.rank(other) == Ordering::Equal
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.rank(other))
    }
}

/// Ascending comparison of two values of one criterion.
fn compare(a: &SortValue, b: &SortValue) -> Ordering {
    match (a, b) {
        (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
        (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
        _ => class(a).cmp(&class(b)),
    }
}

/// Rank of a value's variant when two criteria values differ in kind.
fn class(value: &SortValue) -> u8 {
    match value {
        SortValue::Missing => 0,
        SortValue::Number(_) => 1,
        SortValue::Text(_) => 2,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::SortField;

    fn key(values: Vec<SortValue>, descending: &[bool]) -> SortKey {
        SortKey {
            values,
            score: 0.0,
            descending: descending.into(),
        }
    }

    fn num(v: f64) -> SortValue {
        SortValue::Number(v)
    }

    fn text(v: &str) -> SortValue {
        SortValue::Text(v.into())
    }

    #[test]
    fn default_order_is_relevance_then_id() {
        let order = SortOrder::for_request(&SearchRequest::new("*")).unwrap();
        assert_eq!(&*order.criteria, &[Criterion::Relevance, Criterion::id()]);
        assert_eq!(&*order.descending, &[true, false]);
    }

    #[test]
    fn id_is_appended_once() {
        let mut request = SearchRequest::new("*");
        request.sort = vec![SortField::new("price", SortKind::Double).descending()];
        let order = SortOrder::for_request(&request).unwrap();
        assert_eq!(order.criteria.len(), 2);
        assert_eq!(order.criteria[1], Criterion::id());

        request.sort.push(SortField::new("_id", SortKind::String).descending());
        let order = SortOrder::for_request(&request).unwrap();
        assert_eq!(order.criteria.len(), 2);
        assert_eq!(&*order.descending, &[true, true]);
    }

    #[test]
    fn rejects_unsortable_fields() {
        let mut request = SearchRequest::new("*");
        request.sort = vec![SortField::new("_partition", SortKind::String)];
        assert!(matches!(
            SortOrder::for_request(&request),
            Err(IndexError::Sort { .. })
        ));
        request.sort = vec![SortField::new("_id", SortKind::Double)];
        assert!(matches!(
            SortOrder::for_request(&request),
            Err(IndexError::Sort { .. })
        ));
    }

    #[test]
    fn after_must_cover_every_criterion() {
        let mut request = SearchRequest::new("*");
        request.after = Some(vec![num(1.0)]);
        let err = SortOrder::for_request(&request).unwrap_err();
        assert!(err.to_string().contains("after has 1 values but the sort has 2"));

        request.after = Some(vec![num(1.0), text("a")]);
        assert!(SortOrder::for_request(&request).unwrap().after.is_some());
    }

    #[test]
    fn direction_applies_per_criterion() {
        let dirs = [true, false];
        let cheap_b = key(vec![num(1.0), text("b")], &dirs);
        let dear_a = key(vec![num(9.0), text("a")], &dirs);
        let dear_b = key(vec![num(9.0), text("b")], &dirs);

        // Price descending, then id ascending.
        assert!(dear_a > dear_b);
        assert!(dear_b > cheap_b);
        assert_eq!(dear_a.rank(&dear_a), Ordering::Equal);
    }

    #[test]
    fn missing_ranks_below_numbers_and_text() {
        assert_eq!(compare(&SortValue::Missing, &num(-1e300)), Ordering::Less);
        assert_eq!(compare(&num(1e300), &text("")), Ordering::Less);
        assert_eq!(compare(&num(-0.0), &num(0.0)), Ordering::Less);

        // Ascending: missing values come first.
        let missing = key(vec![SortValue::Missing], &[false]);
        let present = key(vec![num(0.0)], &[false]);
        assert!(missing > present);
    }
}
