//! Count and range facets over every document matching a query.

use std::collections::{BTreeMap, HashMap};

use tantivy::{DocId, Searcher, collector::DocSetCollector, columnar::StrColumn, query::Query};

use super::columns::{Numbers, column_path, distinct_ords, open_text};
use crate::{DoubleRange, FacetCounts, IndexError, SearchRequest};

/// Facet results of one search.
#[derive(Debug, Default)]
pub struct Facets {
    /// Top distinct values per counted field.
    pub counts: FacetCounts,
    /// Matches per range label, per ranged field.
    pub ranges: FacetCounts,
}

/// Computes the facets `request` asks for over all documents matching
/// `query`, regardless of the hit limit.
pub fn collect(
    searcher: &Searcher,
    query: &dyn Query,
    request: &SearchRequest,
) -> Result<Facets, IndexError> {
    let matches = searcher
        .search(query, &DocSetCollector)
        .map_err(|e| IndexError::search(&e))?;
    let mut by_segment: BTreeMap<u32, Vec<DocId>> = BTreeMap::new();
    for address in matches {
        by_segment
            .entry(address.segment_ord)
            .or_default()
            .push(address.doc_id);
    }

    let mut tallies: BTreeMap<&str, HashMap<String, u64>> = request
        .counts
        .iter()
        .map(|field| (field.as_str(), HashMap::new()))
        .collect();
    let mut ranges: FacetCounts = request
        .ranges
        .iter()
        .map(|(field, ranges)| {
            let labels = ranges.iter().map(|r| (r.label.clone(), 0)).collect();
            (field.clone(), labels)
        })
        .collect();

    for (&segment_ord, docs) in &by_segment {
        let fast = searcher.segment_reader(segment_ord).fast_fields();
        for (field, tally) in &mut tallies {
            let path = column_path(field);
            if let Some(column) = open_text(fast, &path).map_err(|e| IndexError::search(&e))? {
                count_values(&column, docs, tally)?;
            }
        }
        for (field, bounds) in &request.ranges {
            let path = column_path(field);
            let Some(column) = Numbers::open(fast, &path).map_err(|e| IndexError::search(&e))?
            else {
                continue;
            };
            if let Some(counts) = ranges.get_mut(field) {
                count_ranges(&column, docs, bounds, counts);
            }
        }
    }

    let counts = tallies
        .into_iter()
        .map(|(field, tally)| (field.to_string(), top_n(tally, request.top_n)))
        .collect();
    Ok(Facets { counts, ranges })
}

/// Adds one to the tally of each distinct value of each doc.
fn count_values(
    column: &StrColumn,
    docs: &[DocId],
    tally: &mut HashMap<String, u64>,
) -> Result<(), IndexError> {
    let mut by_ord: HashMap<u64, u64> = HashMap::new();
    for &doc in docs {
        for ord in distinct_ords(column, doc) {
            *by_ord.entry(ord).or_default() += 1;
        }
    }
    let mut label = String::new();
    for (ord, n) in by_ord {
        label.clear();
        if column.ord_to_str(ord, &mut label)? {
            *tally.entry(label.clone()).or_default() += n;
        }
    }
    Ok(())
}

/// Adds one to each range holding any value of each doc.
fn count_ranges(
    column: &Numbers,
    docs: &[DocId],
    bounds: &[DoubleRange],
    counts: &mut BTreeMap<String, u64>,
) {
    for &doc in docs {
        let values = column.values(doc);
        for range in bounds {
            if values.iter().any(|&v| range.contains(v))
                && let Some(count) = counts.get_mut(&range.label)
            {
                *count += 1;
            }
        }
    }
}

/// Keeps the `n` most frequent labels, breaking ties by label.
fn top_n(tally: HashMap<String, u64>, n: usize) -> BTreeMap<String, u64> {
    let mut entries: Vec<(String, u64)> = tally.into_iter().collect();
    entries.sort_by(|(a_label, a), (b_label, b)| b.cmp(a).then_with(|| a_label.cmp(b_label)));
    entries.truncate(n);
    entries.into_iter().collect()
}
