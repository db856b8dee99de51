//! The tantivy-backed engine.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tantivy::{
    Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term,
    collector::{Count, TopDocs},
    directory::MmapDirectory,
    query::{BooleanQuery, Occur, Query, QueryParser, TermQuery},
    schema::{IndexRecordOption, OwnedValue, Value as _},
};
use tracing::debug;

use super::{Engine, EngineFactory, facets, ordering::SortOrder};
use crate::{
    DocField, DocumentUpdateRequest, IndexDefinition, IndexError, SearchHit, SearchRequest,
    SearchResults, SortValue, analyzer, schema::IndexSchema, sequence::SequencePermit,
};

/// Engine version under which the tantivy engine is registered.
pub const TANTIVY_ENGINE_VERSION: u32 = 1;

/// Default heap size for the index writer (50 MB).
const DEFAULT_HEAP_SIZE: usize = 50_000_000;

/// Commit metadata stored in the tantivy commit payload.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CommitPayload {
    /// Update sequence covered by the commit.
    update_seq: u64,
}

/// Opens [`TantivyEngine`]s.
#[derive(Debug, Clone)]
pub struct TantivyFactory {
    /// Writer heap size in bytes.
    heap_size: usize,
}

impl Default for TantivyFactory {
    fn default() -> Self {
        Self {
            heap_size: DEFAULT_HEAP_SIZE,
        }
    }
}

impl TantivyFactory {
    /// Sets the writer heap size. Tantivy requires at least 15 MB.
    pub fn with_heap_size(mut self, heap_size: usize) -> Self {
        self.heap_size = heap_size;
        self
    }
}

impl EngineFactory for TantivyFactory {
    type Engine = TantivyEngine;

    fn validate(&self, definition: &IndexDefinition) -> Result<(), IndexError> {
        definition.check_fields()?;
        analyzer::check_definition(definition)
    }

    fn open(&self, path: &Path, definition: &IndexDefinition) -> Result<TantivyEngine, IndexError> {
        self.validate(definition)?;
        TantivyEngine::open(path, definition, self.heap_size)
    }
}

/// One open tantivy index: a single writer and a manually reloaded reader.
pub struct TantivyEngine {
    /// Storage directory.
    path: PathBuf,
    /// The Tantivy index.
    index: Index,
    /// The index writer. Tantivy allows only one per directory.
    writer: Mutex<IndexWriter>,
    /// Reader, reloaded after every commit.
    reader: IndexReader,
    /// Schema with field handles.
    schema: IndexSchema,
    /// Set by every mutation, cleared by a successful commit.
    dirty: AtomicBool,
    /// Sequence recovered from the last commit payload.
    committed_seq: u64,
}

impl TantivyEngine {
    /// Opens or creates the index at `path`.
    fn open(path: &Path, definition: &IndexDefinition, heap_size: usize) -> Result<Self, IndexError> {
        let schema = IndexSchema::for_definition(definition);

        fs::create_dir_all(path)?;

        let dir = MmapDirectory::open(path).map_err(|e| {
            let err: tantivy::TantivyError = e.into();
            IndexError::open_index(path.to_path_buf(), &err)
        })?;

        let index = Index::open_or_create(dir, schema.schema().clone())
            .map_err(|e| IndexError::open_index(path.to_path_buf(), &e))?;
        analyzer::register_analyzers(&index, definition)?;

        let committed_seq = match index
            .load_metas()
            .map_err(|e| IndexError::open_index(path.to_path_buf(), &e))?
            .payload
        {
            Some(payload) => {
                serde_json::from_str::<CommitPayload>(&payload)
                    .map_err(|e| IndexError::OpenIndex {
                        path: path.to_path_buf(),
                        message: format!("malformed commit payload: {e}"),
                    })?
                    .update_seq
            }
            None => 0,
        };

        let writer: IndexWriter = index
            .writer_with_num_threads(1, heap_size)
            .map_err(|e| IndexError::open_index(path.to_path_buf(), &e))?;

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| IndexError::open_index(path.to_path_buf(), &e))?;

        debug!(path = %path.display(), committed_seq, "opened tantivy index");

        Ok(Self {
            path: path.to_path_buf(),
            index,
            writer: Mutex::new(writer),
            reader,
            schema,
            dirty: AtomicBool::new(false),
            committed_seq,
        })
    }

    /// Converts an update request into a tantivy document.
    fn build_document(&self, doc_id: &str, request: &DocumentUpdateRequest) -> TantivyDocument {
        let mut doc = TantivyDocument::new();
        doc.add_text(self.schema.id, doc_id);
        if let Some(partition) = &request.partition {
            doc.add_text(self.schema.partition, partition);
        }

        let mut named_text: BTreeMap<String, Vec<OwnedValue>> = BTreeMap::new();
        let mut raw: BTreeMap<String, Vec<OwnedValue>> = BTreeMap::new();
        let mut stored = Map::new();

        for field in request.fields.iter().filter(|f| !f.is_reserved()) {
            match field {
                DocField::Text { name, value, store } => {
                    match self.schema.overrides.get(name) {
                        Some(&dedicated) => doc.add_text(dedicated, value),
                        None => {
                            doc.add_text(self.schema.text, value);
                            named_text
                                .entry(name.clone())
                                .or_default()
                                .push(OwnedValue::Str(value.clone()));
                        }
                    }
                    if *store {
                        stored.insert(name.clone(), Value::String(value.clone()));
                    }
                }
                DocField::String { name, value, store } => {
                    raw.entry(name.clone())
                        .or_default()
                        .push(OwnedValue::Str(value.clone()));
                    if *store {
                        stored.insert(name.clone(), Value::String(value.clone()));
                    }
                }
                DocField::Double { name, value, store } => {
                    raw.entry(name.clone())
                        .or_default()
                        .push(OwnedValue::F64(*value));
                    if *store {
                        stored.insert(name.clone(), Value::from(*value));
                    }
                }
                DocField::Stored { name, value } => {
                    stored.insert(name.clone(), value.clone());
                }
            }
        }

        if !named_text.is_empty() {
            doc.add_object(self.schema.fields, flatten(named_text));
        }
        if !raw.is_empty() {
            doc.add_object(self.schema.string, flatten(raw));
        }
        if !stored.is_empty() {
            doc.add_text(self.schema.stored, Value::Object(stored).to_string());
        }
        doc
    }

    /// Parses the query and applies the partition filter.
    fn build_query(&self, request: &SearchRequest) -> Result<Box<dyn Query>, IndexError> {
        let parser = QueryParser::for_index(&self.index, self.schema.default_query_fields());
        let query = parser
            .parse_query(&request.query)
            .map_err(|e| IndexError::Query {
                query: request.query.clone(),
                message: e.to_string(),
            })?;

        Ok(match &request.partition {
            Some(partition) => {
                let term = Term::from_field_text(self.schema.partition, partition);
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, query),
                    (
                        Occur::Must,
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
                    ),
                ]))
            }
            None => query,
        })
    }

    /// Converts a stored document into a hit.
    fn to_hit(&self, doc: &TantivyDocument, score: f32, order: Vec<SortValue>) -> SearchHit {
        let id = doc
            .get_first(self.schema.id)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let fields = doc
            .get_first(self.schema.stored)
            .and_then(|v| v.as_str())
            .and_then(|s| serde_json::from_str::<Map<String, Value>>(s).ok())
            .unwrap_or_default();
        SearchHit {
            id,
            score,
            fields,
            order,
        }
    }

    /// Term matching the document id.
    fn id_term(&self, doc_id: &str) -> Term {
        Term::from_field_text(self.schema.id, doc_id)
    }
}

/// Collapses single-valued entries; repeated names become arrays.
fn flatten(values: BTreeMap<String, Vec<OwnedValue>>) -> BTreeMap<String, OwnedValue> {
    values
        .into_iter()
        .map(|(name, mut values)| {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                OwnedValue::Array(values)
            };
            (name, value)
        })
        .collect()
}

impl Engine for TantivyEngine {
    fn committed_seq(&self) -> u64 {
        self.committed_seq
    }

    fn num_docs(&self) -> Result<u64, IndexError> {
        Ok(self.reader.searcher().num_docs())
    }

    fn apply_update(
        &self,
        _permit: &SequencePermit<'_>,
        doc_id: &str,
        request: &DocumentUpdateRequest,
    ) -> Result<(), IndexError> {
        let doc = self.build_document(doc_id, request);
        let writer = self.writer.lock();
        self.dirty.store(true, Ordering::Release);
        writer.delete_term(self.id_term(doc_id));
        writer.add_document(doc).map_err(|e| IndexError::write(&e))?;
        Ok(())
    }

    fn apply_delete(&self, _permit: &SequencePermit<'_>, doc_id: &str) -> Result<(), IndexError> {
        let writer = self.writer.lock();
        self.dirty.store(true, Ordering::Release);
        writer.delete_term(self.id_term(doc_id));
        Ok(())
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchResults, IndexError> {
        let order = SortOrder::for_request(request)?;
        let query = self.build_query(request)?;
        let searcher = self.reader.searcher();

        let (hits, total_hits) = if request.limit == 0 {
            let total_hits = searcher
                .search(&*query, &Count)
                .map_err(|e| IndexError::search(&e))?;
            (Vec::new(), total_hits)
        } else {
            let top = TopDocs::with_limit(request.limit).tweak_score(order);
            let (top_docs, total_hits) = searcher
                .search(&*query, &(top, Count))
                .map_err(|e| IndexError::search(&e))?;

            let mut hits = Vec::with_capacity(top_docs.len());
            // Documents at or before the `after` cursor have no key.
            for (key, address) in top_docs {
                let Some(key) = key else { continue };
                let doc: TantivyDocument = searcher
                    .doc(address)
                    .map_err(|e| IndexError::search(&e))?;
                let (values, score) = key.into_parts();
                hits.push(self.to_hit(&doc, score, values));
            }
            (hits, total_hits)
        };

        let mut results = SearchResults {
            total_hits,
            hits,
            ..SearchResults::default()
        };
        if request.has_facets() {
            let facets = facets::collect(&searcher, &*query, request)?;
            results.counts = facets.counts;
            results.ranges = facets.ranges;
        }
        Ok(results)
    }

    fn commit(&self, update_seq: u64) -> Result<bool, IndexError> {
        let mut writer = self.writer.lock();
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }

        let payload = serde_json::to_string(&CommitPayload { update_seq })
            .map_err(|e| IndexError::Commit(e.to_string()))?;
        let committed = writer.prepare_commit().and_then(|mut prepared| {
            prepared.set_payload(&payload);
            prepared.commit()
        });
        if let Err(e) = committed {
            self.dirty.store(true, Ordering::Release);
            return Err(IndexError::commit(&e));
        }
        drop(writer);

        self.reader.reload().map_err(|e| IndexError::commit(&e))?;
        debug!(path = %self.path.display(), update_seq, "committed tantivy index");
        Ok(true)
    }

    fn close(self, delete: bool) -> Result<(), IndexError> {
        let Self {
            path,
            index,
            writer,
            reader,
            ..
        } = self;

        let waited = writer.into_inner().wait_merging_threads();
        drop(reader);
        drop(index);
        if let Err(e) = waited {
            if !delete {
                return Err(IndexError::commit(&e));
            }
        }

        if delete {
            match fs::remove_dir_all(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            debug!(path = %path.display(), "deleted tantivy index");
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::{DoubleRange, SortField, SortKind, sequence::Sequencer};

    fn open(temp: &TempDir, definition: &IndexDefinition) -> TantivyEngine {
        TantivyFactory::default()
            .open(&temp.path().join("index"), definition)
            .unwrap()
    }

    fn text(name: &str, value: &str) -> DocField {
        DocField::Text {
            name: name.into(),
            value: value.into(),
            store: true,
        }
    }

    fn string(name: &str, value: &str) -> DocField {
        DocField::String {
            name: name.into(),
            value: value.into(),
            store: false,
        }
    }

    fn double(name: &str, value: f64) -> DocField {
        DocField::Double {
            name: name.into(),
            value,
            store: false,
        }
    }

    /// Four products: "a" and "c" cost 5, "b" costs 9, "d" has no price.
    fn catalog(temp: &TempDir) -> TantivyEngine {
        let engine = open(temp, &IndexDefinition::new("standard"));
        let seq = Sequencer::new(0);
        let products = [
            ("a", Some(5.0), "red", "pear"),
            ("b", Some(9.0), "blue", "apple"),
            ("c", Some(5.0), "red", "fig"),
            ("d", None, "green", "kiwi"),
        ];
        for (n, (id, price, color, name)) in products.into_iter().enumerate() {
            let mut fields = vec![
                text("body", "product"),
                string("color", color),
                string("name", name),
            ];
            fields.extend(price.map(|p| double("price", p)));
            update(&engine, &seq, n as u64 + 1, id, fields);
        }
        engine.commit(seq.current()).unwrap();
        engine
    }

    fn ids(results: &SearchResults) -> Vec<&str> {
        results.hits.iter().map(|hit| hit.id.as_str()).collect()
    }

    fn update(engine: &TantivyEngine, seq: &Sequencer, n: u64, id: &str, fields: Vec<DocField>) {
        let permit = seq.begin(n).unwrap();
        let request = DocumentUpdateRequest {
            seq: n,
            partition: None,
            fields,
        };
        engine.apply_update(&permit, id, &request).unwrap();
        permit.advance();
    }

    #[test]
    fn new_index_starts_at_zero() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        assert_eq!(engine.committed_seq(), 0);
        assert_eq!(engine.num_docs().unwrap(), 0);
        assert!(temp.path().join("index").join("meta.json").exists());
    }

    #[test]
    fn commit_persists_sequence_across_reopen() {
        let temp = TempDir::new().unwrap();
        let definition = IndexDefinition::new("standard");
        let seq = Sequencer::new(0);
        {
            let engine = open(&temp, &definition);
            update(&engine, &seq, 1, "a", vec![text("body", "hello world")]);
            update(&engine, &seq, 2, "b", vec![text("body", "goodbye world")]);
            assert!(engine.commit(seq.current()).unwrap());
            assert_eq!(engine.num_docs().unwrap(), 2);
            engine.close(false).unwrap();
        }

        let engine = open(&temp, &definition);
        assert_eq!(engine.committed_seq(), 2);
        assert_eq!(engine.num_docs().unwrap(), 2);
    }

    #[test]
    fn clean_commit_is_noop() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        assert!(!engine.commit(0).unwrap());

        let seq = Sequencer::new(0);
        update(&engine, &seq, 1, "a", vec![text("body", "x")]);
        assert!(engine.commit(1).unwrap());
        assert!(!engine.commit(1).unwrap());
    }

    #[test]
    fn update_replaces_document() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        let seq = Sequencer::new(0);
        update(&engine, &seq, 1, "a", vec![text("body", "apples")]);
        update(&engine, &seq, 2, "a", vec![text("body", "oranges")]);
        engine.commit(2).unwrap();

        assert_eq!(engine.num_docs().unwrap(), 1);
        let apples = engine.search(&SearchRequest::new("apples")).unwrap();
        assert_eq!(apples.total_hits, 0);
        let oranges = engine.search(&SearchRequest::new("oranges")).unwrap();
        assert_eq!(oranges.total_hits, 1);
        assert_eq!(oranges.hits[0].id, "a");
        assert_eq!(oranges.hits[0].fields["body"], json!("oranges"));
    }

    #[test]
    fn delete_removes_document() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        let seq = Sequencer::new(0);
        update(&engine, &seq, 1, "a", vec![text("body", "apples")]);

        let permit = seq.begin(2).unwrap();
        engine.apply_delete(&permit, "a").unwrap();
        permit.advance();
        engine.commit(2).unwrap();

        assert_eq!(engine.num_docs().unwrap(), 0);
    }

    #[test]
    fn search_by_named_and_raw_fields() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        let seq = Sequencer::new(0);
        update(
            &engine,
            &seq,
            1,
            "a",
            vec![
                text("title", "Rust Book"),
                DocField::String {
                    name: "lang".into(),
                    value: "british".into(),
                    store: false,
                },
                DocField::Stored {
                    name: "meta".into(),
                    value: json!({"pages": 500}),
                },
            ],
        );
        engine.commit(1).unwrap();

        let by_title = engine.search(&SearchRequest::new("fields.title:rust")).unwrap();
        assert_eq!(by_title.total_hits, 1);
        let hit = &by_title.hits[0];
        assert_eq!(hit.fields["title"], json!("Rust Book"));
        assert_eq!(hit.fields["meta"], json!({"pages": 500}));
        assert!(!hit.fields.contains_key("lang"));

        let by_lang = engine.search(&SearchRequest::new("string.lang:british")).unwrap();
        assert_eq!(by_lang.total_hits, 1);
    }

    #[test]
    fn reserved_fields_are_skipped() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        let seq = Sequencer::new(0);
        update(&engine, &seq, 1, "real", vec![text("_id", "fake")]);
        engine.commit(1).unwrap();

        let results = engine.search(&SearchRequest::new("fake")).unwrap();
        assert_eq!(results.total_hits, 0);
    }

    #[test]
    fn field_analyzer_override() {
        let temp = TempDir::new().unwrap();
        let definition = IndexDefinition::new("standard").with_field_analyzer("title", "english");
        let engine = open(&temp, &definition);
        let seq = Sequencer::new(0);
        update(&engine, &seq, 1, "a", vec![text("title", "running")]);
        engine.commit(1).unwrap();

        let results = engine.search(&SearchRequest::new("title:runs")).unwrap();
        assert_eq!(results.total_hits, 1);
        let unqualified = engine.search(&SearchRequest::new("run")).unwrap();
        assert_eq!(unqualified.total_hits, 1);
    }

    #[test]
    fn partition_filter() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        let seq = Sequencer::new(0);
        for (n, (id, partition)) in [("a", "red"), ("b", "blue")].into_iter().enumerate() {
            let n = n as u64 + 1;
            let permit = seq.begin(n).unwrap();
            let request = DocumentUpdateRequest {
                seq: n,
                partition: Some(partition.into()),
                fields: vec![text("body", "shared words")],
            };
            engine.apply_update(&permit, id, &request).unwrap();
            permit.advance();
        }
        engine.commit(2).unwrap();

        let mut request = SearchRequest::new("shared");
        assert_eq!(engine.search(&request).unwrap().total_hits, 2);
        request.partition = Some("blue".into());
        let results = engine.search(&request).unwrap();
        assert_eq!(results.total_hits, 1);
        assert_eq!(results.hits[0].id, "b");
    }

    #[test]
    fn limit_caps_hits_not_total() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        let seq = Sequencer::new(0);
        for n in 1..=5 {
            update(&engine, &seq, n, &format!("d{n}"), vec![text("body", "common")]);
        }
        engine.commit(5).unwrap();

        let mut request = SearchRequest::new("common");
        request.limit = 2;
        let results = engine.search(&request).unwrap();
        assert_eq!(results.total_hits, 5);
        assert_eq!(results.hits.len(), 2);

        request.limit = 0;
        let results = engine.search(&request).unwrap();
        assert_eq!(results.total_hits, 5);
        assert!(results.hits.is_empty());
    }

    #[test]
    fn sorts_by_double_with_id_tie_break() {
        let temp = TempDir::new().unwrap();
        let engine = catalog(&temp);

        let mut request = SearchRequest::new("product");
        request.sort = vec![SortField::new("price", SortKind::Double).descending()];
        let results = engine.search(&request).unwrap();
        assert_eq!(ids(&results), vec!["b", "a", "c", "d"]);
        assert_eq!(
            results.hits[0].order,
            vec![SortValue::Number(9.0), SortValue::Text("b".into())]
        );
        assert_eq!(results.hits[3].order[0], SortValue::Missing);

        request.sort = vec![SortField::new("price", SortKind::Double)];
        let results = engine.search(&request).unwrap();
        assert_eq!(ids(&results), vec!["d", "a", "c", "b"]);
    }

    #[test]
    fn sorts_by_string() {
        let temp = TempDir::new().unwrap();
        let engine = catalog(&temp);

        let mut request = SearchRequest::new("product");
        request.sort = vec!["name<string>".parse().unwrap()];
        let results = engine.search(&request).unwrap();
        assert_eq!(ids(&results), vec!["b", "c", "d", "a"]);
        assert_eq!(results.hits[0].order[0], SortValue::Text("apple".into()));
    }

    #[test]
    fn after_resumes_where_previous_page_ended() {
        let temp = TempDir::new().unwrap();
        let engine = catalog(&temp);

        let mut request = SearchRequest::new("product");
        request.sort = vec!["-price".parse().unwrap()];
        request.limit = 2;
        let first = engine.search(&request).unwrap();
        assert_eq!(ids(&first), vec!["b", "a"]);

        request.after = Some(first.hits[1].order.clone());
        let second = engine.search(&request).unwrap();
        assert_eq!(ids(&second), vec!["c", "d"]);
        assert_eq!(second.total_hits, 4);

        request.after = Some(second.hits[1].order.clone());
        assert!(engine.search(&request).unwrap().hits.is_empty());
    }

    #[test]
    fn relevance_pages_break_ties_by_id() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        let seq = Sequencer::new(0);
        for id in ["d3", "d1", "d4", "d2"] {
            update(&engine, &seq, seq.current() + 1, id, vec![text("body", "same words")]);
        }
        engine.commit(seq.current()).unwrap();

        let mut request = SearchRequest::new("same");
        request.limit = 2;
        let first = engine.search(&request).unwrap();
        assert_eq!(ids(&first), vec!["d1", "d2"]);
        let hit = &first.hits[0];
        assert_eq!(hit.order[0], SortValue::Number(f64::from(hit.score)));

        request.after = Some(first.hits[1].order.clone());
        assert_eq!(ids(&engine.search(&request).unwrap()), vec!["d3", "d4"]);
    }

    #[test]
    fn bad_sort_is_rejected() {
        let temp = TempDir::new().unwrap();
        let engine = catalog(&temp);

        let mut request = SearchRequest::new("product");
        request.after = Some(vec![SortValue::Number(1.0)]);
        let err = engine.search(&request).unwrap_err();
        assert!(matches!(err, IndexError::Sort { .. }));

        request.after = None;
        request.sort = vec![SortField::new("_stored", SortKind::String)];
        let err = engine.search(&request).unwrap_err();
        assert!(matches!(err, IndexError::Sort { .. }));
    }

    #[test]
    fn counts_and_ranges_cover_all_matches() {
        let temp = TempDir::new().unwrap();
        let engine = catalog(&temp);

        let mut request = SearchRequest::new("product");
        request.limit = 0;
        request.top_n = 2;
        request.counts = vec!["color".into(), "missing".into()];
        let mut cheap = DoubleRange::new("cheap", 0.0, 5.0);
        cheap.max_inclusive = false;
        request.ranges.insert(
            "price".into(),
            vec![
                cheap,
                DoubleRange::new("mid", 5.0, 10.0),
                DoubleRange::new("dear", 100.0, 1000.0),
            ],
        );

        let results = engine.search(&request).unwrap();
        assert_eq!(results.total_hits, 4);
        assert!(results.hits.is_empty());

        let colors = &results.counts["color"];
        assert_eq!(colors.len(), 2);
        assert_eq!(colors["red"], 2);
        assert_eq!(colors["blue"], 1);
        assert!(results.counts["missing"].is_empty());

        let prices = &results.ranges["price"];
        assert_eq!(prices["cheap"], 0);
        assert_eq!(prices["mid"], 3);
        assert_eq!(prices["dear"], 0);
    }

    #[test]
    fn facets_respect_partition() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        let seq = Sequencer::new(0);
        for (n, (id, partition)) in [("a", "p1"), ("b", "p2"), ("c", "p2")].into_iter().enumerate() {
            let n = n as u64 + 1;
            let permit = seq.begin(n).unwrap();
            let request = DocumentUpdateRequest {
                seq: n,
                partition: Some(partition.into()),
                fields: vec![text("body", "x"), string("tag", id)],
            };
            engine.apply_update(&permit, id, &request).unwrap();
            permit.advance();
        }
        engine.commit(3).unwrap();

        let mut request = SearchRequest::new("x");
        request.partition = Some("p2".into());
        request.counts = vec!["tag".into()];
        let results = engine.search(&request).unwrap();
        let tags: Vec<&str> = results.counts["tag"].keys().map(String::as_str).collect();
        assert_eq!(tags, vec!["b", "c"]);
    }

    #[test]
    fn uncommitted_changes_are_not_searchable() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        let seq = Sequencer::new(0);
        update(&engine, &seq, 1, "a", vec![text("body", "pending")]);
        assert_eq!(engine.search(&SearchRequest::new("pending")).unwrap().total_hits, 0);
    }

    #[test]
    fn invalid_query_is_rejected() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        let err = engine.search(&SearchRequest::new("nosuchfield:x")).unwrap_err();
        assert!(matches!(err, IndexError::Query { .. }));
    }

    #[test]
    fn invalid_analyzer_is_rejected() {
        let temp = TempDir::new().unwrap();
        let result = TantivyFactory::default()
            .open(&temp.path().join("index"), &IndexDefinition::new("klingon"));
        assert!(matches!(result, Err(IndexError::InvalidAnalyzer(_))));
    }

    #[test]
    fn close_with_delete_removes_storage() {
        let temp = TempDir::new().unwrap();
        let engine = open(&temp, &IndexDefinition::new("standard"));
        engine.close(true).unwrap();
        assert!(!temp.path().join("index").exists());
    }

    #[test]
    fn close_releases_writer_lock() {
        let temp = TempDir::new().unwrap();
        let definition = IndexDefinition::new("standard");
        let engine = open(&temp, &definition);
        engine.close(false).unwrap();
        open(&temp, &definition).close(false).unwrap();
    }
}
