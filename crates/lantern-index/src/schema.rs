//! Tantivy schema derived from an index definition.
//!
//! Every index has the same fixed fields plus one text field per analyzer
//! override:
//! - `_id`: document id (raw, stored, fast)
//! - `_partition`: partition key (raw)
//! - `text`: catch-all for text values without an override (default analyzer)
//! - `fields`: text values keyed by field name, queried as `fields.<name>`
//! - `string`: string and numeric values keyed by field name, queried as
//!   `string.<name>` (raw tokenizer, fast for sorting and facets)
//! - `_stored`: JSON object of the values returned with hits (stored only)
//! - `<field>`: text for fields with an analyzer override

use std::{collections::BTreeMap, iter};

use tantivy::schema::{
    FAST, Field, IndexRecordOption, JsonObjectOptions, STORED, STRING, Schema, TextFieldIndexing,
    TextOptions,
};

use crate::IndexDefinition;

/// Names of the fixed fields.
pub mod names {
    /// Document id.
    pub const ID: &str = "_id";
    /// Partition key.
    pub const PARTITION: &str = "_partition";
    /// Catch-all text.
    pub const TEXT: &str = "text";
    /// Text values keyed by field name.
    pub const FIELDS: &str = "fields";
    /// Raw string and numeric values keyed by field name.
    pub const STRING: &str = "string";
    /// Stored values.
    pub const STORED: &str = "_stored";
}

/// Tokenizer used for unanalyzed values.
const RAW_TOKENIZER: &str = "raw";

/// Handles to all fields in an index schema.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    /// The underlying Tantivy schema.
    schema: Schema,
    /// Document id.
    pub id: Field,
    /// Partition key.
    pub partition: Field,
    /// Catch-all text.
    pub text: Field,
    /// Text values keyed by field name.
    pub fields: Field,
    /// Raw string and numeric values keyed by field name.
    pub string: Field,
    /// Stored values as a JSON object string.
    pub stored: Field,
    /// Fields with an analyzer override, by field name.
    pub overrides: BTreeMap<String, Field>,
}

/// Indexing options for analyzed text using `tokenizer`.
fn analyzed(tokenizer: &str) -> TextFieldIndexing {
    TextFieldIndexing::default()
        .set_tokenizer(tokenizer)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions)
}

impl IndexSchema {
    /// Builds the schema for `definition`.
    pub fn for_definition(definition: &IndexDefinition) -> Self {
        let mut builder = Schema::builder();
        let default_analyzer = definition.default_analyzer.as_str();

        let id = builder.add_text_field(names::ID, STRING | STORED | FAST);
        let partition = builder.add_text_field(names::PARTITION, STRING);

        let text = builder.add_text_field(
            names::TEXT,
            TextOptions::default().set_indexing_options(analyzed(default_analyzer)),
        );
        let fields = builder.add_json_field(
            names::FIELDS,
            JsonObjectOptions::default().set_indexing_options(analyzed(default_analyzer)),
        );
        let string = builder.add_json_field(
            names::STRING,
            JsonObjectOptions::default()
                .set_indexing_options(
                    TextFieldIndexing::default()
                        .set_tokenizer(RAW_TOKENIZER)
                        .set_index_option(IndexRecordOption::WithFreqs),
                )
                .set_fast(None),
        );
        let stored = builder.add_text_field(names::STORED, STORED);

        let overrides = definition
            .field_analyzers
            .iter()
            .map(|(name, analyzer)| {
                let options = TextOptions::default().set_indexing_options(analyzed(analyzer));
                (name.clone(), builder.add_text_field(name, options))
            })
            .collect();

        Self {
            schema: builder.build(),
            id,
            partition,
            text,
            fields,
            string,
            stored,
            overrides,
        }
    }

    /// Returns a reference to the underlying Tantivy schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Fields searched by query terms without an explicit field.
    pub fn default_query_fields(&self) -> Vec<Field> {
        iter::once(self.text)
            .chain(self.overrides.values().copied())
            .collect()
    }
}
