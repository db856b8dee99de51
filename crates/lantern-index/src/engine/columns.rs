//! Typed reads of `string` fast field columns for sorting and facets.
//!
//! String and double values share the `string` JSON field. Within one segment
//! a path may have a text column, a numeric column, both, or neither; a
//! missing column reads as "no value" for every document.

use tantivy::{
    DocId,
    columnar::{Column, ColumnType, DynamicColumn, StrColumn},
    fastfield::FastFieldReaders,
};

use crate::schema::names;

/// Fast field path holding the values of `field`.
///
/// The document id is its own field; everything else lives under `string`.
pub fn column_path(field: &str) -> String {
    if field == names::ID {
        field.to_string()
    } else {
        format!("{}.{field}", names::STRING)
    }
}

/// The numeric column at one path, whatever width the segment chose.
pub enum Numbers {
    /// Stored as doubles.
    Float(Column<f64>),
    /// Stored as signed integers.
    Signed(Column<i64>),
    /// Stored as unsigned integers.
    Unsigned(Column<u64>),
}

impl Numbers {
    /// Opens the numeric column at `path`, if the segment has one.
    pub fn open(fast: &FastFieldReaders, path: &str) -> tantivy::Result<Option<Self>> {
        for handle in fast.dynamic_column_handles(path)? {
            if !matches!(
                handle.column_type(),
                ColumnType::F64 | ColumnType::I64 | ColumnType::U64
            ) {
                continue;
            }
            match handle.open()? {
                DynamicColumn::F64(column) => return Ok(Some(Self::Float(column))),
                DynamicColumn::I64(column) => return Ok(Some(Self::Signed(column))),
                DynamicColumn::U64(column) => return Ok(Some(Self::Unsigned(column))),
                _ => {}
            }
        }
        Ok(None)
    }

    /// First value of `doc`.
    pub fn first(&self, doc: DocId) -> Option<f64> {
        match self {
            Self::Float(column) => column.first(doc),
            Self::Signed(column) => column.first(doc).map(|v| v as f64),
            Self::Unsigned(column) => column.first(doc).map(|v| v as f64),
        }
    }

    /// Every value of `doc`.
    pub fn values(&self, doc: DocId) -> Vec<f64> {
        match self {
            Self::Float(column) => column.values_for_doc(doc).collect(),
            Self::Signed(column) => column.values_for_doc(doc).map(|v| v as f64).collect(),
            Self::Unsigned(column) => column.values_for_doc(doc).map(|v| v as f64).collect(),
        }
    }
}

/// Opens the text column at `path`, if the segment has one.
pub fn open_text(fast: &FastFieldReaders, path: &str) -> tantivy::Result<Option<StrColumn>> {
    fast.str(path)
}

/// Smallest text value of `doc`; unreadable terms count as missing.
pub fn first_text(column: &StrColumn, doc: DocId) -> Option<String> {
    let ord = column.term_ords(doc).next()?;
    let mut text = String::new();
    match column.ord_to_str(ord, &mut text) {
        Ok(true) => Some(text),
        Ok(false) | Err(_) => None,
    }
}

/// Distinct term ordinals of `doc`.
pub fn distinct_ords(column: &StrColumn, doc: DocId) -> Vec<u64> {
    let mut ords: Vec<u64> = column.term_ords(doc).collect();
    ords.sort_unstable();
    ords.dedup();
    ords
}
