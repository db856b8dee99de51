//! Named text analyzers.
//!
//! An index definition refers to analyzers by name. Each name maps to a fixed
//! tantivy pipeline:
//!
//! - `standard`: `SimpleTokenizer`, `RemoveLongFilter`, `LowerCaser`
//! - `simple`: `SimpleTokenizer`, `LowerCaser`
//! - `whitespace`: `WhitespaceTokenizer` only, case preserved
//! - `keyword`: the whole input as one token
//! - a stemmer language such as `english`: the `standard` pipeline followed by
//!   a `Stemmer` for that language
//!
//! Analyzers are registered with an index under their own name, so a field
//! configured with `english` uses the tokenizer named `english`.

use std::iter;

use tantivy::{
    Index,
    tokenizer::{
        Language, LowerCaser, RawTokenizer, RemoveLongFilter, SimpleTokenizer, Stemmer,
        TextAnalyzer, TokenStream, WhitespaceTokenizer,
    },
};

use crate::{IndexDefinition, IndexError};

/// Maximum token length in bytes before filtering.
const MAX_TOKEN_LENGTH: usize = 40;

/// Analyzer names that are not stemmer languages.
pub const BASIC_ANALYZERS: &[&str] = &["standard", "simple", "whitespace", "keyword"];

/// Parses a stemmer language string into a Tantivy `Language`.
///
/// Returns `None` if the language is not recognized.
fn parse_language(name: &str) -> Option<Language> {
    match name {
        "arabic" => Some(Language::Arabic),
        "danish" => Some(Language::Danish),
        "dutch" => Some(Language::Dutch),
        "english" => Some(Language::English),
        "finnish" => Some(Language::Finnish),
        "french" => Some(Language::French),
        "german" => Some(Language::German),
        "greek" => Some(Language::Greek),
        "hungarian" => Some(Language::Hungarian),
        "italian" => Some(Language::Italian),
        "norwegian" => Some(Language::Norwegian),
        "portuguese" => Some(Language::Portuguese),
        "romanian" => Some(Language::Romanian),
        "russian" => Some(Language::Russian),
        "spanish" => Some(Language::Spanish),
        "swedish" => Some(Language::Swedish),
        "tamil" => Some(Language::Tamil),
        "turkish" => Some(Language::Turkish),
        _ => None,
    }
}

/// Builds the analyzer registered under `name`.
pub fn build_analyzer(name: &str) -> Result<TextAnalyzer, IndexError> {
    let analyzer = match name {
        "standard" => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
            .filter(LowerCaser)
            .build(),
        "simple" => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .build(),
        "whitespace" => TextAnalyzer::builder(WhitespaceTokenizer::default()).build(),
        "keyword" => TextAnalyzer::builder(RawTokenizer::default()).build(),
        other => {
            let language =
                parse_language(other).ok_or_else(|| IndexError::InvalidAnalyzer(other.into()))?;
            TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
                .filter(LowerCaser)
                .filter(Stemmer::new(language))
                .build()
        }
    };
    Ok(analyzer)
}

/// Returns true if `name` is a known analyzer.
pub fn is_known(name: &str) -> bool {
    BASIC_ANALYZERS.contains(&name) || parse_language(name).is_some()
}

/// Fails with [`IndexError::InvalidAnalyzer`] on the first unknown analyzer
/// the definition names.
pub fn check_definition(definition: &IndexDefinition) -> Result<(), IndexError> {
    let names = iter::once(&definition.default_analyzer)
        .chain(definition.field_analyzers.values());
    for name in names {
        if !is_known(name) {
            return Err(IndexError::InvalidAnalyzer(name.clone()));
        }
    }
    Ok(())
}

/// Registers every analyzer the definition names with `index`.
pub fn register_analyzers(index: &Index, definition: &IndexDefinition) -> Result<(), IndexError> {
    let names = iter::once(&definition.default_analyzer)
        .chain(definition.field_analyzers.values());
    for name in names {
        index.tokenizers().register(name, build_analyzer(name)?);
    }
    Ok(())
}

/// Runs `text` through the analyzer `name` and returns the produced tokens.
pub fn analyze(name: &str, text: &str) -> Result<Vec<String>, IndexError> {
    let mut analyzer = build_analyzer(name)?;
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while let Some(token) = stream.next() {
        tokens.push(token.text.clone());
    }
    Ok(tokens)
}
