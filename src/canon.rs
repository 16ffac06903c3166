//! Canonicalization of generic documents into N-Quad statements.

use serde_json::Value;

use crate::error::Error;
use crate::jsonld::JsonLdProcessor;

/// Output of one URDNA2015 pass.
///
/// The verify-hash construction consumes the joined string while the
/// derivation algorithm consumes the statement list; both views come from
/// the same `normalize` call so the two never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonicalized {
    nquads: String,
}

impl Canonicalized {
    pub(crate) fn new(nquads: String) -> Self {
        Self { nquads }
    }

    /// The canonical N-Quads, newline-terminated.
    pub fn as_str(&self) -> &str {
        &self.nquads
    }

    /// Individual statements, in canonical order, blank lines dropped.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.nquads.split('\n').filter(|line| !line.trim().is_empty())
    }

    pub fn into_nquads(self) -> String {
        self.nquads
    }
}

/// Canonicalize a generic document via the JSON-LD processor.
pub fn canonicalize(
    processor: &dyn JsonLdProcessor,
    document: &Value,
) -> Result<Canonicalized, Error> {
    let nquads = processor
        .normalize(document)
        .map_err(Error::Canonicalizing)?;
    Ok(Canonicalized::new(nquads))
}
