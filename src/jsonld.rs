//! Seam to an external JSON-LD processor.
//!
//! The suites in this crate never process JSON-LD themselves; they drive an
//! implementation of [`JsonLdProcessor`] for compaction, framing and
//! URDNA2015 canonicalization, and only ever look at the resulting generic
//! documents and N-Quad strings.

use serde_json::{Map, Value};

pub const CREDENTIALS_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const SECURITY_V1_CONTEXT: &str = "https://w3id.org/security/v1";
pub const SECURITY_V2_CONTEXT: &str = "https://w3id.org/security/v2";
pub const BBS_V1_CONTEXT: &str = "https://w3id.org/security/bbs/v1";

/// Contexts every `BbsBlsSignature2020` provable must carry.
pub const REQUIRED_CONTEXTS: &[&str] = &[BBS_V1_CONTEXT];

/// Failure surfaced by a [`JsonLdProcessor`] implementation.
#[derive(Debug)]
pub struct JsonLdError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl JsonLdError {
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self(source.into())
    }
}

impl std::fmt::Display for JsonLdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for JsonLdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<String> for JsonLdError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for JsonLdError {
    fn from(message: &str) -> Self {
        Self::new(message.to_string())
    }
}

/// External JSON-LD processor contract.
///
/// `normalize` is expected to produce URDNA2015 output: newline-separated
/// N-Quad statements, each line terminated by a newline.
pub trait JsonLdProcessor {
    fn compact(&self, document: &Value, context: &Value) -> Result<Value, JsonLdError>;

    fn frame(&self, document: &Value, frame: &Value) -> Result<Value, JsonLdError>;

    fn normalize(&self, document: &Value) -> Result<String, JsonLdError>;
}

/// Collect the `@context` entries of a document, in order.
pub fn document_contexts(document: &Map<String, Value>) -> Vec<Value> {
    match document.get("@context") {
        Some(Value::Array(contexts)) => contexts.clone(),
        Some(context) => vec![context.clone()],
        None => Vec::new(),
    }
}

/// Append any of `required` missing from `contexts`, preserving order.
pub fn ensure_required_contexts(mut contexts: Vec<Value>, required: &[&str]) -> Vec<Value> {
    for context in required {
        if !contexts.iter().any(|c| c.as_str() == Some(context)) {
            contexts.push(Value::String((*context).to_string()));
        }
    }
    contexts
}
