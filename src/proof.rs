//! Proof model and the proof-shaping steps of the verify-hash and
//! reveal-data algorithms.

use chrono::prelude::*;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canon::canonicalize;
use crate::error::Error;
use crate::jsonld::{JsonLdProcessor, REQUIRED_CONTEXTS, SECURITY_V2_CONTEXT};
use crate::ldp::now_ms;

/// Signature types recognized by the BBS+ suites.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum SignatureType {
    BbsBlsSignature2020,
    BbsBlsSignatureProof2020,
}

impl SignatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BbsBlsSignature2020 => "BbsBlsSignature2020",
            Self::BbsBlsSignatureProof2020 => "BbsBlsSignatureProof2020",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProofPurpose {
    AssertionMethod,
    Authentication,
    KeyAgreement,
    ContractAgreement,
    CapabilityInvocation,
    CapabilityDelegation,
}

impl Default for ProofPurpose {
    fn default() -> Self {
        Self::AssertionMethod
    }
}

/// A `BbsBlsSignature2020` or `BbsBlsSignatureProof2020` proof object.
///
/// `proofValue` and `nonce` are base64 (standard alphabet) on the wire;
/// `@context` only ever appears transiently while hashing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BbsPlusSignature2020Proof {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(rename = "type")]
    pub type_: SignatureType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    pub verification_method: String,
    pub proof_purpose: ProofPurpose,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proof_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl TryFrom<Value> for BbsPlusSignature2020Proof {
    type Error = Error;

    fn try_from(proof: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(proof).map_err(Error::CoercingProof)
    }
}

/// Options threaded into the create-verify-hash algorithm.
///
/// `created` backs the `created` default applied by [`prepare_proof`]; tests
/// pin it for determinism, callers normally leave it unset and get the
/// current time.
#[derive(Debug, Clone, Default)]
pub struct ProofOptions {
    pub contexts: Vec<Value>,
    pub created: Option<DateTime<Utc>>,
}

/// Options for creating a `BbsBlsSignature2020` proof.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LinkedDataProofOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_purpose: Option<ProofPurpose>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// Shape a proof for hashing.
///
/// Canonicalization is sensitive to every field, so the volatile ones are
/// stripped and the type normalized before the proof is hashed:
/// `proofValue` and `nonce` are removed, a missing `created` is defaulted,
/// the type is forced back to `BbsBlsSignature2020` (derived proofs verify
/// against the signature suite's type), and `@context` is set to the
/// option contexts, or the suite's required contexts when none are given.
pub fn prepare_proof(proof: &Value, options: &ProofOptions) -> Result<Map<String, Value>, Error> {
    let mut generic: Map<String, Value> =
        serde_json::from_value(proof.clone()).map_err(Error::PreparingProof)?;

    generic.remove("proofValue");
    generic.remove("nonce");

    let created_missing = match generic.get("created") {
        None => true,
        Some(Value::String(created)) => created.is_empty(),
        Some(_) => false,
    };
    if created_missing {
        let created = options.created.unwrap_or_else(now_ms);
        generic.insert(
            "created".to_string(),
            Value::String(created.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
    }

    generic.insert(
        "type".to_string(),
        Value::String(SignatureType::BbsBlsSignature2020.as_str().to_string()),
    );

    let contexts = if options.contexts.is_empty() {
        REQUIRED_CONTEXTS
            .iter()
            .map(|context| Value::String((*context).to_string()))
            .collect()
    } else {
        options.contexts.clone()
    };
    generic.insert("@context".to_string(), Value::Array(contexts));

    Ok(generic)
}

/// Canonicalize a proof for reveal-data preparation: the signature value is
/// dropped and the W3C security context applied before normalization, so
/// the resulting statements match the ones hashed at verification time.
pub(crate) fn prepare_bls_proof_statements(
    processor: &dyn JsonLdProcessor,
    proof: &BbsPlusSignature2020Proof,
) -> Result<Vec<String>, Error> {
    let mut generic: Map<String, Value> =
        serde_json::from_value(serde_json::to_value(proof)?).map_err(Error::PreparingProof)?;
    generic.remove("proofValue");
    generic.insert(
        "@context".to_string(),
        Value::String(SECURITY_V2_CONTEXT.to_string()),
    );

    let canonical = canonicalize(processor, &Value::Object(generic))?;
    Ok(canonical.statements().map(str::to_string).collect())
}
