//! The `BbsBlsSignature2020` suites.
//!
//! `BbsPlusSignatureSuite` signs and verifies whole documents;
//! `BbsPlusSignatureProofSuite` derives selective-disclosure proofs from a
//! reveal frame and verifies the derived documents. Both hash documents
//! with the create-verify-hash construction: the canonical proof options
//! concatenated with the canonical document, each passed through the
//! suite digest (the identity, since BBS+ hashes every statement itself).

use std::collections::HashMap;

use chrono::prelude::*;
use serde_json::{Map, Value};

use crate::bbs::{BbsPlusSigner, BbsPlusVerifier};
use crate::canon::canonicalize;
use crate::error::Error;
use crate::jsonld::{
    document_contexts, ensure_required_contexts, JsonLdError, JsonLdProcessor, REQUIRED_CONTEXTS,
    SECURITY_V2_CONTEXT,
};
use crate::proof::{
    prepare_bls_proof_statements, prepare_proof, BbsPlusSignature2020Proof, LinkedDataProofOptions,
    ProofOptions, SignatureType,
};

/// Get current time to millisecond precision if possible
pub fn now_ms() -> DateTime<Utc> {
    let datetime = Utc::now();
    let ms = datetime.timestamp_subsec_millis();
    let ns = ms * 1_000_000;
    datetime.with_nanosecond(ns).unwrap_or(datetime)
}

/// A verification capability handed to [`BbsPlusSignatureProofSuite::verify`].
///
/// The suite only works with verifiers exposing the BBS+ capability;
/// anything else is rejected at runtime, mirroring the interface downcast
/// of the upstream suites.
pub trait Verifier {
    /// Identifier of the key backing this verifier.
    fn key_id(&self) -> &str;

    /// The BBS+ capability, when implemented.
    fn as_bbs_plus(&self) -> Option<&dyn BbsPlusVerifier> {
        None
    }
}

/// Removes `proof` from a document and puts it back when dropped, so the
/// caller's document is whole again on every exit path.
struct ProofGuard<'a> {
    document: &'a mut Map<String, Value>,
    proof: Option<Value>,
}

impl<'a> ProofGuard<'a> {
    fn strip(document: &'a mut Map<String, Value>) -> Self {
        let proof = document.remove("proof");
        ProofGuard { document, proof }
    }

    fn document(&self) -> &Map<String, Value> {
        self.document
    }
}

impl Drop for ProofGuard<'_> {
    fn drop(&mut self) {
        if let Some(proof) = self.proof.take() {
            self.document.insert("proof".to_string(), proof);
        }
    }
}

/// Output of the create-derive-proof data algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveProofResult {
    /// Position of each revealed statement in the original statement list,
    /// in revealed (framed canonical) order.
    pub revealed_indices: Vec<usize>,
    /// Canonical statements of the original, pre-frame document.
    pub input_proof_document_statements: Vec<String>,
    /// The framed document.
    pub revealed_document: Map<String, Value>,
}

/// The create-verify-hash algorithm.
///
/// <https://w3c-ccg.github.io/data-integrity-spec/#create-verify-hash-algorithm>,
/// augmented by <https://w3c-ccg.github.io/ldp-bbs2020/#create-verify-data-algorithm>:
/// the output is `digest(canonical proof options) || digest(canonical
/// document)` with the identity digest, a plain byte concatenation of
/// canonical text. The caller supplies the document without its `proof`.
pub fn create_verify_hash(
    processor: &dyn JsonLdProcessor,
    document: &Map<String, Value>,
    proof: &Value,
    options: &ProofOptions,
) -> Result<Vec<u8>, Error> {
    let prepared = prepare_proof(proof, options)?;

    let canonical_document = canonicalize(processor, &Value::Object(document.clone()))?;
    let canonical_proof = canonicalize(processor, &Value::Object(prepared))?;

    let mut output = canonical_proof.as_str().as_bytes().to_vec();
    output.extend_from_slice(canonical_document.as_str().as_bytes());
    Ok(output)
}

/// The create-derive-proof data algorithm.
///
/// <https://w3c-ccg.github.io/vc-di-bbs/#create-derive-proof-data-algorithm>
pub fn create_derive_proof(
    processor: &dyn JsonLdProcessor,
    input_document: &Map<String, Value>,
    reveal_frame: &Map<String, Value>,
) -> Result<DeriveProofResult, Error> {
    // 1. Canonicalize the input document into its statement set.
    let canonical = canonicalize(processor, &Value::Object(input_document.clone()))?;
    let statements: Vec<String> = canonical.statements().map(str::to_string).collect();

    // 2. Frame the input document to obtain the revealed document.
    let framed = processor
        .frame(
            &Value::Object(input_document.clone()),
            &Value::Object(reveal_frame.clone()),
        )
        .map_err(Error::FramingProvable)?;
    let revealed_document = match framed {
        Value::Object(document) => document,
        _ => {
            return Err(Error::FramingProvable(JsonLdError::from(
                "framing produced a non-object document",
            )))
        }
    };

    // 3. Canonicalize the revealed document into the revealed statements.
    let canonical_revealed = canonicalize(processor, &Value::Object(revealed_document.clone()))?;

    // 4. Index the original statements; the first occurrence wins, so a
    //    duplicate statement always maps to its earliest position.
    let mut index_by_statement: HashMap<&str, usize> = HashMap::with_capacity(statements.len());
    for (index, statement) in statements.iter().enumerate() {
        index_by_statement.entry(statement.as_str()).or_insert(index);
    }

    // 5. Map every revealed statement onto its original index.
    let mut revealed_indices = Vec::new();
    for statement in canonical_revealed.statements() {
        let index = index_by_statement
            .get(statement)
            .copied()
            .ok_or_else(|| Error::RevealedStatementNotFound(statement.to_string()))?;
        revealed_indices.push(index);
    }

    Ok(DeriveProofResult {
        revealed_indices,
        input_proof_document_statements: statements,
        revealed_document,
    })
}

/// Assemble the statement vector and reveal indices handed to the BBS+
/// primitive.
///
/// The signature was computed over `proof statements || document
/// statements`, so derivation rebuilds that exact concatenation: the
/// canonical proof statements come first and are always revealed (only the
/// signature value is hidden, never the proof options), and the document
/// indices are shifted past them.
pub fn prepare_reveal_data(
    processor: &dyn JsonLdProcessor,
    derive_result: &DeriveProofResult,
    proof: &BbsPlusSignature2020Proof,
) -> Result<(Vec<Vec<u8>>, Vec<usize>), Error> {
    let proof_statements = prepare_bls_proof_statements(processor, proof)?;
    let proof_statement_count = proof_statements.len();

    let mut reveal_indices =
        Vec::with_capacity(proof_statement_count + derive_result.revealed_indices.len());
    reveal_indices.extend(0..proof_statement_count);
    reveal_indices.extend(
        derive_result
            .revealed_indices
            .iter()
            .map(|index| index + proof_statement_count),
    );

    let statements = proof_statements
        .into_iter()
        .chain(
            derive_result
                .input_proof_document_statements
                .iter()
                .cloned(),
        )
        .map(String::into_bytes)
        .collect();

    Ok((statements, reveal_indices))
}

fn compact_split(
    processor: &dyn JsonLdProcessor,
    provable: &Map<String, Value>,
) -> Result<(Map<String, Value>, Value), Error> {
    let compacted = processor
        .compact(
            &Value::Object(provable.clone()),
            &Value::String(SECURITY_V2_CONTEXT.to_string()),
        )
        .map_err(Error::CompactingProvable)?;
    let mut compacted = match compacted {
        Value::Object(document) => document,
        _ => {
            return Err(Error::CompactingProvable(JsonLdError::from(
                "compaction produced a non-object document",
            )))
        }
    };
    let proof = compacted.remove("proof").unwrap_or(Value::Null);
    Ok((compacted, proof))
}

/// The `BbsBlsSignature2020` signature suite.
pub struct BbsPlusSignatureSuite;

impl BbsPlusSignatureSuite {
    pub const SIGNATURE_TYPE: SignatureType = SignatureType::BbsBlsSignature2020;

    /// Sign `document` and attach the resulting proof to it.
    ///
    /// Any previously attached proof is replaced; a provable carries
    /// exactly one proof through signing and verification.
    pub fn sign<S>(
        processor: &dyn JsonLdProcessor,
        signer: &S,
        document: &mut Map<String, Value>,
        options: &LinkedDataProofOptions,
    ) -> Result<(), Error>
    where
        S: BbsPlusSigner + ?Sized,
    {
        let contexts = ensure_required_contexts(document_contexts(document), REQUIRED_CONTEXTS);
        let created = options.created.unwrap_or_else(now_ms);
        let mut proof = BbsPlusSignature2020Proof {
            context: None,
            type_: Self::SIGNATURE_TYPE,
            created: Some(created),
            verification_method: options
                .verification_method
                .clone()
                .unwrap_or_else(|| signer.key_id().to_string()),
            proof_purpose: options.proof_purpose.unwrap_or_default(),
            proof_value: String::new(),
            nonce: None,
        };

        document.remove("proof");
        let proof_options = ProofOptions {
            contexts,
            created: Some(created),
        };
        let tbs = create_verify_hash(
            processor,
            document,
            &serde_json::to_value(&proof)?,
            &proof_options,
        )?;
        let signature = signer.sign(&tbs).map_err(Error::Signing)?;

        proof.proof_value = base64::encode(signature);
        document.insert("proof".to_string(), serde_json::to_value(&proof)?);
        Ok(())
    }

    /// Verify the `BbsBlsSignature2020` proof embedded in `provable`.
    ///
    /// The proof is stripped while hashing and restored before returning,
    /// whether verification succeeds or fails.
    pub fn verify(
        processor: &dyn JsonLdProcessor,
        verifier: &dyn Verifier,
        provable: &mut Map<String, Value>,
    ) -> Result<(), Error> {
        let embedded = provable.get("proof").cloned().unwrap_or(Value::Null);
        let mut proof = BbsPlusSignature2020Proof::try_from(embedded)?;

        let guard = ProofGuard::strip(provable);

        let signature = base64::decode(&proof.proof_value).map_err(Error::DecodingProofValue)?;
        proof.proof_value = String::new();

        let contexts =
            ensure_required_contexts(document_contexts(guard.document()), REQUIRED_CONTEXTS);
        let options = ProofOptions {
            contexts,
            created: None,
        };
        let tbv = create_verify_hash(
            processor,
            guard.document(),
            &serde_json::to_value(&proof)?,
            &options,
        )?;

        let bbs_plus = verifier.as_bbs_plus().ok_or(Error::VerifierKind)?;
        bbs_plus
            .verify(&tbv, &signature)
            .map_err(Error::VerifyingSignature)?;
        Ok(())
    }
}

/// The `BbsBlsSignatureProof2020` selective-disclosure suite.
pub struct BbsPlusSignatureProofSuite;

impl BbsPlusSignatureProofSuite {
    pub const SIGNATURE_TYPE: SignatureType = SignatureType::BbsBlsSignatureProof2020;

    /// Derive a selectively disclosed document from a signed provable.
    ///
    /// `reveal_frame` selects the disclosed claims per the JSON-LD framing
    /// contract. The returned document contains only the framed claims and
    /// a `BbsBlsSignatureProof2020` proof derived from the original
    /// signature, bound to `nonce`.
    pub fn selectively_disclose<V>(
        processor: &dyn JsonLdProcessor,
        verifier: &V,
        provable: &Map<String, Value>,
        reveal_frame: &Map<String, Value>,
        nonce: &[u8],
    ) -> Result<Map<String, Value>, Error>
    where
        V: BbsPlusVerifier + ?Sized,
    {
        // Compact against the security context and pull the proof off.
        let (compact_provable, compact_proof) = compact_split(processor, provable)?;

        let derive_result = create_derive_proof(processor, &compact_provable, reveal_frame)?;

        let bbs_proof = BbsPlusSignature2020Proof::try_from(compact_proof)?;

        let (statements, reveal_indices) =
            prepare_reveal_data(processor, &derive_result, &bbs_proof)?;

        let signature = base64::decode(&bbs_proof.proof_value).map_err(Error::DecodingProofValue)?;

        let derived = verifier
            .derive_proof(&statements, &signature, nonce, &reveal_indices)
            .map_err(Error::DerivingProof)?;

        let derived_proof = BbsPlusSignature2020Proof {
            context: None,
            type_: Self::SIGNATURE_TYPE,
            created: bbs_proof.created,
            verification_method: bbs_proof.verification_method.clone(),
            proof_purpose: bbs_proof.proof_purpose,
            proof_value: base64::encode(derived),
            nonce: Some(base64::encode(nonce)),
        };

        let mut revealed_document = derive_result.revealed_document;
        revealed_document.insert("proof".to_string(), serde_json::to_value(&derived_proof)?);
        Ok(revealed_document)
    }

    /// Verify the `BbsBlsSignatureProof2020` proof embedded in `provable`.
    ///
    /// The proof is stripped while hashing and restored before returning,
    /// whether verification succeeds or fails.
    // Bug here: https://github.com/w3c-ccg/ldp-bbs2020/issues/62
    pub fn verify(
        processor: &dyn JsonLdProcessor,
        verifier: &dyn Verifier,
        provable: &mut Map<String, Value>,
    ) -> Result<(), Error> {
        let embedded = provable.get("proof").cloned().unwrap_or(Value::Null);
        let mut proof = BbsPlusSignature2020Proof::try_from(embedded)?;

        let guard = ProofGuard::strip(provable);

        let signature = base64::decode(&proof.proof_value).map_err(Error::DecodingProofValue)?;
        let nonce =
            base64::decode(proof.nonce.as_deref().unwrap_or_default()).map_err(Error::DecodingNonce)?;
        proof.proof_value = String::new();

        let contexts =
            ensure_required_contexts(document_contexts(guard.document()), REQUIRED_CONTEXTS);
        let options = ProofOptions {
            contexts,
            created: None,
        };
        let tbv = create_verify_hash(
            processor,
            guard.document(),
            &serde_json::to_value(&proof)?,
            &options,
        )?;

        let bbs_plus = verifier.as_bbs_plus().ok_or(Error::VerifierKind)?;
        bbs_plus
            .verify_derived(&tbv, &signature, &nonce)
            .map_err(Error::VerifyingSignature)?;
        Ok(())
    }
}
