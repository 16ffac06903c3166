//! Test doubles for the two external collaborators: a deterministic
//! JSON-LD processor and a BBS+ primitive that checks statement/nonce
//! binding without pairing arithmetic. Both honor the adapter contracts
//! the suites rely on, which is what the end-to-end scenarios exercise.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::{Map, Value};

use bbs_ldp::bbs::{BbsPlusError, BbsPlusSigner, BbsPlusVerifier};
use bbs_ldp::jsonld::{JsonLdError, JsonLdProcessor};
use bbs_ldp::Verifier;

/// Deterministic stand-in for a JSON-LD processor.
///
/// Normalization flattens a document into one pseudo N-Quad per leaf
/// value, sorted, with `@context` ignored and `id` used as the subject.
/// Sorting makes the output independent of key order, and a framed subset
/// of a document always canonicalizes to a subset of the document's
/// statements, which is all the suites require of URDNA2015 here.
pub struct FixtureProcessor;

impl JsonLdProcessor for FixtureProcessor {
    fn compact(&self, document: &Value, context: &Value) -> Result<Value, JsonLdError> {
        let mut document = document
            .as_object()
            .cloned()
            .ok_or_else(|| JsonLdError::from("compact input is not an object"))?;
        document.insert("@context".to_string(), context.clone());
        Ok(Value::Object(document))
    }

    fn frame(&self, document: &Value, frame: &Value) -> Result<Value, JsonLdError> {
        let document = document
            .as_object()
            .ok_or_else(|| JsonLdError::from("frame input is not an object"))?;
        let frame = frame
            .as_object()
            .ok_or_else(|| JsonLdError::from("frame is not an object"))?;

        let mut framed = frame_object(document, frame);
        match frame.get("@context").or_else(|| document.get("@context")) {
            Some(context) => {
                framed.insert("@context".to_string(), context.clone());
            }
            None => {}
        }
        Ok(Value::Object(framed))
    }

    fn normalize(&self, document: &Value) -> Result<String, JsonLdError> {
        let document = document
            .as_object()
            .ok_or_else(|| JsonLdError::from("normalize input is not an object"))?;
        let subject = match document.get("id").and_then(Value::as_str) {
            Some(id) => format!("<{id}>"),
            None => "_:c14n0".to_string(),
        };

        let mut lines = Vec::new();
        for (key, value) in document {
            if key == "@context" || key == "id" {
                continue;
            }
            flatten(&subject, key, value, &mut lines);
        }
        lines.sort();

        let mut nquads = lines.join("\n");
        if !nquads.is_empty() {
            nquads.push('\n');
        }
        Ok(nquads)
    }
}

/// Keep `id`/`type` plus the keys named by the frame, recursing into
/// object values when the frame does.
fn frame_object(document: &Map<String, Value>, frame: &Map<String, Value>) -> Map<String, Value> {
    let mut framed = Map::new();
    for (key, value) in document {
        if key == "@context" {
            continue;
        }
        if key == "id" || key == "type" {
            framed.insert(key.clone(), value.clone());
            continue;
        }
        if let Some(frame_value) = frame.get(key) {
            match (value, frame_value) {
                (Value::Object(inner), Value::Object(inner_frame)) if !inner_frame.is_empty() => {
                    framed.insert(
                        key.clone(),
                        Value::Object(frame_object(inner, inner_frame)),
                    );
                }
                _ => {
                    framed.insert(key.clone(), value.clone());
                }
            }
        }
    }
    framed
}

fn flatten(subject: &str, path: &str, value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Object(object) => {
            for (key, value) in object {
                flatten(subject, &format!("{path}/{key}"), value, lines);
            }
        }
        Value::Array(values) => {
            for (index, value) in values.iter().enumerate() {
                flatten(subject, &format!("{path}/{index}"), value, lines);
            }
        }
        scalar => lines.push(format!("{subject} <urn:example:{path}> {scalar} .")),
    }
}

/// Shared-secret BBS+ double.
///
/// Signatures are a keyed digest of the exact canonical payload; derived
/// proofs record the revealed statements and the nonce, and verification
/// replays the binding checks a real verifier performs: right key, right
/// nonce, revealed statements matching the presented payload.
pub struct MockBbsSigner {
    key_id: String,
    secret: Vec<u8>,
}

pub struct MockBbsVerifier {
    key_id: String,
    secret: Vec<u8>,
}

pub fn mock_keypair(key_id: &str) -> (MockBbsSigner, MockBbsVerifier) {
    let secret = format!("secret:{key_id}").into_bytes();
    (
        MockBbsSigner {
            key_id: key_id.to_string(),
            secret: secret.clone(),
        },
        MockBbsVerifier {
            key_id: key_id.to_string(),
            secret,
        },
    )
}

fn keyed_digest(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut hasher = DefaultHasher::new();
    secret.hash(&mut hasher);
    payload.hash(&mut hasher);
    hasher.finish().to_be_bytes().to_vec()
}

fn join_statements(statements: &[Vec<u8>]) -> Vec<u8> {
    let mut payload = Vec::new();
    for statement in statements {
        payload.extend_from_slice(statement);
        payload.push(b'\n');
    }
    payload
}

fn payload_statements(payload: &[u8]) -> Vec<Vec<u8>> {
    payload
        .split(|byte| *byte == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(<[u8]>::to_vec)
        .collect()
}

impl BbsPlusSigner for MockBbsSigner {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, BbsPlusError> {
        Ok(keyed_digest(&self.secret, payload))
    }
}

impl BbsPlusVerifier for MockBbsVerifier {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<(), BbsPlusError> {
        if keyed_digest(&self.secret, payload) == signature {
            Ok(())
        } else {
            Err(BbsPlusError::InvalidSignature)
        }
    }

    fn derive_proof(
        &self,
        statements: &[Vec<u8>],
        signature: &[u8],
        nonce: &[u8],
        reveal_indices: &[usize],
    ) -> Result<Vec<u8>, BbsPlusError> {
        let payload = join_statements(statements);
        if keyed_digest(&self.secret, &payload) != signature {
            return Err(BbsPlusError::InvalidSignature);
        }

        let mut revealed = Vec::with_capacity(reveal_indices.len());
        for &index in reveal_indices {
            let statement = statements
                .get(index)
                .ok_or(BbsPlusError::IndexOutOfRange(index))?;
            revealed.push(String::from_utf8_lossy(statement).into_owned());
        }

        let binding = [join_statements(&statements_bytes(&revealed)), nonce.to_vec()].concat();
        let proof = serde_json::json!({
            "nonce": base64::encode(nonce),
            "revealed": revealed,
            "tag": base64::encode(keyed_digest(&self.secret, &binding)),
        });
        Ok(serde_json::to_vec(&proof).expect("mock proof serializes"))
    }

    fn verify_derived(
        &self,
        payload: &[u8],
        proof: &[u8],
        nonce: &[u8],
    ) -> Result<(), BbsPlusError> {
        let proof: Value =
            serde_json::from_slice(proof).map_err(|_| BbsPlusError::MalformedProof)?;
        let proof_nonce = proof["nonce"].as_str().unwrap_or_default();
        if base64::decode(proof_nonce).ok().as_deref() != Some(nonce) {
            return Err(BbsPlusError::InvalidProof);
        }

        let revealed: Vec<String> = proof["revealed"]
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let binding = [join_statements(&statements_bytes(&revealed)), nonce.to_vec()].concat();
        let tag = proof["tag"].as_str().unwrap_or_default();
        if base64::decode(tag).ok() != Some(keyed_digest(&self.secret, &binding)) {
            return Err(BbsPlusError::InvalidProof);
        }

        let presented = payload_statements(payload);
        let recorded = statements_bytes(&revealed);
        if presented != recorded {
            return Err(BbsPlusError::InvalidSignature);
        }
        Ok(())
    }
}

fn statements_bytes(statements: &[String]) -> Vec<Vec<u8>> {
    statements
        .iter()
        .map(|statement| statement.clone().into_bytes())
        .collect()
}

impl Verifier for MockBbsVerifier {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn as_bbs_plus(&self) -> Option<&dyn BbsPlusVerifier> {
        Some(self)
    }
}

/// A verifier with no BBS+ capability.
pub struct NotBbsVerifier;

impl Verifier for NotBbsVerifier {
    fn key_id(&self) -> &str {
        "did:example:other#key"
    }
}
