//! [BBS+] signing primitives over BLS12-381 G2 keys.
//!
//! The suites talk to the primitive through [`BbsPlusSigner`] and
//! [`BbsPlusVerifier`]; the default implementations here are backed by the
//! `bbs` crate. A canonical payload is split on newlines and every
//! statement becomes one signed message, which is what makes deriving a
//! proof over a statement subset possible later.
//!
//! [BBS+]: https://mattrglobal.github.io/bbs-signatures-spec/

use std::collections::BTreeSet;

use bbs::prelude::{
    DeterministicPublicKey, HiddenMessage, HashElem, Issuer, ProofMessage, ProofNonce, Prover,
    SecretKey, Signature, SignatureMessage, SignatureProof, ToVariableLengthBytes,
    Verifier as PokVerifier,
};
use serde::{Deserialize, Serialize};

pub const BLS12381_G2_KEY_2020: &str = "Bls12381G2Key2020";

const SIGNATURE_LENGTH: usize = 112;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BbsPlusError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid derived proof")]
    InvalidProof,
    #[error("malformed signature")]
    MalformedSignature,
    #[error("malformed derived proof")]
    MalformedProof,
    #[error("malformed key material")]
    MalformedKey,
    #[error("missing secret key")]
    MissingSecretKey,
    #[error("statement index {0} out of range")]
    IndexOutOfRange(usize),
    #[error("revealed statement count mismatch")]
    StatementCountMismatch,
    #[error("too many statements: {0}")]
    TooManyStatements(usize),
    #[error(transparent)]
    Base58(#[from] bs58::decode::Error),
    #[error("{0}")]
    Primitive(String),
}

/// Signing side of the BBS+ primitive.
pub trait BbsPlusSigner {
    fn key_id(&self) -> &str;

    /// Sign a canonical payload; each newline-separated statement is one
    /// BBS+ message.
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, BbsPlusError>;
}

/// Verifying side of the BBS+ primitive, including proof derivation (the
/// holder derives with the issuer's public key only).
pub trait BbsPlusVerifier {
    fn key_id(&self) -> &str;

    /// Verify a full signature over a canonical payload.
    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<(), BbsPlusError>;

    /// Derive a proof revealing `reveal_indices` out of `statements`.
    fn derive_proof(
        &self,
        statements: &[Vec<u8>],
        signature: &[u8],
        nonce: &[u8],
        reveal_indices: &[usize],
    ) -> Result<Vec<u8>, BbsPlusError>;

    /// Verify a derived proof over the revealed canonical payload.
    fn verify_derived(&self, payload: &[u8], proof: &[u8], nonce: &[u8])
        -> Result<(), BbsPlusError>;
}

/// A BLS12-381 G2 key document, base58 key material.
///
/// <https://w3c-ccg.github.io/vc-di-bbs/#bls12-381>
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bls12381G2Key2020 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    pub public_key_base58: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_base58: Option<String>,
}

/// Generate a fresh keypair as a `Bls12381G2Key2020` document.
pub fn generate_bls12381g2_key2020() -> Result<Bls12381G2Key2020, BbsPlusError> {
    let (public_key, secret_key) = Issuer::new_short_keys(None);
    Ok(Bls12381G2Key2020 {
        id: None,
        type_: BLS12381_G2_KEY_2020.to_string(),
        controller: None,
        public_key_base58: bs58::encode(public_key.to_bytes_compressed_form()).into_string(),
        private_key_base58: Some(bs58::encode(secret_key.to_bytes_compressed_form()).into_string()),
    })
}

impl Bls12381G2Key2020 {
    pub fn public_key(&self) -> Result<DeterministicPublicKey, BbsPlusError> {
        let bytes = bs58::decode(&self.public_key_base58).into_vec()?;
        DeterministicPublicKey::try_from(bytes.as_slice()).map_err(|_| BbsPlusError::MalformedKey)
    }

    pub fn secret_key(&self) -> Result<SecretKey, BbsPlusError> {
        let encoded = self
            .private_key_base58
            .as_ref()
            .ok_or(BbsPlusError::MissingSecretKey)?;
        let bytes = bs58::decode(encoded).into_vec()?;
        SecretKey::try_from(bytes.as_slice()).map_err(|_| BbsPlusError::MalformedKey)
    }

    pub fn signer(&self, key_id: impl Into<String>) -> Result<Bls12381G2Signer, BbsPlusError> {
        Ok(Bls12381G2Signer {
            key_id: key_id.into(),
            secret_key: self.secret_key()?,
            public_key: self.public_key()?,
        })
    }

    pub fn verifier(&self, key_id: impl Into<String>) -> Result<Bls12381G2Verifier, BbsPlusError> {
        Ok(Bls12381G2Verifier {
            key_id: key_id.into(),
            public_key: self.public_key()?,
        })
    }
}

/// Generate a random proof nonce suitable for binding a derived proof.
pub fn generate_proof_nonce() -> Vec<u8> {
    PokVerifier::generate_proof_nonce()
        .to_bytes_compressed_form()
        .to_vec()
}

fn split_statements(payload: &[u8]) -> Vec<&[u8]> {
    payload
        .split(|byte| *byte == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .collect()
}

fn hash_statements(statements: &[&[u8]]) -> Vec<SignatureMessage> {
    statements
        .iter()
        .map(|statement| SignatureMessage::hash(statement))
        .collect()
}

fn primitive(error: impl std::fmt::Display) -> BbsPlusError {
    BbsPlusError::Primitive(error.to_string())
}

pub struct Bls12381G2Signer {
    key_id: String,
    secret_key: SecretKey,
    public_key: DeterministicPublicKey,
}

impl Bls12381G2Signer {
    pub fn new(
        key_id: impl Into<String>,
        secret_key: SecretKey,
        public_key: DeterministicPublicKey,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            secret_key,
            public_key,
        }
    }

    pub fn verifier(&self) -> Bls12381G2Verifier {
        Bls12381G2Verifier {
            key_id: self.key_id.clone(),
            public_key: self.public_key.clone(),
        }
    }
}

impl BbsPlusSigner for Bls12381G2Signer {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, BbsPlusError> {
        let statements = split_statements(payload);
        let messages = hash_statements(&statements);
        let public_key = self
            .public_key
            .to_public_key(messages.len())
            .map_err(primitive)?;
        let signature =
            Signature::new(messages.as_slice(), &self.secret_key, &public_key).map_err(primitive)?;
        Ok(signature.to_bytes_compressed_form().to_vec())
    }
}

pub struct Bls12381G2Verifier {
    key_id: String,
    public_key: DeterministicPublicKey,
}

impl Bls12381G2Verifier {
    pub fn new(key_id: impl Into<String>, public_key: DeterministicPublicKey) -> Self {
        Self {
            key_id: key_id.into(),
            public_key,
        }
    }
}

impl BbsPlusVerifier for Bls12381G2Verifier {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<(), BbsPlusError> {
        if signature.len() != SIGNATURE_LENGTH {
            return Err(BbsPlusError::MalformedSignature);
        }
        let mut sized = [0u8; SIGNATURE_LENGTH];
        sized.copy_from_slice(signature);
        let signature = Signature::from(&sized);

        let statements = split_statements(payload);
        let messages = hash_statements(&statements);
        let public_key = self
            .public_key
            .to_public_key(messages.len())
            .map_err(primitive)?;

        match signature.verify(messages.as_slice(), &public_key) {
            Ok(true) => Ok(()),
            Ok(false) => Err(BbsPlusError::InvalidSignature),
            Err(error) => Err(primitive(error)),
        }
    }

    fn derive_proof(
        &self,
        statements: &[Vec<u8>],
        signature: &[u8],
        nonce: &[u8],
        reveal_indices: &[usize],
    ) -> Result<Vec<u8>, BbsPlusError> {
        let message_count = statements.len();
        let count_prefix =
            u16::try_from(message_count).map_err(|_| BbsPlusError::TooManyStatements(message_count))?;
        for &index in reveal_indices {
            if index >= message_count {
                return Err(BbsPlusError::IndexOutOfRange(index));
            }
        }

        if signature.len() != SIGNATURE_LENGTH {
            return Err(BbsPlusError::MalformedSignature);
        }
        let mut sized = [0u8; SIGNATURE_LENGTH];
        sized.copy_from_slice(signature);
        let signature = Signature::from(&sized);

        let public_key = self
            .public_key
            .to_public_key(message_count)
            .map_err(primitive)?;
        let proof_request =
            PokVerifier::new_proof_request(reveal_indices, &public_key).map_err(primitive)?;

        let revealed: BTreeSet<usize> = reveal_indices.iter().copied().collect();
        let proof_messages: Vec<ProofMessage> = statements
            .iter()
            .enumerate()
            .map(|(index, statement)| {
                let message = SignatureMessage::hash(statement);
                if revealed.contains(&index) {
                    ProofMessage::Revealed(message)
                } else {
                    ProofMessage::Hidden(HiddenMessage::ProofSpecificBlinding(message))
                }
            })
            .collect();

        let pok = Prover::commit_signature_pok(&proof_request, proof_messages.as_slice(), &signature)
            .map_err(primitive)?;
        let challenge =
            Prover::create_challenge_hash(std::slice::from_ref(&pok), None, &ProofNonce::hash(nonce))
                .map_err(primitive)?;
        let proof = Prover::generate_signature_pok(pok, &challenge).map_err(primitive)?;

        // The verifier needs the original message count to rebuild the
        // sized public key; the proof itself does not carry it.
        let mut bytes = count_prefix.to_be_bytes().to_vec();
        bytes.extend_from_slice(&proof.to_bytes_compressed_form());
        Ok(bytes)
    }

    fn verify_derived(
        &self,
        payload: &[u8],
        proof: &[u8],
        nonce: &[u8],
    ) -> Result<(), BbsPlusError> {
        if proof.len() < 2 {
            return Err(BbsPlusError::MalformedProof);
        }
        let message_count = u16::from_be_bytes([proof[0], proof[1]]) as usize;
        let signature_proof =
            SignatureProof::try_from(&proof[2..]).map_err(|_| BbsPlusError::MalformedProof)?;

        let public_key = self
            .public_key
            .to_public_key(message_count)
            .map_err(primitive)?;
        let revealed_indices: Vec<usize> =
            signature_proof.revealed_messages.keys().copied().collect();
        let proof_request =
            PokVerifier::new_proof_request(&revealed_indices, &public_key).map_err(primitive)?;

        let message_hashes = PokVerifier::verify_signature_pok(
            &proof_request,
            &signature_proof,
            &ProofNonce::hash(nonce),
        )
        .map_err(|_| BbsPlusError::InvalidProof)?;

        let statements = split_statements(payload);
        if message_hashes.len() != statements.len() {
            return Err(BbsPlusError::StatementCountMismatch);
        }
        for (hash, statement) in message_hashes.iter().zip(&statements) {
            if *hash != SignatureMessage::hash(statement) {
                return Err(BbsPlusError::InvalidSignature);
            }
        }
        Ok(())
    }
}

impl crate::ldp::Verifier for Bls12381G2Verifier {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn as_bbs_plus(&self) -> Option<&dyn BbsPlusVerifier> {
        Some(self)
    }
}
