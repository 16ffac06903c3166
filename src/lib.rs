//! Linked-data proofs for the `BbsBlsSignature2020` suite family.
//!
//! A signed JSON-LD document can be turned into a *derived* document that
//! discloses only the claims selected by a reveal frame while staying
//! independently verifiable:
//!
//! - [`ldp::BbsPlusSignatureSuite`] signs and verifies whole documents;
//! - [`ldp::BbsPlusSignatureProofSuite`] derives and verifies
//!   `BbsBlsSignatureProof2020` selective-disclosure proofs.
//!
//! JSON-LD processing (compaction, framing, URDNA2015) is delegated to an
//! implementation of [`jsonld::JsonLdProcessor`]; the pairing primitive is
//! reached through [`crate::bbs::BbsPlusSigner`] and
//! [`crate::bbs::BbsPlusVerifier`], with BLS12-381 G2 implementations
//! provided in [`crate::bbs`].

pub mod bbs;
pub mod canon;
pub mod error;
pub mod jsonld;
pub mod ldp;
pub mod proof;

pub use error::Error;
pub use ldp::{
    create_derive_proof, create_verify_hash, prepare_reveal_data, BbsPlusSignatureProofSuite,
    BbsPlusSignatureSuite, DeriveProofResult, Verifier,
};
pub use proof::{
    prepare_proof, BbsPlusSignature2020Proof, LinkedDataProofOptions, ProofOptions, ProofPurpose,
    SignatureType,
};
