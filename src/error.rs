use crate::bbs::BbsPlusError;
use crate::jsonld::JsonLdError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("compacting provable")]
    CompactingProvable(#[source] JsonLdError),
    #[error("framing provable")]
    FramingProvable(#[source] JsonLdError),
    #[error("canonicalizing provable document")]
    Canonicalizing(#[source] JsonLdError),
    #[error("coercing proof into BbsPlusSignature2020Proof")]
    CoercingProof(#[source] serde_json::Error),
    #[error("preparing proof for the create verify hash algorithm")]
    PreparingProof(#[source] serde_json::Error),
    #[error("decoding proof value")]
    DecodingProofValue(#[source] base64::DecodeError),
    #[error("decoding nonce")]
    DecodingNonce(#[source] base64::DecodeError),
    #[error("verifier does not implement BbsPlusVerifier")]
    VerifierKind,
    #[error("revealed statement not present in source: {0}")]
    RevealedStatementNotFound(String),
    #[error("computing BBS+ signature")]
    Signing(#[source] BbsPlusError),
    #[error("deriving BBS+ proof")]
    DerivingProof(#[source] BbsPlusError),
    #[error("verifying BBS+ signature")]
    VerifyingSignature(#[source] BbsPlusError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
