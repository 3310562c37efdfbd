use crate::webauthn::proto::raw_message::{AuthenticatorData, EcdsaSignature};
use serde_derive::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Raw buffers handed back by the platform credential-creation capability.
#[derive(Clone, Debug)]
pub struct RawAttestationResponse {
    pub raw_id: Vec<u8>,
    pub attestation_object: Vec<u8>,
    pub client_data_json: Vec<u8>,
}

/// Raw buffers handed back by the platform assertion capability.
#[derive(Clone, Debug)]
pub struct RawAssertionResponse {
    pub raw_id: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub signature: Vec<u8>,
    pub client_data_json: Vec<u8>,
}

/// A newly created credential, decoded.
#[derive(Clone, Debug)]
pub struct CredentialCreation {
    pub id: Vec<u8>,
    pub client_data_json: String,
    pub auth_data: AuthenticatorData,
}

/// A completed assertion, packaged for a verifier that consumes byte
/// buffers and typed tokens rather than JSON.
#[derive(Clone, Debug)]
pub struct Assertion {
    /// SHA-256 of the raw credential id
    pub credential_id_hash: [u8; 32],
    pub challenge: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub client_data_tokens: Vec<ClientDataToken>,
    pub signature: EcdsaSignature,
}

#[derive(Serialize_repr, Deserialize_repr, Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ClientDataTokenKind {
    String = 0,
    Bool = 1,
}

/// One client-data field as an ordered key/value token. Boolean values are
/// rendered `"true"`/`"false"`; the kind tag preserves the distinction.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct ClientDataToken {
    #[serde(rename = "t")]
    pub kind: ClientDataTokenKind,
    #[serde(rename = "k")]
    pub key: String,
    #[serde(rename = "v")]
    pub value: String,
}
