use base64::DecodeError as Base64Error;
use serde_cbor::Error as CborError;
use serde_json::Error as JsonError;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

/// Failure decoding WebAuthn binary material. Malformed cryptographic
/// payloads are always surfaced to the caller; none of these are recovered
/// from silently.
#[derive(Debug)]
pub enum DecodeError {
    /// The buffer ends before a fixed field or a length-prefixed slice.
    TooShort,
    /// The extension-data flag is set; extensions are not supported.
    UnsupportedExtension,
    /// COSE key type other than elliptic-curve (2).
    UnsupportedKeyType(i64),
    /// COSE (algorithm, curve) pair outside the accepted set.
    UnsupportedAlgorithm { alg: i64, curve: i64 },
    /// The DER signature does not match `SEQUENCE { INTEGER r, INTEGER s }`.
    MalformedSignature,
    /// A required entry is absent from a CBOR map.
    MissingField(&'static str),
    CborError(CborError),
    Base64Error(Base64Error),
    Other(String),
}

impl From<CborError> for DecodeError {
    fn from(e: CborError) -> Self {
        DecodeError::CborError(e)
    }
}

impl From<Base64Error> for DecodeError {
    fn from(e: Base64Error) -> Self {
        DecodeError::Base64Error(e)
    }
}

impl StdError for DecodeError {}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        use DecodeError::*;
        match self {
            TooShort => write!(f, "Buffer too short"),
            UnsupportedExtension => write!(f, "Extension data not supported"),
            UnsupportedKeyType(kty) => write!(f, "Unsupported kty: {kty}"),
            UnsupportedAlgorithm { alg, curve } => write!(f, "Unsupported alg: {alg}, crv: {curve}"),
            MalformedSignature => write!(f, "Unable to decode ASN.1 signature"),
            MissingField(field) => write!(f, "Missing field: {field}"),
            CborError(cb_e) => cb_e.fmt(f),
            Base64Error(b64_e) => b64_e.fmt(f),
            Other(s) => write!(f, "{s}"),
        }
    }
}

/// Failure driving the platform credential API or packaging its results.
#[derive(Debug)]
pub enum CredentialRequestError {
    /// The platform completed without producing a credential.
    NoCredentialReturned,
    /// The platform refused the ceremony.
    PlatformDeclined(String),
    /// A client-data field is neither a string nor a boolean.
    UnsupportedValueType(String),
    Decode(DecodeError),
    JsonError(JsonError),
}

impl From<DecodeError> for CredentialRequestError {
    fn from(e: DecodeError) -> Self {
        CredentialRequestError::Decode(e)
    }
}

impl From<JsonError> for CredentialRequestError {
    fn from(e: JsonError) -> Self {
        CredentialRequestError::JsonError(e)
    }
}

impl StdError for CredentialRequestError {}

impl Display for CredentialRequestError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        use CredentialRequestError::*;
        match self {
            NoCredentialReturned => write!(f, "No public key credential returned"),
            PlatformDeclined(s) => write!(f, "Platform declined the request: {s}"),
            UnsupportedValueType(key) => write!(f, "Incompatible client data value type for key: {key}"),
            Decode(e) => e.fmt(f),
            JsonError(js_e) => js_e.fmt(f),
        }
    }
}
