use crate::webauthn::{error::DecodeError, proto::constants::*};
use base64::Engine as _;
use byteorder::{BigEndian, ReadBytesExt};
use bytes::Buf;
use serde_cbor::Value;
use serde_derive::*;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use uuid::Uuid;

/// Decoded flag byte of the authenticator data
/// (<https://www.w3.org/TR/webauthn-2/#sctn-authenticator-data>).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AuthenticatorDataFlags {
    pub user_present: bool,
    pub user_verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
    pub attested_credential_data: bool,
    pub extension_data: bool,
}

impl AuthenticatorDataFlags {
    pub fn from_bits(flags: u8) -> Self {
        AuthenticatorDataFlags {
            user_present: flags & WEBAUTHN_USER_PRESENT_FLAG != 0,
            user_verified: flags & WEBAUTHN_USER_VERIFIED_FLAG != 0,
            backup_eligible: flags & WEBAUTHN_BACKUP_ELIGIBLE_FLAG != 0,
            backup_state: flags & WEBAUTHN_BACKUP_STATE_FLAG != 0,
            attested_credential_data: flags & WEBAUTHN_ATTESTED_CREDENTIAL_DATA_FLAG != 0,
            extension_data: flags & WEBAUTHN_EXTENSION_DATA_FLAG != 0,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: AuthenticatorDataFlags,
    pub sign_count: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttestedCredentialData {
    pub aaguid: Uuid,
    pub credential_id: Vec<u8>,
    pub credential_public_key: CosePublicKey,
}

/// COSE public key, restricted to the elliptic-curve key type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CosePublicKey {
    Ec2(Ec2PublicKey),
}

/// EC public key with coordinates as unsigned big-endian integers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ec2PublicKey {
    pub alg: i64,
    pub curve: i64,
    pub x: Vec<u8>,
    pub y: Vec<u8>,
}

/// ECDSA signature recovered from a DER `SEQUENCE { INTEGER r, INTEGER s }`,
/// both integers as unsigned big-endian byte strings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EcdsaSignature {
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

impl AuthenticatorData {
    /// Decode the fixed authenticator-data layout: 32-byte rpIdHash, flag
    /// byte, big-endian 32-bit signature counter, then the attested
    /// credential data when the AT flag is set. Extension data is not
    /// supported and fails the decode.
    pub fn from_slice(buffer: &[u8]) -> Result<Self, DecodeError> {
        if buffer.len() < WEBAUTHN_AUTH_DATA_MIN_LENGTH {
            return Err(DecodeError::TooShort);
        }

        let mut cursor = Cursor::new(buffer);

        let mut rp_id_hash = [0u8; 32];
        cursor.read_exact(&mut rp_id_hash).map_err(|_| DecodeError::TooShort)?;

        let flag_bits = cursor.read_u8().map_err(|_| DecodeError::TooShort)?;
        let flags = AuthenticatorDataFlags::from_bits(flag_bits);

        let sign_count = cursor.read_u32::<BigEndian>().map_err(|_| DecodeError::TooShort)?;

        if flags.extension_data {
            return Err(DecodeError::UnsupportedExtension);
        }

        let attested_credential_data = if flags.attested_credential_data {
            let mut aaguid = [0u8; 16];
            cursor.read_exact(&mut aaguid).map_err(|_| DecodeError::TooShort)?;

            let length = cursor.read_u16::<BigEndian>().map_err(|_| DecodeError::TooShort)?;
            if cursor.remaining() < length as usize {
                return Err(DecodeError::TooShort);
            }

            let mut credential_id = vec![0u8; length as usize];
            cursor.read_exact(&mut credential_id[..]).map_err(|_| DecodeError::TooShort)?;

            // The COSE key consumes the remainder of the buffer
            let mut remaining = vec![0u8; cursor.remaining()];
            cursor.read_exact(&mut remaining[..]).map_err(|_| DecodeError::TooShort)?;

            Some(AttestedCredentialData {
                aaguid: Uuid::from_bytes(aaguid),
                credential_id,
                credential_public_key: CosePublicKey::from_slice(remaining.as_slice())?,
            })
        } else {
            None
        };

        Ok(AuthenticatorData {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential_data,
        })
    }
}

impl CosePublicKey {
    /// Decode a CBOR map keyed by the small-integer COSE labels
    /// {1: kty, 3: alg, -1: crv, -2: x, -3: y}. Only the elliptic-curve
    /// key type is accepted, and only the (ES256, P-256) and
    /// (EdDSA, Ed25519) pairs.
    pub fn from_slice(buffer: &[u8]) -> Result<Self, DecodeError> {
        let map: BTreeMap<i64, Value> = serde_cbor::from_slice(buffer)?;

        let key_type = int_entry(&map, COSE_KEY_TYPE, "1 (kty)")?;
        if key_type != COSE_PUBLIC_KEY_TYPE_EC2 {
            return Err(DecodeError::UnsupportedKeyType(key_type));
        }

        let alg = int_entry(&map, COSE_ALGORITHM, "3 (alg)")?;
        let curve = int_entry(&map, COSE_EC_CURVE, "-1 (crv)")?;

        // Restrict to the supported algorithm/curve pairs
        if !(alg == COSE_ALGORITHM_ES256 && curve == ECDSA_CURVE_P256)
            && !(alg == COSE_ALGORITHM_EDDSA && curve == ECDAA_CURVE_ED25519)
        {
            return Err(DecodeError::UnsupportedAlgorithm { alg, curve });
        }

        let x = bytes_entry(&map, COSE_EC_X, "-2 (x)")?;
        let y = bytes_entry(&map, COSE_EC_Y, "-3 (y)")?;

        Ok(CosePublicKey::Ec2(Ec2PublicKey {
            alg,
            curve,
            x: into_unsigned_be(x),
            y: into_unsigned_be(y),
        }))
    }

    pub fn alg(&self) -> i64 {
        match self {
            CosePublicKey::Ec2(key) => key.alg,
        }
    }

    pub fn curve(&self) -> i64 {
        match self {
            CosePublicKey::Ec2(key) => key.curve,
        }
    }
}

impl EcdsaSignature {
    /// Decode the fixed two-integer DER schema. Any structural mismatch
    /// (wrong tag, a third element, truncated or trailing bytes) fails;
    /// non-minimal integer encodings are accepted as-is.
    pub fn from_der(buffer: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(buffer);

        if cursor.read_u8().map_err(|_| DecodeError::MalformedSignature)? != DER_TAG_SEQUENCE {
            return Err(DecodeError::MalformedSignature);
        }

        let seq_length = read_der_length(&mut cursor)?;
        if cursor.remaining() != seq_length {
            return Err(DecodeError::MalformedSignature);
        }

        let r = read_der_integer(&mut cursor)?;
        let s = read_der_integer(&mut cursor)?;

        if cursor.remaining() != 0 {
            return Err(DecodeError::MalformedSignature);
        }

        Ok(EcdsaSignature { r, s })
    }
}

fn int_entry(map: &BTreeMap<i64, Value>, key: i64, name: &'static str) -> Result<i64, DecodeError> {
    match map.get(&key) {
        Some(Value::Integer(i)) => Ok(*i as i64),
        Some(_) => Err(DecodeError::Other(format!("Unexpected CBOR value for label {name}"))),
        None => Err(DecodeError::MissingField(name)),
    }
}

fn bytes_entry(map: &BTreeMap<i64, Value>, key: i64, name: &'static str) -> Result<Vec<u8>, DecodeError> {
    match map.get(&key) {
        Some(Value::Bytes(b)) => Ok(b.clone()),
        Some(_) => Err(DecodeError::Other(format!("Unexpected CBOR value for label {name}"))),
        None => Err(DecodeError::MissingField(name)),
    }
}

/// Normalize a big-endian byte string to an unsigned integer
/// representation without leading zero padding.
fn into_unsigned_be(mut bytes: Vec<u8>) -> Vec<u8> {
    let zeros = bytes.iter().take_while(|b| **b == 0).count();
    let keep = zeros.min(bytes.len().saturating_sub(1));
    bytes.drain(..keep);
    bytes
}

fn read_der_length(cursor: &mut Cursor<&[u8]>) -> Result<usize, DecodeError> {
    let first = cursor.read_u8().map_err(|_| DecodeError::MalformedSignature)?;

    if first < 0x80 {
        return Ok(first as usize);
    }

    // Long form; two length bytes cover any plausible signature
    let count = (first & 0x7f) as usize;
    if count == 0 || count > 2 {
        return Err(DecodeError::MalformedSignature);
    }

    let mut length = 0usize;
    for _ in 0..count {
        let byte = cursor.read_u8().map_err(|_| DecodeError::MalformedSignature)?;
        length = (length << 8) | byte as usize;
    }

    Ok(length)
}

fn read_der_integer(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>, DecodeError> {
    if cursor.read_u8().map_err(|_| DecodeError::MalformedSignature)? != DER_TAG_INTEGER {
        return Err(DecodeError::MalformedSignature);
    }

    let length = read_der_length(cursor)?;
    if length == 0 || cursor.remaining() < length {
        return Err(DecodeError::MalformedSignature);
    }

    let mut content = vec![0u8; length];
    cursor.read_exact(&mut content[..]).map_err(|_| DecodeError::MalformedSignature)?;

    Ok(into_unsigned_be(content))
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
struct RawAttestationObject {
    fmt: String,
    auth_data: Value,
    att_stmt: Value,
}

/// Attestation object envelope
/// (<https://www.w3.org/TR/webauthn-2/#attestation-object>). The
/// attestation statement is carried through undecoded; this system performs
/// the "none" ceremony and statement validation belongs to a verifier.
#[derive(Clone, Debug)]
pub struct AttestationObject {
    pub fmt: String,
    pub auth_data: AuthenticatorData,
    pub att_stmt: Value,
}

pub trait Message {
    fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError>
    where
        Self: Sized;

    fn from_base64(string: &str) -> Result<Self, DecodeError>
    where
        Self: Sized,
    {
        let raw = base64::engine::general_purpose::STANDARD.decode(string)?;
        Self::from_bytes(raw.as_slice())
    }
}

impl Message for AttestationObject {
    fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let value = serde_cbor::from_slice::<RawAttestationObject>(raw)?;

        let auth_data = match value.auth_data {
            Value::Bytes(vec) => vec,
            _ => return Err(DecodeError::MissingField("authData")),
        };

        Ok(AttestationObject {
            fmt: value.fmt,
            auth_data: AuthenticatorData::from_slice(auth_data.as_slice())?,
            att_stmt: value.att_stmt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Registration payload captured against rp id "localhost": UP+AT set,
    // sign count 5905, zero aaguid, 96-byte credential id, ES256/P-256 key.
    const AUTH_DATA_HEX: &str = "49960de5880e8c687434170f6476605b8fe4aeb9a28632c7995cf3ba831d9763410000171100000000000000000000000000000000006068a802ff82e40212f39537b806830dee2a8d941505f1936ab28cc6e9d5f00ded91ca936e5148be3ffbdee1d120fc029a36ed27ad8e7903e0733f964a0be69b989fb992087acd0deab9eeee61babb60dcbd66c935d266e90e7f294b130570ed61a5010203262001215820f550c2e7ec5767e33d4d34a2bcea2ca5fed921c9ff2b845148adb8cfff375418225820d9f0df021c3c606687e56ee0ccb0e3bf3fbebdd9614e54095e728625967236b7";

    fn cose_map(entries: &[(i64, Value)]) -> Vec<u8> {
        let map: BTreeMap<i64, Value> = entries.iter().cloned().collect();
        serde_cbor::to_vec(&map).unwrap()
    }

    fn ec2_entries(alg: i64, curve: i64) -> Vec<(i64, Value)> {
        vec![
            (COSE_KEY_TYPE, Value::Integer(2)),
            (COSE_ALGORITHM, Value::Integer(alg as i128)),
            (COSE_EC_CURVE, Value::Integer(curve as i128)),
            (COSE_EC_X, Value::Bytes(vec![0x11; 32])),
            (COSE_EC_Y, Value::Bytes(vec![0x22; 32])),
        ]
    }

    #[test]
    fn decode_authenticator_data_known_vector() {
        let raw = hex::decode(AUTH_DATA_HEX).unwrap();

        let ad = AuthenticatorData::from_slice(&raw).unwrap();

        assert_eq!(&ad.rp_id_hash[..], &raw[..32]);
        assert!(ad.flags.user_present);
        assert!(!ad.flags.user_verified);
        assert!(!ad.flags.backup_eligible);
        assert!(!ad.flags.backup_state);
        assert!(ad.flags.attested_credential_data);
        assert!(!ad.flags.extension_data);
        assert_eq!(ad.sign_count, 5905);

        let acd = ad.attested_credential_data.unwrap();
        assert!(acd.aaguid.is_nil());
        assert_eq!(acd.credential_id.len(), 96);
        assert_eq!(&acd.credential_id[..4], &[0x68, 0xa8, 0x02, 0xff]);

        let CosePublicKey::Ec2(key) = acd.credential_public_key;
        assert_eq!(key.alg, COSE_ALGORITHM_ES256);
        assert_eq!(key.curve, ECDSA_CURVE_P256);
        assert_eq!(key.x, hex::decode("f550c2e7ec5767e33d4d34a2bcea2ca5fed921c9ff2b845148adb8cfff375418").unwrap());
        assert_eq!(key.y, hex::decode("d9f0df021c3c606687e56ee0ccb0e3bf3fbebdd9614e54095e728625967236b7").unwrap());
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let raw = vec![0u8; 36];
        assert!(matches!(AuthenticatorData::from_slice(&raw), Err(DecodeError::TooShort)));
    }

    #[test]
    fn decode_minimal_buffer_without_attested_data() {
        let mut raw = vec![0u8; 37];
        raw[32] = WEBAUTHN_USER_PRESENT_FLAG;
        raw[36] = 7;

        let ad = AuthenticatorData::from_slice(&raw).unwrap();

        assert!(ad.flags.user_present);
        assert_eq!(ad.sign_count, 7);
        assert!(ad.attested_credential_data.is_none());
    }

    #[test]
    fn decode_rejects_extension_data() {
        let mut raw = vec![0u8; 64];
        raw[32] = WEBAUTHN_USER_PRESENT_FLAG | WEBAUTHN_EXTENSION_DATA_FLAG;

        assert!(matches!(
            AuthenticatorData::from_slice(&raw),
            Err(DecodeError::UnsupportedExtension)
        ));
    }

    #[test]
    fn decode_rejects_credential_id_overrun() {
        // AT set, aaguid zeroed, then a credential id length far past the end
        let mut raw = vec![0u8; 55];
        raw[32] = WEBAUTHN_ATTESTED_CREDENTIAL_DATA_FLAG;
        raw[53] = 0xff;
        raw[54] = 0xff;

        assert!(matches!(AuthenticatorData::from_slice(&raw), Err(DecodeError::TooShort)));
    }

    #[test]
    fn cose_accepts_eddsa_ed25519() {
        let buf = cose_map(&ec2_entries(COSE_ALGORITHM_EDDSA, ECDAA_CURVE_ED25519));

        let key = CosePublicKey::from_slice(&buf).unwrap();
        assert_eq!(key.alg(), COSE_ALGORITHM_EDDSA);
        assert_eq!(key.curve(), ECDAA_CURVE_ED25519);
    }

    #[test]
    fn cose_rejects_rs256() {
        // -257 is RS256, not in the accepted set
        let buf = cose_map(&ec2_entries(-257, ECDSA_CURVE_P256));

        assert!(matches!(
            CosePublicKey::from_slice(&buf),
            Err(DecodeError::UnsupportedAlgorithm { alg: -257, curve: 1 })
        ));
    }

    #[test]
    fn cose_rejects_non_ec_key_type() {
        let mut entries = ec2_entries(COSE_ALGORITHM_ES256, ECDSA_CURVE_P256);
        entries[0] = (COSE_KEY_TYPE, Value::Integer(3));
        let buf = cose_map(&entries);

        assert!(matches!(CosePublicKey::from_slice(&buf), Err(DecodeError::UnsupportedKeyType(3))));
    }

    #[test]
    fn cose_rejects_missing_coordinate() {
        let entries: Vec<(i64, Value)> = ec2_entries(COSE_ALGORITHM_ES256, ECDSA_CURVE_P256)
            .into_iter()
            .filter(|(k, _)| *k != COSE_EC_Y)
            .collect();
        let buf = cose_map(&entries);

        assert!(matches!(CosePublicKey::from_slice(&buf), Err(DecodeError::MissingField(_))));
    }

    #[test]
    fn cose_strips_coordinate_sign_padding() {
        let mut entries = ec2_entries(COSE_ALGORITHM_ES256, ECDSA_CURVE_P256);
        entries[3] = (COSE_EC_X, Value::Bytes([vec![0x00], vec![0xab; 32]].concat()));
        let buf = cose_map(&entries);

        let CosePublicKey::Ec2(key) = CosePublicKey::from_slice(&buf).unwrap();
        assert_eq!(key.x, vec![0xab; 32]);
    }

    #[test]
    fn der_signature_round_trip() {
        let der = [
            0x30, 0x0c, // SEQUENCE, 12 bytes
            0x02, 0x04, 0x01, 0x02, 0x03, 0x04, // INTEGER r
            0x02, 0x04, 0x75, 0x06, 0x07, 0x08, // INTEGER s
        ];

        let sig = EcdsaSignature::from_der(&der).unwrap();
        assert_eq!(sig.r, vec![0x01, 0x02, 0x03, 0x04]);
        assert_eq!(sig.s, vec![0x75, 0x06, 0x07, 0x08]);
    }

    #[test]
    fn der_signature_accepts_sign_padded_integer() {
        // r = 0x00f1..., the leading zero is DER sign padding
        let der = [0x30, 0x09, 0x02, 0x03, 0x00, 0xf1, 0x02, 0x02, 0x02, 0x03, 0x01];

        let sig = EcdsaSignature::from_der(&der).unwrap();
        assert_eq!(sig.r, vec![0xf1, 0x02]);
        assert_eq!(sig.s, vec![0x03, 0x01]);
    }

    #[test]
    fn der_signature_rejects_three_integers() {
        let der = [
            0x30, 0x09, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02, 0x02, 0x01, 0x03,
        ];

        assert!(matches!(EcdsaSignature::from_der(&der), Err(DecodeError::MalformedSignature)));
    }

    #[test]
    fn der_signature_rejects_wrong_outer_tag() {
        let der = [0x31, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];

        assert!(matches!(EcdsaSignature::from_der(&der), Err(DecodeError::MalformedSignature)));
    }

    #[test]
    fn der_signature_rejects_trailing_bytes() {
        let der = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02, 0x00];

        assert!(matches!(EcdsaSignature::from_der(&der), Err(DecodeError::MalformedSignature)));
    }

    #[test]
    fn der_signature_rejects_truncated_integer() {
        let der = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x04, 0x02];

        assert!(matches!(EcdsaSignature::from_der(&der), Err(DecodeError::MalformedSignature)));
    }

    #[test]
    fn attestation_object_envelope_decodes() {
        let auth_data = hex::decode(AUTH_DATA_HEX).unwrap();

        let envelope: BTreeMap<Value, Value> = [
            (Value::Text("fmt".to_string()), Value::Text("none".to_string())),
            (Value::Text("attStmt".to_string()), Value::Map(BTreeMap::new())),
            (Value::Text("authData".to_string()), Value::Bytes(auth_data)),
        ]
        .into_iter()
        .collect();
        let raw = serde_cbor::to_vec(&envelope).unwrap();

        let object = AttestationObject::from_bytes(&raw).unwrap();

        assert_eq!(object.fmt, WEBAUTHN_FORMAT_NONE);
        assert_eq!(object.auth_data.sign_count, 5905);
        assert!(object.auth_data.attested_credential_data.is_some());
    }
}
