pub mod responses;

use crate::webauthn::{
    client::responses::{
        Assertion, ClientDataToken, ClientDataTokenKind, CredentialCreation, RawAssertionResponse, RawAttestationResponse,
    },
    error::{CredentialRequestError, DecodeError},
    proto::{
        constants::{COSE_ALGORITHM_ES256, WEBAUTHN_CHALLENGE_LENGTH, WEBAUTHN_FORMAT_NONE},
        raw_message::{AttestationObject, EcdsaSignature, Message},
        web_message::{
            PublicKeyCredentialCreationOptions, PublicKeyCredentialDescriptor, PublicKeyCredentialParameters,
            PublicKeyCredentialRequestOptions, PublicKeyCredentialRpEntity, PublicKeyCredentialType,
            PublicKeyCredentialUserEntity,
        },
    },
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::digest::Digest;
use rand_core::{OsRng, RngCore};
use sha2::Sha256;

/// The platform credential API as a black box: it receives option
/// descriptors and hands back raw buffers, or nothing when the user or the
/// platform completes without a credential.
pub trait PlatformAuthenticator {
    fn create(
        &mut self,
        options: &PublicKeyCredentialCreationOptions,
    ) -> Result<Option<RawAttestationResponse>, CredentialRequestError>;

    fn get(
        &mut self,
        options: &PublicKeyCredentialRequestOptions,
    ) -> Result<Option<RawAssertionResponse>, CredentialRequestError>;
}

/// Drive credential creation with the "none" attestation ceremony and
/// decode the returned attestation object. The challenge is caller-supplied
/// or generated from the system CSPRNG.
pub fn credential_create<P: PlatformAuthenticator>(
    platform: &mut P,
    rp: PublicKeyCredentialRpEntity,
    user: PublicKeyCredentialUserEntity,
    challenge: Option<Vec<u8>>,
) -> Result<CredentialCreation, CredentialRequestError> {
    let challenge = challenge.unwrap_or_else(generate_challenge);

    let options = PublicKeyCredentialCreationOptions {
        rp,
        user,
        challenge: URL_SAFE_NO_PAD.encode(challenge.as_slice()),
        pub_key_cred_params: vec![PublicKeyCredentialParameters {
            auth_type: PublicKeyCredentialType::PublicKey,
            alg: COSE_ALGORITHM_ES256,
        }],
        timeout: None,
        attestation: Some(WEBAUTHN_FORMAT_NONE.to_string()),
    };

    let response = platform.create(&options)?.ok_or(CredentialRequestError::NoCredentialReturned)?;

    let attestation = AttestationObject::from_bytes(response.attestation_object.as_slice())?;
    let client_data_json = String::from_utf8(response.client_data_json)
        .map_err(|_| DecodeError::Other("Client data is not valid UTF-8".to_string()))?;

    Ok(CredentialCreation {
        id: response.raw_id,
        client_data_json,
        auth_data: attestation.auth_data,
    })
}

/// Drive an assertion restricted to the allowed credential ids, decode the
/// DER signature, hash the credential id and convert the client data into
/// ordered typed tokens for a verifier that cannot parse JSON natively.
pub fn credential_get<P: PlatformAuthenticator>(
    platform: &mut P,
    allowed_credential_ids: &[Vec<u8>],
    challenge: Option<Vec<u8>>,
) -> Result<Assertion, CredentialRequestError> {
    let challenge = challenge.unwrap_or_else(generate_challenge);

    let options = PublicKeyCredentialRequestOptions {
        challenge: URL_SAFE_NO_PAD.encode(challenge.as_slice()),
        timeout: None,
        rp_id: None,
        allow_credentials: allowed_credential_ids
            .iter()
            .map(|id| PublicKeyCredentialDescriptor {
                cred_type: PublicKeyCredentialType::PublicKey,
                id: URL_SAFE_NO_PAD.encode(id.as_slice()),
            })
            .collect(),
    };

    let response = platform.get(&options)?.ok_or(CredentialRequestError::NoCredentialReturned)?;

    let signature = EcdsaSignature::from_der(response.signature.as_slice())?;
    let credential_id_hash: [u8; 32] = Sha256::digest(response.raw_id.as_slice()).into();
    let client_data_tokens = client_data_tokens(response.client_data_json.as_slice())?;

    Ok(Assertion {
        credential_id_hash,
        challenge,
        authenticator_data: response.authenticator_data,
        client_data_tokens,
        signature,
    })
}

/// Convert a client-data JSON document into an ordered list of typed
/// key/value tokens. Only string and boolean fields are representable.
pub fn client_data_tokens(raw_json: &[u8]) -> Result<Vec<ClientDataToken>, CredentialRequestError> {
    let fields: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(raw_json)?;

    fields
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => Ok(ClientDataToken {
                kind: ClientDataTokenKind::String,
                key,
                value: s,
            }),
            serde_json::Value::Bool(b) => Ok(ClientDataToken {
                kind: ClientDataTokenKind::Bool,
                key,
                value: if b { "true".to_string() } else { "false".to_string() },
            }),
            _ => Err(CredentialRequestError::UnsupportedValueType(key)),
        })
        .collect()
}

fn generate_challenge() -> Vec<u8> {
    let mut challenge = vec![0u8; WEBAUTHN_CHALLENGE_LENGTH];
    OsRng.fill_bytes(challenge.as_mut_slice());
    challenge
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webauthn::proto::constants::WEBAUTHN_REQUEST_TYPE_GET;
    use serde_cbor::Value;
    use std::collections::BTreeMap;

    const AUTH_DATA_HEX: &str = "49960de5880e8c687434170f6476605b8fe4aeb9a28632c7995cf3ba831d9763410000171100000000000000000000000000000000006068a802ff82e40212f39537b806830dee2a8d941505f1936ab28cc6e9d5f00ded91ca936e5148be3ffbdee1d120fc029a36ed27ad8e7903e0733f964a0be69b989fb992087acd0deab9eeee61babb60dcbd66c935d266e90e7f294b130570ed61a5010203262001215820f550c2e7ec5767e33d4d34a2bcea2ca5fed921c9ff2b845148adb8cfff375418225820d9f0df021c3c606687e56ee0ccb0e3bf3fbebdd9614e54095e728625967236b7";

    fn attestation_object_bytes() -> Vec<u8> {
        let envelope: BTreeMap<Value, Value> = [
            (Value::Text("fmt".to_string()), Value::Text("none".to_string())),
            (Value::Text("attStmt".to_string()), Value::Map(BTreeMap::new())),
            (Value::Text("authData".to_string()), Value::Bytes(hex::decode(AUTH_DATA_HEX).unwrap())),
        ]
        .into_iter()
        .collect();
        serde_cbor::to_vec(&envelope).unwrap()
    }

    struct FakePlatform {
        attestation: Option<RawAttestationResponse>,
        assertion: Option<RawAssertionResponse>,
        last_creation_options: Option<PublicKeyCredentialCreationOptions>,
        last_request_options: Option<PublicKeyCredentialRequestOptions>,
    }

    impl FakePlatform {
        fn new() -> Self {
            FakePlatform {
                attestation: None,
                assertion: None,
                last_creation_options: None,
                last_request_options: None,
            }
        }
    }

    impl PlatformAuthenticator for FakePlatform {
        fn create(
            &mut self,
            options: &PublicKeyCredentialCreationOptions,
        ) -> Result<Option<RawAttestationResponse>, CredentialRequestError> {
            self.last_creation_options = Some(options.clone());
            Ok(self.attestation.take())
        }

        fn get(
            &mut self,
            options: &PublicKeyCredentialRequestOptions,
        ) -> Result<Option<RawAssertionResponse>, CredentialRequestError> {
            self.last_request_options = Some(options.clone());
            Ok(self.assertion.take())
        }
    }

    fn rp() -> PublicKeyCredentialRpEntity {
        PublicKeyCredentialRpEntity {
            id: Some("localhost".to_string()),
            name: "Authzn".to_string(),
        }
    }

    fn user() -> PublicKeyCredentialUserEntity {
        PublicKeyCredentialUserEntity {
            id: URL_SAFE_NO_PAD.encode([7u8; 32]),
            name: "alice".to_string(),
            display_name: "alice".to_string(),
        }
    }

    #[test]
    fn credential_create_decodes_attestation() {
        let mut platform = FakePlatform::new();
        platform.attestation = Some(RawAttestationResponse {
            raw_id: vec![1, 2, 3, 4],
            attestation_object: attestation_object_bytes(),
            client_data_json: br#"{"type":"webauthn.create"}"#.to_vec(),
        });

        let created = credential_create(&mut platform, rp(), user(), Some(vec![0x42; 32])).unwrap();

        assert_eq!(created.id, vec![1, 2, 3, 4]);
        assert_eq!(created.auth_data.sign_count, 5905);
        assert!(created.auth_data.attested_credential_data.is_some());

        let options = platform.last_creation_options.unwrap();
        assert_eq!(options.challenge, URL_SAFE_NO_PAD.encode([0x42; 32]));
        assert_eq!(options.attestation.as_deref(), Some("none"));
        assert_eq!(options.pub_key_cred_params[0].alg, COSE_ALGORITHM_ES256);
    }

    #[test]
    fn credential_create_fails_without_credential() {
        let mut platform = FakePlatform::new();

        assert!(matches!(
            credential_create(&mut platform, rp(), user(), None),
            Err(CredentialRequestError::NoCredentialReturned)
        ));
    }

    #[test]
    fn credential_get_packages_assertion() {
        let mut platform = FakePlatform::new();
        platform.assertion = Some(RawAssertionResponse {
            raw_id: vec![9, 9, 9],
            authenticator_data: vec![0u8; 37],
            signature: vec![0x30, 0x08, 0x02, 0x02, 0x01, 0x02, 0x02, 0x02, 0x03, 0x04],
            client_data_json: br#"{"type":"webauthn.get","challenge":"YWJj","origin":"https://example.net","crossOrigin":false}"#.to_vec(),
        });

        let allowed = vec![vec![9, 9, 9]];
        let assertion = credential_get(&mut platform, &allowed, Some(vec![0x11; 32])).unwrap();

        assert_eq!(assertion.challenge, vec![0x11; 32]);
        assert_eq!(assertion.credential_id_hash[..], Sha256::digest([9u8, 9, 9])[..]);
        assert_eq!(assertion.signature.r, vec![0x01, 0x02]);
        assert_eq!(assertion.signature.s, vec![0x03, 0x04]);

        // Token order follows the document order of the client data
        let tokens = &assertion.client_data_tokens;
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].key, "type");
        assert_eq!(tokens[0].kind, ClientDataTokenKind::String);
        assert_eq!(tokens[0].value, WEBAUTHN_REQUEST_TYPE_GET);
        assert_eq!(tokens[1].key, "challenge");
        assert_eq!(tokens[2].key, "origin");
        assert_eq!(tokens[3].key, "crossOrigin");
        assert_eq!(tokens[3].kind, ClientDataTokenKind::Bool);
        assert_eq!(tokens[3].value, "false");

        let options = platform.last_request_options.unwrap();
        assert_eq!(options.allow_credentials.len(), 1);
        assert_eq!(options.allow_credentials[0].id, URL_SAFE_NO_PAD.encode([9u8, 9, 9]));
    }

    #[test]
    fn credential_get_generates_challenge_when_absent() {
        let mut platform = FakePlatform::new();
        platform.assertion = Some(RawAssertionResponse {
            raw_id: vec![1],
            authenticator_data: vec![0u8; 37],
            signature: vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02],
            client_data_json: br#"{"type":"webauthn.get"}"#.to_vec(),
        });

        let assertion = credential_get(&mut platform, &[], None).unwrap();

        assert_eq!(assertion.challenge.len(), WEBAUTHN_CHALLENGE_LENGTH);
        let options = platform.last_request_options.unwrap();
        assert_eq!(options.challenge, URL_SAFE_NO_PAD.encode(assertion.challenge.as_slice()));
    }

    #[test]
    fn client_data_tokens_reject_non_scalar_values() {
        let result = client_data_tokens(br#"{"type":"webauthn.get","clientExtensions":{}}"#);

        assert!(matches!(
            result,
            Err(CredentialRequestError::UnsupportedValueType(key)) if key == "clientExtensions"
        ));
    }

    #[test]
    fn client_data_tokens_round_trip_serde() {
        let tokens = client_data_tokens(br#"{"type":"webauthn.get","crossOrigin":true}"#).unwrap();

        let json = serde_json::to_string(&tokens).unwrap();
        assert_eq!(
            json,
            r#"[{"t":0,"k":"type","v":"webauthn.get"},{"t":1,"k":"crossOrigin","v":"true"}]"#
        );
    }
}
