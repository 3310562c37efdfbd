pub const WEBAUTHN_CHALLENGE_LENGTH: usize = 32;
pub const WEBAUTHN_AUTH_DATA_MIN_LENGTH: usize = 37;

pub const WEBAUTHN_USER_PRESENT_FLAG: u8 = 0b0000_0001;
pub const WEBAUTHN_USER_VERIFIED_FLAG: u8 = 0b0000_0100;
pub const WEBAUTHN_BACKUP_ELIGIBLE_FLAG: u8 = 0b0000_1000;
pub const WEBAUTHN_BACKUP_STATE_FLAG: u8 = 0b0001_0000;
pub const WEBAUTHN_ATTESTED_CREDENTIAL_DATA_FLAG: u8 = 0b0100_0000;
pub const WEBAUTHN_EXTENSION_DATA_FLAG: u8 = 0b1000_0000;

pub const WEBAUTHN_FORMAT_NONE: &str = "none";

pub const WEBAUTHN_REQUEST_TYPE_CREATE: &str = "webauthn.create";
pub const WEBAUTHN_REQUEST_TYPE_GET: &str = "webauthn.get";

pub const COSE_KEY_TYPE: i64 = 1;
pub const COSE_ALGORITHM: i64 = 3;
pub const COSE_EC_CURVE: i64 = -1;
pub const COSE_EC_X: i64 = -2;
pub const COSE_EC_Y: i64 = -3;

pub const COSE_PUBLIC_KEY_TYPE_EC2: i64 = 2;

pub const COSE_ALGORITHM_ES256: i64 = -7;
pub const COSE_ALGORITHM_EDDSA: i64 = -8;

pub const ECDSA_CURVE_P256: i64 = 1;
pub const ECDAA_CURVE_ED25519: i64 = 6;

pub const DER_TAG_SEQUENCE: u8 = 0x30;
pub const DER_TAG_INTEGER: u8 = 0x02;
