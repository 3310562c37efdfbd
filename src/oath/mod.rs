use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

pub mod hotp;
pub mod totp;

pub const OTP_DEFAULT_DIGITS_VALUE: usize = 6;
pub const OTP_DEFAULT_WINDOW_VALUE: u64 = 1;
pub const OTP_DEFAULT_ALG_VALUE: HashesAlgorithm = HashesAlgorithm::SHA1;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HashesAlgorithm {
    SHA1,
    SHA256,
}

#[derive(Clone)]
pub(crate) struct MacHashKey {
    secret: Vec<u8>,
    alg: HashesAlgorithm,
}

impl MacHashKey {
    pub(crate) fn sign(&self, data: &[u8]) -> Vec<u8> {
        match self.alg {
            HashesAlgorithm::SHA1 => {
                let mut context =
                    Hmac::<Sha1>::new_from_slice(&self.secret).expect("HMAC can take key of any size");
                context.update(data);
                context.finalize().into_bytes().to_vec()
            }
            HashesAlgorithm::SHA256 => {
                let mut context =
                    Hmac::<Sha256>::new_from_slice(&self.secret).expect("HMAC can take key of any size");
                context.update(data);
                context.finalize().into_bytes().to_vec()
            }
        }
    }
}

impl HashesAlgorithm {
    pub(crate) fn to_mac_hash_key(&self, key: &[u8]) -> MacHashKey {
        MacHashKey {
            secret: key.to_vec(),
            alg: self.clone(),
        }
    }
}

impl std::fmt::Display for HashesAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            HashesAlgorithm::SHA1 => write!(f, "SHA1"),
            HashesAlgorithm::SHA256 => write!(f, "SHA256"),
        }
    }
}

pub trait OtpAuth {
    fn to_uri(&self, label: Option<&str>, issuer: Option<&str>) -> String;
    fn from_uri(uri: &str) -> Result<Self, String>
    where
        Self: Sized;
}

/// RFC 4226 §5.3 dynamic truncation of an HMAC result.
#[inline]
pub(crate) fn dt(hmac_res: &[u8]) -> u32 {
    let offset_val = (hmac_res[hmac_res.len() - 1] & 0x0F) as usize;
    let h = &hmac_res[offset_val..offset_val + 4];

    ((h[0] as u32 & 0x7f) << 24) | ((h[1] as u32 & 0xff) << 16) | ((h[2] as u32 & 0xff) << 8) | (h[3] as u32 & 0xff)
}

/// Compares a user-supplied token against a generated one without leaking
/// the position of the first mismatch. Lengths are checked up front;
/// unequal lengths are an immediate reject.
#[inline]
pub(crate) fn timing_safe_eq(token: &[u8], expected: &[u8]) -> bool {
    token.len() == expected.len() && ring::constant_time::verify_slices_are_equal(token, expected).is_ok()
}

#[inline]
pub(crate) fn decode_hex_or_base_32(encoded: &str) -> Option<Vec<u8>> {
    // Try base32 first then, if it does not follow RFC4648, try HEX
    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, encoded).or_else(|| hex::decode(encoded).ok())
}

pub fn get_time() -> u64 {
    time::OffsetDateTime::now_utc().unix_timestamp() as u64
}
