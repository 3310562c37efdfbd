use super::*;

pub const HOTP_DEFAULT_COUNTER_VALUE: u64 = 0;

pub struct HOTPBuilder {
    alg: Option<HashesAlgorithm>,
    counter: Option<u64>,
    window: Option<u64>,
    digits: Option<usize>,
    secret: Option<Vec<u8>>,
}

impl HOTPBuilder {
    pub fn new() -> Self {
        HOTPBuilder {
            alg: None,
            counter: None,
            window: None,
            digits: None,
            secret: None,
        }
    }

    pub fn algorithm(mut self, alg: HashesAlgorithm) -> Self {
        self.alg = Some(alg);
        self
    }

    pub fn counter(mut self, c: u64) -> Self {
        self.counter = Some(c);
        self
    }

    pub fn window(mut self, w: u64) -> Self {
        self.window = Some(w);
        self
    }

    pub fn digits(mut self, d: usize) -> Self {
        self.digits = Some(d);
        self
    }

    pub fn secret(mut self, secret: &[u8]) -> Self {
        self.secret = Some(secret.to_vec());
        self
    }

    pub fn build(self) -> HOTPContext {
        let HOTPBuilder {
            alg,
            counter,
            window,
            digits,
            secret,
        } = self;

        let alg = alg.unwrap_or(OTP_DEFAULT_ALG_VALUE);
        let secret = secret.unwrap_or_default();
        let secret_key = alg.to_mac_hash_key(secret.as_slice());

        HOTPContext {
            alg,
            counter: counter.unwrap_or(HOTP_DEFAULT_COUNTER_VALUE),
            window: window.unwrap_or(OTP_DEFAULT_WINDOW_VALUE),
            digits: digits.unwrap_or(OTP_DEFAULT_DIGITS_VALUE),
            secret,
            secret_key,
        }
    }
}

impl Default for HOTPBuilder {
    fn default() -> Self {
        HOTPBuilder::new()
    }
}

pub struct HOTPContext {
    alg: HashesAlgorithm,
    counter: u64,
    window: u64,
    digits: usize,
    secret: Vec<u8>,
    secret_key: MacHashKey,
}

impl HOTPContext {
    /// Create a new HOTP builder
    pub fn builder() -> HOTPBuilder {
        HOTPBuilder::new()
    }

    /// Generate the HOTP code corresponding to the current counter value
    pub fn gen(&self) -> String {
        self.gen_at(self.counter)
    }

    /// Generate the HOTP code for an arbitrary counter value. The moving
    /// factor is the counter as an 8-byte big-endian integer (RFC 4226 §5.1).
    pub fn gen_at(&self, c: u64) -> String {
        let c_b_e = c.to_be_bytes();

        let hs_sig = self.secret_key.sign(&c_b_e[..]);
        let s_bits = dt(hs_sig.as_ref());

        let s_num = s_bits % 10u32.pow(self.digits as u32);

        format!("{:0>width$}", s_num, width = self.digits)
    }

    /// Increment the inner counter value
    pub fn inc(&mut self) -> &mut Self {
        self.counter += 1;
        self
    }

    /// Check if a code equals the value at the current counter
    pub fn validate_current(&self, value: &str) -> bool {
        timing_safe_eq(value.as_bytes(), self.gen().as_bytes())
    }

    /// Scan `[counter - window, counter + window]` in ascending order and
    /// return the signed offset of the first counter whose code matches,
    /// or `None` when no counter in the window matches. The scan saturates
    /// at counter zero. Comparison is constant-time.
    pub fn validate(&self, value: &str) -> Option<i64> {
        self.validate_at(value, self.counter)
    }

    pub(crate) fn validate_at(&self, value: &str, counter: u64) -> Option<i64> {
        let start = counter.saturating_sub(self.window);
        let end = counter.saturating_add(self.window);

        for i in start..=end {
            if timing_safe_eq(value.as_bytes(), self.gen_at(i).as_bytes()) {
                return Some(i as i64 - counter as i64);
            }
        }

        None
    }

    /// Check if a code is valid within the resynchronization window; if yes
    /// the counter is advanced past the matched value. Matches behind the
    /// current counter are rejected as replays, and the counter is not
    /// altered when the value is invalidated.
    pub fn verify(&mut self, value: &str) -> bool {
        match self.validate(value) {
            Some(offset) if offset >= 0 => {
                self.counter += offset as u64 + 1;
                true
            }
            _ => false,
        }
    }
}

impl OtpAuth for HOTPContext {
    fn to_uri(&self, label: Option<&str>, issuer: Option<&str>) -> String {
        let mut uri = format!(
            "otpauth://hotp/{}?secret={}&algorithm={}&digits={}&counter={}",
            label.unwrap_or("authzn"),
            base32::encode(base32::Alphabet::Rfc4648 { padding: false }, self.secret.as_slice()),
            self.alg,
            self.digits,
            self.counter
        );

        if let Some(iss) = issuer {
            uri.push_str("&issuer=");
            uri.push_str(iss);
        }

        uri
    }

    fn from_uri(uri: &str) -> Result<Self, String>
    where
        Self: Sized,
    {
        let mut uri_it = uri.split("://");

        uri_it
            .next()
            .filter(|scheme| scheme.eq(&"otpauth"))
            .ok_or_else(|| "Otpauth uri is malformed".to_string())?;

        let mut type_label_it = uri_it
            .next()
            .map(|type_label_param| type_label_param.split('/'))
            .ok_or_else(|| "Otpauth uri is malformed, missing parts".to_string())?;

        type_label_it
            .next()
            .filter(|otp_type| otp_type.eq(&"hotp"))
            .ok_or_else(|| "Otpauth uri is malformed, bad type".to_string())?;

        let param_it = type_label_it
            .next()
            .and_then(|label_param| label_param.split('?').next_back().map(|s| s.split('&')))
            .ok_or_else(|| "Otpauth uri is malformed, missing parameters".to_string())?;

        let mut secret = Vec::<u8>::new();
        let mut counter = None;
        let mut alg = OTP_DEFAULT_ALG_VALUE;
        let mut digits = OTP_DEFAULT_DIGITS_VALUE;

        for s_param in param_it {
            let mut s_param_it = s_param.split('=');

            match s_param_it.next() {
                Some("secret") => {
                    secret = s_param_it
                        .next()
                        .and_then(decode_hex_or_base_32)
                        .ok_or_else(|| "Otpauth uri is malformed, missing secret value".to_string())?;
                }
                Some("algorithm") => {
                    alg = match s_param_it
                        .next()
                        .ok_or_else(|| "Otpauth uri is malformed, missing algorithm value".to_string())?
                    {
                        "SHA256" => HashesAlgorithm::SHA256,
                        _ => HashesAlgorithm::SHA1,
                    };
                }
                Some("digits") => {
                    digits = s_param_it
                        .next()
                        .ok_or_else(|| "Otpauth uri is malformed, missing digits value".to_string())?
                        .parse::<usize>()
                        .map_err(|_| "Otpauth uri is malformed, bad digits value".to_string())?;
                }
                Some("counter") => {
                    counter = Some(
                        s_param_it
                            .next()
                            .ok_or_else(|| "Otpauth uri is malformed, missing counter value".to_string())?
                            .parse::<u64>()
                            .map_err(|_| "Otpauth uri is malformed, bad counter value".to_string())?,
                    );
                }
                _ => {}
            }
        }

        let counter = counter.ok_or_else(|| "Otpauth uri is malformed".to_string())?;

        if secret.is_empty() {
            return Err("Otpauth uri is malformed".to_string());
        }

        let secret_key = alg.to_mac_hash_key(secret.as_slice());

        Ok(HOTPContext {
            alg,
            counter,
            window: OTP_DEFAULT_WINDOW_VALUE,
            digits,
            secret,
            secret_key,
        })
    }
}
