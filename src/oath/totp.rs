use super::{hotp::HOTPContext, *};

pub const TOTP_DEFAULT_PERIOD_VALUE: u64 = 30;
pub const TOTP_DEFAULT_EPOCH_VALUE: u64 = 0;

pub struct TOTPBuilder {
    alg: Option<HashesAlgorithm>,
    period: Option<u64>,
    window: Option<u64>,
    epoch: Option<u64>,
    digits: Option<usize>,
    secret: Option<Vec<u8>>,
}

impl TOTPBuilder {
    pub fn new() -> Self {
        TOTPBuilder {
            alg: None,
            period: None,
            window: None,
            epoch: None,
            digits: None,
            secret: None,
        }
    }

    pub fn algorithm(mut self, alg: HashesAlgorithm) -> Self {
        self.alg = Some(alg);
        self
    }

    pub fn period(mut self, p: u64) -> Self {
        self.period = Some(p);
        self
    }

    pub fn window(mut self, w: u64) -> Self {
        self.window = Some(w);
        self
    }

    pub fn epoch(mut self, t: u64) -> Self {
        self.epoch = Some(t);
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

    pub fn build(self) -> TOTPContext {
        let TOTPBuilder {
            alg,
            period,
            window,
            epoch,
            digits,
            secret,
        } = self;

        let alg = alg.unwrap_or(OTP_DEFAULT_ALG_VALUE);
        let secret = secret.unwrap_or_default();

        let hotp = hotp::HOTPBuilder::new()
            .algorithm(alg.clone())
            .window(window.unwrap_or(OTP_DEFAULT_WINDOW_VALUE))
            .digits(digits.unwrap_or(OTP_DEFAULT_DIGITS_VALUE))
            .secret(secret.as_slice())
            .build();

        TOTPContext {
            alg,
            period: period.unwrap_or(TOTP_DEFAULT_PERIOD_VALUE),
            epoch: epoch.unwrap_or(TOTP_DEFAULT_EPOCH_VALUE),
            digits: digits.unwrap_or(OTP_DEFAULT_DIGITS_VALUE),
            secret,
            hotp,
        }
    }
}

impl Default for TOTPBuilder {
    fn default() -> Self {
        TOTPBuilder::new()
    }
}

/// TOTP is HOTP with `counter = (when - epoch) / period` (RFC 6238 §4.2).
pub struct TOTPContext {
    alg: HashesAlgorithm,
    period: u64,
    epoch: u64,
    digits: usize,
    secret: Vec<u8>,
    hotp: HOTPContext,
}

impl TOTPContext {
    /// Create a new TOTP builder
    pub fn builder() -> TOTPBuilder {
        TOTPBuilder::new()
    }

    /// Generate the code for the current wall-clock time
    pub fn gen(&self) -> String {
        self.gen_at(get_time())
    }

    /// Generate the code for the given unix timestamp
    pub fn gen_at(&self, when: u64) -> String {
        self.hotp.gen_at(self.counter_at(when))
    }

    /// Validate a code against the current wall-clock time, returning the
    /// signed time-step offset of the first matching candidate.
    pub fn validate(&self, value: &str) -> Option<i64> {
        self.validate_at(value, get_time())
    }

    /// Validate a code against the time step containing `when`. The window
    /// scan and the constant-time comparison are shared with HOTP.
    pub fn validate_at(&self, value: &str, when: u64) -> Option<i64> {
        self.hotp.validate_at(value, self.counter_at(when))
    }

    fn counter_at(&self, when: u64) -> u64 {
        when.saturating_sub(self.epoch) / self.period
    }
}

impl OtpAuth for TOTPContext {
    fn to_uri(&self, label: Option<&str>, issuer: Option<&str>) -> String {
        let mut uri = format!(
            "otpauth://totp/{}?secret={}&algorithm={}&digits={}&period={}",
            label.unwrap_or("authzn"),
            base32::encode(base32::Alphabet::Rfc4648 { padding: false }, self.secret.as_slice()),
            self.alg,
            self.digits,
            self.period
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
            .filter(|otp_type| otp_type.eq(&"totp"))
            .ok_or_else(|| "Otpauth uri is malformed, bad type".to_string())?;

        let param_it = type_label_it
            .next()
            .and_then(|label_param| label_param.split('?').next_back().map(|s| s.split('&')))
            .ok_or_else(|| "Otpauth uri is malformed, missing parameters".to_string())?;

        let mut secret = Vec::<u8>::new();
        let mut period = TOTP_DEFAULT_PERIOD_VALUE;
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
                Some("period") => {
                    period = s_param_it
                        .next()
                        .ok_or_else(|| "Otpauth uri is malformed, missing period value".to_string())?
                        .parse::<u64>()
                        .map_err(|_| "Otpauth uri is malformed, bad period value".to_string())?;
                }
                _ => {}
            }
        }

        if secret.is_empty() {
            return Err("Otpauth uri is malformed".to_string());
        }

        Ok(TOTPBuilder::new()
            .algorithm(alg)
            .period(period)
            .digits(digits)
            .secret(&secret)
            .build())
    }
}
