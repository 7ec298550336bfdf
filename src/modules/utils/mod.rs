use rand::{rng, Rng};

pub mod encrypt;

/// Current UTC time as milliseconds since epoch, the timestamp unit used
/// throughout the storage layer.
#[macro_export]
macro_rules! utc_now {
    () => {{
        use chrono::Utc;
        Utc::now().timestamp_millis()
    }};
}

#[macro_export]
macro_rules! after_n_days_timestamp {
    ($start_ts:expr, $days:expr) => {{
        const MILLIS_PER_DAY: i64 = 86_400_000;
        $start_ts + ($days as i64) * MILLIS_PER_DAY
    }};
}

/// Opaque random identifier used for job ids, file ids, and session ids.
/// Not a database primary key by itself - callers combine it with other
/// fields when uniqueness across a composite key is required.
#[macro_export]
macro_rules! new_id {
    () => {
        $crate::modules::utils::generate_id()
    };
}

pub fn generate_id() -> String {
    let token = generate_token(16);
    hex::encode(token)
}

pub(crate) fn generate_token(bytes: usize) -> Vec<u8> {
    let mut buf = vec![0u8; bytes];
    rng().fill(&mut buf[..]);
    buf
}

pub fn validate_email(email: &str) -> crate::modules::error::AppResult<()> {
    use std::str::FromStr;
    email_address::EmailAddress::from_str(email).map_err(|_| {
        crate::raise_error!(
            format!("invalid email address: {email}"),
            crate::modules::error::code::ErrorCode::InvalidParameter
        )
    })?;
    Ok(())
}

pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Clip a score to the closed unit interval; every analyzer and the
/// staleness scorer route their outputs through this.
pub fn clip_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
