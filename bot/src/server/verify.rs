//! Slack request signature verification

use hmac::{Hmac, Mac};
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const RETRY_HEADER: &str = "x-slack-retry-num";

/// Oldest request timestamp accepted, in seconds
pub const MAX_REQUEST_AGE_SECS: i64 = 60 * 5;

/// Why a Slack request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    MissingHeaders,
    StaleTimestamp,
    BadSignature,
}

/// Verify the `v0` signature Slack puts on every request
pub fn verify_slack_request(
    headers: &HeaderMap,
    body: &[u8],
    secret: &SecretString,
    now_secs: i64,
) -> Result<(), VerifyError> {
    let timestamp = header_str(headers, TIMESTAMP_HEADER).ok_or(VerifyError::MissingHeaders)?;
    let signature = header_str(headers, SIGNATURE_HEADER).ok_or(VerifyError::MissingHeaders)?;

    let sent_at: i64 = timestamp.parse().map_err(|_| VerifyError::MissingHeaders)?;
    if (now_secs - sent_at).abs() > MAX_REQUEST_AGE_SECS {
        return Err(VerifyError::StaleTimestamp);
    }

    let expected = signature
        .strip_prefix("v0=")
        .and_then(|digest| hex::decode(digest).ok())
        .ok_or(VerifyError::BadSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| VerifyError::BadSignature)?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    if bool::from(computed.as_slice().ct_eq(&expected)) {
        Ok(())
    } else {
        Err(VerifyError::BadSignature)
    }
}

/// Whether Slack marked the request as a redelivery
pub fn is_retry(headers: &HeaderMap) -> bool {
    headers.contains_key(RETRY_HEADER)
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
