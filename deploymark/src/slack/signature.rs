//! Slack request signing (`X-Slack-Signature`, version `v0`)

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::errors::DeployError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

const VERSION: &str = "v0";

/// Requests older (or newer) than this are replays
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

fn mac(secret: &SecretString, timestamp: &str, body: &[u8]) -> Result<HmacSha256, DeployError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| DeployError::SignatureError(e.to_string()))?;
    mac.update(format!("{}:{}:", VERSION, timestamp).as_bytes());
    mac.update(body);
    Ok(mac)
}

/// Signature Slack would send for `body` at `timestamp`
pub fn sign(secret: &SecretString, timestamp: &str, body: &[u8]) -> Result<String, DeployError> {
    let digest = mac(secret, timestamp, body)?.finalize().into_bytes();
    Ok(format!("{}={}", VERSION, hex::encode(digest)))
}

/// Check a request's signature headers against the raw body.
///
/// `now` is the current unix time in seconds.
pub fn verify_slack_signature(
    secret: &SecretString,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), DeployError> {
    let timestamp =
        timestamp.ok_or_else(|| DeployError::SignatureError("missing request timestamp".to_string()))?;
    let signature =
        signature.ok_or_else(|| DeployError::SignatureError("missing signature".to_string()))?;

    let sent_at: i64 = timestamp
        .parse()
        .map_err(|_| DeployError::SignatureError(format!("bad timestamp '{}'", timestamp)))?;
    if (now - sent_at).abs() > MAX_CLOCK_SKEW_SECS {
        return Err(DeployError::SignatureError(format!(
            "request timestamp {} is too far from now ({})",
            sent_at, now
        )));
    }

    let digest = signature
        .strip_prefix("v0=")
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
        .ok_or_else(|| DeployError::SignatureError("malformed signature".to_string()))?;

    mac(secret, timestamp, body)?
        .verify_slice(&digest)
        .map_err(|_| DeployError::SignatureError("signature mismatch".to_string()))
}
