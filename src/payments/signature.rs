use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("timestamp outside tolerance")]
    StaleTimestamp,
    #[error("no v1 signature matched")]
    Mismatch,
    #[error("invalid webhook secret")]
    InvalidSecret,
}

/// Parsed `t=<unix>,v1=<hex>[,v1=<hex>...]` header
#[derive(Debug)]
struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let mut it = part.trim().splitn(2, '=');
        match (it.next(), it.next()) {
            (Some("t"), Some(val)) => {
                timestamp = Some(val.parse::<i64>().map_err(|_| SignatureError::MalformedHeader)?)
            }
            (Some("v1"), Some(val)) if !val.is_empty() => signatures.push(val),
            _ => {}
        }
    }
    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(SignatureHeader {
            timestamp,
            signatures,
        }),
        _ => Err(SignatureError::MalformedHeader),
    }
}

/// Hex HMAC-SHA256 over `"{timestamp}.{payload}"`
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a provider signature header against the raw request body.
pub fn verify(
    header: Option<&str>,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<(), SignatureError> {
    let header = parse_header(header.ok_or(SignatureError::MissingHeader)?)?;

    if (now - header.timestamp).unsigned_abs() > tolerance_secs {
        return Err(SignatureError::StaleTimestamp);
    }

    let expected = compute_signature(secret, header.timestamp, payload)?;
    if header
        .signatures
        .iter()
        .any(|candidate| constant_time_eq(expected.as_bytes(), candidate.as_bytes()))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    fn header_for(payload: &[u8], ts: i64) -> String {
        format!("t={},v1={}", ts, compute_signature(SECRET, ts, payload).unwrap())
    }

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let header = header_for(body, NOW);
        assert_eq!(verify(Some(&header), body, SECRET, 300, NOW), Ok(()));
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let body = b"{}";
        let good = compute_signature(SECRET, NOW, body).unwrap();
        let header = format!("t={},v1=deadbeef,v0=abc,v1={}", NOW, good);
        assert_eq!(verify(Some(&header), body, SECRET, 300, NOW), Ok(()));
    }

    #[test]
    fn rejects_tampered_body() {
        let header = header_for(b"{\"amount\":100}", NOW);
        assert_eq!(
            verify(Some(&header), b"{\"amount\":1}", SECRET, 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let body = b"{}";
        let header = header_for(body, NOW - 301);
        assert_eq!(
            verify(Some(&header), body, SECRET, 300, NOW),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        assert_eq!(
            verify(None, b"{}", SECRET, 300, NOW),
            Err(SignatureError::MissingHeader)
        );
        assert_eq!(
            verify(Some("v1=abc"), b"{}", SECRET, 300, NOW),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify(Some("t=notanumber,v1=abc"), b"{}", SECRET, 300, NOW),
            Err(SignatureError::MalformedHeader)
        );
    }
}
