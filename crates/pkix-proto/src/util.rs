//! Small conversion helpers shared by the message types

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use num_bigint::BigUint;

/// Conversion failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("invalid GeneralizedTime '{0}'")]
    Time(String),

    #[error("invalid {radix} number '{value}'")]
    Number { radix: u32, value: String },
}

/// Parse a GeneralizedTime string (`YYYYMMDDHHMMSS[.fff][Z|+HHMM|-HHMM]`).
///
/// A missing zone designator is read as UTC.
pub fn datetime_from_str(input: &str) -> Result<DateTime<Utc>, ConvertError> {
    let invalid = || ConvertError::Time(input.to_string());

    let (body, offset_secs) = split_zone(input).ok_or_else(invalid)?;
    let format = if body.contains('.') {
        "%Y%m%d%H%M%S%.f"
    } else {
        "%Y%m%d%H%M%S"
    };

    let naive = NaiveDateTime::parse_from_str(body, format).map_err(|_| invalid())?;
    let zone = FixedOffset::east_opt(offset_secs).ok_or_else(invalid)?;
    let local = zone.from_local_datetime(&naive).single().ok_or_else(invalid)?;
    Ok(local.with_timezone(&Utc))
}

fn split_zone(input: &str) -> Option<(&str, i32)> {
    if let Some(body) = input.strip_suffix('Z') {
        return Some((body, 0));
    }

    let bytes = input.as_bytes();
    if bytes.len() > 5 {
        let sign_at = bytes.len() - 5;
        let sign = match bytes[sign_at] {
            b'+' => 1,
            b'-' => -1,
            _ => return Some((input, 0)),
        };
        let zone = &input[sign_at + 1..];
        if !zone.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let hours: i32 = zone[..2].parse().ok()?;
        let minutes: i32 = zone[2..].parse().ok()?;
        return Some((&input[..sign_at], sign * (hours * 3600 + minutes * 60)));
    }

    Some((input, 0))
}

/// Format a timestamp as an RFC 7231 HTTP-date
pub fn http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Wrap DER bytes in a PEM envelope with 64-column base64 lines
pub fn pemize(der: &[u8], label: &str) -> String {
    let encoded = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for line in encoded.as_bytes().chunks(64) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

/// Hexadecimal string to decimal string
pub fn hex_to_dec(hex: &str) -> Result<String, ConvertError> {
    BigUint::parse_bytes(hex.as_bytes(), 16)
        .map(|n| n.to_str_radix(10))
        .ok_or_else(|| ConvertError::Number {
            radix: 16,
            value: hex.to_string(),
        })
}

/// Decimal string to lowercase hexadecimal string
pub fn dec_to_hex(dec: &str) -> Result<String, ConvertError> {
    BigUint::parse_bytes(dec.as_bytes(), 10)
        .map(|n| n.to_str_radix(16))
        .ok_or_else(|| ConvertError::Number {
            radix: 10,
            value: dec.to_string(),
        })
}
