//! Access token format consumed by the door readers.
//!
//! Text form:
//!
//! ```text
//! UAI|<subject>|<class>|<startEpoch>|<endEpoch>|CS<checksum>
//! ```
//!
//! The checksum is the byte sum of everything before `|CS`, modulo 256,
//! printed with at least two digits. The hex form is the text form's UTF-8
//! bytes as lowercase hex pairs. The checksum only catches accidental
//! corruption; it is not a signature, so readers must treat the embedded
//! epochs as untrusted input.

use crate::core::time_window::compute_access_window;
use crate::domain::model::{AccessDecision, AccessToken, Reservation, TokenFields};
use crate::utils::error::{BookingError, Result};
use chrono::{DateTime, Utc};

pub const TOKEN_MAGIC: &str = "UAI";
pub const CHECKSUM_PREFIX: &str = "CS";
const FIELD_SEPARATOR: char = '|';
const FIELD_COUNT: usize = 6;

/// Byte sum modulo 256.
pub fn checksum(fields: &str) -> u8 {
    fields.bytes().fold(0u8, |acc, b| acc.wrapping_add(b))
}

pub fn validate_field(name: &str, value: &str) -> Result<()> {
    if value.contains(FIELD_SEPARATOR) {
        return Err(BookingError::InvalidField {
            field: name.to_string(),
            reason: format!("'{}' must not contain '{}'", value, FIELD_SEPARATOR),
        });
    }
    Ok(())
}

pub fn encode(
    subject_id: &str,
    class_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<AccessToken> {
    validate_field("subject_id", subject_id)?;
    validate_field("class_id", class_id)?;

    // timestamp() drops the sub-second component
    let start_epoch = start.timestamp();
    let end_epoch = end.timestamp();

    let body = format!(
        "{TOKEN_MAGIC}|{}|{}|{}|{}",
        subject_id, class_id, start_epoch, end_epoch
    );
    let sum = checksum(&body);
    let text = format!("{}|{CHECKSUM_PREFIX}{:02}", body, sum);
    let hex = hex::encode(text.as_bytes());

    Ok(AccessToken {
        fields: TokenFields {
            subject_id: subject_id.to_string(),
            class_id: class_id.to_string(),
            start_epoch,
            end_epoch,
        },
        checksum: sum,
        text,
        hex,
    })
}

pub fn encode_reservation(reservation: &Reservation) -> Result<AccessToken> {
    encode(
        &reservation.subject_id,
        &reservation.class_id,
        reservation.start_instant,
        reservation.end_instant,
    )
}

fn malformed(reason: impl Into<String>) -> BookingError {
    BookingError::MalformedToken {
        reason: reason.into(),
    }
}

fn parse_checksum(segment: &str) -> Result<u8> {
    let digits = segment
        .strip_prefix(CHECKSUM_PREFIX)
        .ok_or_else(|| malformed(format!("last segment '{}' lacks the CS prefix", segment)))?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("checksum '{}' is not numeric", digits)));
    }
    let value: u8 = digits
        .parse()
        .map_err(|_| malformed(format!("checksum '{}' is out of range", digits)))?;
    if format!("{:02}", value) != digits {
        return Err(malformed(format!("checksum '{}' is not canonical", digits)));
    }
    Ok(value)
}

fn parse_epoch(name: &str, value: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| malformed(format!("{} '{}' is not an integer epoch", name, value)))
}

fn decode_inner(text: &str) -> Result<TokenFields> {
    let parts: Vec<&str> = text.split(FIELD_SEPARATOR).collect();
    if parts.len() != FIELD_COUNT {
        return Err(malformed(format!(
            "expected {} fields, found {}",
            FIELD_COUNT,
            parts.len()
        )));
    }

    let segment = parts[FIELD_COUNT - 1];
    let found = parse_checksum(segment)?;

    // everything before the final "|CS.." segment
    let body = &text[..text.len() - segment.len() - 1];
    let expected = checksum(body);
    if expected != found {
        return Err(BookingError::ChecksumMismatch { expected, found });
    }

    if parts[0] != TOKEN_MAGIC {
        return Err(malformed(format!("unknown token prefix '{}'", parts[0])));
    }

    Ok(TokenFields {
        subject_id: parts[1].to_string(),
        class_id: parts[2].to_string(),
        start_epoch: parse_epoch("start", parts[3])?,
        end_epoch: parse_epoch("end", parts[4])?,
    })
}

fn audited(result: Result<TokenFields>) -> Result<TokenFields> {
    if let Err(e) = &result {
        tracing::warn!(target: "audit", code = e.code(), "rejected access token: {}", e);
    }
    result
}

/// Decodes and validates the text form.
pub fn decode(text: &str) -> Result<TokenFields> {
    audited(decode_inner(text))
}

/// Decodes and validates the hex form.
pub fn decode_hex(hex_form: &str) -> Result<TokenFields> {
    let text = hex::decode(hex_form.trim())
        .map_err(|e| malformed(format!("invalid hex: {}", e)))
        .and_then(|bytes| {
            String::from_utf8(bytes).map_err(|_| malformed("hex payload is not UTF-8"))
        });
    audited(text.and_then(|t| decode_inner(&t)))
}

/// Accepts either form: anything containing a pipe is treated as text.
pub fn decode_any(input: &str) -> Result<TokenFields> {
    let input = input.trim();
    if input.contains(FIELD_SEPARATOR) {
        decode(input)
    } else {
        decode_hex(input)
    }
}

/// Reader-side validation: decodes a presented token and evaluates the
/// access window against the reader's own clock.
#[derive(Debug, Clone, Copy)]
pub struct AccessReader {
    grace_minutes: i64,
}

impl AccessReader {
    pub fn new(grace_minutes: i64) -> Result<Self> {
        if grace_minutes < 0 {
            return Err(BookingError::InvalidGrace {
                minutes: grace_minutes,
            });
        }
        Ok(Self { grace_minutes })
    }

    pub fn grace_minutes(&self) -> i64 {
        self.grace_minutes
    }

    pub fn evaluate(&self, fields: &TokenFields, now: DateTime<Utc>) -> Result<AccessDecision> {
        let start = DateTime::from_timestamp(fields.start_epoch, 0)
            .ok_or_else(|| malformed("start epoch out of range"))?;
        let end = DateTime::from_timestamp(fields.end_epoch, 0)
            .ok_or_else(|| malformed("end epoch out of range"))?;

        let window = compute_access_window(start, end, self.grace_minutes)?;
        Ok(if window.contains(now) {
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied
        })
    }

    pub fn verify(&self, input: &str, now: DateTime<Utc>) -> Result<AccessDecision> {
        let fields = decode_any(input)?;
        let decision = self.evaluate(&fields, now)?;
        tracing::debug!(
            subject = %fields.subject_id,
            class = %fields.class_id,
            "reader decision: {}",
            decision
        );
        Ok(decision)
    }
}
