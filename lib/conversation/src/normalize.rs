//! Normalization of raw history records.
//!
//! Raw records arrive with heterogeneous, possibly missing fields. This is the
//! only place field fallbacks are resolved; everything downstream works with
//! [`NormalizedMessage`].

use crate::error::SummarizeError;
use crate::message::{Message, SenderType};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

/// A raw record after normalization, with its parsed timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    /// Position of the record in the raw input.
    pub index: usize,
    /// Parsed timestamp used for ordering.
    pub instant: DateTime<Utc>,
    /// The normalized message, with untrimmed content.
    pub message: Message,
}

/// Normalizes one raw record.
///
/// # Errors
///
/// Fails closed on non-object records, missing or unparseable timestamps, and
/// non-string content.
pub fn normalize(index: usize, raw: &JsonValue) -> Result<NormalizedMessage, SummarizeError> {
    let record = raw
        .as_object()
        .ok_or(SummarizeError::NotAnObject { index })?;

    let timestamp = ["created_at", "timestamp"]
        .iter()
        .find_map(|key| record.get(*key).filter(|v| !v.is_null()))
        .ok_or(SummarizeError::MissingTimestamp { index })?;
    let timestamp = timestamp
        .as_str()
        .ok_or_else(|| SummarizeError::InvalidTimestamp {
            index,
            value: timestamp.to_string(),
        })?;
    let instant = parse_timestamp(timestamp).ok_or_else(|| SummarizeError::InvalidTimestamp {
        index,
        value: timestamp.to_string(),
    })?;

    let sender_type = SenderType::from_raw(record.get("sender_type").and_then(JsonValue::as_str));

    let content = match record.get("content") {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(_) => return Err(SummarizeError::InvalidContent { index }),
    };

    Ok(NormalizedMessage {
        index,
        instant,
        message: Message::new(timestamp, sender_type, content),
    })
}

/// Normalizes every record and orders them oldest first.
///
/// The sort is stable, so records with equal timestamps keep their input
/// order.
///
/// # Errors
///
/// Returns the first record that fails [`normalize`].
pub fn normalize_history(raw: &[JsonValue]) -> Result<Vec<NormalizedMessage>, SummarizeError> {
    let mut normalized = raw
        .iter()
        .enumerate()
        .map(|(index, record)| normalize(index, record))
        .collect::<Result<Vec<_>, _>>()?;
    normalized.sort_by_key(|m| m.instant);
    Ok(normalized)
}

/// Parses an ISO-8601 timestamp.
///
/// Accepts RFC 3339, a space instead of `T`, a short `+HH` offset as written
/// by Postgres, and naive timestamps, which are taken as UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    const OFFSET_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f%#z",
        "%Y-%m-%d %H:%M:%S%.f%#z",
        "%Y-%m-%dT%H:%M%#z",
        "%Y-%m-%d %H:%M%#z",
    ];
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn prefers_created_at() {
        let normalized = normalize(
            0,
            &json!({
                "created_at": "2024-01-01T10:00:00Z",
                "timestamp": "2023-06-01T00:00:00Z",
                "sender_type": "customer",
                "content": "hello"
            }),
        )
        .expect("valid record");

        assert_eq!(normalized.message.timestamp, "2024-01-01T10:00:00Z");
        assert_eq!(normalized.message.sender_type, SenderType::Customer);
        assert_eq!(normalized.message.content, "hello");
    }

    #[test]
    fn falls_back_to_timestamp() {
        let normalized = normalize(
            3,
            &json!({"timestamp": "2024-01-01T10:00:00Z", "sender_type": "agent", "content": "hi"}),
        )
        .expect("valid record");

        assert_eq!(normalized.index, 3);
        assert_eq!(normalized.message.timestamp, "2024-01-01T10:00:00Z");
        assert_eq!(normalized.message.sender_type, SenderType::Human);
    }

    #[test]
    fn null_created_at_falls_back() {
        let normalized = normalize(
            0,
            &json!({"created_at": null, "timestamp": "2024-01-01T10:00:00Z"}),
        )
        .expect("valid record");

        assert_eq!(normalized.message.timestamp, "2024-01-01T10:00:00Z");
        assert_eq!(normalized.message.content, "");
        assert_eq!(normalized.message.sender_type, SenderType::Human);
    }

    #[test]
    fn missing_timestamp_fails_closed() {
        let err = normalize(2, &json!({"sender_type": "customer", "content": "hi"})).unwrap_err();
        assert_eq!(err, SummarizeError::MissingTimestamp { index: 2 });
    }

    #[test]
    fn unparseable_timestamp_fails_closed() {
        let err = normalize(0, &json!({"created_at": "yesterday", "content": "hi"})).unwrap_err();
        assert!(matches!(err, SummarizeError::InvalidTimestamp { .. }));
    }

    #[test]
    fn non_string_content_fails_closed() {
        let err = normalize(
            1,
            &json!({"created_at": "2024-01-01T10:00:00Z", "content": 42}),
        )
        .unwrap_err();
        assert_eq!(err, SummarizeError::InvalidContent { index: 1 });
    }

    #[test]
    fn non_object_fails_closed() {
        let err = normalize(0, &json!("just text")).unwrap_err();
        assert_eq!(err, SummarizeError::NotAnObject { index: 0 });
    }

    #[test]
    fn parses_common_iso_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        assert_eq!(parse_timestamp("2024-01-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01 10:00:00+00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01 10:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("01/01/2024"), None);
    }
}
