//! Decoding of persisted candidates into validated records.
//!
//! Persisted data is whatever an earlier version (or a hand edit) left on
//! disk. The required fields decide whether a record is kept; an optional
//! field with an unexpected shape is read as absent.

use super::{Rating, Suggestion, SuggestionStatus};
use crate::error::ValidationError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// One candidate object, consumed field by field.
struct RawSuggestion {
    fields: Map<String, Value>,
}

impl RawSuggestion {
    /// JSON `null` counts as absent.
    fn take(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key).filter(|value| !value.is_null())
    }

    /// A required text field; any non-string is treated as missing.
    fn required_text(&mut self, key: &str) -> Option<String> {
        match self.take(key)? {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    fn optional_text(&mut self, id: &str, key: &str) -> Option<String> {
        match self.take(key)? {
            Value::String(text) => Some(text),
            other => {
                ignored(id, key, &other);
                None
            }
        }
    }

    /// Unsigned metric. Fractional values (JS doubles) are rounded.
    fn optional_count(&mut self, id: &str, key: &str) -> Option<u64> {
        let value = self.take(key)?;
        let count = value.as_u64().or_else(|| {
            value
                .as_f64()
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map(|n| n.round() as u64)
        });
        if count.is_none() {
            ignored(id, key, &value);
        }
        count
    }

    /// Keeps the string entries of `tags` and skips the rest.
    fn tags(&mut self, id: &str) -> Option<Vec<String>> {
        match self.take("tags")? {
            Value::Array(items) => {
                let total = items.len();
                let tags: Vec<String> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(tag) => Some(tag),
                        _ => None,
                    })
                    .collect();
                if tags.len() < total {
                    debug!(id, skipped = total - tags.len(), "ignoring non-text tags");
                }
                Some(tags)
            }
            other => {
                ignored(id, "tags", &other);
                None
            }
        }
    }

    fn into_suggestion(mut self) -> Result<Suggestion, ValidationError> {
        let id = self
            .required_text("id")
            .filter(|id| !id.is_empty())
            .ok_or(ValidationError::MissingId)?;

        let issue = self
            .required_text("issue")
            .filter(|issue| !issue.is_empty())
            .ok_or_else(|| ValidationError::MissingIssue(id.clone()))?;

        let timestamp = match self.take("timestamp") {
            Some(value) => decode_timestamp(&id, value)?,
            None => return Err(ValidationError::MissingTimestamp(id)),
        };

        let status = match self.take("status") {
            Some(Value::String(tag)) => tag.parse::<SuggestionStatus>()?,
            Some(other) => return Err(ValidationError::UnknownStatus(other.to_string())),
            None => SuggestionStatus::default(),
        };

        let rating = match self.take("rating") {
            Some(value) => decode_rating(&id, value)?,
            None => None,
        };

        let record = Suggestion {
            suggestion: self.required_text("suggestion").unwrap_or_default(),
            feature: self.optional_text(&id, "feature"),
            file: self.optional_text(&id, "file"),
            finding_id: self.optional_text(&id, "findingId"),
            conversation_id: self.optional_text(&id, "conversationId"),
            parent_id: self.optional_text(&id, "parentId"),
            tokens_used: self.optional_count(&id, "tokensUsed"),
            response_time: self.optional_count(&id, "responseTime"),
            tags: self.tags(&id),
            id,
            timestamp,
            issue,
            status,
            rating,
        };
        record.validate()?;
        Ok(record)
    }
}

fn ignored(id: &str, field: &str, value: &Value) {
    debug!(id, field, value = %value, "ignoring unreadable optional field");
}

/// Integral value of a JSON number, accepting whole floats.
fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.is_finite() && n.fract() == 0.0)
            .map(|n| n as i64)
    })
}

/// Strings go through [`parse_timestamp`]; numbers are epoch milliseconds.
fn decode_timestamp(id: &str, value: Value) -> Result<DateTime<Utc>, ValidationError> {
    let parsed = match &value {
        Value::String(text) => parse_timestamp(text),
        Value::Number(_) => value
            .as_i64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|n| n.is_finite())
                    .map(|n| n.round() as i64)
            })
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    };
    parsed.ok_or_else(|| ValidationError::InvalidTimestamp {
        id: id.to_string(),
        raw: match value {
            Value::String(text) => text,
            other => other.to_string(),
        },
    })
}

/// A whole number outside 1-5 rejects the record; anything else that is not
/// a whole number is read as no rating.
fn decode_rating(id: &str, value: Value) -> Result<Option<Rating>, ValidationError> {
    let Some(whole) = whole_number(&value) else {
        ignored(id, "rating", &value);
        return Ok(None);
    };
    let narrowed = u8::try_from(whole).map_err(|_| ValidationError::RatingOutOfRange(whole))?;
    Ok(Some(Rating::new(narrowed)?))
}

/// Decode one loosely-shaped persisted candidate.
///
/// Only a non-object is `Malformed`; the other variants name the first
/// required-field rule the candidate breaks.
pub fn decode_candidate(value: Value) -> Result<Suggestion, ValidationError> {
    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(ValidationError::Malformed(format!(
                "expected an object, found {}",
                json_kind(&other)
            )))
        }
    };
    RawSuggestion { fields }.into_suggestion()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse a serialized timestamp: RFC 3339 first, then naive forms read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};
    use serde_json::json;

    #[test]
    fn test_decode_full_candidate() {
        let record = decode_candidate(json!({
            "id": "s-1",
            "timestamp": "2024-05-02T09:30:00.000Z",
            "issue": "Slow query",
            "suggestion": "Add an index",
            "feature": "orderHistory",
            "file": "src/db/orders.ts",
            "findingId": "f-1",
            "status": "success",
            "tokensUsed": 300,
            "responseTime": 950,
            "rating": 5,
            "tags": ["sql", "perf"]
        }))
        .unwrap();

        assert_eq!(record.id, "s-1");
        assert_eq!(
            record.timestamp,
            Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap()
        );
        assert_eq!(record.finding_id.as_deref(), Some("f-1"));
        assert_eq!(record.rating.map(|r| r.value()), Some(5));
        assert_eq!(record.tags(), ["sql".to_string(), "perf".to_string()]);
    }

    #[test]
    fn test_decode_rejects_missing_required_fields() {
        let base = json!({
            "id": "s-1",
            "timestamp": "2024-05-02T09:30:00Z",
            "issue": "x",
            "suggestion": "y"
        });
        assert!(decode_candidate(base.clone()).is_ok());

        let mut empty_id = base.clone();
        empty_id["id"] = json!("");
        assert_eq!(decode_candidate(empty_id), Err(ValidationError::MissingId));

        let mut no_issue = base.clone();
        no_issue.as_object_mut().unwrap().remove("issue");
        assert!(matches!(
            decode_candidate(no_issue),
            Err(ValidationError::MissingIssue(_))
        ));

        let mut empty_body = base.clone();
        empty_body["suggestion"] = json!("");
        assert!(matches!(
            decode_candidate(empty_body),
            Err(ValidationError::EmptySuggestion(_))
        ));

        let mut no_time = base;
        no_time.as_object_mut().unwrap().remove("timestamp");
        assert!(matches!(
            decode_candidate(no_time),
            Err(ValidationError::MissingTimestamp(_))
        ));
    }

    #[test]
    fn test_decode_allows_empty_body_for_user_status() {
        let record = decode_candidate(json!({
            "id": "m-1",
            "timestamp": "2024-05-02T09:30:00Z",
            "issue": "What about retries?",
            "suggestion": "",
            "status": "user"
        }))
        .unwrap();
        assert!(record.is_user_message());
    }

    #[test]
    fn test_decode_defaults_missing_status_to_success() {
        let record = decode_candidate(json!({
            "id": "s-1",
            "timestamp": 1_714_642_200_000_i64,
            "issue": "x",
            "suggestion": "y"
        }))
        .unwrap();
        assert_eq!(record.status, SuggestionStatus::Success);
        assert_eq!(record.timestamp.year(), 2024);
    }

    #[test]
    fn test_decode_rejects_bad_values() {
        let unknown_status = json!({
            "id": "s-1", "timestamp": "2024-05-02T09:30:00Z",
            "issue": "x", "suggestion": "y", "status": "archived"
        });
        assert_eq!(
            decode_candidate(unknown_status),
            Err(ValidationError::UnknownStatus("archived".to_string()))
        );

        let bad_rating = json!({
            "id": "s-1", "timestamp": "2024-05-02T09:30:00Z",
            "issue": "x", "suggestion": "y", "rating": 11
        });
        assert_eq!(
            decode_candidate(bad_rating),
            Err(ValidationError::RatingOutOfRange(11))
        );

        let bad_time = json!({
            "id": "s-1", "timestamp": "yesterday-ish",
            "issue": "x", "suggestion": "y"
        });
        assert!(matches!(
            decode_candidate(bad_time),
            Err(ValidationError::InvalidTimestamp { .. })
        ));

        assert!(matches!(
            decode_candidate(json!(42)),
            Err(ValidationError::Malformed(_))
        ));
        assert_eq!(
            decode_candidate(json!({"id": 7, "issue": "x"})),
            Err(ValidationError::MissingId)
        );
    }

    #[test]
    fn test_decode_tolerates_bad_optional_fields() {
        let base = json!({
            "id": "a",
            "timestamp": "2024-05-02T09:30:00.000Z",
            "issue": "x",
            "suggestion": "y"
        });
        let with = |key: &str, value: Value| {
            let mut candidate = base.clone();
            candidate[key] = value;
            decode_candidate(candidate).unwrap()
        };

        assert_eq!(with("responseTime", json!(1834.5)).response_time, Some(1835));
        assert_eq!(with("tokensUsed", json!(300.0)).tokens_used, Some(300));
        assert_eq!(with("tokensUsed", json!(-1)).tokens_used, None);
        assert_eq!(with("tokensUsed", json!("many")).tokens_used, None);
        assert_eq!(with("feature", json!(42)).feature, None);
        assert_eq!(with("file", json!(["a.ts"])).file, None);
        assert_eq!(with("parentId", json!(false)).parent_id, None);
        assert_eq!(with("tags", json!(["a", 1, null, "b"])).tags(), ["a", "b"]);
        assert_eq!(with("tags", json!("a,b")).tags, None);
        assert_eq!(with("rating", json!("5")).rating, None);
        assert_eq!(with("rating", json!(4.5)).rating, None);
        assert_eq!(with("rating", json!(4.0)).rating.map(|r| r.value()), Some(4));
        assert_eq!(with("feature", Value::Null).feature, None);

        let float_millis = with("timestamp", json!(1_714_642_200_000.0_f64));
        assert_eq!(
            float_millis.timestamp,
            Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_decode_non_string_status_is_unknown() {
        let candidate = json!({
            "id": "s-1", "timestamp": "2024-05-02T09:30:00Z",
            "issue": "x", "suggestion": "y", "status": 3
        });
        assert_eq!(
            decode_candidate(candidate),
            Err(ValidationError::UnknownStatus("3".to_string()))
        );
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let offset = parse_timestamp("2024-05-02T11:30:00+02:00").unwrap();
        assert_eq!(offset.hour(), 9);

        let naive = parse_timestamp("2024-05-02 09:30:00").unwrap();
        assert_eq!(naive, Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap());

        let fractional = parse_timestamp("2024-05-02T09:30:00.250").unwrap();
        assert_eq!(fractional.timestamp_subsec_millis(), 250);

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("02/05/2024").is_none());
    }
}
