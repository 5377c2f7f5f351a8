use serde_json::Value;
use sqlx::PgPool;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

use crate::error::MigrateError;

/// One legacy user document. The legacy store enforces no schema, so every
/// field access goes through a coercing accessor and yields an `Option`.
/// Nothing outside the reconciler boundary sees the raw JSON.
#[derive(Debug, Clone)]
pub struct SourceDoc(pub Value);

impl SourceDoc {
    /// First non-empty string under any of the given keys. Numbers are
    /// stringified; other types are treated as absent.
    pub fn str_field(&self, keys: &[&str]) -> Option<String> {
        for key in keys {
            match self.0.get(key) {
                Some(Value::String(s)) => {
                    let trimmed = s.trim();
                    if !trimmed.is_empty() {
                        return Some(trimmed.to_string());
                    }
                }
                Some(Value::Number(n)) => return Some(n.to_string()),
                _ => {}
            }
        }
        None
    }

    /// Boolean under any of the given keys, accepting "true"/"false" strings
    /// and 0/1 numbers as legacy writers produced all three.
    pub fn bool_field(&self, keys: &[&str]) -> Option<bool> {
        for key in keys {
            match self.0.get(key) {
                Some(Value::Bool(b)) => return Some(*b),
                Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => return Some(true),
                    "false" => return Some(false),
                    _ => {}
                },
                Some(Value::Number(n)) => return n.as_i64().map(|v| v != 0),
                _ => {}
            }
        }
        None
    }

    /// Numeric field, accepting numbers or numeric strings.
    pub fn number_field(&self, keys: &[&str]) -> Option<f64> {
        for key in keys {
            match self.0.get(key) {
                Some(Value::Number(n)) => return n.as_f64(),
                Some(Value::String(s)) => {
                    if let Ok(v) = s.trim().parse::<f64>() {
                        return Some(v);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Timestamp field. Legacy documents carry RFC 3339 strings, bare
    /// `YYYY-MM-DD` dates, or epoch milliseconds depending on which writer
    /// produced them.
    pub fn date_field(&self, keys: &[&str]) -> Option<OffsetDateTime> {
        for key in keys {
            match self.0.get(key) {
                Some(Value::String(s)) => {
                    if let Some(ts) = parse_timestamp(s.trim()) {
                        return Some(ts);
                    }
                }
                Some(Value::Number(n)) => {
                    if let Some(millis) = n.as_i64() {
                        if let Ok(ts) =
                            OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
                        {
                            return Some(ts);
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// The document's raw identifier, stringified. Handles plain strings,
    /// numbers, and the `{"$oid": "..."}` wrapper the legacy export used.
    pub fn raw_id(&self) -> Option<String> {
        for key in ["_id", "id"] {
            match self.0.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => {
                    return Some(s.trim().to_string())
                }
                Some(Value::Number(n)) => return Some(n.to_string()),
                Some(Value::Object(map)) => {
                    if let Some(Value::String(oid)) = map.get("$oid") {
                        return Some(oid.clone());
                    }
                }
                _ => {}
            }
        }
        None
    }
}

fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    let date_only = format_description!("[year]-[month]-[day]");
    if let Ok(date) = Date::parse(raw, &date_only) {
        return Some(date.with_time(Time::MIDNIGHT).assume_utc());
    }
    None
}

/// Read every user document from the legacy store in one unfiltered query.
/// The result is detached: plain JSON values with no write-back handle.
pub async fn fetch_all_users(source: &PgPool) -> Result<Vec<SourceDoc>, MigrateError> {
    let rows: Vec<(Value,)> = sqlx::query_as("SELECT doc FROM users")
        .fetch_all(source)
        .await
        .map_err(|e| MigrateError::connection("source", e))?;
    Ok(rows.into_iter().map(|(doc,)| SourceDoc(doc)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn str_field_prefers_first_present_alias() {
        let doc = SourceDoc(json!({"username": "asha", "name": "Asha K"}));
        assert_eq!(doc.str_field(&["name", "username"]), Some("Asha K".into()));
        assert_eq!(doc.str_field(&["nickname", "username"]), Some("asha".into()));
    }

    #[test]
    fn str_field_skips_blank_and_non_string() {
        let doc = SourceDoc(json!({"name": "   ", "department": ["HR"]}));
        assert_eq!(doc.str_field(&["name"]), None);
        assert_eq!(doc.str_field(&["department"]), None);
    }

    #[test]
    fn str_field_stringifies_numbers() {
        let doc = SourceDoc(json!({"employeeId": 1042}));
        assert_eq!(doc.str_field(&["employeeId"]), Some("1042".into()));
    }

    #[test]
    fn bool_field_coerces_strings_and_numbers() {
        let doc = SourceDoc(json!({"a": "True", "b": 0, "c": false, "d": "maybe"}));
        assert_eq!(doc.bool_field(&["a"]), Some(true));
        assert_eq!(doc.bool_field(&["b"]), Some(false));
        assert_eq!(doc.bool_field(&["c"]), Some(false));
        assert_eq!(doc.bool_field(&["d"]), None);
    }

    #[test]
    fn number_field_accepts_numeric_strings() {
        let doc = SourceDoc(json!({"baseSalary": "12000"}));
        assert_eq!(doc.number_field(&["baseSalary"]), Some(12000.0));
    }

    #[test]
    fn date_field_parses_rfc3339_date_only_and_epoch_millis() {
        let doc = SourceDoc(json!({
            "a": "2023-04-01T10:30:00Z",
            "b": "2023-04-01",
            "c": 1_680_000_000_000i64,
        }));
        let a = doc.date_field(&["a"]).expect("rfc3339 should parse");
        assert_eq!(a.unix_timestamp(), 1_680_345_000);
        let b = doc.date_field(&["b"]).expect("date-only should parse");
        assert_eq!((b.year(), b.month() as u8, b.day()), (2023, 4, 1));
        let c = doc.date_field(&["c"]).expect("epoch millis should parse");
        assert_eq!(c.unix_timestamp(), 1_680_000_000);
    }

    #[test]
    fn raw_id_handles_string_number_and_oid_wrapper() {
        assert_eq!(
            SourceDoc(json!({"_id": "abc123"})).raw_id(),
            Some("abc123".into())
        );
        assert_eq!(SourceDoc(json!({"id": 7})).raw_id(), Some("7".into()));
        assert_eq!(
            SourceDoc(json!({"_id": {"$oid": "64f0c0ffee"}})).raw_id(),
            Some("64f0c0ffee".into())
        );
        assert_eq!(SourceDoc(json!({})).raw_id(), None);
    }
}
