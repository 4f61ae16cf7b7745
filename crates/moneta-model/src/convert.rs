//! Conversion of stored column values to their semantic attribute types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use moneta_core::error::{Error, Result};
use moneta_core::types::AttrType;
use moneta_core::value::Value;

use crate::descriptors::AttrSpec;

/// Normalize a date's textual form to `YYYY-MM-DD`.
pub fn normalize_date(text: &str) -> Result<String> {
    let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|e| Error::validation(format!("'{text}' is not a date: {e}")))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Normalize a timestamp's textual form to UTC RFC 3339.
///
/// Text without an offset is treated as UTC.
pub fn normalize_datetime(text: &str) -> Result<String> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive
                .and_utc()
                .to_rfc3339_opts(SecondsFormat::Secs, true));
        }
    }
    Err(Error::validation(format!("'{text}' is not a timestamp")))
}

/// Convert a raw column value read from the database to the attribute's
/// semantic type.
///
/// Dates and datetimes parse with timezone normalization; JSON columns
/// decode their structured payload (a malformed payload is logged and the
/// raw value kept); everything else passes through.
pub fn convert_from_db(value: Option<&Value>, attr: &AttrSpec) -> Result<Value> {
    let Some(value) = value else {
        return Ok(Value::Null);
    };
    if value.is_null() {
        return Ok(Value::Null);
    }
    match attr.attr_type {
        AttrType::Date => match value.as_str() {
            Some(text) => Ok(Value::Date(normalize_date(text)?)),
            None => Ok(value.clone()),
        },
        AttrType::DateTime => match value.as_str() {
            Some(text) => Ok(Value::Timestamp(normalize_datetime(text)?)),
            None => Ok(value.clone()),
        },
        AttrType::Dict | AttrType::List => match value {
            Value::Text(text) => match serde_json::from_str(text) {
                Ok(json) => Ok(Value::Json(json)),
                Err(e) => {
                    tracing::error!(attribute = %attr.name, error = %e, "stored JSON does not decode");
                    Ok(value.clone())
                }
            },
            other => Ok(other.clone()),
        },
        AttrType::Int | AttrType::Relation | AttrType::Str | AttrType::Flag => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moneta_core::flags::ColumnFlags;

    #[test]
    fn test_normalize_datetime_treats_naive_as_utc() {
        assert_eq!(
            normalize_datetime("2026-08-06 13:05:09").unwrap(),
            "2026-08-06T13:05:09Z"
        );
        assert_eq!(
            normalize_datetime("2026-08-06T13:05:09").unwrap(),
            "2026-08-06T13:05:09Z"
        );
    }

    #[test]
    fn test_normalize_datetime_converts_offsets() {
        assert_eq!(
            normalize_datetime("2026-08-06T13:05:09+02:00").unwrap(),
            "2026-08-06T11:05:09Z"
        );
    }

    #[test]
    fn test_convert_json_column() {
        let attr = AttrSpec::new("meta", AttrType::Dict, ColumnFlags::NONE);
        let converted =
            convert_from_db(Some(&Value::Text(r#"{"a":1}"#.to_string())), &attr).unwrap();
        assert_eq!(converted, Value::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn test_convert_malformed_json_keeps_raw_value() {
        let attr = AttrSpec::new("meta", AttrType::Dict, ColumnFlags::NONE);
        let raw = Value::Text("{not json".to_string());
        assert_eq!(convert_from_db(Some(&raw), &attr).unwrap(), raw);
    }

    #[test]
    fn test_missing_column_converts_to_null() {
        let attr = AttrSpec::new("x", AttrType::Int, ColumnFlags::NONE);
        assert_eq!(convert_from_db(None, &attr).unwrap(), Value::Null);
    }

    #[test]
    fn test_scalars_pass_through() {
        let attr = AttrSpec::new("x", AttrType::Int, ColumnFlags::NONE);
        assert_eq!(
            convert_from_db(Some(&Value::Int(7)), &attr).unwrap(),
            Value::Int(7)
        );
    }
}
