use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{DairyError, DairyResult};
use crate::store::Fields;

const LOCAL_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub fn parse_date_safe(date_str: &str) -> Option<NaiveDate> {
    if date_str.trim().is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_str.trim(), "%Y%m%d"))
        .ok()
}

/// Parses a client timestamp. Accepts RFC 3339, farm-local `YYYY-MM-DDTHH:MM`
/// and farm-local dates (midnight).
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> DairyResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_date_safe(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))
        .ok_or_else(|| {
            DairyError::Validation(format!(
                "Invalid date '{}'. Expected YYYY-MM-DDTHH:MM.",
                raw
            ))
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| DairyError::Validation(format!("Ambiguous local time '{}'.", raw)))
}

/// The farm-local calendar day `[00:00, 24:00)` as a UTC range, inclusive at both ends.
pub fn local_day_bounds(
    date: NaiveDate,
    offset: FixedOffset,
) -> DairyResult<(DateTime<Utc>, DateTime<Utc>)> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DairyError::Validation(format!("Invalid date '{}'.", date)))?;
    let start = offset
        .from_local_datetime(&midnight)
        .single()
        .ok_or_else(|| DairyError::Validation(format!("Invalid date '{}'.", date)))?
        .with_timezone(&Utc);
    let end = start + chrono::Duration::days(1) - chrono::Duration::milliseconds(1);
    Ok((start, end))
}

pub fn local_date(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

pub fn required_text(field: &str, value: &str) -> DairyResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DairyError::Validation(format!("{} must not be empty.", field)));
    }
    Ok(value.to_string())
}

/// Yields, quantities and money are never negative.
pub fn non_negative(field: &str, value: f64) -> DairyResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(DairyError::Validation(format!(
            "{} must be a non-negative number.",
            field
        )));
    }
    Ok(value)
}

pub fn to_fields<T: Serialize>(value: &T) -> DairyResult<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(DairyError::Internal(
            "record did not serialize to an object".to_string(),
        )),
    }
}

/// Collects the fields present in a partial update. Absent and blank values
/// are skipped so they never overwrite stored data.
#[derive(Debug, Default)]
pub struct PatchBuilder {
    fields: Fields,
}

impl PatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, key: &str, value: Option<String>) -> &mut Self {
        if let Some(value) = value {
            let value = value.trim();
            if !value.is_empty() {
                self.fields
                    .insert(key.to_string(), Value::String(value.to_string()));
            }
        }
        self
    }

    pub fn amount(&mut self, key: &str, value: Option<f64>) -> DairyResult<&mut Self> {
        if let Some(value) = value {
            let value = non_negative(key, value)?;
            self.fields.insert(key.to_string(), Value::from(value));
        }
        Ok(self)
    }

    pub fn timestamp(
        &mut self,
        key: &str,
        value: Option<String>,
        offset: FixedOffset,
    ) -> DairyResult<&mut Self> {
        if let Some(raw) = value.filter(|raw| !raw.trim().is_empty()) {
            let ts = parse_timestamp(&raw, offset)?;
            self.fields
                .insert(key.to_string(), serde_json::to_value(ts)?);
        }
        Ok(self)
    }

    pub fn value(&mut self, key: &str, value: Value) -> &mut Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn finish(&mut self) -> DairyResult<Fields> {
        if self.fields.is_empty() {
            return Err(DairyError::EmptyUpdate);
        }
        Ok(std::mem::take(&mut self.fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn nairobi() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    #[test]
    fn test_local_minutes_format_uses_farm_offset() {
        let ts = parse_timestamp("2023-06-27T06:30", nairobi()).unwrap();
        assert_eq!(ts.hour(), 3);
        assert_eq!(ts.minute(), 30);
        assert_eq!(ts.day(), 27);
    }

    #[test]
    fn test_rfc3339_and_plain_dates() {
        let ts = parse_timestamp("2023-06-27T06:30:00Z", nairobi()).unwrap();
        assert_eq!(ts.hour(), 6);

        let midnight = parse_timestamp("2023-06-27", nairobi()).unwrap();
        assert_eq!(local_date(midnight, nairobi()).day(), 27);
        assert_eq!(midnight.with_timezone(&nairobi()).hour(), 0);
    }

    #[test]
    fn test_garbage_dates_are_validation_errors() {
        let err = parse_timestamp("next tuesday", nairobi()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_patch_builder_skips_blank_fields() {
        let mut patch = PatchBuilder::new();
        patch.text("name", Some("   ".to_string())).text("trip", None);
        assert!(matches!(patch.finish(), Err(DairyError::EmptyUpdate)));

        let mut patch = PatchBuilder::new();
        patch.text("name", Some(" Daisy ".to_string()));
        patch.amount("package", Some(2.5)).unwrap();
        let fields = patch.finish().unwrap();
        assert_eq!(fields["name"], Value::from("Daisy"));
        assert_eq!(fields["package"], Value::from(2.5));
    }

    #[test]
    fn test_negative_amounts_are_rejected() {
        let mut patch = PatchBuilder::new();
        assert!(patch.amount("amount", Some(-1.0)).is_err());
        assert!(non_negative("amount", f64::NAN).is_err());
    }

    #[test]
    fn test_local_day_bounds_cover_the_whole_day() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let (start, end) = local_day_bounds(date, nairobi()).unwrap();
        assert_eq!(local_date(start, nairobi()), date);
        assert_eq!(local_date(end, nairobi()), date);
        assert!(end - start < chrono::Duration::days(1));
    }
}
