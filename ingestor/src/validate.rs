use crate::model::Sample;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// Untyped field map as received from a client.
pub type Candidate = Map<String, Value>;

pub const REQUIRED_FIELDS: [&str; 5] = [
    "device_id",
    "timestamp",
    "thermal_value",
    "battery_level",
    "memory_usage",
];

const THERMAL_MIN: i64 = 0;
const THERMAL_MAX: i64 = 3;
const PERCENT_MIN: f64 = 0.0;
const PERCENT_MAX: f64 = 100.0;

pub const THERMAL_ERROR: &str = "thermal_value must be an integer between 0 and 3";
pub const BATTERY_ERROR: &str = "battery_level must be a number between 0 and 100";
pub const MEMORY_ERROR: &str = "memory_usage must be a number between 0 and 100";
pub const TIMESTAMP_FORMAT_ERROR: &str = "Invalid timestamp format. Use ISO8601 format";
pub const TIMESTAMP_FUTURE_ERROR: &str = "Timestamp cannot be in the future";

/// Validates a candidate vital reading against `now`.
///
/// Returns every violation found, in rule order. When a required field is
/// missing only the missing-field messages are returned.
pub fn validate(candidate: &Candidate, now: DateTime<Utc>) -> Vec<String> {
    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| field_value(candidate, field).is_null())
        .map(|field| format!("Missing required field: {}", field))
        .collect();

    if !missing.is_empty() {
        return missing;
    }

    let mut errors = Vec::new();

    // Truncating parse: 3.9 is accepted as 3
    let thermal = parse_int(field_value(candidate, "thermal_value"));
    if !thermal.is_some_and(|t| (THERMAL_MIN..=THERMAL_MAX).contains(&t)) {
        errors.push(THERMAL_ERROR.to_string());
    }

    if !in_percent_range(parse_float(field_value(candidate, "battery_level"))) {
        errors.push(BATTERY_ERROR.to_string());
    }

    if !in_percent_range(parse_float(field_value(candidate, "memory_usage"))) {
        errors.push(MEMORY_ERROR.to_string());
    }

    match parse_timestamp(field_value(candidate, "timestamp")) {
        None => errors.push(TIMESTAMP_FORMAT_ERROR.to_string()),
        Some(ts) if ts > now => errors.push(TIMESTAMP_FUTURE_ERROR.to_string()),
        Some(_) => {}
    }

    errors
}

/// Validates against the current wall-clock time.
pub fn validate_now(candidate: &Candidate) -> Vec<String> {
    validate(candidate, Utc::now())
}

/// Converts a candidate that passed [`validate`] into a typed sample, using
/// the same parse rules the validator applied.
pub fn to_sample(candidate: &Candidate) -> Option<Sample> {
    let device_id = match field_value(candidate, "device_id") {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    Some(Sample {
        device_id,
        timestamp: parse_timestamp(field_value(candidate, "timestamp"))?,
        thermal_value: i32::try_from(parse_int(field_value(candidate, "thermal_value"))?).ok()?,
        battery_level: parse_float(field_value(candidate, "battery_level"))?,
        memory_usage: parse_float(field_value(candidate, "memory_usage"))?,
    })
}

fn field_value<'a>(candidate: &'a Candidate, field: &str) -> &'a Value {
    candidate.get(field).unwrap_or(&Value::Null)
}

fn in_percent_range(value: Option<f64>) -> bool {
    value.is_some_and(|v| (PERCENT_MIN..=PERCENT_MAX).contains(&v))
}

/// Integer parse that truncates numbers toward zero and reads the leading
/// integer of a string ("2abc" is 2).
fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => numeric_prefix(s, false)?.parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

/// Real-number parse that reads the leading decimal of a string ("75.5%" is 75.5).
fn parse_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => numeric_prefix(s, true)?.parse().ok(),
        _ => None,
    }
}

/// Returns the longest leading slice of `s` (after whitespace) that reads as
/// a number, or `None` when it starts with no digits.
fn numeric_prefix(s: &str, decimal: bool) -> Option<&str> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let scan_digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = scan_digits(end);
    let mut digits = int_end - end;
    end = int_end;

    if decimal {
        if bytes.get(end) == Some(&b'.') {
            let frac_end = scan_digits(end + 1);
            digits += frac_end - (end + 1);
            if digits > 0 {
                end = frac_end;
            }
        }

        if digits > 0 && matches!(bytes.get(end), Some(b'e' | b'E')) {
            let mut exp_start = end + 1;
            if matches!(bytes.get(exp_start), Some(b'+' | b'-')) {
                exp_start += 1;
            }
            let exp_end = scan_digits(exp_start);
            if exp_end > exp_start {
                end = exp_end;
            }
        }
    }

    (digits > 0).then(|| &s[..end])
}

/// Strings are read as ISO 8601 (a missing offset means UTC), numbers as
/// milliseconds since the Unix epoch.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(naive.and_utc());
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
                return Some(naive.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        _ => None,
    }
}
