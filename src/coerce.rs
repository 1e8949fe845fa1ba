use chrono::NaiveDate;
use serde_json::Value;

/// Coerces a JSON value to `f64`, falling back to `default` when the value
/// is absent, null, or not parseable as a number.
pub fn as_f64_or(value: Option<&Value>, default: f64) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(default),
        _ => default,
    }
}

/// Coerces a JSON value to `i64` with a fallback default.
///
/// Fractional strings (e.g. `"15.5"`) are not integers and fall back;
/// fractional JSON numbers truncate toward zero.
pub fn as_i64_or(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(default),
        _ => default,
    }
}

/// Reads a string field off a JSON object, empty when absent or non-string.
pub fn str_or_empty<'a>(value: Option<&'a Value>) -> &'a str {
    value.and_then(Value::as_str).unwrap_or("")
}

/// Date formats accepted for credit-line dates, tried in order.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%Y%m%d", "%d-%m-%Y"];

/// Parses a date string trying the supported formats in order; the first
/// format that succeeds wins.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}
