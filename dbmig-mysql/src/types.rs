//! Conversions between engine values and MySQL wire values.

use dbmig_migrate::{SqlRow, SqlValue};
use mysql_async::{Params, Row, Value};

/// Convert an engine value to a MySQL Value.
pub fn to_mysql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Int(i) => Value::Int(*i),
        SqlValue::UInt(u) => Value::UInt(*u),
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
    }
}

/// Positional statement parameters.
pub fn to_params(values: &[SqlValue]) -> Params {
    if values.is_empty() {
        Params::Empty
    } else {
        Params::Positional(values.iter().map(to_mysql_value).collect())
    }
}

/// Convert a MySQL Value to an engine value.
///
/// Temporal values are rendered the way the server prints them; binary data
/// that is not UTF-8 is decoded lossily.
pub fn from_mysql_value(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => SqlValue::Text(text),
            Err(err) => SqlValue::Text(String::from_utf8_lossy(err.as_bytes()).into_owned()),
        },
        Value::Int(i) => SqlValue::Int(i),
        Value::UInt(u) => SqlValue::UInt(u),
        Value::Float(f) => SqlValue::Float(f64::from(f)),
        Value::Double(d) => SqlValue::Float(d),
        Value::Date(year, month, day, hour, minute, second, micro) => {
            let mut text = format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            );
            if micro > 0 {
                text.push_str(&format!(".{:06}", micro));
            }
            SqlValue::Text(text)
        }
        Value::Time(is_neg, days, hours, minutes, seconds, micro) => {
            let sign = if is_neg { "-" } else { "" };
            let mut text = format!(
                "{}{:02}:{:02}:{:02}",
                sign,
                days * 24 + u32::from(hours),
                minutes,
                seconds
            );
            if micro > 0 {
                text.push_str(&format!(".{:06}", micro));
            }
            SqlValue::Text(text)
        }
    }
}

/// Convert a MySQL row to an engine row.
pub fn from_mysql_row(row: Row) -> SqlRow {
    SqlRow::new(row.unwrap().into_iter().map(from_mysql_value).collect())
}
