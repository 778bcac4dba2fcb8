use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo};

/// Convert a MySQL row to a JSON object keyed by column name
pub fn row_to_json(row: &MySqlRow) -> Map<String, Value> {
    let mut map = Map::new();
    for column in row.columns() {
        let i = column.ordinal();
        let value = decode_column(row, i, column.type_info().name());
        map.insert(column.name().to_string(), value);
    }
    map
}

fn decode_column(row: &MySqlRow, i: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "BOOLEAN" => row.try_get::<Option<bool>, _>(i).map(|v| v.map(Value::Bool)),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            row.try_get::<Option<i64>, _>(i).map(|v| v.map(Value::from))
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row.try_get::<Option<u64>, _>(i).map(|v| v.map(Value::from)),
        "FLOAT" | "DOUBLE" => row
            .try_get::<Option<f64>, _>(i)
            .map(|v| v.and_then(Number::from_f64).map(Value::Number)),
        // Kept as text so no precision is lost
        "DECIMAL" => row
            .try_get::<Option<Decimal>, _>(i)
            .map(|v| v.map(|d| Value::String(d.to_string()))),
        "JSON" => row.try_get::<Option<Value>, _>(i),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(i)
            .map(|v| v.map(|d| Value::String(d.to_string()))),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(i)
            .map(|v| v.map(|t| Value::String(t.to_string()))),
        "DATETIME" => row
            .try_get::<Option<NaiveDateTime>, _>(i)
            .map(|v| v.map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        "TIMESTAMP" => row
            .try_get::<Option<DateTime<Utc>>, _>(i)
            .map(|v| v.map(|dt| Value::String(dt.to_rfc3339()))),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => row
            .try_get::<Option<Vec<u8>>, _>(i)
            .map(|v| v.map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))),
        _ => row.try_get::<Option<String>, _>(i).map(|v| v.map(Value::String)),
    };

    match decoded {
        Ok(Some(value)) => value,
        Ok(None) => Value::Null,
        Err(_) => fallback(row, i),
    }
}

/// Try different types if the declared column type did not decode
fn fallback(row: &MySqlRow, i: usize) -> Value {
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(i) {
        Value::String(s)
    } else if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(i) {
        Value::from(n)
    } else if let Ok(Some(f)) = row.try_get::<Option<f64>, _>(i) {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    } else if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(i) {
        Value::Bool(b)
    } else {
        Value::Null
    }
}
