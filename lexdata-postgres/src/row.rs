//! PostgreSQL row decoding.
//!
//! Rows are first turned into a JSON object keyed by column name, then
//! deserialized into the caller's type with serde. A missing field or a type
//! mismatch is a [`DataError`] with code `DecodeError`; extra columns are
//! ignored unless the target type denies unknown fields.

use std::any::type_name;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use lexdata_core::{DataError, DataResult, Record, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Type};
use uuid::Uuid;

/// Extension trait for PostgreSQL rows.
pub trait PgRow {
    /// Convert the row into a JSON object keyed by column name.
    fn to_json(&self) -> DataResult<Map<String, Json>>;

    /// Convert the row into a [`Record`].
    fn to_record(&self) -> DataResult<Record>;

    /// Deserialize the row into `T`.
    fn decode<T: DeserializeOwned>(&self) -> DataResult<T>;
}

impl PgRow for Row {
    fn to_json(&self) -> DataResult<Map<String, Json>> {
        let mut map = Map::with_capacity(self.len());
        for (idx, column) in self.columns().iter().enumerate() {
            let value = column_to_json(self, idx, column.type_()).map_err(|e| {
                DataError::decode(format!("column '{}': {}", column.name(), e))
                    .with_column(column.name())
            })?;
            map.insert(column.name().to_string(), value);
        }
        Ok(map)
    }

    fn to_record(&self) -> DataResult<Record> {
        Ok(self
            .to_json()?
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect())
    }

    fn decode<T: DeserializeOwned>(&self) -> DataResult<T> {
        let map = self.to_json()?;
        serde_json::from_value(Json::Object(map)).map_err(|e| {
            DataError::decode(format!("cannot decode row into {}: {}", type_name::<T>(), e))
        })
    }
}

/// Decode every row into `T`.
pub fn decode_all<T: DeserializeOwned>(rows: &[Row]) -> DataResult<Vec<T>> {
    rows.iter().map(|row| row.decode::<T>()).collect()
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>, String> {
    row.try_get::<_, Option<T>>(idx).map_err(|e| e.to_string())
}

/// NUMERIC becomes a JSON number only when an `f64` holds it exactly;
/// anything else is kept as its decimal string so no digit is lost.
fn decimal_to_json(d: Decimal) -> Json {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Json::from(i);
        }
    }
    d.to_f64()
        .filter(|f| Decimal::from_f64(*f) == Some(d))
        .and_then(serde_json::Number::from_f64)
        .map(Json::Number)
        .unwrap_or_else(|| Json::String(d.normalize().to_string()))
}

fn column_to_json(row: &Row, idx: usize, ty: &Type) -> Result<Json, String> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Json::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(Json::from),
        Type::INT4 => get::<i32>(row, idx)?.map(Json::from),
        Type::INT8 => get::<i64>(row, idx)?.map(Json::from),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(|f| Json::from(f as f64)),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Json::from),
        Type::NUMERIC => get::<Decimal>(row, idx)?.map(decimal_to_json),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            get::<String>(row, idx)?.map(Json::String)
        }
        Type::DATE => get::<NaiveDate>(row, idx)?.map(|d| Json::String(d.to_string())),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx)?
            .map(|t| Json::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?
            .map(|t| Json::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        Type::UUID => get::<Uuid>(row, idx)?.map(|u| Json::String(u.to_string())),
        Type::JSON | Type::JSONB => get::<Json>(row, idx)?,
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => get::<Vec<Option<String>>>(row, idx)?.map(|items| {
            Json::Array(
                items
                    .into_iter()
                    .map(|s| s.map(Json::String).unwrap_or(Json::Null))
                    .collect(),
            )
        }),
        Type::INT4_ARRAY => get::<Vec<i32>>(row, idx)?.map(Json::from),
        Type::INT8_ARRAY => get::<Vec<i64>>(row, idx)?.map(Json::from),
        _ => return Err(format!("unsupported column type {}", ty)),
    };
    Ok(value.unwrap_or(Json::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_integral_numeric_stays_integral() {
        assert_eq!(decimal_to_json(Decimal::from_str("2.000").unwrap()), Json::from(2));
        assert_eq!(decimal_to_json(Decimal::from_str("100.50").unwrap()), Json::from(100.5));
    }

    #[test]
    fn test_integral_numeric_decodes_into_floats() {
        #[derive(serde::Deserialize)]
        struct Item {
            quantity: f64,
        }
        let json = serde_json::json!({ "quantity": decimal_to_json(Decimal::from(2)) });
        let item: Item = serde_json::from_value(json).unwrap();
        assert_eq!(item.quantity, 2.0);
    }

    #[test]
    fn test_wide_numeric_keeps_every_digit() {
        let wide = Decimal::from_str("12345678901234567.0123456789").unwrap();
        assert_eq!(decimal_to_json(wide), Json::String("12345678901234567.0123456789".to_string()));

        let huge = Decimal::from_str("123456789012345678901234").unwrap();
        assert_eq!(decimal_to_json(huge), Json::String("123456789012345678901234".to_string()));
    }

    #[test]
    fn test_wide_numeric_refuses_float_target() {
        #[derive(Debug, serde::Deserialize)]
        struct Entry {
            #[allow(dead_code)]
            amount: f64,
        }
        let json = serde_json::json!({
            "amount": decimal_to_json(Decimal::from_str("0.1000000000000000000000000001").unwrap())
        });
        assert!(serde_json::from_value::<Entry>(json).is_err());
    }

    // Row conversion itself needs a live server; see the workspace tests.
}
