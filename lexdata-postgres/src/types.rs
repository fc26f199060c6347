//! Type conversions for PostgreSQL.
//!
//! Parameters are encoded after the statement is prepared, so each [`Value`]
//! is converted for the type the server inferred for its placeholder rather
//! than for the Rust type the caller happened to use.

use std::error::Error;
use std::str::FromStr;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use lexdata_core::{DataError, DataResult, Value};
use rust_decimal::Decimal;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

use crate::error::PgError;

/// A boxed, encodable parameter.
pub type SqlParam = Box<dyn ToSql + Sync + Send>;

/// SQL NULL for a parameter of any type.
#[derive(Debug, Clone, Copy)]
pub struct SqlNull;

impl ToSql for SqlNull {
    fn to_sql(&self, _ty: &Type, _out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn mismatch(value: &Value, ty: &Type) -> PgError {
    PgError::type_conversion(format!("cannot bind a {} value to a {} parameter", value.kind(), ty))
}

fn parse<T: FromStr>(value: &Value, ty: &Type, text: &str) -> Result<T, PgError> {
    text.parse::<T>().map_err(|_| {
        PgError::type_conversion(format!("'{}' is not a valid {} ({} given)", text, ty, value.kind()))
    })
}

fn parse_timestamp(value: &Value, ty: &Type, text: &str) -> Result<DateTime<Utc>, PgError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date: NaiveDate = parse(value, ty, text)?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

fn parse_date(value: &Value, ty: &Type, text: &str) -> Result<NaiveDate, PgError> {
    match NaiveDate::from_str(text) {
        Ok(date) => Ok(date),
        Err(_) => parse_timestamp(value, ty, text).map(|ts| ts.date_naive()),
    }
}

fn decimal_from_f64(value: &Value, ty: &Type, f: f64) -> Result<Decimal, PgError> {
    // Display gives the shortest round-trip form, so 0.1 stays 0.1.
    parse(value, ty, &f.to_string())
}

fn int_to_sql(value: &Value, ty: &Type, i: i64) -> Result<SqlParam, PgError> {
    let narrow = |_: std::num::TryFromIntError| {
        PgError::type_conversion(format!("{} is out of range for {}", i, ty))
    };
    let param: SqlParam = match *ty {
        Type::INT8 => Box::new(i),
        Type::INT4 => Box::new(i32::try_from(i).map_err(narrow)?),
        Type::INT2 => Box::new(i16::try_from(i).map_err(narrow)?),
        Type::FLOAT8 => Box::new(i as f64),
        Type::FLOAT4 => Box::new(i as f32),
        Type::NUMERIC => Box::new(Decimal::from(i)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => Box::new(i.to_string()),
        Type::JSON | Type::JSONB => Box::new(serde_json::Value::from(i)),
        _ => return Err(mismatch(value, ty)),
    };
    Ok(param)
}

fn float_to_sql(value: &Value, ty: &Type, f: f64) -> Result<SqlParam, PgError> {
    let param: SqlParam = match *ty {
        Type::FLOAT8 => Box::new(f),
        Type::FLOAT4 => Box::new(f as f32),
        Type::NUMERIC => Box::new(decimal_from_f64(value, ty, f)?),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => Box::new(f.to_string()),
        Type::JSON | Type::JSONB => Box::new(value.to_json()),
        _ => return Err(mismatch(value, ty)),
    };
    Ok(param)
}

fn text_to_sql(value: &Value, ty: &Type, s: &str) -> Result<SqlParam, PgError> {
    let param: SqlParam = match *ty {
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            Box::new(s.to_string())
        }
        Type::TIMESTAMPTZ => Box::new(parse_timestamp(value, ty, s)?),
        Type::TIMESTAMP => Box::new(parse_timestamp(value, ty, s)?.naive_utc()),
        Type::DATE => Box::new(parse_date(value, ty, s)?),
        Type::UUID => Box::new(parse::<Uuid>(value, ty, s)?),
        Type::NUMERIC => Box::new(parse::<Decimal>(value, ty, s)?),
        Type::INT8 => Box::new(parse::<i64>(value, ty, s)?),
        Type::INT4 => Box::new(parse::<i32>(value, ty, s)?),
        Type::INT2 => Box::new(parse::<i16>(value, ty, s)?),
        Type::FLOAT8 => Box::new(parse::<f64>(value, ty, s)?),
        Type::BOOL => Box::new(parse::<bool>(value, ty, s)?),
        Type::JSON | Type::JSONB => Box::new(serde_json::Value::String(s.to_string())),
        _ => return Err(mismatch(value, ty)),
    };
    Ok(param)
}

fn json_to_sql(value: &Value, ty: &Type, json: &serde_json::Value) -> Result<SqlParam, PgError> {
    match *ty {
        Type::JSON | Type::JSONB => Ok(Box::new(json.clone())),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
            let items = json
                .as_array()
                .ok_or_else(|| mismatch(value, ty))?
                .iter()
                .map(|item| item.as_str().map(String::from).ok_or_else(|| mismatch(value, ty)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Box::new(items))
        }
        Type::TEXT | Type::VARCHAR => Ok(Box::new(json.to_string())),
        _ => Err(mismatch(value, ty)),
    }
}

/// Convert a value for a parameter of the given type.
pub fn value_to_sql(value: &Value, ty: &Type) -> Result<SqlParam, PgError> {
    match value {
        Value::Null => Ok(Box::new(SqlNull)),
        Value::Bool(b) => match *ty {
            Type::BOOL => Ok(Box::new(*b)),
            Type::TEXT | Type::VARCHAR => Ok(Box::new(b.to_string())),
            _ => Err(mismatch(value, ty)),
        },
        Value::Int(i) => int_to_sql(value, ty, *i),
        Value::Float(f) => float_to_sql(value, ty, *f),
        Value::Text(s) => text_to_sql(value, ty, s),
        Value::Timestamp(ts) => match *ty {
            Type::TIMESTAMPTZ => Ok(Box::new(*ts)),
            Type::TIMESTAMP => Ok(Box::new(ts.naive_utc())),
            Type::DATE => Ok(Box::new(ts.date_naive())),
            Type::TEXT | Type::VARCHAR => Ok(Box::new(ts.to_rfc3339())),
            _ => Err(mismatch(value, ty)),
        },
        Value::Date(d) => match *ty {
            Type::DATE => Ok(Box::new(*d)),
            Type::TIMESTAMPTZ => Ok(Box::new(d.and_time(NaiveTime::MIN).and_utc())),
            Type::TIMESTAMP => Ok(Box::new(d.and_time(NaiveTime::MIN))),
            Type::TEXT | Type::VARCHAR => Ok(Box::new(d.to_string())),
            _ => Err(mismatch(value, ty)),
        },
        Value::Uuid(u) => match *ty {
            Type::UUID => Ok(Box::new(*u)),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR => Ok(Box::new(u.to_string())),
            _ => Err(mismatch(value, ty)),
        },
        Value::TextArray(items) => match *ty {
            Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => Ok(Box::new(items.clone())),
            Type::JSON | Type::JSONB => Ok(Box::new(value.to_json())),
            _ => Err(mismatch(value, ty)),
        },
        Value::Json(json) => json_to_sql(value, ty, json),
    }
}

/// Convert statement values for the parameter types of a prepared statement.
pub fn bind(values: &[Value], types: &[Type]) -> DataResult<Vec<SqlParam>> {
    if values.len() != types.len() {
        return Err(DataError::encode(format!(
            "statement expects {} parameters, {} given",
            types.len(),
            values.len()
        )));
    }

    values
        .iter()
        .zip(types)
        .enumerate()
        .map(|(i, (value, ty))| {
            value_to_sql(value, ty).map_err(|e| {
                DataError::from(e).with_context(format!("binding parameter ${}", i + 1))
            })
        })
        .collect()
}

/// Borrow bound parameters in the form the driver expects.
pub fn as_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p.as_ref() as _).collect()
}
