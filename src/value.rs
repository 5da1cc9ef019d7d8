//! Record values.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value as Json;

use crate::error::{EphError, Result};
use crate::schema::{Column, ColumnType};

/// One record: column id → value.
pub type Record = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Float32(f32),
    UInt64(u64),
    Bytes(Vec<u8>),
}

impl Value {
    /// Build the value for `column` from a JSON scalar.
    pub fn from_json(column: &Column, json: &Json) -> Result<Self> {
        let mismatch = || EphError::TypeMismatch {
            column: column.id.clone(),
            expected: column.ty.name(),
        };
        let v = match column.ty {
            ColumnType::Int32 => {
                let n = json.as_i64().ok_or_else(mismatch)?;
                Value::Int32(i32::try_from(n).map_err(|_| mismatch())?)
            }
            ColumnType::Float32 => Value::Float32(json.as_f64().ok_or_else(mismatch)? as f32),
            ColumnType::UInt64 => Value::UInt64(json.as_u64().ok_or_else(mismatch)?),
            ColumnType::Bytes(_) => Value::Bytes(json.as_str().ok_or_else(mismatch)?.as_bytes().to_vec()),
        };
        Ok(v)
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Int32(v) => Json::from(*v),
            Value::Float32(v) => serde_json::Number::from_f64(*v as f64)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::UInt64(v) => Json::from(*v),
            Value::Bytes(b) => Json::String(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Int32(v) }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self { Value::Float32(v) }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self { Value::UInt64(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Bytes(v.as_bytes().to_vec()) }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self { Value::Bytes(v) }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Bytes(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
        }
    }
}

/// Parse a JSON object into a record following `columns`.
///
/// Keys not named by the schema are ignored; missing keys are left out so the
/// encoder reports them against the right column.
pub fn record_from_json<'a, I>(columns: I, json: &Json) -> Result<Record>
where
    I: IntoIterator<Item = &'a Column>,
{
    let obj = json
        .as_object()
        .ok_or_else(|| EphError::Corrupt("record is not a JSON object".into()))?;
    let mut record = Record::new();
    for col in columns {
        if let Some(v) = obj.get(&col.id) {
            record.insert(col.id.clone(), Value::from_json(col, v)?);
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_scalars_follow_column_type() {
        let vmag = Column::float32("vmag");
        assert_eq!(Value::from_json(&vmag, &json!(3.5)).unwrap(), Value::Float32(3.5));
        assert_eq!(Value::from_json(&vmag, &json!(2)).unwrap(), Value::Float32(2.0));

        let hip = Column::int32("hip");
        assert_eq!(Value::from_json(&hip, &json!(-7)).unwrap(), Value::Int32(-7));
        assert!(matches!(
            Value::from_json(&hip, &json!(1.5)),
            Err(EphError::TypeMismatch { .. })
        ));
        assert!(Value::from_json(&hip, &json!(1u64 << 40)).is_err());

        let name = Column::bytes("name", 8);
        assert_eq!(Value::from_json(&name, &json!("Vega")).unwrap(), Value::from("Vega"));
        assert!(Value::from_json(&name, &json!(1)).is_err());
    }

    #[test]
    fn record_ignores_unknown_keys() {
        let cols = [Column::int32("hip"), Column::float32("vmag")];
        let r = record_from_json(&cols, &json!({"hip": 1, "vmag": 0.5, "note": "x"})).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r["hip"], Value::Int32(1));

        let partial = record_from_json(&cols, &json!({"hip": 1})).unwrap();
        assert!(!partial.contains_key("vmag"));
    }

    #[test]
    fn to_json_values() {
        assert_eq!(Value::UInt64(u64::MAX).to_json(), json!(u64::MAX));
        assert_eq!(Value::from("abc").to_json(), json!("abc"));
        assert_eq!(Value::Float32(f32::NAN).to_json(), Json::Null);
    }
}
