//! Row values produced and consumed by scalar functions

use crate::error::{DbxError, DbxResult};
use crate::types::semantic::{SemanticType, StructField};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::DataType;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 값
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i32),
    Long(i64),
    Double(f64),
    String(String),
    Boolean(bool),
    Decimal(Decimal),
    /// Ordered named tuple; order matches the declaring struct type.
    Struct(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl Value {
    /// Best-effort type of a concrete value. NULL has no type of its own.
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            Value::Null => SemanticType::Unresolved,
            Value::Integer(_) => SemanticType::Integer,
            Value::Long(_) => SemanticType::Long,
            Value::Double(_) => SemanticType::Double,
            Value::String(_) => SemanticType::String,
            Value::Boolean(_) => SemanticType::Boolean,
            Value::Decimal(_) => SemanticType::Decimal,
            Value::Struct(fields) => SemanticType::Struct(
                fields
                    .iter()
                    .map(|(name, v)| StructField::new(name.clone(), v.semantic_type()))
                    .collect(),
            ),
            Value::Array(items) => SemanticType::array_of(
                items
                    .iter()
                    .find(|v| !v.is_null())
                    .map(Value::semantic_type)
                    .unwrap_or(SemanticType::Unresolved),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// NULL은 모든 타입과 호환
    pub fn matches_type(&self, expected: &SemanticType) -> bool {
        match (self, expected) {
            (Value::Null, _) => true,
            (Value::Struct(values), SemanticType::Struct(fields)) => {
                values.len() == fields.len()
                    && values.iter().zip(fields).all(|((name, v), f)| {
                        name.eq_ignore_ascii_case(&f.name) && v.matches_type(&f.data_type)
                    })
            }
            (Value::Array(items), SemanticType::Array(elem)) => {
                items.iter().all(|v| v.matches_type(elem))
            }
            _ => &self.semantic_type() == expected,
        }
    }

    fn mismatch(&self, expected: &str) -> DbxError {
        DbxError::TypeMismatch {
            expected: expected.to_string(),
            actual: self.semantic_type().to_string(),
        }
    }

    // 타입 변환 헬퍼
    pub fn as_i32(&self) -> DbxResult<i32> {
        match self {
            Value::Integer(i) => Ok(*i),
            _ => Err(self.mismatch("INT")),
        }
    }

    pub fn as_i64(&self) -> DbxResult<i64> {
        match self {
            Value::Long(i) => Ok(*i),
            Value::Integer(i) => Ok(i64::from(*i)),
            _ => Err(self.mismatch("BIGINT")),
        }
    }

    pub fn as_f64(&self) -> DbxResult<f64> {
        match self {
            Value::Double(f) => Ok(*f),
            _ => Err(self.mismatch("DOUBLE")),
        }
    }

    pub fn as_str(&self) -> DbxResult<&str> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(self.mismatch("STRING")),
        }
    }

    pub fn as_bool(&self) -> DbxResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            _ => Err(self.mismatch("BOOLEAN")),
        }
    }

    pub fn as_decimal(&self) -> DbxResult<Decimal> {
        match self {
            Value::Decimal(d) => Ok(*d),
            _ => Err(self.mismatch("DECIMAL")),
        }
    }

    /// Struct member by name (case-insensitive)
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Numeric view used for cross-type comparison.
    fn numeric(&self) -> Option<Numeric> {
        match self {
            Value::Integer(i) => Some(Numeric::Int(i64::from(*i))),
            Value::Long(i) => Some(Numeric::Int(*i)),
            Value::Decimal(d) => Some(Numeric::Dec(*d)),
            Value::Double(f) => Some(Numeric::Float(*f)),
            _ => None,
        }
    }

    /// SQL comparison. `None` when either side is NULL or the types are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Struct(a), Value::Struct(b)) => {
                for ((_, x), (_, y)) in a.iter().zip(b) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => self.numeric()?.compare(&other.numeric()?),
        }
    }

    /// Ordering for ORDER BY: NULLs sort first, incomparable values are equal.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Extract a value from an Arrow array at the given index.
    pub fn from_array(array: &ArrayRef, idx: usize) -> DbxResult<Self> {
        if array.is_null(idx) {
            return Ok(Value::Null);
        }
        match array.data_type() {
            DataType::Int32 => Ok(Value::Integer(
                array
                    .as_primitive::<arrow::datatypes::Int32Type>()
                    .value(idx),
            )),
            DataType::Int64 => Ok(Value::Long(
                array
                    .as_primitive::<arrow::datatypes::Int64Type>()
                    .value(idx),
            )),
            DataType::Float64 => Ok(Value::Double(
                array
                    .as_primitive::<arrow::datatypes::Float64Type>()
                    .value(idx),
            )),
            DataType::Boolean => Ok(Value::Boolean(array.as_boolean().value(idx))),
            DataType::Utf8 => Ok(Value::String(
                array.as_string::<i32>().value(idx).to_string(),
            )),
            DataType::Decimal128(_, scale) => {
                let raw = array
                    .as_primitive::<arrow::datatypes::Decimal128Type>()
                    .value(idx);
                let scale = u32::try_from(*scale).map_err(|_| {
                    DbxError::Schema(format!("negative decimal scale {scale} is not supported"))
                })?;
                Decimal::try_from_i128_with_scale(raw, scale)
                    .map(Value::Decimal)
                    .map_err(|e| DbxError::Schema(format!("decimal out of range: {e}")))
            }
            DataType::Struct(fields) => {
                let array = array.as_struct();
                let values = fields
                    .iter()
                    .zip(array.columns())
                    .map(|(field, column)| {
                        Ok((field.name().clone(), Value::from_array(column, idx)?))
                    })
                    .collect::<DbxResult<Vec<_>>>()?;
                Ok(Value::Struct(values))
            }
            DataType::List(_) => {
                let inner = array.as_list::<i32>().value(idx);
                let items = (0..inner.len())
                    .map(|i| Value::from_array(&inner, i))
                    .collect::<DbxResult<Vec<_>>>()?;
                Ok(Value::Array(items))
            }
            dt => Err(DbxError::TypeMismatch {
                expected: "Int32|Int64|Float64|Boolean|Utf8|Decimal128|Struct|List".to_string(),
                actual: format!("{dt:?}"),
            }),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i64),
    Dec(Decimal),
    Float(f64),
}

impl Numeric {
    fn compare(&self, other: &Numeric) -> Option<Ordering> {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => Some(a.cmp(b)),
            (Numeric::Float(a), Numeric::Float(b)) => a.partial_cmp(b),
            (Numeric::Float(_), _) | (_, Numeric::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => Some(self.as_decimal()?.cmp(&other.as_decimal()?)),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Int(i) => i.to_f64(),
            Numeric::Dec(d) => d.to_f64(),
            Numeric::Float(f) => Some(*f),
        }
    }

    fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Numeric::Int(i) => Some(Decimal::from(*i)),
            Numeric::Dec(d) => Some(*d),
            Numeric::Float(f) => Decimal::from_f64(*f),
        }
    }
}

// GROUP BY 키로 사용하기 위한 Eq/Hash. NaN 키끼리는 같은 그룹으로 묶이지 않는다.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            Value::Long(i) => i.hash(state),
            Value::Double(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Decimal(d) => d.normalize().hash(state),
            Value::Struct(fields) => fields.hash(state),
            Value::Array(items) => items.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Long(i) => write!(f, "{i}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Struct(fields) => {
                write!(f, "{{")?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Decimal128Array, Int32Array, StringArray, StructArray};
    use arrow::datatypes::{Field, Fields};
    use std::str::FromStr;
    use std::sync::Arc;

    #[test]
    fn test_compare_across_numeric_types() {
        assert_eq!(
            Value::Integer(2).compare(&Value::Long(3)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Decimal(Decimal::from_str("1.0").unwrap()).compare(&Value::Integer(1)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Double(2.5).compare(&Value::Integer(2)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Null.compare(&Value::Integer(1)), None);
        assert_eq!(Value::String("a".into()).compare(&Value::Integer(1)), None);
    }

    #[test]
    fn test_sort_cmp_nulls_first() {
        assert_eq!(Value::Null.sort_cmp(&Value::Integer(0)), Ordering::Less);
        assert_eq!(Value::Integer(0).sort_cmp(&Value::Null), Ordering::Greater);
    }

    #[test]
    fn test_matches_type_struct() {
        let ty = SemanticType::struct_of([("a", SemanticType::Integer)]);
        assert!(Value::Struct(vec![("a".into(), Value::Integer(1))]).matches_type(&ty));
        assert!(Value::Struct(vec![("a".into(), Value::Null)]).matches_type(&ty));
        assert!(!Value::Struct(vec![("b".into(), Value::Integer(1))]).matches_type(&ty));
        assert!(Value::Null.matches_type(&SemanticType::String));
    }

    #[test]
    fn test_from_array_primitives() {
        let ints: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), None]));
        assert_eq!(Value::from_array(&ints, 0).unwrap(), Value::Integer(1));
        assert_eq!(Value::from_array(&ints, 1).unwrap(), Value::Null);

        let strs: ArrayRef = Arc::new(StringArray::from(vec!["x"]));
        assert_eq!(
            Value::from_array(&strs, 0).unwrap(),
            Value::String("x".to_string())
        );
    }

    #[test]
    fn test_from_array_decimal() {
        let arr: ArrayRef = Arc::new(
            Decimal128Array::from(vec![150])
                .with_precision_and_scale(10, 2)
                .unwrap(),
        );
        assert_eq!(
            Value::from_array(&arr, 0).unwrap(),
            Value::Decimal(Decimal::from_str("1.50").unwrap())
        );
    }

    #[test]
    fn test_from_array_struct_keeps_order() {
        let a: ArrayRef = Arc::new(Int32Array::from(vec![7]));
        let b: ArrayRef = Arc::new(StringArray::from(vec!["s"]));
        let fields = Fields::from(vec![
            Field::new("a", DataType::Int32, true),
            Field::new("b", DataType::Utf8, true),
        ]);
        let arr: ArrayRef = Arc::new(StructArray::new(fields, vec![a, b], None));

        let value = Value::from_array(&arr, 0).unwrap();
        assert_eq!(
            value,
            Value::Struct(vec![
                ("a".to_string(), Value::Integer(7)),
                ("b".to_string(), Value::String("s".to_string())),
            ])
        );
        assert_eq!(value.field("B"), Some(&Value::String("s".to_string())));
    }

    #[test]
    fn test_display() {
        let v = Value::Struct(vec![
            ("x".to_string(), Value::Integer(1)),
            ("y".to_string(), Value::Array(vec![Value::Null])),
        ]);
        assert_eq!(v.to_string(), "{x: 1, y: [NULL]}");
    }
}
