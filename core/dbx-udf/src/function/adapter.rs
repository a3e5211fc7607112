//! Rust 타입 ↔ SemanticType/Value 매핑 트레이트
//!
//! 콜러블 어댑터가 클로저의 정적 시그니처에서 파라미터/반환 타입을 추론할 때 사용합니다.
//! `#[derive(SqlRecord)]`는 구조체에 대해 세 트레이트를 모두 구현합니다.

use crate::error::{DbxError, DbxResult};
use crate::types::{SemanticType, Value};
use rust_decimal::Decimal;

/// Rust 타입을 SemanticType으로 변환하는 트레이트
pub trait SqlType {
    fn semantic_type() -> SemanticType;

    /// Nullable parameters receive NULL; others short-circuit the call to NULL.
    fn is_nullable() -> bool {
        false
    }
}

/// Value에서 Rust 타입으로 변환하는 트레이트
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> DbxResult<Self>;
}

/// Rust 타입을 Value로 변환하는 트레이트
pub trait IntoValue {
    fn into_value(self) -> Value;
}

macro_rules! impl_primitive {
    ($ty:ty, $semantic:ident, $variant:ident) => {
        impl SqlType for $ty {
            fn semantic_type() -> SemanticType {
                SemanticType::$semantic
            }
        }

        impl FromValue for $ty {
            fn from_value(value: &Value) -> DbxResult<Self> {
                match value {
                    Value::$variant(v) => Ok(v.clone()),
                    other => Err(DbxError::TypeMismatch {
                        expected: SemanticType::$semantic.to_string(),
                        actual: other.semantic_type().to_string(),
                    }),
                }
            }
        }

        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

// 기본 타입 구현
impl_primitive!(i32, Integer, Integer);
impl_primitive!(i64, Long, Long);
impl_primitive!(f64, Double, Double);
impl_primitive!(String, String, String);
impl_primitive!(bool, Boolean, Boolean);
impl_primitive!(Decimal, Decimal, Decimal);

// Option<T> 구현
impl<T: SqlType> SqlType for Option<T> {
    fn semantic_type() -> SemanticType {
        T::semantic_type()
    }

    fn is_nullable() -> bool {
        true
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> DbxResult<Self> {
        match value {
            Value::Null => Ok(None),
            v => Ok(Some(T::from_value(v)?)),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

// Vec<T> → ARRAY<T>
impl<T: SqlType> SqlType for Vec<T> {
    fn semantic_type() -> SemanticType {
        SemanticType::array_of(T::semantic_type())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> DbxResult<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            other => Err(DbxError::TypeMismatch {
                expected: "ARRAY".to_string(),
                actual: other.semantic_type().to_string(),
            }),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(IntoValue::into_value).collect())
    }
}

/// Read a named member out of a struct value. Used by `#[derive(SqlRecord)]`.
pub fn struct_member<T: FromValue>(value: &Value, name: &str) -> DbxResult<T> {
    match value {
        Value::Struct(_) => {
            let member = value.field(name).ok_or_else(|| DbxError::TypeMismatch {
                expected: format!("struct with field '{name}'"),
                actual: value.semantic_type().to_string(),
            })?;
            T::from_value(member)
        }
        other => Err(DbxError::TypeMismatch {
            expected: "STRUCT".to_string(),
            actual: other.semantic_type().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructField;

    struct Point {
        x: i32,
        label: Option<String>,
    }

    impl SqlType for Point {
        fn semantic_type() -> SemanticType {
            SemanticType::Struct(vec![
                StructField::new("x", i32::semantic_type()),
                StructField::new("label", <Option<String>>::semantic_type()),
            ])
        }
    }

    impl FromValue for Point {
        fn from_value(value: &Value) -> DbxResult<Self> {
            Ok(Point {
                x: struct_member(value, "x")?,
                label: struct_member(value, "label")?,
            })
        }
    }

    impl IntoValue for Point {
        fn into_value(self) -> Value {
            Value::Struct(vec![
                ("x".to_string(), self.x.into_value()),
                ("label".to_string(), self.label.into_value()),
            ])
        }
    }

    #[test]
    fn test_primitive_mapping() {
        assert_eq!(i32::semantic_type(), SemanticType::Integer);
        assert_eq!(i64::semantic_type(), SemanticType::Long);
        assert_eq!(f64::semantic_type(), SemanticType::Double);
        assert_eq!(String::semantic_type(), SemanticType::String);
        assert_eq!(bool::semantic_type(), SemanticType::Boolean);
        assert_eq!(Decimal::semantic_type(), SemanticType::Decimal);
        assert!(!i32::is_nullable());
        assert!(<Option<i32>>::is_nullable());
    }

    #[test]
    fn test_from_value_strict() {
        assert_eq!(i32::from_value(&Value::Integer(3)).unwrap(), 3);
        assert!(i32::from_value(&Value::Long(3)).is_err());
        assert_eq!(<Option<i32>>::from_value(&Value::Null).unwrap(), None);
    }

    #[test]
    fn test_vec_mapping() {
        assert_eq!(
            <Vec<i64>>::semantic_type(),
            SemanticType::array_of(SemanticType::Long)
        );
        let v = vec![1i64, 2].into_value();
        assert_eq!(<Vec<i64>>::from_value(&v).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_manual_struct_mapping() {
        let value = Point {
            x: 4,
            label: None,
        }
        .into_value();
        assert!(value.matches_type(&Point::semantic_type()));

        let back = Point::from_value(&value).unwrap();
        assert_eq!(back.x, 4);
        assert!(back.label.is_none());
        assert!(Point::from_value(&Value::Integer(1)).is_err());
    }
}
