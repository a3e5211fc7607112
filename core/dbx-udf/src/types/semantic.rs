//! SemanticType — 분석기와 UDF 시그니처가 공유하는 닫힌 타입 집합

use crate::error::{DbxError, DbxResult};
use arrow::datatypes::{DataType, Field, Fields};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Decimal columns exported to Arrow use this precision/scale.
pub const ARROW_DECIMAL_PRECISION: u8 = 38;
pub const ARROW_DECIMAL_SCALE: i8 = 10;

/// 분석 시점 타입
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticType {
    Integer,
    Long,
    Double,
    String,
    Boolean,
    Decimal,
    /// Ordered, named tuple. Field order is part of the type.
    Struct(Vec<StructField>),
    Array(Box<SemanticType>),
    /// Not yet known (e.g. untyped NULL literal)
    Unresolved,
}

/// One named member of a struct type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub data_type: SemanticType,
}

impl StructField {
    pub fn new(name: impl Into<String>, data_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

impl SemanticType {
    pub fn struct_of<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, SemanticType)>,
        S: Into<String>,
    {
        SemanticType::Struct(
            fields
                .into_iter()
                .map(|(name, ty)| StructField::new(name, ty))
                .collect(),
        )
    }

    pub fn array_of(element: SemanticType) -> Self {
        SemanticType::Array(Box::new(element))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SemanticType::Integer
                | SemanticType::Long
                | SemanticType::Double
                | SemanticType::Decimal
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, SemanticType::Integer | SemanticType::Long)
    }

    /// True if this type or any nested member is `Unresolved`.
    pub fn contains_unresolved(&self) -> bool {
        match self {
            SemanticType::Unresolved => true,
            SemanticType::Struct(fields) => fields.iter().any(|f| f.data_type.contains_unresolved()),
            SemanticType::Array(elem) => elem.contains_unresolved(),
            _ => false,
        }
    }

    /// Field schema of a struct type, `None` otherwise.
    pub fn struct_fields(&self) -> Option<&[StructField]> {
        match self {
            SemanticType::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Lookup a struct member by name (case-insensitive, first declared match).
    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.struct_fields()?
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Validate that the type can be carried by a function signature.
    pub fn validate_for_signature(&self) -> Result<(), String> {
        match self {
            SemanticType::Unresolved => Err("type is unresolved".to_string()),
            SemanticType::Struct(fields) => {
                if fields.is_empty() {
                    return Err("struct type must declare at least one field".to_string());
                }
                for (i, field) in fields.iter().enumerate() {
                    if fields[..i]
                        .iter()
                        .any(|prev| prev.name.eq_ignore_ascii_case(&field.name))
                    {
                        return Err(format!("duplicate struct field '{}'", field.name));
                    }
                    field
                        .data_type
                        .validate_for_signature()
                        .map_err(|e| format!("field '{}': {e}", field.name))?;
                }
                Ok(())
            }
            SemanticType::Array(elem) => elem.validate_for_signature(),
            _ => Ok(()),
        }
    }

    /// Arrow DataType for this semantic type
    pub fn to_arrow(&self) -> DataType {
        match self {
            SemanticType::Integer => DataType::Int32,
            SemanticType::Long => DataType::Int64,
            SemanticType::Double => DataType::Float64,
            SemanticType::String => DataType::Utf8,
            SemanticType::Boolean => DataType::Boolean,
            SemanticType::Decimal => {
                DataType::Decimal128(ARROW_DECIMAL_PRECISION, ARROW_DECIMAL_SCALE)
            }
            SemanticType::Struct(fields) => DataType::Struct(struct_fields_to_arrow(fields)),
            SemanticType::Array(elem) => {
                DataType::List(Arc::new(Field::new("item", elem.to_arrow(), true)))
            }
            SemanticType::Unresolved => DataType::Null,
        }
    }

    /// Arrow DataType → SemanticType
    pub fn from_arrow(data_type: &DataType) -> DbxResult<Self> {
        match data_type {
            DataType::Int32 => Ok(SemanticType::Integer),
            DataType::Int64 => Ok(SemanticType::Long),
            DataType::Float64 => Ok(SemanticType::Double),
            DataType::Utf8 => Ok(SemanticType::String),
            DataType::Boolean => Ok(SemanticType::Boolean),
            DataType::Decimal128(_, _) => Ok(SemanticType::Decimal),
            DataType::Struct(fields) => Ok(SemanticType::Struct(
                fields
                    .iter()
                    .map(|f| Ok(StructField::new(f.name(), Self::from_arrow(f.data_type())?)))
                    .collect::<DbxResult<_>>()?,
            )),
            DataType::List(field) => {
                Ok(SemanticType::array_of(Self::from_arrow(field.data_type())?))
            }
            dt => Err(DbxError::TypeMismatch {
                expected: "Int32|Int64|Float64|Utf8|Boolean|Decimal128|Struct|List".to_string(),
                actual: format!("{dt:?}"),
            }),
        }
    }
}

/// Struct member list → Arrow `Fields`, preserving declaration order.
pub fn struct_fields_to_arrow(fields: &[StructField]) -> Fields {
    fields
        .iter()
        .map(|f| Field::new(f.name.clone(), f.data_type.to_arrow(), true))
        .collect()
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Integer => write!(f, "INT"),
            SemanticType::Long => write!(f, "BIGINT"),
            SemanticType::Double => write!(f, "DOUBLE"),
            SemanticType::String => write!(f, "STRING"),
            SemanticType::Boolean => write!(f, "BOOLEAN"),
            SemanticType::Decimal => write!(f, "DECIMAL"),
            SemanticType::Struct(fields) => {
                write!(f, "STRUCT<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.data_type)?;
                }
                write!(f, ">")
            }
            SemanticType::Array(elem) => write!(f, "ARRAY<{elem}>"),
            SemanticType::Unresolved => write!(f, "UNRESOLVED"),
        }
    }
}
