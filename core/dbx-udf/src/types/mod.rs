//! 타입 시스템
//!
//! 분석 시점 타입([`SemanticType`])과 실행 시점 값([`Value`])

pub mod semantic;
pub mod value;

pub use semantic::{SemanticType, StructField, struct_fields_to_arrow};
pub use value::Value;
