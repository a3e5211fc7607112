//! Error types for the DBX UDF layer.
//!
//! All public APIs return `DbxResult<T>` — no panics in library code.
//! 분석 단계 에러는 [`AnalysisError`]로 분리되어 행 처리 전에 보고됩니다.

use crate::types::SemanticType;
use thiserror::Error;

/// Query-time resolution failures. Always raised before any row is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// No signature under this name in the user registry or the built-in catalog
    #[error("undefined function: {name}")]
    UndefinedFunction { name: String },

    /// Signatures exist, but none accepts the supplied argument count
    #[error("wrong number of arguments for function '{name}': expected {expected}, got {actual}")]
    WrongArity {
        name: String,
        expected: String,
        actual: usize,
    },

    /// No coercion from the argument type to the declared parameter type
    #[error(
        "type mismatch in call to '{name}': argument {position} expects {expected}, got {actual}"
    )]
    TypeMismatch {
        name: String,
        position: usize,
        expected: SemanticType,
        actual: SemanticType,
    },

    /// Column reference not present in the input row schema
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// Field-path access to a field the struct does not declare
    #[error("struct {data_type} has no field '{field}'")]
    NoSuchField {
        field: String,
        data_type: SemanticType,
    },

    /// Field-path access on a non-struct value
    #[error("cannot access field '{field}' of non-struct type {data_type}")]
    NotAStruct {
        field: String,
        data_type: SemanticType,
    },

    /// Operator applied to operand types it does not support
    #[error("invalid operands for '{op}': {left} and {right}")]
    InvalidOperands {
        op: String,
        left: SemanticType,
        right: SemanticType,
    },

    /// WHERE / HAVING predicate of a non-boolean type
    #[error("{clause} predicate must be BOOLEAN, got {actual}")]
    NonBooleanPredicate {
        clause: &'static str,
        actual: SemanticType,
    },
}

/// Unified error type for all DBX UDF operations.
#[derive(Debug, Error)]
pub enum DbxError {
    /// Registration-time failure: the callable's signature cannot be mapped
    #[error("signature inference error for '{name}': {reason}")]
    SignatureInference { name: String, reason: String },

    /// Query analysis failure
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// Failure raised by a user-supplied callable while evaluating a row
    #[error("UDF '{function}' failed{}: {message}", row_context(.row))]
    UdfRuntime {
        function: String,
        row: Option<usize>,
        message: String,
    },

    /// SQL parsing error
    #[error("SQL parse error: {message}\nSQL: {sql}")]
    SqlParse { message: String, sql: String },

    /// Unsupported SQL feature
    #[error("SQL feature not supported: {feature}\nHint: {hint}")]
    SqlNotSupported { feature: String, hint: String },

    /// Feature not yet implemented
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Requested table does not exist
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// Schema definition or validation error
    #[error("schema error: {0}")]
    Schema(String),

    /// Type mismatch between expected and actual values
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Row evaluation error outside user code (overflow, division by zero, ...)
    #[error("execution error: {message}\nContext: {context}")]
    Execution { message: String, context: String },

    /// Apache Arrow error (RecordBatch operations)
    #[error("arrow error: {source}")]
    Arrow {
        #[from]
        source: arrow::error::ArrowError,
    },

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

fn row_context(row: &Option<usize>) -> String {
    match row {
        Some(idx) => format!(" at row {idx}"),
        None => String::new(),
    }
}

impl DbxError {
    /// 행 번호를 UDF 런타임 에러에 부착
    pub fn with_row(self, idx: usize) -> Self {
        match self {
            DbxError::UdfRuntime {
                function,
                row: None,
                message,
            } => DbxError::UdfRuntime {
                function,
                row: Some(idx),
                message,
            },
            other => other,
        }
    }

    pub fn signature(name: &str, reason: impl Into<String>) -> Self {
        DbxError::SignatureInference {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn execution(message: impl Into<String>, context: impl Into<String>) -> Self {
        DbxError::Execution {
            message: message.into(),
            context: context.into(),
        }
    }
}

/// Result type alias for all DBX UDF operations.
pub type DbxResult<T> = Result<T, DbxError>;

// From 구현들
impl From<serde_json::Error> for DbxError {
    fn from(err: serde_json::Error) -> Self {
        DbxError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_undefined_function() {
        let err: DbxError = AnalysisError::UndefinedFunction {
            name: "nope".to_string(),
        }
        .into();
        assert!(err.to_string().contains("undefined function"));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn error_display_wrong_arity() {
        let err = AnalysisError::WrongArity {
            name: "substr".to_string(),
            expected: "2 or 3".to_string(),
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "wrong number of arguments for function 'substr': expected 2 or 3, got 4"
        );
    }

    #[test]
    fn error_display_type_mismatch() {
        let err = AnalysisError::TypeMismatch {
            name: "strLen".to_string(),
            position: 1,
            expected: SemanticType::String,
            actual: SemanticType::Integer,
        };
        assert_eq!(
            err.to_string(),
            "type mismatch in call to 'strLen': argument 1 expects STRING, got INT"
        );
    }

    #[test]
    fn error_display_udf_runtime_row() {
        let err = DbxError::UdfRuntime {
            function: "boom".to_string(),
            row: None,
            message: "kaput".to_string(),
        };
        assert_eq!(err.to_string(), "UDF 'boom' failed: kaput");

        let err = err.with_row(7);
        assert_eq!(err.to_string(), "UDF 'boom' failed at row 7: kaput");
    }

    #[test]
    fn with_row_keeps_first_row() {
        let err = DbxError::UdfRuntime {
            function: "f".to_string(),
            row: Some(1),
            message: "x".to_string(),
        };
        assert!(err.with_row(9).to_string().contains("row 1"));
    }

    #[test]
    fn error_display_sql_parse() {
        let err = DbxError::SqlParse {
            message: "unexpected token".to_string(),
            sql: "SELECT * FORM users".to_string(),
        };
        assert!(err.to_string().contains("SQL parse error"));
        assert!(err.to_string().contains("FORM users"));
    }

    #[test]
    fn dbx_result_err() {
        let result: DbxResult<i32> = Err(DbxError::TableNotFound("t".to_string()));
        assert!(result.is_err());
    }
}
