//! # DBX UDF — Scalar User-Defined Functions for the DBX SQL layer
//!
//! 호스트 Rust 클로저를 SQL 스칼라 함수로 등록하고, 쿼리 분석 단계에서
//! 이름·인자 수·타입을 검사해 해결된 호출로 바꾼 뒤 행 단위로 실행합니다.
//!
//! ## 빠른 시작
//!
//! ```rust
//! use dbx_udf::{Session, SessionConfig, Value};
//!
//! # fn main() -> dbx_udf::DbxResult<()> {
//! let session = Session::new(SessionConfig::default());
//!
//! // 시그니처는 클로저의 정적 타입에서 추론
//! session.register_udf("strLen", |s: String| s.len() as i32)?;
//!
//! let result = session.sql("SELECT strLen('test')")?;
//! assert_eq!(result.rows[0][0], Value::Integer(4));
//! # Ok(())
//! # }
//! ```
//!
//! ## 파이프라인
//!
//! ```text
//! SQL 문자열 → Parser → AST → Planner → LogicalPlan (미해결 호출)
//!          → Analyzer (registry → built-ins, arity, coercion) ⇄ Optimizer
//!          → Executor → QueryResult / RecordBatch
//! ```
//!
//! ## 모듈 구조
//!
//! - [`function`] — 시그니처, 콜러블 어댑터, 레지스트리, 내장 함수
//! - [`analyzer`] — 함수 해석, 타입 강제 변환, 플랜 분석
//! - [`sql`] — SQL 파서, 플래너, 옵티마이저, 실행기
//! - [`types`] — [`SemanticType`]과 [`Value`]
//! - [`session`] — [`Session`]: 레지스트리 + 테이블 카탈로그 + 설정
//! - [`config`] — [`SessionConfig`]
//! - [`error`] — [`DbxError`], [`AnalysisError`]

pub mod analyzer;
pub mod config;
pub mod error;
pub mod function;
pub mod logging;
pub mod session;
pub mod sql;
pub mod types;

// Re-export main types
pub use analyzer::{DecimalNarrowing, ResolvedInvocation};
pub use config::{SessionConfig, UdfErrorPolicy};
pub use error::{AnalysisError, DbxError, DbxResult};
pub use function::{
    Arity, Callable, FromValue, FunctionRegistry, FunctionSignature, IntoValue, ScalarUdf,
    SqlType, builtin_registry,
};
pub use session::{Session, Table};
pub use sql::QueryResult;
pub use types::{SemanticType, StructField, Value};

// Derive macro
pub use dbx_udf_derive::SqlRecord;
