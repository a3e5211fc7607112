//! SQL 플래너 모듈
//!
//! sqlparser AST로부터 미해결 LogicalPlan을 생성합니다.

pub mod logical;
pub mod types;

// Re-export main types
pub use logical::LogicalPlanner;
pub use types::*;
