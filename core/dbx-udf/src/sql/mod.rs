//! SQL 계층 — 파서, 플래너, 옵티마이저, 실행기

pub mod executor;
pub mod optimizer;
pub mod parser;
pub mod planner;

pub use executor::{QueryExecutor, QueryResult, TableSource};
pub use optimizer::{OptimizationRule, QueryOptimizer};
pub use parser::SqlParser;
pub use planner::{Expr, LogicalPlan, LogicalPlanner, RowSchema};
