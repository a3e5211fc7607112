//! 재작성 규칙 — 분석된 플랜의 인자 표현식만 다시 씁니다
//!
//! 해결된 호출(`Expr::Invocation`)의 대상 함수와 강제 변환은 건드리지 않으므로
//! 재분석해도 같은 함수가 선택됩니다. 세션은 플랜이 고정될 때까지
//! analyze → optimize를 반복합니다.

mod constant_folding;
mod expression_normalization;


use crate::error::DbxResult;
use crate::sql::planner::LogicalPlan;
use tracing::trace;

pub use constant_folding::ConstantFoldingRule;
pub use expression_normalization::ExpressionNormalizationRule;

/// A plan-to-plan rewrite. Must keep every resolved invocation intact.
pub trait OptimizationRule: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, plan: LogicalPlan) -> DbxResult<LogicalPlan>;
}

/// Ordered rule pipeline
pub struct QueryOptimizer {
    rules: Vec<Box<dyn OptimizationRule>>,
}

impl QueryOptimizer {
    /// 상수 접기 → 정규화
    pub fn new() -> Self {
        Self::with_rules(vec![
            Box::new(ConstantFoldingRule),
            Box::new(ExpressionNormalizationRule),
        ])
    }

    pub fn with_rules(rules: Vec<Box<dyn OptimizationRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// One pass over every rule in order.
    pub fn optimize(&self, plan: LogicalPlan) -> DbxResult<LogicalPlan> {
        self.rules.iter().try_fold(plan, |plan, rule| {
            trace!(rule = rule.name(), "rewrite rule");
            rule.apply(plan)
        })
    }
}

impl Default for QueryOptimizer {
    fn default() -> Self {
        Self::new()
    }
}
