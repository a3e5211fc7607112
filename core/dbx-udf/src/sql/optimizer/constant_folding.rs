//! Constant Folding
//!
//! 상수 표현식을 계획 단계에서 평가 (1 + 2 → 3). 함수 호출 자체는 평가하지 않고
//! 인자만 접는다.

use crate::error::DbxResult;
use crate::sql::executor::evaluate_constant;
use crate::sql::planner::{Expr, LogicalPlan, RowSchema};
use crate::types::Value;

use super::OptimizationRule;

/// 상수 표현식을 계획 단계에서 평가 (1 + 2 → 3)
pub struct ConstantFoldingRule;

impl OptimizationRule for ConstantFoldingRule {
    fn name(&self) -> &str {
        "ConstantFolding"
    }

    fn apply(&self, plan: LogicalPlan) -> DbxResult<LogicalPlan> {
        let plan = plan.map_exprs(&mut |e| self.fold_expr(e))?;
        Ok(self.prune_filters(plan))
    }
}

impl ConstantFoldingRule {
    /// Bottom-up fold. A node folds only when all of its children are literals,
    /// evaluation succeeds, and the result keeps the node's type.
    fn fold_expr(&self, expr: Expr) -> DbxResult<Expr> {
        let expr = expr.map_children(|child| self.fold_expr(child))?;
        if !Self::foldable(&expr) {
            return Ok(expr);
        }
        let folded = evaluate_constant(&expr).ok().and_then(|value| {
            let ty = expr.data_type(&RowSchema::empty()).ok()?;
            (value.semantic_type() == ty).then_some(value)
        });
        Ok(match folded {
            Some(value) => Expr::Literal(value),
            None => expr,
        })
    }

    fn foldable(expr: &Expr) -> bool {
        match expr {
            Expr::BinaryOp { left, right, .. } => left.is_literal() && right.is_literal(),
            Expr::Not(e)
            | Expr::Negative(e)
            | Expr::IsNull(e)
            | Expr::IsNotNull(e)
            | Expr::Cast { expr: e, .. }
            | Expr::FieldAccess { expr: e, .. } => e.is_literal(),
            // 함수 호출은 결정적이어도 평가하지 않는다
            Expr::Column(_) | Expr::Literal(_) | Expr::Function { .. } | Expr::Invocation(_) => {
                false
            }
        }
    }

    /// If predicate folded to TRUE, eliminate filter entirely
    fn prune_filters(&self, plan: LogicalPlan) -> LogicalPlan {
        match plan {
            LogicalPlan::Filter {
                input,
                predicate: Expr::Literal(Value::Boolean(true)),
            } => self.prune_filters(*input),
            LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter {
                input: Box::new(self.prune_filters(*input)),
                predicate,
            },
            LogicalPlan::Project { input, projections } => LogicalPlan::Project {
                input: Box::new(self.prune_filters(*input)),
                projections,
            },
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => LogicalPlan::Aggregate {
                input: Box::new(self.prune_filters(*input)),
                group_by,
                aggregates,
            },
            LogicalPlan::Sort { input, order_by } => LogicalPlan::Sort {
                input: Box::new(self.prune_filters(*input)),
                order_by,
            },
            LogicalPlan::Limit {
                input,
                count,
                offset,
            } => LogicalPlan::Limit {
                input: Box::new(self.prune_filters(*input)),
                count,
                offset,
            },
            other => other,
        }
    }
}
