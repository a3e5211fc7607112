//! Expression Normalization
//!
//! 리터럴을 비교/산술 연산의 오른쪽으로 이동 (`5 < n` → `n > 5`)

use crate::error::DbxResult;
use crate::sql::planner::{BinaryOperator, Expr, LogicalPlan};

use super::OptimizationRule;

/// `literal op expr` → `expr flip(op) literal`. AND/OR keep their evaluation order.
pub struct ExpressionNormalizationRule;

impl OptimizationRule for ExpressionNormalizationRule {
    fn name(&self) -> &str {
        "ExpressionNormalization"
    }

    fn apply(&self, plan: LogicalPlan) -> DbxResult<LogicalPlan> {
        plan.map_exprs(&mut |e| self.normalize_expr(e))
    }
}

impl ExpressionNormalizationRule {
    fn normalize_expr(&self, expr: Expr) -> DbxResult<Expr> {
        let expr = expr.map_children(|child| self.normalize_expr(child))?;
        match expr {
            Expr::BinaryOp { left, op, right }
                if left.is_literal()
                    && !right.is_literal()
                    && !matches!(op, BinaryOperator::And | BinaryOperator::Or) =>
            {
                match op.flip() {
                    Some(flipped) => Ok(Expr::BinaryOp {
                        left: right,
                        op: flipped,
                        right: left,
                    }),
                    None => Ok(Expr::BinaryOp { left, op, right }),
                }
            }
            other => Ok(other),
        }
    }
}
