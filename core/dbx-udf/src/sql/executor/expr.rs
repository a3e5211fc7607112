//! Row-level expression evaluation

use crate::analyzer::{DecimalNarrowing, ResolvedInvocation, narrow_decimal};
use crate::config::UdfErrorPolicy;
use crate::error::{DbxError, DbxResult};
use crate::sql::planner::{BinaryOperator, Expr, RowSchema};
use crate::types::{SemanticType, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::warn;

/// Evaluates resolved expressions against rows of a fixed input schema.
pub struct ExprEvaluator<'a> {
    schema: &'a RowSchema,
    on_udf_error: UdfErrorPolicy,
}

impl<'a> ExprEvaluator<'a> {
    pub fn new(schema: &'a RowSchema, on_udf_error: UdfErrorPolicy) -> Self {
        Self {
            schema,
            on_udf_error,
        }
    }

    /// Evaluate `expr` for one row. `row_idx` tags UDF failures.
    pub fn evaluate(&self, expr: &Expr, row: &[Value], row_idx: usize) -> DbxResult<Value> {
        match expr {
            Expr::Column(name) => {
                let idx = self.schema.index_of(name).ok_or_else(|| {
                    DbxError::execution(format!("column '{name}' not in input"), "evaluate")
                })?;
                row.get(idx).cloned().ok_or_else(|| {
                    DbxError::execution(
                        format!("column index {} out of range ({})", idx, row.len()),
                        "evaluate",
                    )
                })
            }
            Expr::Literal(value) => Ok(value.clone()),
            Expr::BinaryOp { left, op, right } => {
                let l = self.evaluate(left, row, row_idx)?;
                // AND/OR 단락 평가
                match (op, &l) {
                    (BinaryOperator::And, Value::Boolean(false)) => {
                        return Ok(Value::Boolean(false));
                    }
                    (BinaryOperator::Or, Value::Boolean(true)) => return Ok(Value::Boolean(true)),
                    _ => {}
                }
                let r = self.evaluate(right, row, row_idx)?;
                eval_binary(&l, *op, &r)
            }
            Expr::Not(inner) => match self.evaluate(inner, row, row_idx)? {
                Value::Boolean(b) => Ok(Value::Boolean(!b)),
                Value::Null => Ok(Value::Null),
                other => Err(DbxError::TypeMismatch {
                    expected: "BOOLEAN".to_string(),
                    actual: other.semantic_type().to_string(),
                }),
            },
            Expr::Negative(inner) => negate(self.evaluate(inner, row, row_idx)?),
            Expr::IsNull(inner) => Ok(Value::Boolean(
                self.evaluate(inner, row, row_idx)?.is_null(),
            )),
            Expr::IsNotNull(inner) => Ok(Value::Boolean(
                !self.evaluate(inner, row, row_idx)?.is_null(),
            )),
            Expr::Cast { expr, to, checked } => {
                cast_value(self.evaluate(expr, row, row_idx)?, to, *checked)
            }
            Expr::FieldAccess { expr, field } => {
                let base = self.evaluate(expr, row, row_idx)?;
                Ok(base.field(field).cloned().unwrap_or(Value::Null))
            }
            Expr::Invocation(inv) => self.invoke(inv, row, row_idx),
            Expr::Function { name, .. } => {
                Err(DbxError::execution("unresolved function call", name.clone()))
            }
        }
    }

    /// Evaluate a predicate; NULL counts as false.
    pub fn matches(&self, predicate: &Expr, row: &[Value], row_idx: usize) -> DbxResult<bool> {
        match self.evaluate(predicate, row, row_idx)? {
            Value::Boolean(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(DbxError::TypeMismatch {
                expected: "BOOLEAN".to_string(),
                actual: other.semantic_type().to_string(),
            }),
        }
    }

    fn invoke(&self, inv: &ResolvedInvocation, row: &[Value], row_idx: usize) -> DbxResult<Value> {
        let args = inv
            .args()
            .iter()
            .map(|arg| self.evaluate(arg, row, row_idx))
            .collect::<DbxResult<SmallVec<[Value; 4]>>>()?;

        match inv.function().invoke(&args) {
            Ok(value) => Ok(value),
            Err(err @ DbxError::UdfRuntime { .. }) => {
                let err = err.with_row(row_idx);
                match self.on_udf_error {
                    UdfErrorPolicy::Abort => Err(err),
                    UdfErrorPolicy::Null => {
                        warn!(function = inv.name(), row = row_idx, error = %err, "UDF failed, yielding NULL");
                        Ok(Value::Null)
                    }
                }
            }
            Err(err) => Err(err),
        }
    }
}

/// Evaluate a literal-only expression. Fails on column references.
pub fn evaluate_constant(expr: &Expr) -> DbxResult<Value> {
    let schema = RowSchema::empty();
    ExprEvaluator::new(&schema, UdfErrorPolicy::Abort).evaluate(expr, &[], 0)
}

fn overflow(op: BinaryOperator) -> DbxError {
    DbxError::execution("numeric overflow", op.to_string())
}

/// Binary operator over two values. NULL operands propagate except in AND/OR.
pub fn eval_binary(l: &Value, op: BinaryOperator, r: &Value) -> DbxResult<Value> {
    use BinaryOperator::*;
    match op {
        And => Ok(match (l, r) {
            (Value::Boolean(false), _) | (_, Value::Boolean(false)) => Value::Boolean(false),
            (Value::Boolean(true), Value::Boolean(true)) => Value::Boolean(true),
            _ => Value::Null,
        }),
        Or => Ok(match (l, r) {
            (Value::Boolean(true), _) | (_, Value::Boolean(true)) => Value::Boolean(true),
            (Value::Boolean(false), Value::Boolean(false)) => Value::Boolean(false),
            _ => Value::Null,
        }),
        _ if l.is_null() || r.is_null() => Ok(Value::Null),
        Eq | NotEq | Lt | LtEq | Gt | GtEq => Ok(match l.compare(r) {
            Some(ord) => Value::Boolean(match op {
                Eq => ord == Ordering::Equal,
                NotEq => ord != Ordering::Equal,
                Lt => ord == Ordering::Less,
                LtEq => ord != Ordering::Greater,
                Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }),
            None => Value::Null,
        }),
        Plus | Minus | Multiply | Divide | Modulo => eval_arithmetic(l, op, r),
    }
}

fn eval_arithmetic(l: &Value, op: BinaryOperator, r: &Value) -> DbxResult<Value> {
    use BinaryOperator::*;
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                Plus => a.checked_add(b),
                Minus => a.checked_sub(b),
                Multiply => a.checked_mul(b),
                // 0으로 나누기 → NULL
                Divide | Modulo if b == 0 => return Ok(Value::Null),
                Divide => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            result.map(Value::Integer).ok_or_else(|| overflow(op))
        }
        (Value::Integer(_) | Value::Long(_), Value::Integer(_) | Value::Long(_)) => {
            let (a, b) = (l.as_i64()?, r.as_i64()?);
            let result = match op {
                Plus => a.checked_add(b),
                Minus => a.checked_sub(b),
                Multiply => a.checked_mul(b),
                Divide | Modulo if b == 0 => return Ok(Value::Null),
                Divide => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            result.map(Value::Long).ok_or_else(|| overflow(op))
        }
        (Value::Double(_), _) | (_, Value::Double(_)) => {
            let (a, b) = (to_f64(l)?, to_f64(r)?);
            Ok(match op {
                Plus => Value::Double(a + b),
                Minus => Value::Double(a - b),
                Multiply => Value::Double(a * b),
                Divide | Modulo if b == 0.0 => Value::Null,
                Divide => Value::Double(a / b),
                _ => Value::Double(a % b),
            })
        }
        _ => {
            let (a, b) = (to_decimal(l)?, to_decimal(r)?);
            let result = match op {
                Plus => a.checked_add(b),
                Minus => a.checked_sub(b),
                Multiply => a.checked_mul(b),
                Divide | Modulo if b.is_zero() => return Ok(Value::Null),
                Divide => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            result.map(Value::Decimal).ok_or_else(|| overflow(op))
        }
    }
}

fn to_f64(v: &Value) -> DbxResult<f64> {
    match v {
        Value::Integer(i) => Ok(f64::from(*i)),
        Value::Long(i) => Ok(*i as f64),
        Value::Double(f) => Ok(*f),
        Value::Decimal(d) => d
            .to_f64()
            .ok_or_else(|| DbxError::execution(format!("{d} is not representable"), "DOUBLE")),
        other => Err(DbxError::TypeMismatch {
            expected: "numeric".to_string(),
            actual: other.semantic_type().to_string(),
        }),
    }
}

fn to_decimal(v: &Value) -> DbxResult<Decimal> {
    match v {
        Value::Integer(i) => Ok(Decimal::from(*i)),
        Value::Long(i) => Ok(Decimal::from(*i)),
        Value::Decimal(d) => Ok(*d),
        Value::Double(f) => Decimal::from_f64(*f)
            .ok_or_else(|| DbxError::execution(format!("{f} is not representable"), "DECIMAL")),
        other => Err(DbxError::TypeMismatch {
            expected: "numeric".to_string(),
            actual: other.semantic_type().to_string(),
        }),
    }
}

fn negate(value: Value) -> DbxResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Integer(i) => i
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| DbxError::execution("numeric overflow", "-")),
        Value::Long(i) => i
            .checked_neg()
            .map(Value::Long)
            .ok_or_else(|| DbxError::execution("numeric overflow", "-")),
        Value::Double(f) => Ok(Value::Double(-f)),
        Value::Decimal(d) => Ok(Value::Decimal(-d)),
        other => Err(DbxError::TypeMismatch {
            expected: "numeric".to_string(),
            actual: other.semantic_type().to_string(),
        }),
    }
}

fn cast_error(value: &Value, to: &SemanticType) -> DbxError {
    DbxError::execution(format!("cannot cast {value} to {to}"), "CAST")
}

/// CAST semantics. `checked` narrowing fails on fractional decimals instead of truncating.
pub fn cast_value(value: Value, to: &SemanticType, checked: bool) -> DbxResult<Value> {
    if value.is_null() || *to == SemanticType::Unresolved || value.semantic_type() == *to {
        return Ok(value);
    }

    match (&value, to) {
        (Value::Decimal(d), SemanticType::Integer | SemanticType::Long) => {
            let policy = if checked {
                DecimalNarrowing::Exact
            } else {
                DecimalNarrowing::Truncate
            };
            narrow_decimal(*d, to, policy).ok_or_else(|| {
                DbxError::execution(format!("{d} cannot be narrowed to {to} exactly"), "CAST")
            })
        }
        (Value::Integer(_) | Value::Long(_) | Value::Double(_), SemanticType::Double) => {
            Ok(Value::Double(to_f64(&value)?))
        }
        (Value::Integer(_) | Value::Long(_) | Value::Double(_), SemanticType::Decimal) => {
            Ok(Value::Decimal(to_decimal(&value)?))
        }
        (Value::Decimal(d), SemanticType::Double) => d
            .to_f64()
            .map(Value::Double)
            .ok_or_else(|| cast_error(&value, to)),
        (Value::Integer(i), SemanticType::Long) => Ok(Value::Long(i64::from(*i))),
        (Value::Long(i), SemanticType::Integer) => i32::try_from(*i)
            .map(Value::Integer)
            .map_err(|_| cast_error(&value, to)),
        (Value::Double(f), SemanticType::Integer) => {
            f.trunc().to_i32().map(Value::Integer).ok_or_else(|| cast_error(&value, to))
        }
        (Value::Double(f), SemanticType::Long) => {
            f.trunc().to_i64().map(Value::Long).ok_or_else(|| cast_error(&value, to))
        }
        (Value::String(s), _) => parse_string(s.trim(), to).ok_or_else(|| cast_error(&value, to)),
        (
            Value::Integer(_)
            | Value::Long(_)
            | Value::Double(_)
            | Value::Decimal(_)
            | Value::Boolean(_),
            SemanticType::String,
        ) => Ok(Value::String(value.to_string())),
        _ => Err(cast_error(&value, to)),
    }
}

fn parse_string(s: &str, to: &SemanticType) -> Option<Value> {
    match to {
        SemanticType::Integer => s.parse().ok().map(Value::Integer),
        SemanticType::Long => s.parse().ok().map(Value::Long),
        SemanticType::Double => s.parse().ok().map(Value::Double),
        SemanticType::Decimal => Decimal::from_str(s).ok().map(Value::Decimal),
        SemanticType::Boolean => match s.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Some(Value::Boolean(true)),
            "false" | "f" | "0" => Some(Value::Boolean(false)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::ScalarUdf;
    use crate::sql::planner::ColumnDef;
    use std::sync::Arc;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(
            eval_binary(&Value::Integer(2), BinaryOperator::Plus, &Value::Integer(3)).unwrap(),
            Value::Integer(5)
        );
        assert_eq!(
            eval_binary(&Value::Integer(2), BinaryOperator::Multiply, &Value::Long(3)).unwrap(),
            Value::Long(6)
        );
        assert!(
            eval_binary(&Value::Integer(i32::MAX), BinaryOperator::Plus, &Value::Integer(1))
                .is_err()
        );
    }

    #[test]
    fn test_division_by_zero_is_null() {
        assert_eq!(
            eval_binary(&Value::Integer(1), BinaryOperator::Divide, &Value::Integer(0)).unwrap(),
            Value::Null
        );
        assert_eq!(
            eval_binary(&Value::Double(1.0), BinaryOperator::Modulo, &Value::Double(0.0)).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_mixed_numeric_promotion() {
        assert_eq!(
            eval_binary(&Value::Integer(1), BinaryOperator::Plus, &Value::Decimal(dec("0.5")))
                .unwrap(),
            Value::Decimal(dec("1.5"))
        );
        assert_eq!(
            eval_binary(&Value::Decimal(dec("0.5")), BinaryOperator::Plus, &Value::Double(1.0))
                .unwrap(),
            Value::Double(1.5)
        );
    }

    #[test]
    fn test_three_valued_logic() {
        use BinaryOperator::*;
        assert_eq!(
            eval_binary(&Value::Null, And, &Value::Boolean(false)).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            eval_binary(&Value::Null, And, &Value::Boolean(true)).unwrap(),
            Value::Null
        );
        assert_eq!(
            eval_binary(&Value::Null, Or, &Value::Boolean(true)).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            eval_binary(&Value::Null, Eq, &Value::Integer(1)).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_cast_decimal_narrowing() {
        assert_eq!(
            cast_value(Value::Decimal(dec("1.0")), &SemanticType::Integer, true).unwrap(),
            Value::Integer(1)
        );
        assert!(cast_value(Value::Decimal(dec("1.5")), &SemanticType::Integer, true).is_err());
        assert_eq!(
            cast_value(Value::Decimal(dec("1.5")), &SemanticType::Integer, false).unwrap(),
            Value::Integer(1)
        );
    }

    #[test]
    fn test_cast_strings() {
        assert_eq!(
            cast_value(Value::String(" 42 ".into()), &SemanticType::Long, false).unwrap(),
            Value::Long(42)
        );
        assert_eq!(
            cast_value(Value::Integer(7), &SemanticType::String, false).unwrap(),
            Value::String("7".into())
        );
        assert!(cast_value(Value::String("x".into()), &SemanticType::Integer, false).is_err());
        assert_eq!(
            cast_value(Value::Null, &SemanticType::Integer, true).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_invocation_errors_tagged_with_row() {
        let udf = ScalarUdf::from_fn("boom", |n: i32| -> Result<i32, String> {
            if n > 1 { Err("too big".into()) } else { Ok(n) }
        })
        .unwrap();
        let inv = ResolvedInvocation::new(Arc::new(udf), vec![Expr::column("n")]).unwrap();
        let expr = Expr::Invocation(inv);
        let schema = RowSchema::new(vec![ColumnDef::new("n", SemanticType::Integer)]);

        let abort = ExprEvaluator::new(&schema, UdfErrorPolicy::Abort);
        assert_eq!(
            abort.evaluate(&expr, &[Value::Integer(1)], 0).unwrap(),
            Value::Integer(1)
        );
        match abort.evaluate(&expr, &[Value::Integer(5)], 7) {
            Err(DbxError::UdfRuntime { function, row, .. }) => {
                assert_eq!(function, "boom");
                assert_eq!(row, Some(7));
            }
            other => panic!("Expected UdfRuntime, got {:?}", other),
        }

        let lenient = ExprEvaluator::new(&schema, UdfErrorPolicy::Null);
        assert_eq!(
            lenient.evaluate(&expr, &[Value::Integer(5)], 7).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_field_access_and_constant() {
        let value = Value::Struct(vec![("x".to_string(), Value::Integer(3))]);
        let expr = Expr::literal(1).field("x");
        assert_eq!(evaluate_constant(&expr).unwrap(), Value::Null);
        let schema = RowSchema::new(vec![ColumnDef::new(
            "p",
            SemanticType::struct_of([("x", SemanticType::Integer)]),
        )]);
        let eval = ExprEvaluator::new(&schema, UdfErrorPolicy::Abort);
        assert_eq!(
            eval.evaluate(&Expr::column("p").field("x"), &[value], 0).unwrap(),
            Value::Integer(3)
        );
        assert!(evaluate_constant(&Expr::column("p")).is_err());
    }
}
