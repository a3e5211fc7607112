//! Coercion engine
//!
//! 선언된 파라미터 타입과 인자 타입 사이의 암시적 변환 규칙.
//! 함수 이름에 따라 규칙이 달라지지 않습니다.

use crate::sql::planner::Expr;
use crate::types::{SemanticType, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal → 정수 축소 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecimalNarrowing {
    /// Literals must be exactly representable; other expressions are checked at runtime.
    #[default]
    Exact,
    /// Truncate toward zero.
    Truncate,
}

impl fmt::Display for DecimalNarrowing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecimalNarrowing::Exact => write!(f, "exact"),
            DecimalNarrowing::Truncate => write!(f, "truncate"),
        }
    }
}

impl FromStr for DecimalNarrowing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(DecimalNarrowing::Exact),
            "truncate" => Ok(DecimalNarrowing::Truncate),
            other => Err(format!("unknown decimal narrowing policy '{other}'")),
        }
    }
}

/// 적용 가능한 변환 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Identity,
    Widening,
    Narrowing,
}

/// `from` → `to` 변환 규칙 조회
pub fn can_coerce(from: &SemanticType, to: &SemanticType) -> Option<Coercion> {
    use SemanticType::*;

    if from.contains_unresolved() || to.contains_unresolved() {
        return None;
    }
    if from == to {
        return Some(Coercion::Identity);
    }
    match (from, to) {
        (Integer, Long) | (Integer, Double) | (Long, Double) => Some(Coercion::Widening),
        (Integer, Decimal) | (Long, Decimal) | (Decimal, Double) => Some(Coercion::Widening),
        (Decimal, Integer) | (Decimal, Long) => Some(Coercion::Narrowing),
        _ => None,
    }
}

/// Coercion outcome for one argument expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Ok(Expr),
    /// Rule exists, but this literal cannot be narrowed exactly.
    Inexact,
    /// No rule for the type pair.
    Undefined,
}

/// `expr` (타입 `from`)를 `to`로 변환한 표현식.
/// The result's declared type always equals `to`.
pub fn coerce(expr: Expr, from: &SemanticType, to: &SemanticType, policy: DecimalNarrowing) -> Coerced {
    match can_coerce(from, to) {
        None => Coerced::Undefined,
        Some(Coercion::Identity) => Coerced::Ok(expr),
        Some(Coercion::Widening) => Coerced::Ok(Expr::Cast {
            expr: Box::new(expr),
            to: to.clone(),
            checked: false,
        }),
        Some(Coercion::Narrowing) => match expr {
            Expr::Literal(Value::Decimal(d)) => match narrow_decimal(d, to, policy) {
                Some(value) => Coerced::Ok(Expr::Literal(value)),
                None => Coerced::Inexact,
            },
            expr => Coerced::Ok(Expr::Cast {
                expr: Box::new(expr),
                to: to.clone(),
                checked: policy == DecimalNarrowing::Exact,
            }),
        },
    }
}

/// Decimal → INT/BIGINT under a policy. `None` if fractional (Exact) or out of range.
pub fn narrow_decimal(d: Decimal, to: &SemanticType, policy: DecimalNarrowing) -> Option<Value> {
    let whole = d.trunc();
    if policy == DecimalNarrowing::Exact && whole != d {
        return None;
    }
    match to {
        SemanticType::Integer => whole.to_i32().map(Value::Integer),
        SemanticType::Long => whole.to_i64().map(Value::Long),
        _ => None,
    }
}
