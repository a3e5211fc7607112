//! Expression resolver
//!
//! 미해결 함수 호출을 사용자 레지스트리 → 내장 카탈로그 순으로 조회해
//! arity 검사와 인자 변환을 거친 `ResolvedInvocation`으로 바꿉니다.
//! 한 번의 bottom-up 패스로 동작하며, 이미 해결된 트리에는 아무것도 바꾸지 않습니다.

use crate::analyzer::coercion::{Coerced, Coercion, DecimalNarrowing, can_coerce, coerce};
use crate::analyzer::invocation::ResolvedInvocation;
use crate::error::{AnalysisError, DbxResult};
use crate::function::{Callable, FunctionRegistry};
use crate::sql::planner::{Expr, RowSchema, field_type};
use crate::types::SemanticType;
use smallvec::SmallVec;
use std::sync::Arc;

/// 표현식 해석기
pub struct ExpressionResolver<'a> {
    registry: &'a FunctionRegistry,
    builtins: &'a FunctionRegistry,
    policy: DecimalNarrowing,
}

impl<'a> ExpressionResolver<'a> {
    pub fn new(
        registry: &'a FunctionRegistry,
        builtins: &'a FunctionRegistry,
        policy: DecimalNarrowing,
    ) -> Self {
        Self {
            registry,
            builtins,
            policy,
        }
    }

    /// Resolve `expr` against the input row schema.
    pub fn resolve(&self, expr: Expr, schema: &RowSchema) -> DbxResult<Expr> {
        match expr {
            Expr::Column(name) => {
                if schema.index_of(&name).is_none() {
                    return Err(AnalysisError::UnknownColumn(name).into());
                }
                Ok(Expr::Column(name))
            }
            Expr::Literal(_) => Ok(expr),
            Expr::FieldAccess { expr: base, field } => self.resolve_field_access(*base, field, schema),
            Expr::Function { name, args } => {
                let args = args
                    .into_iter()
                    .map(|a| self.resolve(a, schema))
                    .collect::<DbxResult<Vec<_>>>()?;
                self.resolve_call(name, args, schema)
            }
            // 이미 해결된 호출: 인자만 재귀적으로 확인하고 재변환하지 않는다
            Expr::Invocation(_) => expr.map_children(|a| self.resolve(a, schema)),
            other => {
                let resolved = other.map_children(|c| self.resolve(c, schema))?;
                self.check_operator(&resolved, schema)?;
                Ok(resolved)
            }
        }
    }

    fn resolve_field_access(
        &self,
        base: Expr,
        field: String,
        schema: &RowSchema,
    ) -> DbxResult<Expr> {
        // `qualifier.column` — 테이블 이름/별칭으로 한정된 컬럼
        if let Expr::Column(name) = &base
            && schema.index_of(name).is_none()
            && schema.is_qualifier(name)
        {
            return self.resolve(Expr::Column(field), schema);
        }

        let base = self.resolve(base, schema)?;
        field_type(&base.data_type(schema)?, &field)?;
        Ok(Expr::FieldAccess {
            expr: Box::new(base),
            field,
        })
    }

    fn check_operator(&self, expr: &Expr, schema: &RowSchema) -> DbxResult<()> {
        match expr {
            Expr::BinaryOp { .. } => {
                expr.data_type(schema)?;
            }
            Expr::Not(inner) => {
                let ty = inner.data_type(schema)?;
                if !matches!(ty, SemanticType::Boolean | SemanticType::Unresolved) {
                    return Err(invalid("NOT", ty).into());
                }
            }
            Expr::Negative(inner) => {
                let ty = inner.data_type(schema)?;
                if !(ty.is_numeric() || ty == SemanticType::Unresolved) {
                    return Err(invalid("-", ty).into());
                }
            }
            Expr::Cast { expr: inner, to, .. } => {
                let from = inner.data_type(schema)?;
                if !can_cast(&from, to) {
                    return Err(AnalysisError::InvalidOperands {
                        op: "CAST".to_string(),
                        left: from,
                        right: to.clone(),
                    }
                    .into());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<Vec<Arc<dyn Callable>>> {
        self.registry
            .lookup(name)
            .or_else(|| self.builtins.lookup(name))
    }

    fn resolve_call(&self, name: String, args: Vec<Expr>, schema: &RowSchema) -> DbxResult<Expr> {
        let candidates = self
            .lookup(&name)
            .ok_or_else(|| AnalysisError::UndefinedFunction { name: name.clone() })?;

        let mut matching: SmallVec<[&Arc<dyn Callable>; 4]> = candidates
            .iter()
            .filter(|c| c.signature().accepts(args.len()))
            .collect();
        if matching.is_empty() {
            let expected = candidates
                .iter()
                .map(|c| c.signature().arity.to_string())
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(AnalysisError::WrongArity {
                name,
                expected,
                actual: args.len(),
            }
            .into());
        }
        let arg_types = args
            .iter()
            .map(|a| a.data_type(schema))
            .collect::<DbxResult<SmallVec<[SemanticType; 8]>>>()?;

        // 고정 arity 우선, 그다음 축소 → 확장 변환이 적은 순. 동률은 등록 순서.
        matching.sort_by_cached_key(|c| {
            (
                c.signature().arity.is_variadic(),
                conversion_cost(&***c, &arg_types),
            )
        });

        let mut first_error = None;
        for candidate in matching {
            match self.coerce_args(&**candidate, &args, &arg_types) {
                Ok(coerced) => {
                    let invocation = ResolvedInvocation::new(Arc::clone(candidate), coerced)?;
                    tracing::trace!(
                        function = %candidate.signature(),
                        id = invocation.id().get(),
                        "resolved function call"
                    );
                    return Ok(Expr::Invocation(invocation));
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        Err(first_error
            .unwrap_or(AnalysisError::UndefinedFunction { name })
            .into())
    }

    fn coerce_args(
        &self,
        function: &dyn Callable,
        args: &[Expr],
        arg_types: &[SemanticType],
    ) -> Result<Vec<Expr>, AnalysisError> {
        let signature = function.signature();
        args.iter()
            .zip(arg_types)
            .enumerate()
            .map(|(i, (arg, actual))| {
                let expected = signature.param_type(i).cloned().unwrap_or(SemanticType::Unresolved);
                let mismatch = || AnalysisError::TypeMismatch {
                    name: signature.name.clone(),
                    position: i + 1,
                    expected: expected.clone(),
                    actual: actual.clone(),
                };

                // 타입 없는 NULL은 파라미터 타입을 따른다
                if *actual == SemanticType::Unresolved {
                    return Ok(Expr::Cast {
                        expr: Box::new(arg.clone()),
                        to: expected.clone(),
                        checked: false,
                    });
                }
                match coerce(arg.clone(), actual, &expected, self.policy) {
                    Coerced::Ok(expr) => Ok(expr),
                    Coerced::Inexact | Coerced::Undefined => Err(mismatch()),
                }
            })
            .collect()
    }
}

/// (narrowings, widenings) needed to call `function` with `arg_types`.
/// Untyped NULL and undefined pairs count as widenings.
fn conversion_cost(function: &dyn Callable, arg_types: &[SemanticType]) -> (usize, usize) {
    let signature = function.signature();
    arg_types
        .iter()
        .enumerate()
        .fold((0, 0), |(narrow, widen), (i, actual)| {
            match signature.param_type(i).and_then(|p| can_coerce(actual, p)) {
                Some(Coercion::Identity) => (narrow, widen),
                Some(Coercion::Narrowing) => (narrow + 1, widen),
                Some(Coercion::Widening) | None => (narrow, widen + 1),
            }
        })
}

fn invalid(op: &str, ty: SemanticType) -> AnalysisError {
    AnalysisError::InvalidOperands {
        op: op.to_string(),
        left: ty.clone(),
        right: ty,
    }
}

/// Explicit `CAST` support: implicit coercions, any numeric pair,
/// primitive ↔ STRING, and untyped NULL to anything.
pub fn can_cast(from: &SemanticType, to: &SemanticType) -> bool {
    use SemanticType::*;
    if *from == Unresolved || can_coerce(from, to).is_some() {
        return true;
    }
    match (from, to) {
        (f, t) if f.is_numeric() && t.is_numeric() => true,
        (String, Integer | Long | Double | Decimal | Boolean) => true,
        (Integer | Long | Double | Decimal | Boolean, String) => true,
        _ => false,
    }
}
