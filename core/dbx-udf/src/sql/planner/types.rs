//! SQL 플래너 타입 정의
//!
//! LogicalPlan, Expr, RowSchema 등의 핵심 타입들을 정의합니다.
//! 플래너가 만든 트리에는 미해결 함수 호출(`Expr::Function`)이 남아 있고,
//! 분석기를 거친 트리에서는 모두 `Expr::Invocation`으로 바뀝니다.

use crate::analyzer::ResolvedInvocation;
use crate::error::{AnalysisError, DbxError, DbxResult};
use crate::types::{SemanticType, Value};
use std::fmt;

/// 논리 플랜 — SQL 쿼리의 논리적 표현
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    /// FROM 없는 SELECT: 컬럼이 없는 단일 행
    OneRow,
    /// 테이블 스캔
    Scan {
        table: String,
        alias: Option<String>,
    },
    /// WHERE / HAVING 조건 필터
    Filter {
        input: Box<LogicalPlan>,
        predicate: Expr,
    },
    /// 컬럼 선택/계산. Output names are fixed at planning time.
    Project {
        input: Box<LogicalPlan>,
        projections: Vec<(Expr, String)>,
    },
    /// GROUP BY + 집계
    Aggregate {
        input: Box<LogicalPlan>,
        group_by: Vec<(Expr, String)>,
        aggregates: Vec<AggregateExpr>,
    },
    /// ORDER BY
    Sort {
        input: Box<LogicalPlan>,
        order_by: Vec<SortExpr>,
    },
    /// LIMIT/OFFSET
    Limit {
        input: Box<LogicalPlan>,
        count: usize,
        offset: usize,
    },
}

impl LogicalPlan {
    pub fn input(&self) -> Option<&LogicalPlan> {
        match self {
            LogicalPlan::OneRow | LogicalPlan::Scan { .. } => None,
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. } => Some(input),
        }
    }

    /// Visit every expression in the plan, top-down.
    pub fn for_each_expr(&self, f: &mut dyn FnMut(&Expr)) {
        match self {
            LogicalPlan::Filter { predicate, .. } => f(predicate),
            LogicalPlan::Project { projections, .. } => projections.iter().for_each(|(e, _)| f(e)),
            LogicalPlan::Aggregate {
                group_by,
                aggregates,
                ..
            } => {
                group_by.iter().for_each(|(e, _)| f(e));
                aggregates.iter().for_each(|a| f(&a.expr));
            }
            LogicalPlan::Sort { order_by, .. } => order_by.iter().for_each(|s| f(&s.expr)),
            _ => {}
        }
        if let Some(input) = self.input() {
            input.for_each_expr(f);
        }
    }

    /// Rewrite every expression in the plan, inputs first.
    pub fn map_exprs(self, f: &mut dyn FnMut(Expr) -> DbxResult<Expr>) -> DbxResult<LogicalPlan> {
        Ok(match self {
            LogicalPlan::OneRow | LogicalPlan::Scan { .. } => self,
            LogicalPlan::Filter { input, predicate } => {
                let input = Box::new(input.map_exprs(f)?);
                LogicalPlan::Filter {
                    input,
                    predicate: f(predicate)?,
                }
            }
            LogicalPlan::Project { input, projections } => {
                let input = Box::new(input.map_exprs(f)?);
                LogicalPlan::Project {
                    input,
                    projections: projections
                        .into_iter()
                        .map(|(e, name)| Ok((f(e)?, name)))
                        .collect::<DbxResult<_>>()?,
                }
            }
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => {
                let input = Box::new(input.map_exprs(f)?);
                LogicalPlan::Aggregate {
                    input,
                    group_by: group_by
                        .into_iter()
                        .map(|(e, name)| Ok((f(e)?, name)))
                        .collect::<DbxResult<_>>()?,
                    aggregates: aggregates
                        .into_iter()
                        .map(|a| {
                            Ok(AggregateExpr {
                                expr: f(a.expr)?,
                                ..a
                            })
                        })
                        .collect::<DbxResult<_>>()?,
                }
            }
            LogicalPlan::Sort { input, order_by } => {
                let input = Box::new(input.map_exprs(f)?);
                LogicalPlan::Sort {
                    input,
                    order_by: order_by
                        .into_iter()
                        .map(|s| {
                            Ok(SortExpr {
                                expr: f(s.expr)?,
                                ..s
                            })
                        })
                        .collect::<DbxResult<_>>()?,
                }
            }
            LogicalPlan::Limit {
                input,
                count,
                offset,
            } => LogicalPlan::Limit {
                input: Box::new(input.map_exprs(f)?),
                count,
                offset,
            },
        })
    }
}

/// 표현식 — 컬럼, 리터럴, 연산자, 함수
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// 컬럼 참조
    Column(String),
    /// 리터럴 값
    Literal(Value),
    /// 이항 연산 (+, -, *, /, %, =, !=, <, >, AND, OR)
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    /// NOT
    Not(Box<Expr>),
    /// 단항 마이너스
    Negative(Box<Expr>),
    /// IS NULL
    IsNull(Box<Expr>),
    /// IS NOT NULL
    IsNotNull(Box<Expr>),
    /// 타입 변환. `checked` casts fail on lossy decimal narrowing instead of truncating.
    Cast {
        expr: Box<Expr>,
        to: SemanticType,
        checked: bool,
    },
    /// 미해결 함수 호출 (파서 출력, 실행 불가)
    Function { name: String, args: Vec<Expr> },
    /// 해결된 함수 호출
    Invocation(ResolvedInvocation),
    /// 구조체 필드 접근 (`expr.field`)
    FieldAccess { expr: Box<Expr>, field: String },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn field(self, field: impl Into<String>) -> Self {
        Expr::FieldAccess {
            expr: Box::new(self),
            field: field.into(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }

    /// Rebuild the node from its children after applying `f` to each of them.
    /// Invocation arguments are replaced through [`ResolvedInvocation::with_args`].
    pub fn map_children<F>(self, mut f: F) -> DbxResult<Expr>
    where
        F: FnMut(Expr) -> DbxResult<Expr>,
    {
        Ok(match self {
            Expr::Column(_) | Expr::Literal(_) => self,
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: Box::new(f(*left)?),
                op,
                right: Box::new(f(*right)?),
            },
            Expr::Not(e) => Expr::Not(Box::new(f(*e)?)),
            Expr::Negative(e) => Expr::Negative(Box::new(f(*e)?)),
            Expr::IsNull(e) => Expr::IsNull(Box::new(f(*e)?)),
            Expr::IsNotNull(e) => Expr::IsNotNull(Box::new(f(*e)?)),
            Expr::Cast { expr, to, checked } => Expr::Cast {
                expr: Box::new(f(*expr)?),
                to,
                checked,
            },
            Expr::Function { name, args } => Expr::Function {
                name,
                args: args.into_iter().map(f).collect::<DbxResult<_>>()?,
            },
            Expr::Invocation(inv) => {
                let args = inv
                    .args()
                    .iter()
                    .cloned()
                    .map(&mut f)
                    .collect::<DbxResult<Vec<_>>>()?;
                Expr::Invocation(inv.with_args(args)?)
            }
            Expr::FieldAccess { expr, field } => Expr::FieldAccess {
                expr: Box::new(f(*expr)?),
                field,
            },
        })
    }

    /// Pre-order visit of this expression tree.
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Column(_) | Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::Not(e) | Expr::Negative(e) | Expr::IsNull(e) | Expr::IsNotNull(e) => e.visit(f),
            Expr::Cast { expr, .. } | Expr::FieldAccess { expr, .. } => expr.visit(f),
            Expr::Function { args, .. } => args.iter().for_each(|a| a.visit(f)),
            Expr::Invocation(inv) => inv.args().iter().for_each(|a| a.visit(f)),
        }
    }

    /// True if any unresolved function call remains in the tree.
    pub fn has_unresolved_call(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= matches!(e, Expr::Function { .. }));
        found
    }

    /// 결과 타입. Only meaningful for resolved trees.
    pub fn data_type(&self, schema: &RowSchema) -> DbxResult<SemanticType> {
        match self {
            Expr::Column(name) => schema
                .column(name)
                .map(|c| c.data_type.clone())
                .ok_or_else(|| AnalysisError::UnknownColumn(name.clone()).into()),
            Expr::Literal(value) => Ok(value.semantic_type()),
            Expr::BinaryOp { left, op, right } => Ok(op.result_type(
                &left.data_type(schema)?,
                &right.data_type(schema)?,
            )?),
            Expr::Not(_) | Expr::IsNull(_) | Expr::IsNotNull(_) => Ok(SemanticType::Boolean),
            Expr::Negative(e) => e.data_type(schema),
            Expr::Cast { to, .. } => Ok(to.clone()),
            Expr::Function { name, .. } => Err(DbxError::execution(
                "unresolved function call",
                name.clone(),
            )),
            Expr::Invocation(inv) => Ok(inv.return_type().clone()),
            Expr::FieldAccess { expr, field } => {
                let base = expr.data_type(schema)?;
                field_type(&base, field).map_err(Into::into)
            }
        }
    }
}

/// Type of `field` within `base`, or the matching analysis error.
pub fn field_type(base: &SemanticType, field: &str) -> Result<SemanticType, AnalysisError> {
    match base {
        SemanticType::Struct(_) => base
            .field(field)
            .map(|f| f.data_type.clone())
            .ok_or_else(|| AnalysisError::NoSuchField {
                field: field.to_string(),
                data_type: base.clone(),
            }),
        other => Err(AnalysisError::NotAStruct {
            field: field.to_string(),
            data_type: other.clone(),
        }),
    }
}

fn fmt_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::BinaryOp { .. } => write!(f, "({expr})"),
        _ => write!(f, "{expr}"),
    }
}

fn fmt_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{name}"),
            Expr::Literal(Value::String(s)) => write!(f, "'{s}'"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::BinaryOp { left, op, right } => {
                fmt_operand(f, left)?;
                write!(f, " {op} ")?;
                fmt_operand(f, right)
            }
            Expr::Not(e) => write!(f, "NOT {e}"),
            Expr::Negative(e) => write!(f, "-{e}"),
            Expr::IsNull(e) => write!(f, "{e} IS NULL"),
            Expr::IsNotNull(e) => write!(f, "{e} IS NOT NULL"),
            Expr::Cast { expr, to, .. } => write!(f, "CAST({expr} AS {to})"),
            Expr::Function { name, args } => {
                write!(f, "{name}(")?;
                fmt_args(f, args)?;
                write!(f, ")")
            }
            Expr::Invocation(inv) => {
                write!(f, "{}(", inv.name())?;
                fmt_args(f, inv.args())?;
                write!(f, ")")
            }
            Expr::FieldAccess { expr, field } => write!(f, "{expr}.{field}"),
        }
    }
}

/// 이항 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // 산술
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    // 비교
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // 논리
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Plus
                | BinaryOperator::Minus
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
        )
    }

    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Plus
                | BinaryOperator::Multiply
                | BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::And
                | BinaryOperator::Or
        )
    }

    /// Operator to use when the operands are swapped (`a < b` ⇔ `b > a`).
    pub fn flip(&self) -> Option<BinaryOperator> {
        match self {
            BinaryOperator::Lt => Some(BinaryOperator::Gt),
            BinaryOperator::LtEq => Some(BinaryOperator::GtEq),
            BinaryOperator::Gt => Some(BinaryOperator::Lt),
            BinaryOperator::GtEq => Some(BinaryOperator::LtEq),
            op if op.is_commutative() => Some(*op),
            _ => None,
        }
    }

    /// 결과 타입 계산. NULL 리터럴(Unresolved)은 상대 피연산자의 타입을 따른다.
    pub fn result_type(
        &self,
        left: &SemanticType,
        right: &SemanticType,
    ) -> Result<SemanticType, AnalysisError> {
        let invalid = || AnalysisError::InvalidOperands {
            op: self.to_string(),
            left: left.clone(),
            right: right.clone(),
        };
        use SemanticType::Unresolved;

        if self.is_arithmetic() {
            return match (left, right) {
                (Unresolved, Unresolved) => Ok(Unresolved),
                (Unresolved, t) | (t, Unresolved) if t.is_numeric() => Ok(t.clone()),
                (l, r) if l.is_numeric() && r.is_numeric() => {
                    Ok(if numeric_rank(l) >= numeric_rank(r) {
                        l.clone()
                    } else {
                        r.clone()
                    })
                }
                _ => Err(invalid()),
            };
        }

        if self.is_comparison() {
            let comparable = match (left, right) {
                (Unresolved, _) | (_, Unresolved) => true,
                (l, r) if l.is_numeric() && r.is_numeric() => true,
                (SemanticType::Array(_), _) | (_, SemanticType::Array(_)) => false,
                (l, r) => l == r,
            };
            return if comparable {
                Ok(SemanticType::Boolean)
            } else {
                Err(invalid())
            };
        }

        // AND / OR
        match (left, right) {
            (SemanticType::Boolean | Unresolved, SemanticType::Boolean | Unresolved) => {
                Ok(SemanticType::Boolean)
            }
            _ => Err(invalid()),
        }
    }
}

/// Arithmetic widening order: INT < BIGINT < DECIMAL < DOUBLE
pub fn numeric_rank(ty: &SemanticType) -> u8 {
    match ty {
        SemanticType::Integer => 0,
        SemanticType::Long => 1,
        SemanticType::Decimal => 2,
        SemanticType::Double => 3,
        _ => u8::MAX,
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        };
        write!(f, "{s}")
    }
}

/// 집계 표현식
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    pub expr: Expr,
    /// Output column name (e.g. `COUNT(*)`, `SUM(x)`)
    pub name: String,
}

impl AggregateExpr {
    pub fn output_type(&self, input: &RowSchema) -> DbxResult<SemanticType> {
        let arg = self.expr.data_type(input)?;
        self.function.output_type(&arg).ok_or_else(|| {
            AnalysisError::InvalidOperands {
                op: self.function.to_string(),
                left: arg.clone(),
                right: arg,
            }
            .into()
        })
    }
}

/// 집계 함수
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            _ => None,
        }
    }

    /// `None` when the function does not accept the argument type.
    pub fn output_type(&self, arg: &SemanticType) -> Option<SemanticType> {
        match self {
            AggregateFunction::Count => Some(SemanticType::Long),
            AggregateFunction::Sum => match arg {
                SemanticType::Integer | SemanticType::Long => Some(SemanticType::Long),
                SemanticType::Double | SemanticType::Decimal => Some(arg.clone()),
                SemanticType::Unresolved => Some(SemanticType::Long),
                _ => None,
            },
            AggregateFunction::Avg => match arg {
                SemanticType::Decimal => Some(SemanticType::Decimal),
                t if t.is_numeric() => Some(SemanticType::Double),
                SemanticType::Unresolved => Some(SemanticType::Double),
                _ => None,
            },
            AggregateFunction::Min | AggregateFunction::Max => match arg {
                SemanticType::Array(_) => None,
                t => Some(t.clone()),
            },
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        };
        write!(f, "{s}")
    }
}

/// ORDER BY 항목
#[derive(Debug, Clone, PartialEq)]
pub struct SortExpr {
    pub expr: Expr,
    pub asc: bool,
    pub nulls_first: bool,
}

/// 컬럼 정의
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: SemanticType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// 플랜 노드의 출력 행 스키마
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSchema {
    pub columns: Vec<ColumnDef>,
    /// Table name and alias usable as `qualifier.column`
    pub qualifiers: Vec<String>,
}

impl RowSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            columns,
            qualifiers: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_qualifiers(mut self, qualifiers: Vec<String>) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    /// 컬럼 위치 (대소문자 무시, 첫 번째 일치)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.index_of(name).map(|i| &self.columns[i])
    }

    pub fn is_qualifier(&self, name: &str) -> bool {
        self.qualifiers.iter().any(|q| q.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        let e = Expr::call(
            "strLen2",
            vec![
                Expr::literal("test"),
                Expr::binary(Expr::literal(1), BinaryOperator::Plus, Expr::column("n")),
            ],
        );
        // 인자는 괄호 없이, 중첩된 연산 피연산자만 괄호
        assert_eq!(e.to_string(), "strLen2('test', 1 + n)");
        let nested = Expr::binary(
            Expr::binary(Expr::column("a"), BinaryOperator::Plus, Expr::literal(1)),
            BinaryOperator::Multiply,
            Expr::column("b"),
        );
        assert_eq!(nested.to_string(), "(a + 1) * b");
        assert_eq!(Expr::column("p").field("x").to_string(), "p.x");
    }

    #[test]
    fn test_arithmetic_result_type() {
        let op = BinaryOperator::Plus;
        assert_eq!(
            op.result_type(&SemanticType::Integer, &SemanticType::Long)
                .unwrap(),
            SemanticType::Long
        );
        assert_eq!(
            op.result_type(&SemanticType::Decimal, &SemanticType::Double)
                .unwrap(),
            SemanticType::Double
        );
        assert_eq!(
            op.result_type(&SemanticType::Unresolved, &SemanticType::Integer)
                .unwrap(),
            SemanticType::Integer
        );
        assert!(op
            .result_type(&SemanticType::String, &SemanticType::Integer)
            .is_err());
    }

    #[test]
    fn test_comparison_result_type() {
        let op = BinaryOperator::Gt;
        assert_eq!(
            op.result_type(&SemanticType::Integer, &SemanticType::Decimal)
                .unwrap(),
            SemanticType::Boolean
        );
        assert!(op
            .result_type(&SemanticType::String, &SemanticType::Integer)
            .is_err());
        assert!(BinaryOperator::And
            .result_type(&SemanticType::Integer, &SemanticType::Boolean)
            .is_err());
    }

    #[test]
    fn test_flip() {
        assert_eq!(BinaryOperator::Lt.flip(), Some(BinaryOperator::Gt));
        assert_eq!(BinaryOperator::Eq.flip(), Some(BinaryOperator::Eq));
        assert_eq!(BinaryOperator::Minus.flip(), None);
    }

    #[test]
    fn test_field_type() {
        let ty = SemanticType::struct_of([("x", SemanticType::Integer)]);
        assert_eq!(field_type(&ty, "X").unwrap(), SemanticType::Integer);
        assert!(matches!(
            field_type(&ty, "y"),
            Err(AnalysisError::NoSuchField { .. })
        ));
        assert!(matches!(
            field_type(&SemanticType::Integer, "y"),
            Err(AnalysisError::NotAStruct { .. })
        ));
    }

    #[test]
    fn test_data_type_unknown_column() {
        let schema = RowSchema::new(vec![ColumnDef::new("a", SemanticType::Integer)]);
        assert_eq!(
            Expr::column("A").data_type(&schema).unwrap(),
            SemanticType::Integer
        );
        assert!(matches!(
            Expr::column("b").data_type(&schema),
            Err(DbxError::Analysis(AnalysisError::UnknownColumn(_)))
        ));
    }

    #[test]
    fn test_aggregate_output_types() {
        assert_eq!(
            AggregateFunction::Sum.output_type(&SemanticType::Integer),
            Some(SemanticType::Long)
        );
        assert_eq!(
            AggregateFunction::Avg.output_type(&SemanticType::Long),
            Some(SemanticType::Double)
        );
        assert_eq!(AggregateFunction::Sum.output_type(&SemanticType::String), None);
        assert_eq!(
            AggregateFunction::from_name("count"),
            Some(AggregateFunction::Count)
        );
    }
}
