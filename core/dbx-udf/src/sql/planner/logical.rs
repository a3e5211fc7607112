//! SQL 논리 플래너
//!
//! AST → 미해결 LogicalPlan 변환. 함수 호출은 이름과 인자만 가진
//! `Expr::Function`으로 남고, 해석은 분석기가 담당합니다.

use crate::analyzer::SchemaProvider;
use crate::error::{DbxError, DbxResult};
use crate::sql::planner::types::*;
use crate::types::{SemanticType, Value};
use ahash::AHashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use sqlparser::ast::{
    BinaryOperator as SqlBinaryOp, DataType as SqlDataType, Expr as SqlExpr, FunctionArg,
    FunctionArgExpr, FunctionArguments, GroupByExpr, Ident, OrderByExpr as SqlOrderByExpr, Query,
    Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins, UnaryOperator,
};
use std::str::FromStr;

/// SQL BinaryOperator → Logical BinaryOperator 변환
pub fn convert_binary_op(op: &SqlBinaryOp) -> DbxResult<BinaryOperator> {
    match op {
        SqlBinaryOp::Plus => Ok(BinaryOperator::Plus),
        SqlBinaryOp::Minus => Ok(BinaryOperator::Minus),
        SqlBinaryOp::Multiply => Ok(BinaryOperator::Multiply),
        SqlBinaryOp::Divide => Ok(BinaryOperator::Divide),
        SqlBinaryOp::Modulo => Ok(BinaryOperator::Modulo),
        SqlBinaryOp::Eq => Ok(BinaryOperator::Eq),
        SqlBinaryOp::NotEq => Ok(BinaryOperator::NotEq),
        SqlBinaryOp::Lt => Ok(BinaryOperator::Lt),
        SqlBinaryOp::LtEq => Ok(BinaryOperator::LtEq),
        SqlBinaryOp::Gt => Ok(BinaryOperator::Gt),
        SqlBinaryOp::GtEq => Ok(BinaryOperator::GtEq),
        SqlBinaryOp::And => Ok(BinaryOperator::And),
        SqlBinaryOp::Or => Ok(BinaryOperator::Or),
        _ => Err(DbxError::NotImplemented(format!(
            "Unsupported binary operator: {:?}",
            op
        ))),
    }
}

/// SQL 타입 이름 → SemanticType (CAST 대상)
pub fn convert_data_type(data_type: &SqlDataType) -> DbxResult<SemanticType> {
    let text = data_type.to_string().to_uppercase();
    let base = text.split('(').next().unwrap_or_default().trim();
    match base {
        "INT" | "INTEGER" | "INT4" => Ok(SemanticType::Integer),
        "BIGINT" | "LONG" | "INT8" => Ok(SemanticType::Long),
        "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "FLOAT8" | "REAL" => Ok(SemanticType::Double),
        "DECIMAL" | "NUMERIC" | "DEC" => Ok(SemanticType::Decimal),
        "STRING" | "TEXT" | "VARCHAR" | "CHAR" | "CHARACTER VARYING" => Ok(SemanticType::String),
        "BOOLEAN" | "BOOL" => Ok(SemanticType::Boolean),
        _ => Err(DbxError::SqlNotSupported {
            feature: format!("CAST to {text}"),
            hint: "Supported: INT, BIGINT, DOUBLE, DECIMAL, STRING, BOOLEAN".to_string(),
        }),
    }
}

/// 숫자 리터럴: 정수는 INT → BIGINT 순, 소수점/지수가 있으면 DECIMAL
pub fn parse_number(text: &str) -> DbxResult<Value> {
    let invalid = || DbxError::Schema(format!("Invalid number: {}", text));
    if text.contains(['.', 'e', 'E']) {
        let decimal = if text.contains(['e', 'E']) {
            Decimal::from_scientific(text)
        } else {
            Decimal::from_str(text)
        };
        return decimal.map(Value::Decimal).map_err(|_| invalid());
    }
    if let Ok(i) = text.parse::<i32>() {
        Ok(Value::Integer(i))
    } else if let Ok(i) = text.parse::<i64>() {
        Ok(Value::Long(i))
    } else {
        Decimal::from_str(text)
            .map(Value::Decimal)
            .map_err(|_| invalid())
    }
}

/// Extract a usize from a SQL literal expression (for LIMIT/OFFSET).
pub fn extract_usize(expr: &SqlExpr) -> DbxResult<usize> {
    match expr {
        SqlExpr::Value(sqlparser::ast::Value::Number(n, _)) => n.parse::<usize>().map_err(|_| {
            DbxError::Schema(format!(
                "LIMIT/OFFSET value must be a positive integer, got: {}",
                n
            ))
        }),
        _ => Err(DbxError::NotImplemented(format!(
            "Non-literal LIMIT/OFFSET expression: {:?}",
            expr
        ))),
    }
}

/// Output column name of an unaliased SELECT item.
fn default_name(expr: &Expr) -> String {
    match expr {
        Expr::Column(name) => name.clone(),
        Expr::FieldAccess { field, .. } => field.clone(),
        other => other.to_string(),
    }
}

/// Replace every subtree for which `f` returns a replacement, outermost first.
fn replace_subtrees<F>(expr: Expr, f: &F) -> DbxResult<Expr>
where
    F: Fn(&Expr) -> Option<Expr>,
{
    match f(&expr) {
        Some(replacement) => Ok(replacement),
        None => expr.map_children(|child| replace_subtrees(child, f)),
    }
}

/// 논리 플랜 빌더 — AST → LogicalPlan 변환
pub struct LogicalPlanner<'a> {
    alias_map: RwLock<AHashMap<String, Expr>>,
    /// FROM 테이블의 컬럼 이름 (소문자). 같은 이름의 SELECT 별칭보다 우선.
    input_columns: RwLock<Vec<String>>,
    schemas: Option<&'a dyn SchemaProvider>,
}

impl LogicalPlanner<'static> {
    /// Planner without a catalog: every SELECT alias is substituted.
    pub fn new() -> Self {
        Self {
            alias_map: RwLock::new(AHashMap::new()),
            input_columns: RwLock::new(Vec::new()),
            schemas: None,
        }
    }
}

impl<'a> LogicalPlanner<'a> {
    pub fn with_schemas(schemas: &'a dyn SchemaProvider) -> Self {
        Self {
            alias_map: RwLock::new(AHashMap::new()),
            input_columns: RwLock::new(Vec::new()),
            schemas: Some(schemas),
        }
    }

    /// Statement → LogicalPlan
    pub fn plan(&self, statement: &Statement) -> DbxResult<LogicalPlan> {
        match statement {
            Statement::Query(query) => self.plan_query(query),
            _ => Err(DbxError::SqlNotSupported {
                feature: format!("{:?}", statement)
                    .split_whitespace()
                    .next()
                    .unwrap_or("statement")
                    .to_string(),
                hint: "Only SELECT queries are currently supported".to_string(),
            }),
        }
    }

    /// Query → LogicalPlan 변환
    fn plan_query(&self, query: &Query) -> DbxResult<LogicalPlan> {
        // ORDER BY lives on Query, not Select in sqlparser 0.52
        let order_by: &[SqlOrderByExpr] = query
            .order_by
            .as_ref()
            .map(|o| o.exprs.as_slice())
            .unwrap_or_default();
        let mut plan = match query.body.as_ref() {
            SetExpr::Select(select) => self.plan_select(select, order_by)?,
            _ => {
                return Err(DbxError::SqlNotSupported {
                    feature: "Non-SELECT queries".to_string(),
                    hint: "Only SELECT queries are currently supported".to_string(),
                });
            }
        };

        // LIMIT / OFFSET
        if query.limit.is_some() || query.offset.is_some() {
            let count = match &query.limit {
                Some(expr) => extract_usize(expr)?,
                None => usize::MAX,
            };
            let offset = match &query.offset {
                Some(offset) => extract_usize(&offset.value)?,
                None => 0,
            };
            plan = LogicalPlan::Limit {
                input: Box::new(plan),
                count,
                offset,
            };
        }

        Ok(plan)
    }

    /// SELECT (+ ORDER BY) → LogicalPlan 변환
    ///
    /// Sort keys that are not SELECT outputs become hidden projections named
    /// `__order_<n>`; an outer Project then drops them after sorting.
    fn plan_select(&self, select: &Select, order_by: &[SqlOrderByExpr]) -> DbxResult<LogicalPlan> {
        // Clear alias map for new query
        self.alias_map.write().clear();

        // 1. FROM 절 → Scan (없으면 단일 행)
        let mut plan = self.plan_from(&select.from)?;
        *self.input_columns.write() = self.input_column_names(&plan);

        // Pre-scan projections for aliases to support WHERE/GROUP BY/HAVING
        for item in &select.projection {
            if let SelectItem::ExprWithAlias { expr, alias } = item {
                let planned_expr = self.plan_expr(expr)?;
                self.alias_map
                    .write()
                    .insert(alias.value.to_lowercase(), planned_expr);
            }
        }

        // 2. WHERE 절 → Filter
        if let Some(ref selection) = select.selection {
            let predicate = self.plan_expr(selection)?;
            plan = LogicalPlan::Filter {
                input: Box::new(plan),
                predicate,
            };
        }

        // 3. GROUP BY
        let group_by: Vec<(Expr, String)> = match &select.group_by {
            GroupByExpr::Expressions(exprs, _) => exprs
                .iter()
                .map(|e| {
                    let expr = self.plan_expr(e)?;
                    let name = default_name(&expr);
                    Ok((expr, name))
                })
                .collect::<DbxResult<Vec<_>>>()?,
            GroupByExpr::All(_) => {
                return Err(DbxError::SqlNotSupported {
                    feature: "GROUP BY ALL".to_string(),
                    hint: "List the grouping expressions explicitly".to_string(),
                });
            }
        };

        // 4. SELECT 목록 + ORDER BY 키
        let mut projections = self.plan_projection(&select.projection)?;
        let (sort_exprs, mut hidden) = self.plan_order_by(order_by, &projections)?;
        let mut having = select
            .having
            .as_ref()
            .map(|h| self.plan_expr(h))
            .transpose()?;

        // 5. 집계 추출 → Aggregate
        let mut aggregates = Vec::new();
        for (expr, _) in projections.iter_mut().chain(hidden.iter_mut()) {
            *expr = self.extract_aggregates(expr.clone(), &mut aggregates)?;
        }
        if let Some(h) = having.take() {
            having = Some(self.extract_aggregates(h, &mut aggregates)?);
        }

        if !group_by.is_empty() || !aggregates.is_empty() {
            if projections.is_empty() {
                return Err(DbxError::SqlNotSupported {
                    feature: "SELECT * with GROUP BY or aggregates".to_string(),
                    hint: "List the grouping keys and aggregates explicitly".to_string(),
                });
            }
            let group_refs = |e: &Expr| {
                group_by
                    .iter()
                    .find(|(g, _)| g == e)
                    .map(|(_, name)| Expr::Column(name.clone()))
            };
            for (expr, _) in projections.iter_mut().chain(hidden.iter_mut()) {
                *expr = replace_subtrees(expr.clone(), &group_refs)?;
            }
            if let Some(h) = having.take() {
                having = Some(replace_subtrees(h, &group_refs)?);
            }

            plan = LogicalPlan::Aggregate {
                input: Box::new(plan),
                group_by,
                aggregates,
            };
        }

        // 6. HAVING → Filter
        if let Some(predicate) = having {
            plan = LogicalPlan::Filter {
                input: Box::new(plan),
                predicate,
            };
        }

        // 7. SELECT 절 → Project (숨은 정렬 키 포함)
        let visible: Option<Vec<(Expr, String)>> = (!hidden.is_empty()).then(|| {
            projections
                .iter()
                .map(|(_, name)| (Expr::Column(name.clone()), name.clone()))
                .collect()
        });
        projections.extend(hidden);
        plan = LogicalPlan::Project {
            input: Box::new(plan),
            projections,
        };

        // 8. ORDER BY → Sort
        if !sort_exprs.is_empty() {
            plan = LogicalPlan::Sort {
                input: Box::new(plan),
                order_by: sort_exprs,
            };
        }
        if let Some(visible) = visible {
            plan = LogicalPlan::Project {
                input: Box::new(plan),
                projections: visible,
            };
        }

        Ok(plan)
    }

    /// Lowercased column names of the FROM table. Unknown tables yield none;
    /// the analyzer reports them.
    fn input_column_names(&self, from: &LogicalPlan) -> Vec<String> {
        match (from, self.schemas) {
            (LogicalPlan::Scan { table, .. }, Some(schemas)) => schemas
                .table_schema(table)
                .map(|schema| {
                    schema
                        .names()
                        .into_iter()
                        .map(|n| n.to_lowercase())
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// ORDER BY 키 → (정렬식, 숨은 프로젝션)
    fn plan_order_by(
        &self,
        order_by: &[SqlOrderByExpr],
        projections: &[(Expr, String)],
    ) -> DbxResult<(Vec<SortExpr>, Vec<(Expr, String)>)> {
        let mut hidden: Vec<(Expr, String)> = Vec::new();
        let sort_exprs = order_by
            .iter()
            .map(|ob| {
                let mut sort = self.plan_order_by_expr(ob, projections)?;
                // SELECT *는 입력 컬럼을 그대로 내보내므로 키를 그대로 평가할 수 있다
                let is_output = projections.is_empty()
                    || matches!(&sort.expr, Expr::Column(c)
                        if projections.iter().any(|(_, name)| name.eq_ignore_ascii_case(c)));
                if !is_output {
                    let name = match hidden.iter().find(|(e, _)| *e == sort.expr) {
                        Some((_, name)) => name.clone(),
                        None => {
                            let name = format!("__order_{}", hidden.len());
                            hidden.push((sort.expr.clone(), name.clone()));
                            name
                        }
                    };
                    sort.expr = Expr::Column(name);
                }
                Ok(sort)
            })
            .collect::<DbxResult<Vec<_>>>()?;
        Ok((sort_exprs, hidden))
    }

    /// Convert sqlparser OrderByExpr → our SortExpr
    fn plan_order_by_expr(
        &self,
        ob: &SqlOrderByExpr,
        projections: &[(Expr, String)],
    ) -> DbxResult<SortExpr> {
        let planned = self.plan_order_key(&ob.expr)?;
        // SELECT 목록과 같은 표현식은 출력 컬럼을 참조
        let expr = projections
            .iter()
            .find(|(p, _)| *p == planned)
            .map(|(_, name)| Expr::Column(name.clone()))
            .unwrap_or(planned);
        let asc = ob.asc.unwrap_or(true);
        Ok(SortExpr {
            expr,
            asc,
            nulls_first: ob.nulls_first.unwrap_or(asc),
        })
    }

    /// ORDER BY keys see SELECT aliases as output columns, not as substituted expressions.
    fn plan_order_key(&self, expr: &SqlExpr) -> DbxResult<Expr> {
        match expr {
            SqlExpr::Identifier(ident) => Ok(Expr::Column(ident.value.clone())),
            _ => self.plan_expr(expr),
        }
    }

    /// Replace aggregate calls with references to their output columns.
    fn extract_aggregates(
        &self,
        expr: Expr,
        aggregates: &mut Vec<AggregateExpr>,
    ) -> DbxResult<Expr> {
        match expr {
            Expr::Function { name, args } => match AggregateFunction::from_name(&name) {
                Some(function) => {
                    let display = Expr::Function {
                        name: function.to_string(),
                        args: args.clone(),
                    }
                    .to_string();
                    let arg = match args.as_slice() {
                        [] => Expr::Literal(Value::Integer(1)),
                        [Expr::Column(c)] if c == "*" => Expr::Literal(Value::Integer(1)),
                        [arg] => arg.clone(),
                        _ => {
                            return Err(DbxError::SqlNotSupported {
                                feature: format!("{function} with {} arguments", args.len()),
                                hint: "Aggregates take a single argument".to_string(),
                            });
                        }
                    };
                    if !aggregates.iter().any(|a| a.name == display) {
                        aggregates.push(AggregateExpr {
                            function,
                            expr: arg,
                            name: display.clone(),
                        });
                    }
                    Ok(Expr::Column(display))
                }
                None => Expr::Function { name, args }
                    .map_children(|child| self.extract_aggregates(child, aggregates)),
            },
            other => other.map_children(|child| self.extract_aggregates(child, aggregates)),
        }
    }

    /// FROM 절 → Scan
    fn plan_from(&self, from: &[TableWithJoins]) -> DbxResult<LogicalPlan> {
        if from.is_empty() {
            return Ok(LogicalPlan::OneRow);
        }

        if from.len() > 1 || !from[0].joins.is_empty() {
            return Err(DbxError::SqlNotSupported {
                feature: "Multiple tables or JOIN in FROM clause".to_string(),
                hint: "Query a single table".to_string(),
            });
        }

        match &from[0].relation {
            TableFactor::Table { name, alias, .. } => Ok(LogicalPlan::Scan {
                table: name.to_string(),
                alias: alias.as_ref().map(|a| a.name.value.clone()),
            }),
            _ => Err(DbxError::SqlNotSupported {
                feature: "Complex table expressions".to_string(),
                hint: "Use simple table names only".to_string(),
            }),
        }
    }

    /// SELECT 절 → Vec<(Expr, String)>. `SELECT *` alone yields an empty list.
    fn plan_projection(&self, projection: &[SelectItem]) -> DbxResult<Vec<(Expr, String)>> {
        let mut projections = Vec::new();

        for item in projection {
            match item {
                SelectItem::Wildcard(_) if projection.len() == 1 => {
                    // SELECT * -> empty projections means all columns
                }
                SelectItem::UnnamedExpr(expr) => {
                    let planned = self.plan_expr(expr)?;
                    let name = default_name(&planned);
                    projections.push((planned, name));
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    projections.push((self.plan_expr(expr)?, alias.value.clone()));
                }
                _ => {
                    return Err(DbxError::NotImplemented(format!(
                        "Unsupported SELECT item: {}",
                        item
                    )));
                }
            }
        }

        Ok(projections)
    }

    /// SELECT alias for `ident`, unless the input has a column of that name.
    fn lookup_alias(&self, ident: &Ident) -> Option<Expr> {
        let key = ident.value.to_lowercase();
        if self.input_columns.read().contains(&key) {
            return None;
        }
        self.alias_map.read().get(&key).cloned()
    }

    fn plan_function_args(&self, args: &FunctionArguments) -> DbxResult<Vec<Expr>> {
        match args {
            FunctionArguments::None => Ok(vec![]),
            FunctionArguments::List(arg_list) => arg_list
                .args
                .iter()
                .map(|arg| match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => self.plan_expr(e),
                    // COUNT(*)
                    FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => {
                        Ok(Expr::Column("*".to_string()))
                    }
                    other => Err(DbxError::SqlNotSupported {
                        feature: format!("function argument {other}"),
                        hint: "Use positional arguments".to_string(),
                    }),
                })
                .collect(),
            FunctionArguments::Subquery(_) => Err(DbxError::NotImplemented(
                "Subquery function arguments".to_string(),
            )),
        }
    }

    /// SQL Expr → Logical Expr 변환
    fn plan_expr(&self, expr: &SqlExpr) -> DbxResult<Expr> {
        match expr {
            SqlExpr::Identifier(ident) => {
                // Check if this identifier is an alias defined in SELECT
                if let Some(aliased_expr) = self.lookup_alias(ident) {
                    return Ok(aliased_expr);
                }
                Ok(Expr::Column(ident.value.clone()))
            }
            SqlExpr::Value(value) => {
                let value = match value {
                    sqlparser::ast::Value::Number(n, _) => parse_number(n)?,
                    sqlparser::ast::Value::SingleQuotedString(s) => Value::String(s.clone()),
                    sqlparser::ast::Value::Boolean(b) => Value::Boolean(*b),
                    sqlparser::ast::Value::Null => Value::Null,
                    _ => {
                        return Err(DbxError::NotImplemented(format!(
                            "Unsupported value: {:?}",
                            value
                        )));
                    }
                };
                Ok(Expr::Literal(value))
            }
            SqlExpr::BinaryOp { left, op, right } => {
                let left_expr = self.plan_expr(left)?;
                let right_expr = self.plan_expr(right)?;
                let binary_op = convert_binary_op(op)?;
                Ok(Expr::binary(left_expr, binary_op, right_expr))
            }
            SqlExpr::UnaryOp { op, expr } => {
                let inner = self.plan_expr(expr)?;
                match op {
                    UnaryOperator::Not => Ok(Expr::Not(Box::new(inner))),
                    UnaryOperator::Plus => Ok(inner),
                    UnaryOperator::Minus => Ok(match inner {
                        // 음수 리터럴은 리터럴로 유지 (decimal 축소 판정에 필요)
                        Expr::Literal(Value::Integer(i)) if i != i32::MIN => {
                            Expr::Literal(Value::Integer(-i))
                        }
                        Expr::Literal(Value::Long(i)) if i != i64::MIN => {
                            Expr::Literal(Value::Long(-i))
                        }
                        Expr::Literal(Value::Decimal(d)) => Expr::Literal(Value::Decimal(-d)),
                        other => Expr::Negative(Box::new(other)),
                    }),
                    _ => Err(DbxError::NotImplemented(format!(
                        "Unsupported unary operator: {:?}",
                        op
                    ))),
                }
            }
            SqlExpr::IsNull(expr) => {
                let inner = self.plan_expr(expr)?;
                Ok(Expr::IsNull(Box::new(inner)))
            }
            SqlExpr::IsNotNull(expr) => {
                let inner = self.plan_expr(expr)?;
                Ok(Expr::IsNotNull(Box::new(inner)))
            }
            SqlExpr::Cast {
                expr, data_type, ..
            } => Ok(Expr::Cast {
                expr: Box::new(self.plan_expr(expr)?),
                to: convert_data_type(data_type)?,
                checked: false,
            }),
            SqlExpr::Function(func) => {
                let name = func
                    .name
                    .0
                    .last()
                    .map(|i| i.value.clone())
                    .unwrap_or_default();
                let args = self.plan_function_args(&func.args)?;
                Ok(Expr::Function { name, args })
            }
            SqlExpr::Nested(expr) => self.plan_expr(expr),
            SqlExpr::CompoundIdentifier(idents) => {
                // alias.field, table.column, column.field.field …
                let (first, rest) = match idents.split_first() {
                    Some(parts) => parts,
                    None => return Err(DbxError::Schema("empty identifier".to_string())),
                };
                let base = self
                    .lookup_alias(first)
                    .unwrap_or_else(|| Expr::Column(first.value.clone()));
                Ok(rest
                    .iter()
                    .fold(base, |acc, ident| acc.field(ident.value.clone())))
            }
            _ => Err(DbxError::NotImplemented(format!(
                "Unsupported expression: {}",
                expr
            ))),
        }
    }
}

impl Default for LogicalPlanner<'static> {
    fn default() -> Self {
        Self::new()
    }
}
