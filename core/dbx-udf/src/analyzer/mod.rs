//! 쿼리 분석기
//!
//! 플래너가 만든 LogicalPlan의 각 노드에 대해 입력 행 스키마를 추적하면서
//! 표현식을 해석합니다. 분석이 끝난 플랜에는 미해결 함수 호출이 남지 않으며,
//! 모든 분석 에러는 행을 하나도 처리하기 전에 보고됩니다.

pub mod coercion;
pub mod invocation;
pub mod resolver;

pub use coercion::{Coerced, Coercion, DecimalNarrowing, can_coerce, coerce, narrow_decimal};
pub use invocation::{InvocationId, ResolvedInvocation};
pub use resolver::{ExpressionResolver, can_cast};

use crate::error::{AnalysisError, DbxResult};
use crate::function::FunctionRegistry;
use crate::sql::planner::{AggregateExpr, ColumnDef, Expr, LogicalPlan, RowSchema, SortExpr};
use crate::types::SemanticType;

/// 테이블 스키마 조회 인터페이스
pub trait SchemaProvider {
    fn table_schema(&self, table: &str) -> DbxResult<RowSchema>;
}

/// LogicalPlan 분석기
pub struct Analyzer<'a> {
    resolver: ExpressionResolver<'a>,
    catalog: &'a dyn SchemaProvider,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        registry: &'a FunctionRegistry,
        builtins: &'a FunctionRegistry,
        policy: DecimalNarrowing,
        catalog: &'a dyn SchemaProvider,
    ) -> Self {
        Self {
            resolver: ExpressionResolver::new(registry, builtins, policy),
            catalog,
        }
    }

    /// 플랜 분석. Running it on an analyzed plan returns an equal plan.
    pub fn analyze(&self, plan: LogicalPlan) -> DbxResult<LogicalPlan> {
        self.analyze_node(plan).map(|(plan, _)| plan)
    }

    /// Output row schema of an analyzed plan.
    pub fn schema_of(&self, plan: &LogicalPlan) -> DbxResult<RowSchema> {
        self.analyze_node(plan.clone()).map(|(_, schema)| schema)
    }

    fn analyze_node(&self, plan: LogicalPlan) -> DbxResult<(LogicalPlan, RowSchema)> {
        match plan {
            LogicalPlan::OneRow => Ok((LogicalPlan::OneRow, RowSchema::empty())),
            LogicalPlan::Scan { table, alias } => {
                let mut qualifiers = vec![table.clone()];
                qualifiers.extend(alias.clone());
                let schema = self.catalog.table_schema(&table)?.with_qualifiers(qualifiers);
                Ok((LogicalPlan::Scan { table, alias }, schema))
            }
            LogicalPlan::Filter { input, predicate } => {
                let clause = if matches!(input.as_ref(), LogicalPlan::Aggregate { .. }) {
                    "HAVING"
                } else {
                    "WHERE"
                };
                let (input, schema) = self.analyze_node(*input)?;
                let predicate = self.resolver.resolve(predicate, &schema)?;
                let actual = predicate.data_type(&schema)?;
                if !matches!(actual, SemanticType::Boolean | SemanticType::Unresolved) {
                    return Err(AnalysisError::NonBooleanPredicate { clause, actual }.into());
                }
                Ok((
                    LogicalPlan::Filter {
                        input: Box::new(input),
                        predicate,
                    },
                    schema,
                ))
            }
            LogicalPlan::Project { input, projections } => {
                let (input, schema) = self.analyze_node(*input)?;
                // SELECT * → 입력 컬럼 전체
                let projections = if projections.is_empty() {
                    schema
                        .columns
                        .iter()
                        .map(|c| (Expr::Column(c.name.clone()), c.name.clone()))
                        .collect()
                } else {
                    projections
                };

                let mut resolved = Vec::with_capacity(projections.len());
                let mut columns = Vec::with_capacity(projections.len());
                for (expr, name) in projections {
                    let expr = self.resolver.resolve(expr, &schema)?;
                    columns.push(ColumnDef::new(name.clone(), expr.data_type(&schema)?));
                    resolved.push((expr, name));
                }
                Ok((
                    LogicalPlan::Project {
                        input: Box::new(input),
                        projections: resolved,
                    },
                    RowSchema::new(columns),
                ))
            }
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => {
                let (input, schema) = self.analyze_node(*input)?;
                let mut columns = Vec::with_capacity(group_by.len() + aggregates.len());

                let group_by = group_by
                    .into_iter()
                    .map(|(expr, name)| {
                        let expr = self.resolver.resolve(expr, &schema)?;
                        columns.push(ColumnDef::new(name.clone(), expr.data_type(&schema)?));
                        Ok((expr, name))
                    })
                    .collect::<DbxResult<Vec<_>>>()?;

                let aggregates = aggregates
                    .into_iter()
                    .map(|agg| {
                        let agg = AggregateExpr {
                            expr: self.resolver.resolve(agg.expr, &schema)?,
                            ..agg
                        };
                        columns.push(ColumnDef::new(agg.name.clone(), agg.output_type(&schema)?));
                        Ok(agg)
                    })
                    .collect::<DbxResult<Vec<_>>>()?;

                Ok((
                    LogicalPlan::Aggregate {
                        input: Box::new(input),
                        group_by,
                        aggregates,
                    },
                    RowSchema::new(columns),
                ))
            }
            LogicalPlan::Sort { input, order_by } => {
                let (input, schema) = self.analyze_node(*input)?;
                let order_by = order_by
                    .into_iter()
                    .map(|s| {
                        Ok(SortExpr {
                            expr: self.resolver.resolve(s.expr, &schema)?,
                            ..s
                        })
                    })
                    .collect::<DbxResult<Vec<_>>>()?;
                Ok((
                    LogicalPlan::Sort {
                        input: Box::new(input),
                        order_by,
                    },
                    schema,
                ))
            }
            LogicalPlan::Limit {
                input,
                count,
                offset,
            } => {
                let (input, schema) = self.analyze_node(*input)?;
                Ok((
                    LogicalPlan::Limit {
                        input: Box::new(input),
                        count,
                        offset,
                    },
                    schema,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbxError;
    use crate::function::builtin_registry;
    use crate::sql::planner::{AggregateFunction, BinaryOperator};
    use crate::types::StructField;

    struct Tables;

    impl SchemaProvider for Tables {
        fn table_schema(&self, table: &str) -> DbxResult<RowSchema> {
            match table {
                "t" => Ok(RowSchema::new(vec![
                    ColumnDef::new("s", SemanticType::String),
                    ColumnDef::new("n", SemanticType::Integer),
                ])),
                _ => Err(DbxError::TableNotFound(table.to_string())),
            }
        }
    }

    fn registry() -> FunctionRegistry {
        let registry = FunctionRegistry::new();
        registry.register_fn("strLen", |s: String| s.len() as i32).unwrap();
        registry.register_fn("isBig", |n: i32| n > 80).unwrap();
        registry
            .register(std::sync::Arc::new(
                crate::function::ScalarUdf::dynamic(
                    "mkPoint",
                    vec![SemanticType::Integer],
                    SemanticType::Struct(vec![
                        StructField::new("x", SemanticType::Integer),
                        StructField::new("label", SemanticType::String),
                    ]),
                    crate::function::Arity::Fixed(1),
                    |args| {
                        Ok(crate::types::Value::Struct(vec![
                            ("x".to_string(), args[0].clone()),
                            ("label".to_string(), crate::types::Value::String("p".into())),
                        ]))
                    },
                )
                .unwrap(),
            ));
        registry
    }

    fn scan() -> Box<LogicalPlan> {
        Box::new(LogicalPlan::Scan {
            table: "t".to_string(),
            alias: None,
        })
    }

    #[test]
    fn test_analyze_project_and_filter() {
        let reg = registry();
        let analyzer = Analyzer::new(&reg, builtin_registry(), DecimalNarrowing::Exact, &Tables);
        let plan = LogicalPlan::Project {
            input: Box::new(LogicalPlan::Filter {
                input: scan(),
                predicate: Expr::call("isBig", vec![Expr::column("n")]),
            }),
            projections: vec![(Expr::call("strLen", vec![Expr::column("s")]), "len".to_string())],
        };

        let analyzed = analyzer.analyze(plan).unwrap();
        let mut unresolved = false;
        analyzed.for_each_expr(&mut |e| unresolved |= e.has_unresolved_call());
        assert!(!unresolved);

        let schema = analyzer.schema_of(&analyzed).unwrap();
        assert_eq!(schema.columns, vec![ColumnDef::new("len", SemanticType::Integer)]);
        assert_eq!(analyzer.analyze(analyzed.clone()).unwrap(), analyzed);
    }

    #[test]
    fn test_non_boolean_predicate() {
        let reg = registry();
        let analyzer = Analyzer::new(&reg, builtin_registry(), DecimalNarrowing::Exact, &Tables);
        let plan = LogicalPlan::Filter {
            input: scan(),
            predicate: Expr::call("strLen", vec![Expr::column("s")]),
        };
        let err = analyzer.analyze(plan).unwrap_err();
        assert!(matches!(
            err,
            DbxError::Analysis(AnalysisError::NonBooleanPredicate { clause: "WHERE", .. })
        ));
    }

    #[test]
    fn test_struct_projection_schema() {
        let reg = registry();
        let analyzer = Analyzer::new(&reg, builtin_registry(), DecimalNarrowing::Exact, &Tables);
        let plan = LogicalPlan::Project {
            input: scan(),
            projections: vec![
                (
                    Expr::call("mkPoint", vec![Expr::column("n")]).field("label"),
                    "label".to_string(),
                ),
                (Expr::call("mkPoint", vec![Expr::column("n")]), "p".to_string()),
            ],
        };
        let analyzed = analyzer.analyze(plan).unwrap();
        let schema = analyzer.schema_of(&analyzed).unwrap();
        assert_eq!(schema.columns[0].data_type, SemanticType::String);
        assert_eq!(
            schema.columns[1].data_type.struct_fields().unwrap()[0].name,
            "x"
        );

        let bad = LogicalPlan::Project {
            input: scan(),
            projections: vec![(
                Expr::call("mkPoint", vec![Expr::column("n")]).field("nope"),
                "x".to_string(),
            )],
        };
        assert!(matches!(
            analyzer.analyze(bad),
            Err(DbxError::Analysis(AnalysisError::NoSuchField { .. }))
        ));
    }

    #[test]
    fn test_aggregate_schema_and_having() {
        let reg = registry();
        let analyzer = Analyzer::new(&reg, builtin_registry(), DecimalNarrowing::Exact, &Tables);
        let key = Expr::call("strLen", vec![Expr::column("s")]);
        let plan = LogicalPlan::Filter {
            input: Box::new(LogicalPlan::Aggregate {
                input: scan(),
                group_by: vec![(key, "strLen(s)".to_string())],
                aggregates: vec![AggregateExpr {
                    function: AggregateFunction::Count,
                    expr: Expr::literal(1),
                    name: "COUNT(*)".to_string(),
                }],
            }),
            predicate: Expr::binary(
                Expr::column("COUNT(*)"),
                BinaryOperator::Gt,
                Expr::literal(1),
            ),
        };
        let analyzed = analyzer.analyze(plan).unwrap();
        let schema = analyzer.schema_of(&analyzed).unwrap();
        assert_eq!(
            schema.columns,
            vec![
                ColumnDef::new("strLen(s)", SemanticType::Integer),
                ColumnDef::new("COUNT(*)", SemanticType::Long),
            ]
        );
    }

    #[test]
    fn test_unknown_table() {
        let reg = registry();
        let analyzer = Analyzer::new(&reg, builtin_registry(), DecimalNarrowing::Exact, &Tables);
        let plan = LogicalPlan::Scan {
            table: "missing".to_string(),
            alias: None,
        };
        assert!(matches!(
            analyzer.analyze(plan),
            Err(DbxError::TableNotFound(_))
        ));
    }
}
