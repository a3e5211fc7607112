//! SQL Query Executor Module
//!
//! 분석/최적화가 끝난 LogicalPlan을 행 단위로 실행합니다. 각 RecordBatch는
//! 하나의 파티션이 되며, Filter/Project는 rayon으로 파티션 병렬 처리됩니다.

pub mod aggregate;
pub mod expr;
pub mod result;

pub use aggregate::{Accumulator, hash_aggregate};
pub use expr::{ExprEvaluator, cast_value, eval_binary, evaluate_constant};
pub use result::QueryResult;

use crate::config::UdfErrorPolicy;
use crate::error::{DbxError, DbxResult};
use crate::sql::planner::{ColumnDef, Expr, LogicalPlan, RowSchema};
use crate::types::Value;
use arrow::record_batch::RecordBatch;
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

/// 한 행
pub type Row = Vec<Value>;

/// Source of table data for Scan nodes.
pub trait TableSource: Sync {
    /// Schema (with table qualifiers) and batches of a registered table.
    fn scan(&self, table: &str, alias: Option<&str>) -> DbxResult<(RowSchema, Vec<RecordBatch>)>;
}

/// Contiguous run of rows. `offset` is the index of the first row within the operator input.
#[derive(Debug, Default)]
struct Partition {
    offset: usize,
    rows: Vec<Row>,
}

fn renumber(partitions: Vec<Vec<Row>>) -> Vec<Partition> {
    let mut offset = 0;
    partitions
        .into_iter()
        .map(|rows| {
            let partition = Partition { offset, rows };
            offset += partition.rows.len();
            partition
        })
        .collect()
}

fn flatten(partitions: Vec<Partition>) -> Vec<Row> {
    partitions.into_iter().flat_map(|p| p.rows).collect()
}

/// Executes analyzed plans.
pub struct QueryExecutor<'a> {
    tables: &'a dyn TableSource,
    on_udf_error: UdfErrorPolicy,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(tables: &'a dyn TableSource, on_udf_error: UdfErrorPolicy) -> Self {
        Self {
            tables,
            on_udf_error,
        }
    }

    /// Run a resolved plan to completion.
    pub fn execute(&self, plan: &LogicalPlan) -> DbxResult<QueryResult> {
        let (schema, partitions) = self.execute_node(plan)?;
        let rows = flatten(partitions);
        debug!(rows = rows.len(), columns = schema.len(), "query executed");
        Ok(QueryResult::new(schema.columns, rows))
    }

    fn execute_node(&self, plan: &LogicalPlan) -> DbxResult<(RowSchema, Vec<Partition>)> {
        match plan {
            LogicalPlan::OneRow => Ok((
                RowSchema::empty(),
                vec![Partition {
                    offset: 0,
                    rows: vec![Vec::new()],
                }],
            )),
            LogicalPlan::Scan { table, alias } => {
                let (schema, batches) = self.tables.scan(table, alias.as_deref())?;
                let partitions = batches
                    .par_iter()
                    .map(|batch| {
                        (0..batch.num_rows())
                            .map(|i| {
                                batch
                                    .columns()
                                    .iter()
                                    .map(|col| Value::from_array(col, i))
                                    .collect::<DbxResult<Row>>()
                            })
                            .collect::<DbxResult<Vec<Row>>>()
                    })
                    .collect::<DbxResult<Vec<_>>>()?;
                Ok((schema, renumber(partitions)))
            }
            LogicalPlan::Filter { input, predicate } => {
                let (schema, partitions) = self.execute_node(input)?;
                let eval = ExprEvaluator::new(&schema, self.on_udf_error);
                let kept = partitions
                    .into_par_iter()
                    .map(|p| {
                        let mut rows = Vec::with_capacity(p.rows.len());
                        for (i, row) in p.rows.into_iter().enumerate() {
                            if eval.matches(predicate, &row, p.offset + i)? {
                                rows.push(row);
                            }
                        }
                        Ok(rows)
                    })
                    .collect::<DbxResult<Vec<_>>>()?;
                Ok((schema, renumber(kept)))
            }
            LogicalPlan::Project { input, projections } => {
                let (schema, partitions) = self.execute_node(input)?;
                let columns = projections
                    .iter()
                    .map(|(expr, name)| Ok(ColumnDef::new(name.clone(), expr.data_type(&schema)?)))
                    .collect::<DbxResult<Vec<_>>>()?;
                let eval = ExprEvaluator::new(&schema, self.on_udf_error);
                let projected = partitions
                    .into_par_iter()
                    .map(|p| {
                        let offset = p.offset;
                        let rows = p
                            .rows
                            .iter()
                            .enumerate()
                            .map(|(i, row)| {
                                projections
                                    .iter()
                                    .map(|(expr, _)| eval.evaluate(expr, row, offset + i))
                                    .collect::<DbxResult<Row>>()
                            })
                            .collect::<DbxResult<Vec<_>>>()?;
                        Ok(Partition { offset, rows })
                    })
                    .collect::<DbxResult<Vec<_>>>()?;
                Ok((RowSchema::new(columns), projected))
            }
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => {
                let (schema, partitions) = self.execute_node(input)?;
                let mut columns = Vec::with_capacity(group_by.len() + aggregates.len());
                for (expr, name) in group_by {
                    columns.push(ColumnDef::new(name.clone(), expr.data_type(&schema)?));
                }
                let typed_aggregates = aggregates
                    .iter()
                    .map(|agg| {
                        let output = agg.output_type(&schema)?;
                        columns.push(ColumnDef::new(agg.name.clone(), output.clone()));
                        Ok((agg.clone(), output))
                    })
                    .collect::<DbxResult<Vec<_>>>()?;

                let keys: Vec<Expr> = group_by.iter().map(|(e, _)| e.clone()).collect();
                let eval = ExprEvaluator::new(&schema, self.on_udf_error);
                let rows = hash_aggregate(&eval, flatten(partitions), &keys, &typed_aggregates)?;
                Ok((RowSchema::new(columns), renumber(vec![rows])))
            }
            LogicalPlan::Sort { input, order_by } => {
                let (schema, partitions) = self.execute_node(input)?;
                let eval = ExprEvaluator::new(&schema, self.on_udf_error);
                let mut keyed = flatten(partitions)
                    .into_iter()
                    .enumerate()
                    .map(|(i, row)| {
                        let keys = order_by
                            .iter()
                            .map(|s| eval.evaluate(&s.expr, &row, i))
                            .collect::<DbxResult<Vec<_>>>()?;
                        Ok((keys, row))
                    })
                    .collect::<DbxResult<Vec<_>>>()?;

                keyed.sort_by(|(a, _), (b, _)| {
                    for ((x, y), s) in a.iter().zip(b).zip(order_by) {
                        let ord = match (x.is_null(), y.is_null()) {
                            (true, true) => Ordering::Equal,
                            (true, false) if s.nulls_first => Ordering::Less,
                            (true, false) => Ordering::Greater,
                            (false, true) if s.nulls_first => Ordering::Greater,
                            (false, true) => Ordering::Less,
                            (false, false) if s.asc => x.sort_cmp(y),
                            (false, false) => y.sort_cmp(x),
                        };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                });
                let rows = keyed.into_iter().map(|(_, row)| row).collect();
                Ok((schema, renumber(vec![rows])))
            }
            LogicalPlan::Limit {
                input,
                count,
                offset,
            } => {
                let (schema, partitions) = self.execute_node(input)?;
                let rows = flatten(partitions)
                    .into_iter()
                    .skip(*offset)
                    .take(*count)
                    .collect();
                Ok((schema, renumber(vec![rows])))
            }
        }
    }
}

/// Reject plans that still carry unresolved calls.
pub fn ensure_resolved(plan: &LogicalPlan) -> DbxResult<()> {
    let mut unresolved = None;
    plan.for_each_expr(&mut |e| {
        e.visit(&mut |node| {
            if let Expr::Function { name, .. } = node {
                unresolved.get_or_insert_with(|| name.clone());
            }
        })
    });
    match unresolved {
        Some(name) => Err(DbxError::execution("unresolved function call", name)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::planner::{BinaryOperator, SortExpr};
    use crate::types::SemanticType;
    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    struct OneTable;

    impl TableSource for OneTable {
        fn scan(
            &self,
            table: &str,
            _alias: Option<&str>,
        ) -> DbxResult<(RowSchema, Vec<RecordBatch>)> {
            if table != "t" {
                return Err(DbxError::TableNotFound(table.to_string()));
            }
            let schema = Arc::new(Schema::new(vec![
                Field::new("n", DataType::Int32, true),
                Field::new("s", DataType::Utf8, true),
            ]));
            let batch = |ns: Vec<Option<i32>>, ss: Vec<&str>| {
                RecordBatch::try_new(
                    schema.clone(),
                    vec![
                        Arc::new(Int32Array::from(ns)),
                        Arc::new(StringArray::from(ss)),
                    ],
                )
                .unwrap()
            };
            Ok((
                RowSchema::new(vec![
                    ColumnDef::new("n", SemanticType::Integer),
                    ColumnDef::new("s", SemanticType::String),
                ]),
                vec![
                    batch(vec![Some(3), None], vec!["c", "x"]),
                    batch(vec![Some(1), Some(2)], vec!["a", "b"]),
                ],
            ))
        }
    }

    fn scan() -> Box<LogicalPlan> {
        Box::new(LogicalPlan::Scan {
            table: "t".to_string(),
            alias: None,
        })
    }

    #[test]
    fn test_filter_and_project() {
        let plan = LogicalPlan::Project {
            input: Box::new(LogicalPlan::Filter {
                input: scan(),
                predicate: Expr::binary(Expr::column("n"), BinaryOperator::GtEq, Expr::literal(2)),
            }),
            projections: vec![(Expr::column("s"), "s".to_string())],
        };
        let result = QueryExecutor::new(&OneTable, UdfErrorPolicy::Abort)
            .execute(&plan)
            .unwrap();
        assert_eq!(result.rows, vec![vec![Value::from("c")], vec![Value::from("b")]]);
    }

    #[test]
    fn test_sort_nulls_and_limit() {
        let plan = LogicalPlan::Limit {
            input: Box::new(LogicalPlan::Sort {
                input: scan(),
                order_by: vec![SortExpr {
                    expr: Expr::column("n"),
                    asc: false,
                    nulls_first: false,
                }],
            }),
            count: 3,
            offset: 1,
        };
        let result = QueryExecutor::new(&OneTable, UdfErrorPolicy::Abort)
            .execute(&plan)
            .unwrap();
        assert_eq!(
            result.column("n").unwrap(),
            vec![Value::Integer(2), Value::Integer(1), Value::Null]
        );
    }

    #[test]
    fn test_one_row() {
        let plan = LogicalPlan::Project {
            input: Box::new(LogicalPlan::OneRow),
            projections: vec![(
                Expr::binary(Expr::literal(1), BinaryOperator::Plus, Expr::literal(2)),
                "x".to_string(),
            )],
        };
        let result = QueryExecutor::new(&OneTable, UdfErrorPolicy::Abort)
            .execute(&plan)
            .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(3)]]);
    }

    #[test]
    fn test_unresolved_plan_rejected() {
        let plan = LogicalPlan::Project {
            input: Box::new(LogicalPlan::OneRow),
            projections: vec![(Expr::call("f", vec![]), "f".to_string())],
        };
        assert!(ensure_resolved(&plan).is_err());
    }
}
