//! Hash aggregation — GROUP BY keys and COUNT/SUM/AVG/MIN/MAX accumulators

use crate::error::DbxResult;
use crate::sql::executor::expr::{ExprEvaluator, cast_value, eval_binary};
use crate::sql::executor::Row;
use crate::sql::planner::{AggregateExpr, AggregateFunction, BinaryOperator, Expr};
use crate::types::{SemanticType, Value};
use ahash::AHashMap;
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Running state of one aggregate within one group.
#[derive(Debug, Clone)]
pub enum Accumulator {
    Count(i64),
    Sum(Option<Value>),
    Avg { sum: Option<Value>, count: i64 },
    Min(Option<Value>),
    Max(Option<Value>),
}

impl Accumulator {
    pub fn new(function: AggregateFunction) -> Self {
        match function {
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::Sum => Accumulator::Sum(None),
            AggregateFunction::Avg => Accumulator::Avg {
                sum: None,
                count: 0,
            },
            AggregateFunction::Min => Accumulator::Min(None),
            AggregateFunction::Max => Accumulator::Max(None),
        }
    }

    /// Fold one input value. NULLs are skipped by every aggregate.
    /// `sum_type` is the accumulation type for SUM/AVG.
    pub fn update(&mut self, value: Value, sum_type: &SemanticType) -> DbxResult<()> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum(sum) => add_into(sum, value, sum_type)?,
            Accumulator::Avg { sum, count } => {
                add_into(sum, value, sum_type)?;
                *count += 1;
            }
            Accumulator::Min(current) => keep_if(current, value, Ordering::Less),
            Accumulator::Max(current) => keep_if(current, value, Ordering::Greater),
        }
        Ok(())
    }

    pub fn finish(self) -> DbxResult<Value> {
        match self {
            Accumulator::Count(n) => Ok(Value::Long(n)),
            Accumulator::Sum(sum) | Accumulator::Min(sum) | Accumulator::Max(sum) => {
                Ok(sum.unwrap_or(Value::Null))
            }
            Accumulator::Avg { sum: None, .. } => Ok(Value::Null),
            Accumulator::Avg {
                sum: Some(sum),
                count,
            } => {
                let count = match sum {
                    Value::Decimal(_) => Value::Decimal(Decimal::from(count)),
                    _ => Value::Double(count as f64),
                };
                eval_binary(&sum, BinaryOperator::Divide, &count)
            }
        }
    }
}

fn add_into(sum: &mut Option<Value>, value: Value, sum_type: &SemanticType) -> DbxResult<()> {
    let value = cast_value(value, sum_type, false)?;
    *sum = Some(match sum.take() {
        Some(acc) => eval_binary(&acc, BinaryOperator::Plus, &value)?,
        None => value,
    });
    Ok(())
}

fn keep_if(current: &mut Option<Value>, value: Value, wanted: Ordering) {
    let replace = match current {
        Some(cur) => value.compare(cur) == Some(wanted),
        None => true,
    };
    if replace {
        *current = Some(value);
    }
}

/// Accumulation type for SUM/AVG given the aggregate's output type.
fn sum_type(agg: &AggregateExpr, output: &SemanticType) -> SemanticType {
    match (agg.function, output) {
        (AggregateFunction::Avg, SemanticType::Decimal) => SemanticType::Decimal,
        (AggregateFunction::Avg, _) => SemanticType::Double,
        _ => output.clone(),
    }
}

type GroupKey = SmallVec<[Value; 2]>;

/// GROUP BY over all input rows. Groups come out in first-seen order.
/// Without grouping keys an empty input still yields one row.
pub fn hash_aggregate(
    eval: &ExprEvaluator<'_>,
    rows: impl IntoIterator<Item = Row>,
    group_by: &[Expr],
    aggregates: &[(AggregateExpr, SemanticType)],
) -> DbxResult<Vec<Row>> {
    let sum_types: Vec<SemanticType> = aggregates
        .iter()
        .map(|(agg, output)| sum_type(agg, output))
        .collect();
    let fresh = || -> Vec<Accumulator> {
        aggregates
            .iter()
            .map(|(agg, _)| Accumulator::new(agg.function))
            .collect()
    };

    let mut index: AHashMap<GroupKey, usize> = AHashMap::new();
    let mut groups: Vec<(GroupKey, Vec<Accumulator>)> = Vec::new();

    for (row_idx, row) in rows.into_iter().enumerate() {
        let key = group_by
            .iter()
            .map(|e| eval.evaluate(e, &row, row_idx))
            .collect::<DbxResult<GroupKey>>()?;
        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, fresh()));
                groups.len() - 1
            }
        };
        let accumulators = &mut groups[slot].1;
        for (((agg, _), acc), sum_type) in aggregates.iter().zip(accumulators).zip(&sum_types) {
            let value = eval.evaluate(&agg.expr, &row, row_idx)?;
            acc.update(value, sum_type)?;
        }
    }

    if groups.is_empty() && group_by.is_empty() {
        groups.push((GroupKey::new(), fresh()));
    }

    groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut row: Row = key.into_vec();
            for acc in accumulators {
                row.push(acc.finish()?);
            }
            Ok(row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UdfErrorPolicy;
    use crate::sql::planner::{ColumnDef, RowSchema};
    use std::str::FromStr;

    fn agg(function: AggregateFunction, column: &str) -> AggregateExpr {
        AggregateExpr {
            function,
            expr: Expr::column(column),
            name: format!("{function}({column})"),
        }
    }

    #[test]
    fn test_accumulators() {
        let mut sum = Accumulator::new(AggregateFunction::Sum);
        for v in [Value::Integer(1), Value::Null, Value::Integer(4)] {
            sum.update(v, &SemanticType::Long).unwrap();
        }
        assert_eq!(sum.finish().unwrap(), Value::Long(5));

        let mut avg = Accumulator::new(AggregateFunction::Avg);
        for v in [Value::Integer(1), Value::Integer(2)] {
            avg.update(v, &SemanticType::Double).unwrap();
        }
        assert_eq!(avg.finish().unwrap(), Value::Double(1.5));

        let mut avg = Accumulator::new(AggregateFunction::Avg);
        avg.update(
            Value::Decimal(Decimal::from_str("1.5").unwrap()),
            &SemanticType::Decimal,
        )
        .unwrap();
        assert_eq!(
            avg.finish().unwrap(),
            Value::Decimal(Decimal::from_str("1.5").unwrap())
        );

        let mut min = Accumulator::new(AggregateFunction::Min);
        for v in ["b", "a", "c"] {
            min.update(Value::from(v), &SemanticType::String).unwrap();
        }
        assert_eq!(min.finish().unwrap(), Value::from("a"));

        assert_eq!(
            Accumulator::new(AggregateFunction::Max).finish().unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_group_order_is_first_seen() {
        let schema = RowSchema::new(vec![
            ColumnDef::new("k", SemanticType::String),
            ColumnDef::new("v", SemanticType::Integer),
        ]);
        let eval = ExprEvaluator::new(&schema, UdfErrorPolicy::Abort);
        let rows = vec![
            vec![Value::from("b"), Value::Integer(1)],
            vec![Value::from("a"), Value::Integer(2)],
            vec![Value::from("b"), Value::Integer(3)],
        ];
        let out = hash_aggregate(
            &eval,
            rows,
            &[Expr::column("k")],
            &[
                (agg(AggregateFunction::Count, "v"), SemanticType::Long),
                (agg(AggregateFunction::Sum, "v"), SemanticType::Long),
            ],
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                vec![Value::from("b"), Value::Long(2), Value::Long(4)],
                vec![Value::from("a"), Value::Long(1), Value::Long(2)],
            ]
        );
    }

    #[test]
    fn test_global_aggregate_on_empty_input() {
        let schema = RowSchema::new(vec![ColumnDef::new("v", SemanticType::Integer)]);
        let eval = ExprEvaluator::new(&schema, UdfErrorPolicy::Abort);
        let out = hash_aggregate(
            &eval,
            Vec::new(),
            &[],
            &[
                (agg(AggregateFunction::Count, "v"), SemanticType::Long),
                (agg(AggregateFunction::Sum, "v"), SemanticType::Long),
            ],
        )
        .unwrap();
        assert_eq!(out, vec![vec![Value::Long(0), Value::Null]]);

        let grouped = hash_aggregate(
            &eval,
            Vec::new(),
            &[Expr::column("v")],
            &[(agg(AggregateFunction::Count, "v"), SemanticType::Long)],
        )
        .unwrap();
        assert!(grouped.is_empty());
    }
}
