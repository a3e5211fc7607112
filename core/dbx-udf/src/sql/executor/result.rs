//! Query results — rows plus column metadata, exportable as an Arrow RecordBatch

use crate::error::{DbxError, DbxResult};
use crate::sql::executor::Row;
use crate::sql::planner::ColumnDef;
use crate::types::semantic::{ARROW_DECIMAL_PRECISION, ARROW_DECIMAL_SCALE};
use crate::types::{SemanticType, StructField, Value, struct_fields_to_arrow};
use arrow::array::{
    ArrayRef, BooleanArray, Decimal128Array, Float64Array, Int32Array, Int64Array, ListArray,
    NullArray, StringArray, StructArray,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Materialized SELECT output.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(columns: Vec<ColumnDef>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Value at (row, column name)
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))?;
        self.rows.get(row)?.get(idx)
    }

    /// All values of one column
    pub fn column(&self, column: &str) -> Option<Vec<Value>> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))?;
        Some(self.rows.iter().map(|r| r[idx].clone()).collect())
    }

    /// Arrow 변환. Struct columns keep their declared member order.
    pub fn to_record_batch(&self) -> DbxResult<RecordBatch> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(c.name.clone(), c.data_type.to_arrow(), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let arrays = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                let values: Vec<&Value> = self.rows.iter().map(|r| &r[idx]).collect();
                build_array(&values, &c.data_type)
            })
            .collect::<DbxResult<Vec<_>>>()?;

        if arrays.is_empty() {
            return Ok(RecordBatch::new_empty(schema));
        }
        Ok(RecordBatch::try_new(schema, arrays)?)
    }

    /// 표 형태 출력
    pub fn pretty(&self) -> DbxResult<String> {
        let batch = self.to_record_batch()?;
        Ok(arrow::util::pretty::pretty_format_batches(&[batch])?.to_string())
    }
}

fn mismatch(expected: &SemanticType, actual: &Value) -> DbxError {
    DbxError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.semantic_type().to_string(),
    }
}

/// Build one Arrow column from values of a single semantic type.
pub fn build_array(values: &[&Value], data_type: &SemanticType) -> DbxResult<ArrayRef> {
    macro_rules! primitive {
        ($array:ty, $variant:ident) => {{
            let array: $array = values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::$variant(x) => Ok(Some(x.clone())),
                    other => Err(mismatch(data_type, other)),
                })
                .collect::<DbxResult<_>>()?;
            Ok(Arc::new(array) as ArrayRef)
        }};
    }

    match data_type {
        SemanticType::Integer => primitive!(Int32Array, Integer),
        SemanticType::Long => primitive!(Int64Array, Long),
        SemanticType::Double => primitive!(Float64Array, Double),
        SemanticType::Boolean => primitive!(BooleanArray, Boolean),
        SemanticType::String => primitive!(StringArray, String),
        SemanticType::Decimal => {
            let array: Decimal128Array = values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Decimal(d) => {
                        let mut scaled = *d;
                        scaled.rescale(ARROW_DECIMAL_SCALE as u32);
                        // rescale은 96비트 가수부를 넘으면 더 낮은 scale에서 멈춘다
                        if scaled.scale() != ARROW_DECIMAL_SCALE as u32 {
                            return Err(DbxError::Schema(format!(
                                "decimal {d} does not fit DECIMAL({ARROW_DECIMAL_PRECISION}, {ARROW_DECIMAL_SCALE})"
                            )));
                        }
                        Ok(Some(scaled.mantissa()))
                    }
                    other => Err(mismatch(data_type, other)),
                })
                .collect::<DbxResult<_>>()?;
            Ok(Arc::new(array.with_precision_and_scale(
                ARROW_DECIMAL_PRECISION,
                ARROW_DECIMAL_SCALE,
            )?) as ArrayRef)
        }
        SemanticType::Struct(fields) => build_struct(values, fields),
        SemanticType::Array(element) => {
            let mut lengths = Vec::with_capacity(values.len());
            let mut items: Vec<&Value> = Vec::new();
            let mut validity = Vec::with_capacity(values.len());
            for v in values {
                match v {
                    Value::Null => {
                        lengths.push(0);
                        validity.push(false);
                    }
                    Value::Array(elems) => {
                        lengths.push(elems.len());
                        items.extend(elems.iter());
                        validity.push(true);
                    }
                    other => return Err(mismatch(data_type, other)),
                }
            }
            let child = build_array(&items, element)?;
            let field = Arc::new(Field::new("item", element.to_arrow(), true));
            Ok(Arc::new(ListArray::try_new(
                field,
                OffsetBuffer::from_lengths(lengths),
                child,
                Some(NullBuffer::from(validity)),
            )?) as ArrayRef)
        }
        SemanticType::Unresolved => Ok(Arc::new(NullArray::new(values.len())) as ArrayRef),
    }
}

fn build_struct(values: &[&Value], fields: &[StructField]) -> DbxResult<ArrayRef> {
    let validity: Vec<bool> = values.iter().map(|v| !v.is_null()).collect();
    let children = fields
        .iter()
        .map(|field| {
            let column: Vec<&Value> = values
                .iter()
                .map(|v| v.field(&field.name).unwrap_or(&Value::Null))
                .collect();
            build_array(&column, &field.data_type)
        })
        .collect::<DbxResult<Vec<_>>>()?;
    Ok(Arc::new(StructArray::try_new(
        struct_fields_to_arrow(fields),
        children,
        Some(NullBuffer::from(validity)),
    )?) as ArrayRef)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_record_batch_primitive_columns() {
        let result = QueryResult::new(
            vec![
                ColumnDef::new("n", SemanticType::Integer),
                ColumnDef::new("s", SemanticType::String),
                ColumnDef::new("d", SemanticType::Decimal),
            ],
            vec![
                vec![
                    Value::Integer(1),
                    Value::from("a"),
                    Value::Decimal(Decimal::from_str("1.25").unwrap()),
                ],
                vec![Value::Null, Value::from("b"), Value::Null],
            ],
        );
        let batch = result.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 3);
        assert!(batch.column(0).is_null(1));

        let back = Value::from_array(batch.column(2), 0).unwrap();
        assert_eq!(back, Value::Decimal(Decimal::from_str("1.25").unwrap()));
    }

    #[test]
    fn test_record_batch_struct_column() {
        let ty = SemanticType::struct_of([
            ("x", SemanticType::Integer),
            ("label", SemanticType::String),
        ]);
        let result = QueryResult::new(
            vec![ColumnDef::new("p", ty)],
            vec![
                vec![Value::Struct(vec![
                    ("x".to_string(), Value::Integer(1)),
                    ("label".to_string(), Value::from("one")),
                ])],
                vec![Value::Null],
            ],
        );
        let batch = result.to_record_batch().unwrap();
        let array = batch.column(0).as_struct();
        assert_eq!(array.column_names(), vec!["x", "label"]);
        assert!(array.is_null(1));
        assert_eq!(
            Value::from_array(batch.column(0), 0).unwrap(),
            result.rows[0][0]
        );
    }

    #[test]
    fn test_record_batch_list_and_pretty() {
        let result = QueryResult::new(
            vec![ColumnDef::new(
                "xs",
                SemanticType::array_of(SemanticType::Long),
            )],
            vec![
                vec![Value::Array(vec![Value::Long(1), Value::Long(2)])],
                vec![Value::Array(vec![])],
            ],
        );
        let batch = result.to_record_batch().unwrap();
        assert_eq!(batch.column(0).as_list::<i32>().value_length(0), 2);
        let text = result.pretty().unwrap();
        assert!(text.contains("xs"));
    }

    #[test]
    fn test_decimal_out_of_arrow_range_rejected() {
        let result = QueryResult::new(
            vec![ColumnDef::new("d", SemanticType::Decimal)],
            vec![vec![Value::Decimal(
                Decimal::from_str("12345678901234567890").unwrap(),
            )]],
        );
        assert!(matches!(
            result.to_record_batch(),
            Err(DbxError::Schema(_))
        ));

        let fits = QueryResult::new(
            vec![ColumnDef::new("d", SemanticType::Decimal)],
            vec![vec![Value::Decimal(Decimal::from_str("123456789.5").unwrap())]],
        );
        let batch = fits.to_record_batch().unwrap();
        assert_eq!(
            Value::from_array(batch.column(0), 0).unwrap(),
            Value::Decimal(Decimal::from_str("123456789.5").unwrap())
        );
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let result = QueryResult::new(
            vec![ColumnDef::new("n", SemanticType::Integer)],
            vec![vec![Value::from("oops")]],
        );
        assert!(matches!(
            result.to_record_batch(),
            Err(DbxError::TypeMismatch { .. })
        ));
    }
}
