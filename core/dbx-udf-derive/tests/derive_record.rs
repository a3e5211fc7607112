//! derive(SqlRecord) 매크로 테스트

use dbx_udf::function::{FromValue, IntoValue, SqlType};
use dbx_udf::{SemanticType, Session, SqlRecord, StructField, Value};

#[derive(Debug, Clone, PartialEq, SqlRecord)]
pub struct Point {
    pub x: i32,
    pub y: i64,
    #[dbx(rename = "label")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, SqlRecord)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

#[test]
fn test_semantic_type_keeps_declaration_order() {
    assert_eq!(
        Point::semantic_type(),
        SemanticType::Struct(vec![
            StructField::new("x", SemanticType::Integer),
            StructField::new("y", SemanticType::Long),
            StructField::new("label", SemanticType::String),
        ])
    );
    assert!(!Point::is_nullable());
}

#[test]
fn test_into_and_from_value() {
    let p = Point {
        x: 1,
        y: 2,
        name: None,
    };
    let value = p.clone().into_value();
    assert_eq!(
        value,
        Value::Struct(vec![
            ("x".to_string(), Value::Integer(1)),
            ("y".to_string(), Value::Long(2)),
            ("label".to_string(), Value::Null),
        ])
    );
    assert_eq!(Point::from_value(&value).unwrap(), p);
    assert!(Point::from_value(&Value::Integer(1)).is_err());
}

#[test]
fn test_nested_record() {
    let ty = Segment::semantic_type();
    let fields = ty.struct_fields().unwrap();
    assert_eq!(fields[0].name, "from");
    assert_eq!(fields[1].data_type, Point::semantic_type());
}

#[test]
fn test_record_as_udf_return_type() {
    let session = Session::default();
    session
        .register_udf("mkPoint", |x: i32| Point {
            x,
            y: i64::from(x) * 10,
            name: Some(format!("p{x}")),
        })
        .unwrap();
    let result = session
        .sql("SELECT mkPoint(3) AS p, p.label AS l, p.y AS y")
        .unwrap();
    assert_eq!(result.column_names(), vec!["p", "l", "y"]);
    assert_eq!(result.rows[0][1], Value::from("p3"));
    assert_eq!(result.rows[0][2], Value::Long(30));
}

#[test]
fn test_record_as_udf_parameter() {
    let session = Session::default();
    session
        .register_udf("mkPoint", |x: i32| Point {
            x,
            y: 0,
            name: None,
        })
        .unwrap();
    session
        .register_udf("norm1", |p: Point| i64::from(p.x.abs()) + p.y.abs())
        .unwrap();
    let result = session.sql("SELECT norm1(mkPoint(-4))").unwrap();
    assert_eq!(result.rows[0][0], Value::Long(4));
}
