// UDF 벤치마크
//
// Section 1: 호출 경로 (typed closure adapter vs 내장 함수)
// Section 2: 분석 경로 (parse → resolve → coerce → rewrite)
// Section 3: 실행 경로 (파티션 병렬 필터/프로젝션)

use arrow::array::{Int32Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use dbx_udf::{Callable, ScalarUdf, Session, Value, builtin_registry};
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// Section 1: 호출 경로
// ═══════════════════════════════════════════════════════════════════════════

fn bench_invoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("invoke");

    let str_len = ScalarUdf::from_fn("strLen", |s: String| s.chars().count() as i32).unwrap();
    let args = [Value::from("benchmark")];
    group.bench_function("typed_one_arg", |b| {
        b.iter(|| str_len.invoke(black_box(&args)).unwrap())
    });

    let add3 = ScalarUdf::from_fn("add3", |a: i64, b: i64, c: i64| a + b + c).unwrap();
    let args = [Value::Long(1), Value::Long(2), Value::Long(3)];
    group.bench_function("typed_three_args", |b| {
        b.iter(|| add3.invoke(black_box(&args)).unwrap())
    });

    let null_args = [Value::Null];
    group.bench_function("null_short_circuit", |b| {
        b.iter(|| str_len.invoke(black_box(&null_args)).unwrap())
    });

    let upper = builtin_registry().lookup("upper").unwrap()[0].clone();
    let args = [Value::from("benchmark")];
    group.bench_function("builtin_upper", |b| {
        b.iter(|| upper.invoke(black_box(&args)).unwrap())
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Section 2: 분석 경로
// ═══════════════════════════════════════════════════════════════════════════

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");

    let session = Session::default();
    session.register_udf("strLen", |s: String| s.len() as i32).unwrap();
    session.register_udf("twice", |n: i64| n * 2).unwrap();

    group.bench_function("single_call", |b| {
        b.iter(|| session.plan_sql(black_box("SELECT strLen('test')")).unwrap())
    });

    group.bench_function("nested_with_coercion", |b| {
        b.iter(|| {
            session
                .plan_sql(black_box(
                    "SELECT twice(strLen(upper(concat('a', 'b'))) + 1 * 2), twice(1.0)",
                ))
                .unwrap()
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Section 3: 실행 경로
// ═══════════════════════════════════════════════════════════════════════════

fn numbers(rows: i32, partitions: i32) -> Vec<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int32, true)]));
    let per = rows / partitions;
    (0..partitions)
        .map(|p| {
            let values: Vec<i32> = (p * per..(p + 1) * per).collect();
            RecordBatch::try_new(schema.clone(), vec![Arc::new(Int32Array::from(values))]).unwrap()
        })
        .collect()
}

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");
    group.sample_size(20);

    for partitions in [1, 8] {
        let session = Session::default();
        session.register_table("numbers", numbers(100_000, partitions)).unwrap();
        session.register_udf("even", |n: i32| n % 2 == 0).unwrap();
        session.register_udf("square", |n: i64| n * n).unwrap();

        group.bench_function(format!("filter_project_{partitions}p"), |b| {
            b.iter(|| {
                session
                    .sql(black_box("SELECT square(n) FROM numbers WHERE even(n)"))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_invoke, bench_plan, bench_execute);
criterion_main!(benches);
