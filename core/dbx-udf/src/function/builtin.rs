//! 내장 스칼라 함수 카탈로그
//!
//! 사용자 UDF와 같은 어댑터로 등록되며, 사용자 레지스트리에 없는 이름은 여기서 조회됩니다.

use crate::error::{DbxError, DbxResult};
use crate::function::callable::ScalarUdf;
use crate::function::registry::FunctionRegistry;
use crate::function::signature::Arity;
use crate::types::{SemanticType, Value};
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::sync::{Arc, OnceLock};

static BUILTINS: OnceLock<FunctionRegistry> = OnceLock::new();

/// Process-wide built-in catalog, built on first use.
pub fn builtin_registry() -> &'static FunctionRegistry {
    BUILTINS.get_or_init(|| {
        let registry = FunctionRegistry::new();
        for udf in builtin_functions() {
            match udf {
                Ok(udf) => registry.register_overload(Arc::new(udf)),
                Err(e) => tracing::error!(error = %e, "failed to build built-in function"),
            }
        }
        registry
    })
}

fn builtin_functions() -> Vec<DbxResult<ScalarUdf>> {
    vec![
        ScalarUdf::from_fn("length", |s: String| s.chars().count() as i32),
        ScalarUdf::from_fn("upper", |s: String| s.to_uppercase()),
        ScalarUdf::from_fn("lower", |s: String| s.to_lowercase()),
        ScalarUdf::from_fn("abs", |x: i32| x.checked_abs().ok_or("integer overflow in abs")),
        ScalarUdf::from_fn("abs", |x: i64| x.checked_abs().ok_or("integer overflow in abs")),
        ScalarUdf::from_fn("abs", |x: Decimal| x.abs()),
        ScalarUdf::from_fn("abs", |x: f64| x.abs()),
        ScalarUdf::from_fn("substr", |s: String, pos: i32| substr(&s, pos, None)),
        ScalarUdf::from_fn("substr", |s: String, pos: i32, len: i32| {
            substr(&s, pos, Some(len))
        }),
        ScalarUdf::dynamic(
            "concat",
            vec![SemanticType::String],
            SemanticType::String,
            Arity::Variadic { min: 1 },
            concat,
        ),
        ScalarUdf::from_fn("rand", || rand::random::<f64>()).map(ScalarUdf::non_deterministic),
        ScalarUdf::from_fn("rand", |seed: i64| {
            rand::rngs::StdRng::seed_from_u64(seed as u64).r#gen::<f64>()
        })
        .map(ScalarUdf::non_deterministic),
    ]
}

/// 1-based substring. `pos` 0 behaves like 1, negative `pos` counts from the end.
fn substr(s: &str, pos: i32, len: Option<i32>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let total = chars.len() as i64;
    let pos = i64::from(pos);

    let start = if pos > 0 {
        pos - 1
    } else if pos < 0 {
        (total + pos).max(0)
    } else {
        0
    };
    let end = match len {
        Some(len) if len <= 0 => return String::new(),
        Some(len) => (start + i64::from(len)).min(total),
        None => total,
    };
    if start >= total || start >= end {
        return String::new();
    }
    chars[start as usize..end as usize].iter().collect()
}

fn concat(args: &[Value]) -> DbxResult<Value> {
    let mut out = String::new();
    for arg in args {
        match arg {
            Value::String(s) => out.push_str(s),
            other => {
                return Err(DbxError::TypeMismatch {
                    expected: "STRING".to_string(),
                    actual: other.semantic_type().to_string(),
                });
            }
        }
    }
    Ok(Value::String(out))
}
