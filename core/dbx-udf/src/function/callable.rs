//! Callable trait and the scalar UDF adapter
//!
//! 모든 스칼라 함수(사용자 UDF, 내장 함수)의 공통 인터페이스.
//! 호스트 클로저는 등록 시 한 번만 시그니처를 추론하고, 이후에는
//! "정렬된 인자 목록 → 단일 값" 형태의 균일한 본문으로 호출됩니다.
//!
//! Callables may be invoked concurrently from several partitions, so
//! registered functions must be `Send + Sync` and safe to call in parallel.

use crate::error::{DbxError, DbxResult};
use crate::function::adapter::{FromValue, IntoValue, SqlType};
use crate::function::signature::{Arity, FunctionSignature};
use crate::types::{SemanticType, Value};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// 실행 가능한 스칼라 함수의 공통 인터페이스
pub trait Callable: Send + Sync {
    /// 함수 실행. Arguments are already coerced to the declared parameter types.
    fn invoke(&self, args: &[Value]) -> DbxResult<Value>;

    /// 함수 시그니처
    fn signature(&self) -> &FunctionSignature;

    /// 함수 이름
    fn name(&self) -> &str {
        &self.signature().name
    }

    /// Whether constant arguments always produce the same result.
    fn is_deterministic(&self) -> bool {
        true
    }
}

/// Type-erased function body
pub type UdfBody = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Marker for closures returning a plain value
pub struct Plain;

/// Marker for closures returning `Result<T, E>`
pub struct Fallible;

/// Conversion from a typed host closure into an erased scalar UDF body.
///
/// Implemented for `Fn(A1, .., An) -> R` and `Fn(A1, .., An) -> Result<R, E>`
/// with `n` in `0..=22`, where every `Ai: SqlType + FromValue` and
/// `R: SqlType + IntoValue`.
pub trait IntoScalarUdf<Args, Marker>: Send + Sync + 'static {
    fn param_types() -> Vec<SemanticType>;
    fn nullable_params() -> Vec<bool>;
    fn return_type() -> SemanticType;
    fn into_body(self) -> UdfBody;
}

macro_rules! impl_into_scalar_udf {
    ($($arg:ident),*) => {
        impl<Func, Ret, $($arg,)*> IntoScalarUdf<($($arg,)*), Plain> for Func
        where
            Func: Fn($($arg),*) -> Ret + Send + Sync + 'static,
            Ret: SqlType + IntoValue,
            $($arg: SqlType + FromValue,)*
        {
            fn param_types() -> Vec<SemanticType> {
                vec![$($arg::semantic_type()),*]
            }

            fn nullable_params() -> Vec<bool> {
                vec![$($arg::is_nullable()),*]
            }

            fn return_type() -> SemanticType {
                Ret::semantic_type()
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_body(self) -> UdfBody {
                let func = self;
                Arc::new(move |args: &[Value]| -> Result<Value, String> {
                    let mut args = args.iter();
                    $(
                        let $arg = $arg::from_value(
                            args.next().ok_or_else(|| "missing argument".to_string())?,
                        )
                        .map_err(|e| e.to_string())?;
                    )*
                    Ok(func($($arg),*).into_value())
                })
            }
        }

        impl<Func, Ret, Err, $($arg,)*> IntoScalarUdf<($($arg,)*), Fallible> for Func
        where
            Func: Fn($($arg),*) -> Result<Ret, Err> + Send + Sync + 'static,
            Ret: SqlType + IntoValue,
            Err: fmt::Display,
            $($arg: SqlType + FromValue,)*
        {
            fn param_types() -> Vec<SemanticType> {
                vec![$($arg::semantic_type()),*]
            }

            fn nullable_params() -> Vec<bool> {
                vec![$($arg::is_nullable()),*]
            }

            fn return_type() -> SemanticType {
                Ret::semantic_type()
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_body(self) -> UdfBody {
                let func = self;
                Arc::new(move |args: &[Value]| -> Result<Value, String> {
                    let mut args = args.iter();
                    $(
                        let $arg = $arg::from_value(
                            args.next().ok_or_else(|| "missing argument".to_string())?,
                        )
                        .map_err(|e| e.to_string())?;
                    )*
                    func($($arg),*)
                        .map(IntoValue::into_value)
                        .map_err(|e| e.to_string())
                })
            }
        }
    };
}

impl_into_scalar_udf!();
impl_into_scalar_udf!(A1);
impl_into_scalar_udf!(A1, A2);
impl_into_scalar_udf!(A1, A2, A3);
impl_into_scalar_udf!(A1, A2, A3, A4);
impl_into_scalar_udf!(A1, A2, A3, A4, A5);
impl_into_scalar_udf!(A1, A2, A3, A4, A5, A6);
impl_into_scalar_udf!(A1, A2, A3, A4, A5, A6, A7);
impl_into_scalar_udf!(A1, A2, A3, A4, A5, A6, A7, A8);
impl_into_scalar_udf!(A1, A2, A3, A4, A5, A6, A7, A8, A9);
impl_into_scalar_udf!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10);
impl_into_scalar_udf!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11);
impl_into_scalar_udf!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12);
impl_into_scalar_udf!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13);
impl_into_scalar_udf!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14);
impl_into_scalar_udf!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15);
impl_into_scalar_udf!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16);
impl_into_scalar_udf!(
    A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16, A17
);
impl_into_scalar_udf!(
    A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16, A17, A18
);
impl_into_scalar_udf!(
    A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16, A17, A18, A19
);
impl_into_scalar_udf!(
    A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16, A17, A18, A19, A20
);
impl_into_scalar_udf!(
    A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16, A17, A18, A19, A20,
    A21
);
impl_into_scalar_udf!(
    A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16, A17, A18, A19, A20,
    A21, A22
);

/// Scalar UDF (정렬된 인자 목록 → 단일 값)
pub struct ScalarUdf {
    signature: FunctionSignature,
    /// Per declared parameter; variadic tails reuse the last entry.
    nullable_params: Vec<bool>,
    deterministic: bool,
    body: UdfBody,
}

impl ScalarUdf {
    /// 타입이 있는 클로저에서 UDF 생성 (시그니처 자동 추론)
    pub fn from_fn<F, Args, Marker>(name: impl Into<String>, func: F) -> DbxResult<Self>
    where
        F: IntoScalarUdf<Args, Marker>,
    {
        let signature =
            FunctionSignature::new(name, F::param_types(), F::return_type())?;
        Ok(Self {
            signature,
            nullable_params: F::nullable_params(),
            deterministic: true,
            body: func.into_body(),
        })
    }

    /// 명시적 시그니처로 UDF 생성. NULL arguments short-circuit to NULL.
    pub fn dynamic<F>(
        name: impl Into<String>,
        params: Vec<SemanticType>,
        return_type: SemanticType,
        arity: Arity,
        func: F,
    ) -> DbxResult<Self>
    where
        F: Fn(&[Value]) -> DbxResult<Value> + Send + Sync + 'static,
    {
        let signature = FunctionSignature::with_arity(name, params, return_type, arity)?;
        let nullable_params = vec![false; signature.params.len()];
        Ok(Self {
            signature,
            nullable_params,
            deterministic: true,
            body: Arc::new(move |args: &[Value]| func(args).map_err(|e| e.to_string())),
        })
    }

    /// Mark the function as non-deterministic (e.g. `rand`).
    pub fn non_deterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    pub fn return_type(&self) -> &SemanticType {
        &self.signature.return_type
    }

    pub fn arity(&self) -> Arity {
        self.signature.arity
    }

    fn is_nullable(&self, idx: usize) -> bool {
        self.nullable_params
            .get(idx)
            .or_else(|| self.nullable_params.last())
            .copied()
            .unwrap_or(false)
    }

    fn runtime_error(&self, message: impl Into<String>) -> DbxError {
        DbxError::UdfRuntime {
            function: self.signature.name.clone(),
            row: None,
            message: message.into(),
        }
    }
}

impl Callable for ScalarUdf {
    fn invoke(&self, args: &[Value]) -> DbxResult<Value> {
        if !self.signature.accepts(args.len()) {
            return Err(self.runtime_error(format!(
                "expected {} arguments, got {}",
                self.signature.arity,
                args.len()
            )));
        }

        // NULL 전파
        if args
            .iter()
            .enumerate()
            .any(|(i, arg)| arg.is_null() && !self.is_nullable(i))
        {
            return Ok(Value::Null);
        }

        // 함수 실행 — panic도 런타임 에러로 변환
        let result = catch_unwind(AssertUnwindSafe(|| (self.body)(args)))
            .map_err(|payload| self.runtime_error(panic_message(payload.as_ref())))?;

        let value = result.map_err(|message| self.runtime_error(message))?;
        if !value.matches_type(&self.signature.return_type) {
            return Err(self.runtime_error(format!(
                "returned {} but declares {}",
                value.semantic_type(),
                self.signature.return_type
            )));
        }
        Ok(value)
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn is_deterministic(&self) -> bool {
        self.deterministic
    }
}

impl fmt::Debug for ScalarUdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarUdf")
            .field("signature", &self.signature)
            .field("deterministic", &self.deterministic)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
