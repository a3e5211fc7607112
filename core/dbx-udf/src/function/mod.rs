//! 스칼라 함수 계층: 시그니처, 콜러블 어댑터, 레지스트리, 내장 카탈로그

pub mod adapter;
pub mod builtin;
pub mod callable;
pub mod registry;
pub mod signature;

pub use adapter::{FromValue, IntoValue, SqlType, struct_member};
pub use builtin::builtin_registry;
pub use callable::{Callable, Fallible, IntoScalarUdf, Plain, ScalarUdf, UdfBody};
pub use registry::FunctionRegistry;
pub use signature::{Arity, FunctionSignature, MAX_PARAMS};
