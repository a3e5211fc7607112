//! 해결된 함수 호출 노드

use crate::error::{AnalysisError, DbxError, DbxResult};
use crate::function::Callable;
use crate::sql::planner::Expr;
use crate::types::{SemanticType, StructField, struct_fields_to_arrow};
use arrow::datatypes::{Field, Fields};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INVOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a resolved call, kept across argument rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvocationId(u64);

impl InvocationId {
    fn next() -> Self {
        InvocationId(NEXT_INVOCATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Typed call of a registered function with coerced arguments.
///
/// The argument count always satisfies the signature's arity; rewrites replace
/// arguments through [`ResolvedInvocation::with_args`], which keeps the id,
/// the name and the return type.
#[derive(Clone)]
pub struct ResolvedInvocation {
    id: InvocationId,
    function: Arc<dyn Callable>,
    args: Vec<Expr>,
}

impl ResolvedInvocation {
    pub fn new(function: Arc<dyn Callable>, args: Vec<Expr>) -> DbxResult<Self> {
        check_arity(function.as_ref(), args.len())?;
        Ok(Self {
            id: InvocationId::next(),
            function,
            args,
        })
    }

    /// Same node with replaced arguments.
    pub fn with_args(&self, args: Vec<Expr>) -> DbxResult<Self> {
        check_arity(self.function.as_ref(), args.len())?;
        Ok(Self {
            id: self.id,
            function: Arc::clone(&self.function),
            args,
        })
    }

    pub fn id(&self) -> InvocationId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.function.name()
    }

    pub fn function(&self) -> &Arc<dyn Callable> {
        &self.function
    }

    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    pub fn return_type(&self) -> &SemanticType {
        &self.function.signature().return_type
    }

    pub fn is_deterministic(&self) -> bool {
        self.function.is_deterministic()
    }

    /// Declared field schema when the function returns a struct.
    pub fn struct_fields(&self) -> Option<&[StructField]> {
        self.return_type().struct_fields()
    }

    /// Struct field schema as Arrow `Fields`, in declaration order.
    pub fn arrow_fields(&self) -> Option<Fields> {
        self.struct_fields().map(struct_fields_to_arrow)
    }

    /// Output field for this call under the given column name.
    pub fn arrow_field(&self, name: &str) -> Field {
        Field::new(name, self.return_type().to_arrow(), true)
    }
}

fn check_arity(function: &dyn Callable, count: usize) -> DbxResult<()> {
    let signature = function.signature();
    if signature.accepts(count) {
        Ok(())
    } else {
        Err(DbxError::Analysis(AnalysisError::WrongArity {
            name: signature.name.clone(),
            expected: signature.arity.to_string(),
            actual: count,
        }))
    }
}

impl PartialEq for ResolvedInvocation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name() == other.name() && self.args == other.args
    }
}

impl fmt::Debug for ResolvedInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedInvocation")
            .field("id", &self.id.0)
            .field("signature", &self.function.signature().to_string())
            .field("args", &self.args)
            .finish()
    }
}
