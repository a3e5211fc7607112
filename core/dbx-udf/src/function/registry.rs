//! Function registry
//!
//! 이름 → 시그니처 목록. 사용자 UDF는 이름당 하나의 시그니처만 가지며(마지막 등록 우선),
//! 내장 카탈로그는 arity 오버로딩을 위해 같은 이름에 여러 시그니처를 둘 수 있습니다.

use crate::error::DbxResult;
use crate::function::callable::{Callable, IntoScalarUdf, ScalarUdf};
use crate::function::signature::FunctionSignature;
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// 세션 단위 함수 레지스트리
pub struct FunctionRegistry {
    /// 등록된 함수들 (정규화된 이름 → 시그니처 목록)
    functions: RwLock<AHashMap<String, Vec<Arc<dyn Callable>>>>,
    case_sensitive: bool,
}

impl FunctionRegistry {
    /// Case-insensitive registry
    pub fn new() -> Self {
        Self::with_case_sensitivity(false)
    }

    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        Self {
            functions: RwLock::new(AHashMap::new()),
            case_sensitive,
        }
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn key(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    /// Callable 등록. An existing entry under the same name is replaced.
    pub fn register(&self, callable: Arc<dyn Callable>) {
        let key = self.key(callable.name());
        let signature = callable.signature().to_string();
        let previous = self.functions.write().insert(key, vec![callable]);

        match previous {
            Some(old) => tracing::debug!(
                function = %signature,
                replaced = old.len(),
                "replaced function registration"
            ),
            None => tracing::debug!(function = %signature, "registered function"),
        }
    }

    /// 타입이 있는 클로저 등록 (시그니처 자동 추론)
    pub fn register_fn<F, Args, Marker>(&self, name: &str, func: F) -> DbxResult<()>
    where
        F: IntoScalarUdf<Args, Marker>,
    {
        let udf = ScalarUdf::from_fn(name, func)?;
        self.register(Arc::new(udf));
        Ok(())
    }

    /// 같은 이름에 시그니처 추가 (arity 오버로딩)
    pub fn register_overload(&self, callable: Arc<dyn Callable>) {
        let key = self.key(callable.name());
        tracing::debug!(function = %callable.signature(), "registered overload");
        self.functions.write().entry(key).or_default().push(callable);
    }

    /// 이름으로 조회. Returns every signature registered under the name.
    pub fn lookup(&self, name: &str) -> Option<Vec<Arc<dyn Callable>>> {
        self.functions.read().get(&self.key(name)).cloned()
    }

    /// 등록 해제
    pub fn deregister(&self, name: &str) -> bool {
        let removed = self.functions.write().remove(&self.key(name)).is_some();
        if removed {
            tracing::debug!(function = name, "deregistered function");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.read().contains_key(&self.key(name))
    }

    /// 등록된 함수 이름 목록 (정렬됨)
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .read()
            .values()
            .filter_map(|entries| entries.first().map(|c| c.name().to_string()))
            .collect();
        names.sort_by_key(|n| n.to_lowercase());
        names
    }

    pub fn signatures(&self, name: &str) -> Vec<FunctionSignature> {
        self.lookup(name)
            .map(|entries| entries.iter().map(|c| c.signature().clone()).collect())
            .unwrap_or_default()
    }

    /// All signatures, ordered by name then arity.
    pub fn describe(&self) -> Vec<FunctionSignature> {
        let mut all: Vec<FunctionSignature> = self
            .functions
            .read()
            .values()
            .flat_map(|entries| entries.iter().map(|c| c.signature().clone()))
            .collect();
        all.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.params.len().cmp(&b.params.len()))
        });
        all
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.functions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.read().is_empty()
    }

    pub fn clear(&self) {
        self.functions.write().clear();
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .field("case_sensitive", &self.case_sensitive)
            .finish()
    }
}
