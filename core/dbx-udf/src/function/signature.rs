//! 함수 시그니처
//!
//! 이름, 파라미터 타입, 반환 타입, arity 클래스

use crate::error::{DbxError, DbxResult};
use crate::types::SemanticType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Practical ceiling on declared parameters, matching host function-object limits.
pub const MAX_PARAMS: usize = 22;

/// Arity 클래스
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arity {
    /// Exactly N arguments
    Fixed(usize),
    /// At least `min` arguments; extra arguments take the last parameter's type
    Variadic { min: usize },
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => count == *n,
            Arity::Variadic { min } => count >= *min,
        }
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self, Arity::Variadic { .. })
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{n}"),
            Arity::Variadic { min } => write!(f, "at least {min}"),
        }
    }
}

/// 함수 시그니처
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<SemanticType>,
    pub return_type: SemanticType,
    pub arity: Arity,
}

impl FunctionSignature {
    /// Fixed-arity signature. Fails with `SignatureInference` on an invalid shape.
    pub fn new(
        name: impl Into<String>,
        params: Vec<SemanticType>,
        return_type: SemanticType,
    ) -> DbxResult<Self> {
        let arity = Arity::Fixed(params.len());
        Self::with_arity(name, params, return_type, arity)
    }

    /// Variadic signature: `params` is the required prefix, its last type repeats.
    pub fn variadic(
        name: impl Into<String>,
        params: Vec<SemanticType>,
        return_type: SemanticType,
    ) -> DbxResult<Self> {
        let arity = Arity::Variadic { min: params.len() };
        Self::with_arity(name, params, return_type, arity)
    }

    pub fn with_arity(
        name: impl Into<String>,
        params: Vec<SemanticType>,
        return_type: SemanticType,
        arity: Arity,
    ) -> DbxResult<Self> {
        let signature = Self {
            name: name.into(),
            params,
            return_type,
            arity,
        };
        signature.validate()?;
        Ok(signature)
    }

    fn validate(&self) -> DbxResult<()> {
        if !is_identifier(&self.name) {
            return Err(DbxError::signature(
                &self.name,
                "function name must be a non-empty SQL identifier",
            ));
        }
        if self.params.len() > MAX_PARAMS {
            return Err(DbxError::signature(
                &self.name,
                format!(
                    "{} parameters declared, at most {MAX_PARAMS} are supported",
                    self.params.len()
                ),
            ));
        }
        match self.arity {
            Arity::Fixed(n) if n != self.params.len() => {
                return Err(DbxError::signature(
                    &self.name,
                    format!("arity {n} does not match {} parameter types", self.params.len()),
                ));
            }
            Arity::Variadic { min } if self.params.is_empty() || min > self.params.len() => {
                return Err(DbxError::signature(
                    &self.name,
                    "variadic signature needs a repeated parameter type",
                ));
            }
            _ => {}
        }
        for (i, param) in self.params.iter().enumerate() {
            param
                .validate_for_signature()
                .map_err(|reason| DbxError::signature(&self.name, format!("parameter {}: {reason}", i + 1)))?;
        }
        self.return_type
            .validate_for_signature()
            .map_err(|reason| DbxError::signature(&self.name, format!("return type: {reason}")))
    }

    /// Declared type of the argument at `idx` (0-based).
    pub fn param_type(&self, idx: usize) -> Option<&SemanticType> {
        match self.arity {
            Arity::Fixed(_) => self.params.get(idx),
            Arity::Variadic { .. } => self.params.get(idx).or_else(|| self.params.last()),
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        self.arity.accepts(count)
    }

    pub fn accepts_zero_args(&self) -> bool {
        self.arity.accepts(0)
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        if self.arity.is_variadic() {
            write!(f, "...")?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_signature() {
        let sig = FunctionSignature::new(
            "strLen2",
            vec![SemanticType::String, SemanticType::Integer],
            SemanticType::Integer,
        )
        .unwrap();
        assert!(sig.accepts(2));
        assert!(!sig.accepts(1));
        assert!(!sig.accepts_zero_args());
        assert_eq!(sig.param_type(1), Some(&SemanticType::Integer));
        assert_eq!(sig.param_type(2), None);
        assert_eq!(sig.to_string(), "strLen2(STRING, INT) -> INT");
    }

    #[test]
    fn test_variadic_signature() {
        let sig =
            FunctionSignature::variadic("concat", vec![SemanticType::String], SemanticType::String)
                .unwrap();
        assert!(sig.accepts(1));
        assert!(sig.accepts(5));
        assert!(!sig.accepts(0));
        assert_eq!(sig.param_type(4), Some(&SemanticType::String));
        assert_eq!(sig.to_string(), "concat(STRING...) -> STRING");
    }

    #[test]
    fn test_zero_arity() {
        let sig = FunctionSignature::new("rand", vec![], SemanticType::Double).unwrap();
        assert!(sig.accepts_zero_args());
    }

    #[test]
    fn test_rejects_too_many_params() {
        let params = vec![SemanticType::Integer; MAX_PARAMS + 1];
        let err = FunctionSignature::new("wide", params, SemanticType::Integer).unwrap_err();
        assert!(matches!(err, DbxError::SignatureInference { .. }));

        let params = vec![SemanticType::Integer; MAX_PARAMS];
        assert!(FunctionSignature::new("wide", params, SemanticType::Integer).is_ok());
    }

    #[test]
    fn test_rejects_unresolved_types() {
        assert!(
            FunctionSignature::new("f", vec![SemanticType::Unresolved], SemanticType::Integer)
                .is_err()
        );
        assert!(FunctionSignature::new("f", vec![], SemanticType::Unresolved).is_err());
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(FunctionSignature::new("", vec![], SemanticType::Integer).is_err());
        assert!(FunctionSignature::new("1abc", vec![], SemanticType::Integer).is_err());
        assert!(FunctionSignature::new("a-b", vec![], SemanticType::Integer).is_err());
        assert!(FunctionSignature::new("_ok_1", vec![], SemanticType::Integer).is_ok());
    }

    #[test]
    fn test_rejects_empty_variadic() {
        assert!(FunctionSignature::variadic("v", vec![], SemanticType::Integer).is_err());
    }
}
