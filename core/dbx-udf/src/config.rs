//! 세션 설정
//!
//! 기본값 → 설정 파일(JSON) → 환경 변수 순으로 덮어씁니다.

use crate::analyzer::DecimalNarrowing;
use crate::error::{DbxError, DbxResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Handling of runtime failures raised by user functions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UdfErrorPolicy {
    /// 쿼리 중단
    #[default]
    Abort,
    /// 해당 행의 결과를 NULL로 대체 (경고 로그)
    Null,
}

impl fmt::Display for UdfErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UdfErrorPolicy::Abort => write!(f, "abort"),
            UdfErrorPolicy::Null => write!(f, "null"),
        }
    }
}

impl FromStr for UdfErrorPolicy {
    type Err = DbxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(UdfErrorPolicy::Abort),
            "null" => Ok(UdfErrorPolicy::Null),
            other => Err(DbxError::Serialization(format!(
                "unknown UDF error policy '{other}' (expected abort|null)"
            ))),
        }
    }
}

/// 세션 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 함수 이름 대소문자 구분 여부
    pub case_sensitive: bool,
    /// DECIMAL → INT/BIGINT 인자 축소 정책
    pub decimal_narrowing: DecimalNarrowing,
    /// UDF 런타임 에러 처리
    pub on_udf_error: UdfErrorPolicy,
    /// analyze → optimize 반복 상한
    pub max_rewrite_passes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            decimal_narrowing: DecimalNarrowing::Exact,
            on_udf_error: UdfErrorPolicy::Abort,
            max_rewrite_passes: 4,
        }
    }
}

impl SessionConfig {
    pub const ENV_CASE_SENSITIVE: &'static str = "DBX_UDF_CASE_SENSITIVE";
    pub const ENV_DECIMAL_NARROWING: &'static str = "DBX_UDF_DECIMAL_NARROWING";
    pub const ENV_ON_ERROR: &'static str = "DBX_UDF_ON_ERROR";
    pub const ENV_MAX_REWRITE_PASSES: &'static str = "DBX_UDF_MAX_REWRITE_PASSES";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_decimal_narrowing(mut self, policy: DecimalNarrowing) -> Self {
        self.decimal_narrowing = policy;
        self
    }

    pub fn with_udf_error_policy(mut self, policy: UdfErrorPolicy) -> Self {
        self.on_udf_error = policy;
        self
    }

    /// At least one pass always runs.
    pub fn with_max_rewrite_passes(mut self, passes: usize) -> Self {
        self.max_rewrite_passes = passes.max(1);
        self
    }

    /// 환경 변수에서 로드 (설정된 항목만 덮어씀)
    pub fn load_from_env(mut self) -> DbxResult<Self> {
        if let Ok(value) = env::var(Self::ENV_CASE_SENSITIVE) {
            self.case_sensitive = value.eq_ignore_ascii_case("true") || value == "1";
        }
        if let Ok(value) = env::var(Self::ENV_DECIMAL_NARROWING) {
            self.decimal_narrowing = value.parse().map_err(DbxError::Serialization)?;
        }
        if let Ok(value) = env::var(Self::ENV_ON_ERROR) {
            self.on_udf_error = value.parse()?;
        }
        if let Ok(value) = env::var(Self::ENV_MAX_REWRITE_PASSES) {
            let passes: usize = value.parse().map_err(|_| {
                DbxError::Serialization(format!(
                    "{} must be a positive integer, got '{value}'",
                    Self::ENV_MAX_REWRITE_PASSES
                ))
            })?;
            self = self.with_max_rewrite_passes(passes);
        }
        Ok(self)
    }

    /// 파일에서 로드. 누락된 항목은 기본값.
    pub fn load_from_file(path: impl AsRef<Path>) -> DbxResult<Self> {
        let json = fs::read_to_string(path)?;
        let config: SessionConfig = serde_json::from_str(&json)?;
        let passes = config.max_rewrite_passes;
        Ok(config.with_max_rewrite_passes(passes))
    }

    /// 파일에 저장
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> DbxResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;

        // 디렉토리 생성
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(!config.case_sensitive);
        assert_eq!(config.decimal_narrowing, DecimalNarrowing::Exact);
        assert_eq!(config.on_udf_error, UdfErrorPolicy::Abort);
        assert!(config.max_rewrite_passes >= 1);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .with_case_sensitive(true)
            .with_decimal_narrowing(DecimalNarrowing::Truncate)
            .with_udf_error_policy(UdfErrorPolicy::Null)
            .with_max_rewrite_passes(0);
        assert!(config.case_sensitive);
        assert_eq!(config.decimal_narrowing, DecimalNarrowing::Truncate);
        assert_eq!(config.on_udf_error, UdfErrorPolicy::Null);
        assert_eq!(config.max_rewrite_passes, 1);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("NULL".parse::<UdfErrorPolicy>().unwrap(), UdfErrorPolicy::Null);
        assert!("skip".parse::<UdfErrorPolicy>().is_err());
        assert_eq!(UdfErrorPolicy::Abort.to_string(), "abort");
    }

    #[test]
    fn test_file_roundtrip_and_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("session.json");
        let config = SessionConfig::new().with_decimal_narrowing(DecimalNarrowing::Truncate);
        config.save_to_file(&path).unwrap();
        assert_eq!(SessionConfig::load_from_file(&path).unwrap(), config);

        let partial = dir.path().join("partial.json");
        fs::write(&partial, r#"{ "on_udf_error": "null" }"#).unwrap();
        let loaded = SessionConfig::load_from_file(&partial).unwrap();
        assert_eq!(loaded.on_udf_error, UdfErrorPolicy::Null);
        assert_eq!(loaded.decimal_narrowing, DecimalNarrowing::Exact);

        // 파일의 0회도 최소 1회로 보정
        let zero = dir.path().join("zero.json");
        fs::write(&zero, r#"{ "max_rewrite_passes": 0 }"#).unwrap();
        assert_eq!(SessionConfig::load_from_file(&zero).unwrap().max_rewrite_passes, 1);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            SessionConfig::load_from_file("/nonexistent/dbx-udf.json"),
            Err(DbxError::Io { .. })
        ));
    }
}
