//! 로깅 초기화
//!
//! 라이브러리 자체는 `tracing` 이벤트만 발생시키고 subscriber는 설치하지 않습니다.
//! 등록/해석/재작성 이벤트는 `dbx_udf` target 아래에 기록됩니다.
//!
//! 필터 우선순위: `DBX_UDF_LOG` → `RUST_LOG` → 인자로 받은 기본값.

/// 필터 지시어를 읽는 환경 변수
pub const LOG_ENV: &str = "DBX_UDF_LOG";

/// Default directive: session lifecycle at info, everything else quiet.
pub const DEFAULT_DIRECTIVE: &str = "warn,dbx_udf=info";

#[cfg(feature = "logging")]
mod subscriber {
    use super::LOG_ENV;
    use tracing_subscriber::{EnvFilter, fmt};

    pub(super) fn filter(fallback: &str) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(fallback))
    }

    pub(super) fn install(filter: EnvFilter, for_tests: bool) -> bool {
        let builder = fmt().with_env_filter(filter).with_target(true);
        if for_tests {
            builder.with_test_writer().try_init().is_ok()
        } else {
            builder
                .with_thread_ids(true)
                .with_line_number(true)
                .try_init()
                .is_ok()
        }
    }
}

/// Install a fmt subscriber with [`DEFAULT_DIRECTIVE`].
///
/// ```rust
/// dbx_udf::logging::init();
/// ```
pub fn init() -> bool {
    init_with_directive(DEFAULT_DIRECTIVE)
}

/// Install a fmt subscriber. Returns `false` when a global subscriber already exists
/// or the `logging` feature is off.
///
/// ```rust
/// dbx_udf::logging::init_with_directive("dbx_udf=trace");
/// ```
#[cfg(feature = "logging")]
pub fn init_with_directive(fallback: &str) -> bool {
    subscriber::install(subscriber::filter(fallback), false)
}

#[cfg(not(feature = "logging"))]
pub fn init_with_directive(_fallback: &str) -> bool {
    false
}

/// 테스트용: debug 레벨, libtest 출력 캡처 사용
#[cfg(feature = "logging")]
pub fn init_test() -> bool {
    subscriber::install(subscriber::filter("dbx_udf=debug"), true)
}

#[cfg(not(feature = "logging"))]
pub fn init_test() -> bool {
    false
}
