//! 지수 구성종목 동기화 Collector.
//!
//! 외부 소스(Wikipedia, 정적 목록, 파일)의 구성종목과 로컬 자산 레지스트리를
//! 비교해 추가/재활성화/비활성화를 멱등적으로 적용합니다.

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::{ReconcileSummary, SymbolFailure, SyncPhase};
