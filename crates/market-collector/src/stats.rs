//! 동기화 통계 구조체.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 심볼 단위 처리 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Create,
    Reactivate,
    Deactivate,
}

/// 심볼 하나의 저장 실패 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub phase: SyncPhase,
    pub message: String,
}

/// 그룹 하나의 동기화 결과
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// 그룹에 새로 추가된 심볼 수
    pub added: usize,
    /// 재활성화된 심볼 수
    pub reactivated: usize,
    /// 비활성화된 심볼 수
    pub deactivated: usize,
    /// 변경 없이 유지된 구성종목 수
    pub unchanged: usize,
    /// 심볼 단위 저장 실패
    pub errors: Vec<SymbolFailure>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ReconcileSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// 적용된 변경 수
    pub fn changes(&self) -> usize {
        self.added + self.reactivated + self.deactivated
    }

    /// 실패 기록 추가
    pub fn record_failure(&mut self, symbol: &str, phase: SyncPhase, message: impl Into<String>) {
        self.errors.push(SymbolFailure {
            symbol: symbol.to_string(),
            phase,
            message: message.into(),
        });
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, group: &str) {
        tracing::info!(
            group = group,
            added = self.added,
            reactivated = self.reactivated,
            deactivated = self.deactivated,
            unchanged = self.unchanged,
            errors = self.error_count(),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "구성종목 동기화 완료"
        );
    }
}
