//! 구성종목 스냅샷.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::group::AssetGroup;

/// 외부 소스가 현재 그룹에 속한다고 말하는 심볼 집합.
///
/// 실행마다 새로 만들어지며 저장되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    pub group: AssetGroup,
    /// 정규화된 심볼 (정렬됨, 중복 없음)
    pub symbols: BTreeSet<String>,
    /// 소스 설명 (URL, 파일 경로 등)
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl MembershipSnapshot {
    pub fn new(group: AssetGroup, symbols: BTreeSet<String>, source: impl Into<String>) -> Self {
        Self {
            group,
            symbols,
            source: source.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }
}
