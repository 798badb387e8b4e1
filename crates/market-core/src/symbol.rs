//! 심볼 정규화.
//!
//! 데이터 소스마다 표기가 다릅니다 (Wikipedia `BRK.B`, Yahoo `BRK-B`,
//! DAX 목록 `ADS` vs `ADS.DE`). 집합 연산 전에 모든 소스가 같은 규칙으로
//! 정규화해야 매 실행마다 가짜 추가/삭제가 생기지 않습니다.

use serde::{Deserialize, Serialize};

/// 심볼 정규화 규칙.
///
/// 적용 순서:
/// 1. 각주 표기(`[1]`, `*`) 제거 후 trim, 안쪽 공백이 남으면 심볼 아님
/// 2. 대문자 변환
/// 3. 거래소 접미사 제거 → 주식 클래스 구분자 치환 → 접미사 재부착
///
/// `normalize(normalize(s)) == normalize(s)`가 항상 성립합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolNormalizer {
    /// `.`을 대체할 주식 클래스 구분자 (Yahoo 형식은 `-`)
    #[serde(default)]
    pub share_class_separator: Option<char>,
    /// 거래소 접미사 (예: ".DE")
    #[serde(default)]
    pub exchange_suffix: Option<String>,
}

impl SymbolNormalizer {
    /// 미국 주식용 규칙 (`BRK.B` → `BRK-B`)
    pub fn yahoo_us() -> Self {
        Self {
            share_class_separator: Some('-'),
            exchange_suffix: None,
        }
    }

    /// 거래소 접미사를 붙이는 규칙 (`ADS` → `ADS.DE`)
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            share_class_separator: None,
            exchange_suffix: Some(suffix.into().to_ascii_uppercase()),
        }
    }

    /// 원시 문자열을 정규화. 심볼로 볼 수 없는 값이면 `None`.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let stripped = strip_footnotes(raw);
        // 안쪽 공백이 남은 값("BRK B")은 is_symbol_char에서 거부됨
        let mut cleaned = stripped.trim().to_ascii_uppercase();
        if cleaned.is_empty() || !cleaned.chars().all(is_symbol_char) {
            return None;
        }

        let suffix = self
            .exchange_suffix
            .as_deref()
            .map(|s| s.to_ascii_uppercase());

        if let Some(suffix) = suffix.as_deref() {
            if let Some(stripped) = cleaned.strip_suffix(suffix) {
                cleaned = stripped.to_string();
            }
        }

        if let Some(sep) = self.share_class_separator {
            cleaned = cleaned.replace('.', &sep.to_string());
        }

        if cleaned.is_empty() {
            return None;
        }

        if let Some(suffix) = suffix {
            cleaned.push_str(&suffix);
        }

        Some(cleaned)
    }
}

/// 대괄호 각주와 `*`를 제거
fn strip_footnotes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            '*' => {}
            c => out.push(c),
        }
    }
    out
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=' | '/' | '&')
}
