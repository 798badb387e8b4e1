//! Wikipedia 구성종목 표 수집기.
//!
//! 지수 문서 (예: "List of S&P 500 companies", "Nasdaq-100", "DAX")의 HTML 표 중
//! 헤더에 지정한 컬럼명이 있는 첫 표에서 해당 컬럼 값을 읽습니다.
//!
//! ```rust,ignore
//! let source = WikipediaTableSource::new(
//!     client,
//!     "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies",
//!     vec!["Symbol".to_string()],
//!     SymbolNormalizer::yahoo_us(),
//! );
//! let symbols = source.fetch().await?;
//! ```

use std::collections::BTreeSet;

use async_trait::async_trait;
use market_core::SymbolNormalizer;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{FetchError, MembershipSource};

/// Wikipedia 표 기반 구성종목 소스
#[derive(Debug, Clone)]
pub struct WikipediaTableSource {
    client: reqwest::Client,
    url: String,
    /// 심볼 컬럼 후보 헤더 (대소문자 무시)
    columns: Vec<String>,
    /// 특정 표만 사용 (문서 내 0부터 시작하는 순서)
    table_index: Option<usize>,
    normalizer: SymbolNormalizer,
}

impl WikipediaTableSource {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        columns: Vec<String>,
        normalizer: SymbolNormalizer,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            columns,
            table_index: None,
            normalizer,
        }
    }

    pub fn with_table_index(mut self, index: Option<usize>) -> Self {
        self.table_index = index;
        self
    }
}

#[async_trait]
impl MembershipSource for WikipediaTableSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<BTreeSet<String>, FetchError> {
        let html = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let raw = parse_symbol_column(&html, &self.columns, self.table_index)?;
        let symbols: BTreeSet<String> = raw
            .iter()
            .filter_map(|cell| self.normalizer.normalize(cell))
            .collect();

        debug!(url = %self.url, cells = raw.len(), symbols = symbols.len(), "표 파싱 완료");
        Ok(symbols)
    }
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Parse(format!("selector '{}': {}", css, e)))
}

/// 헤더 텍스트 비교용 정리 (각주 제거, 공백 정리, 소문자)
fn header_key(text: &str) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            c => out.push(c),
        }
    }
    out.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// HTML 문서에서 심볼 컬럼 값을 추출.
///
/// 후보 컬럼명 중 하나를 헤더에 가진 첫 표를 사용합니다. `table_index`가
/// 주어지면 그 표만 검사합니다. 맞는 표가 없으면 `FetchError::Parse`.
pub fn parse_symbol_column(
    html: &str,
    columns: &[String],
    table_index: Option<usize>,
) -> Result<Vec<String>, FetchError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let header_sel = selector("th")?;
    let cell_sel = selector("th, td")?;

    let wanted: Vec<String> = columns.iter().map(|c| header_key(c)).collect();

    for (index, table) in document.select(&table_sel).enumerate() {
        if table_index.is_some_and(|i| i != index) {
            continue;
        }

        let mut rows = table.select(&row_sel);
        let Some(header_row) = rows.by_ref().find(|r| r.select(&header_sel).next().is_some())
        else {
            continue;
        };

        let headers: Vec<String> = header_row
            .select(&cell_sel)
            .map(|c| header_key(&cell_text(&c)))
            .collect();
        let Some(column) = headers.iter().position(|h| wanted.contains(h)) else {
            continue;
        };

        let values: Vec<String> = rows
            .filter_map(|row| row.select(&cell_sel).nth(column))
            .map(|cell| cell_text(&cell))
            .filter(|text| !text.is_empty())
            .collect();

        if !values.is_empty() {
            return Ok(values);
        }
    }

    Err(FetchError::Parse(format!(
        "컬럼 {:?}을(를) 가진 표를 찾을 수 없음",
        columns
    )))
}
