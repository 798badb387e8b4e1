//! 로컬 파일 구성종목 목록.
//!
//! 한 줄에 하나씩 (쉼표 구분도 허용), `#` 이후는 주석입니다.

use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;
use market_core::SymbolNormalizer;

use super::{FetchError, MembershipSource};

#[derive(Debug, Clone)]
pub struct FileListSource {
    path: PathBuf,
    normalizer: SymbolNormalizer,
}

impl FileListSource {
    pub fn new(path: impl Into<PathBuf>, normalizer: SymbolNormalizer) -> Self {
        Self {
            path: path.into(),
            normalizer,
        }
    }
}

/// 파일 내용에서 심볼 추출
pub fn parse_symbol_list(content: &str, normalizer: &SymbolNormalizer) -> BTreeSet<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .flat_map(|line| line.split(','))
        .filter_map(|s| normalizer.normalize(s))
        .collect()
}

#[async_trait]
impl MembershipSource for FileListSource {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn is_remote(&self) -> bool {
        false
    }

    async fn fetch(&self) -> Result<BTreeSet<String>, FetchError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(parse_symbol_list(&content, &self.normalizer))
    }
}
