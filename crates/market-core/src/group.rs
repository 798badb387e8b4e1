//! 자산 그룹 (지수) 식별자.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 자산 그룹 라벨 (예: "sp500", "nasdaq100", "dax").
///
/// 비어 있지 않은 소문자 ASCII 식별자이며 `[a-z0-9_-]`만 허용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetGroup(String);

impl AssetGroup {
    /// 검증 후 그룹 생성. 대문자는 소문자로 변환합니다.
    pub fn new(id: impl AsRef<str>) -> Result<Self, CoreError> {
        let raw = id.as_ref().trim();
        let id = raw.to_ascii_lowercase();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !valid {
            return Err(CoreError::InvalidGroup(raw.to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetGroup {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AssetGroup {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AssetGroup> for String {
    fn from(group: AssetGroup) -> Self {
        group.0
    }
}

impl AsRef<str> for AssetGroup {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
