//! 자산 레코드와 자산 유형.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::group::AssetGroup;

/// 자산 분류.
///
/// 생성 시 한 번 지정되며 이후 거의 변경되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// 개별 주식 (구성종목 기본값)
    #[default]
    Stock,
    /// 지수 (^GSPC, ^VIX 등)
    Index,
    /// 원자재 선물 (GC=F 등)
    Commodity,
    /// 환율
    Fx,
    /// 암호화폐
    Crypto,
    /// ETF
    Etf,
}

impl AssetType {
    /// DB 저장용 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::Index => "index",
            Self::Commodity => "commodity",
            Self::Fx => "fx",
            Self::Crypto => "crypto",
            Self::Etf => "etf",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" => Ok(Self::Stock),
            "index" => Ok(Self::Index),
            "commodity" => Ok(Self::Commodity),
            "fx" | "forex" | "currency" => Ok(Self::Fx),
            "crypto" => Ok(Self::Crypto),
            "etf" => Ok(Self::Etf),
            other => Err(CoreError::UnknownAssetType(other.to_string())),
        }
    }
}

/// 자산 레지스트리의 한 행.
///
/// `symbol`은 모든 그룹에 걸쳐 유일합니다. `asset_group`은 대표 그룹이며,
/// 실제 그룹 소속은 멤버십 테이블이 관리합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub symbol: String,
    pub name: Option<String>,
    pub asset_type: AssetType,
    pub asset_group: Option<AssetGroup>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 수동 자산 등록 요청
#[derive(Debug, Clone, Default)]
pub struct NewAsset {
    pub symbol: String,
    pub asset_type: AssetType,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub exchange: Option<String>,
    pub group: Option<AssetGroup>,
}
