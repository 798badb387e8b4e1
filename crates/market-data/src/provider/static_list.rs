//! 고정 구성종목 목록.

use std::collections::BTreeSet;

use async_trait::async_trait;
use market_core::SymbolNormalizer;

use super::{FetchError, MembershipSource};

/// DAX 40 공식 구성종목 (Yahoo 형식)
const DAX40: &[&str] = &[
    "ADS.DE", "AIR.DE", "ALV.DE", "BAS.DE", "BAYN.DE", "BEI.DE", "BMW.DE", "BNR.DE", "CON.DE",
    "DB1.DE", "DBK.DE", "DHL.DE", "DTE.DE", "EOAN.DE", "FME.DE", "FRE.DE", "HEI.DE", "HEN3.DE",
    "HFG.DE", "IFX.DE", "LIN.DE", "MBG.DE", "MRK.DE", "MTX.DE", "MUV2.DE", "PAH3.DE", "P911.DE",
    "QIA.DE", "RHM.DE", "RWE.DE", "SAP.DE", "SHL.DE", "SIE.DE", "SRT3.DE", "SY1.DE", "VNA.DE",
    "VOW3.DE", "ZAL.DE", "1COV.DE", "BDT.DE",
];

/// 설정이나 코드에 고정된 구성종목 목록
#[derive(Debug, Clone)]
pub struct StaticListSource {
    name: String,
    symbols: Vec<String>,
    normalizer: SymbolNormalizer,
}

impl StaticListSource {
    pub fn new<I, S>(name: impl Into<String>, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            symbols: symbols.into_iter().map(Into::into).collect(),
            normalizer: SymbolNormalizer::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: SymbolNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// DAX 40 목록
    pub fn dax40() -> Self {
        Self::new("static:dax40", DAX40.iter().copied())
            .with_normalizer(SymbolNormalizer::with_suffix(".DE"))
    }
}

#[async_trait]
impl MembershipSource for StaticListSource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn is_remote(&self) -> bool {
        false
    }

    async fn fetch(&self) -> Result<BTreeSet<String>, FetchError> {
        Ok(self
            .symbols
            .iter()
            .filter_map(|s| self.normalizer.normalize(s))
            .collect())
    }
}
