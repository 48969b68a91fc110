use crate::error::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use strum::IntoEnumIterator;

#[cfg(feature = "graphql")]
use async_graphql::{Enum, SimpleObject};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FundCategory {
    BitcoinEtf,
    MsciWorld,
    Sp500,
    EmergingMarkets,
    EuroStoxx50,
    GlobalAggregateBond,
    GoldEtf,
}

impl FundCategory {
    pub fn label(self) -> &'static str {
        match self {
            FundCategory::BitcoinEtf => "Bitcoin ETFs",
            FundCategory::MsciWorld => "MSCI World",
            FundCategory::Sp500 => "S&P 500",
            FundCategory::EmergingMarkets => "Emerging Markets",
            FundCategory::EuroStoxx50 => "EURO STOXX 50",
            FundCategory::GlobalAggregateBond => "Global Aggregate Bonds",
            FundCategory::GoldEtf => "Gold ETC/ETF",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct FundCategoryInfo {
    pub id: FundCategory,
    pub label: String,
}

pub fn categories() -> Vec<FundCategoryInfo> {
    FundCategory::iter()
        .map(|id| FundCategoryInfo {
            id,
            label: id.label().to_string(),
        })
        .collect()
}

/// A fund as reported by a data backend. Every field except the name is
/// optional since backends differ in coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct FundRecord {
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    pub name: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub domicile: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub aum_millions: Option<f64>,
    /// TER in percent
    #[serde(default)]
    pub expense_ratio: Option<f64>,
    #[serde(default)]
    pub replication: Option<String>,
    #[serde(default)]
    pub distributing: Option<bool>,
    #[serde(default)]
    pub inception_date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub y1: Option<f64>,
    #[serde(default)]
    pub y3: Option<f64>,
    #[serde(default)]
    pub y5: Option<f64>,
    #[serde(default)]
    pub ytd: Option<f64>,
    #[serde(default)]
    pub tracking_difference: Option<f64>,
    #[serde(default)]
    pub volatility_y1: Option<f64>,
    /// Overwritten with the requested category when ranking
    #[serde(default)]
    pub category: Option<FundCategory>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub data_source: Option<String>,
}

impl FundRecord {
    pub fn seed(
        category: FundCategory,
        name: &str,
        symbol: &str,
        provider: &str,
        expense_ratio: f64,
    ) -> Self {
        Self {
            isin: None,
            symbol: Some(symbol.to_string()),
            name: name.to_string(),
            provider: Some(provider.to_string()),
            domicile: None,
            currency: None,
            aum_millions: None,
            expense_ratio: Some(expense_ratio),
            replication: None,
            distributing: None,
            inception_date: None,
            url: None,
            y1: None,
            y3: None,
            y5: None,
            ytd: None,
            tracking_difference: None,
            volatility_y1: None,
            category: Some(category),
            score: None,
            data_source: Some("seed".to_string()),
        }
    }

    /// Identity used to merge the same fund reported by several backends
    pub fn dedupe_key(&self) -> String {
        self.isin
            .as_deref()
            .filter(|isin| !isin.is_empty())
            .or_else(|| self.symbol.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.name)
            .to_lowercase()
    }
}

/// A backend able to list the funds of a category
#[async_trait]
pub trait FundSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, category: FundCategory) -> Result<Vec<FundRecord>>;
}

/// Well known funds used when no backend has data
pub fn seed_funds(category: FundCategory) -> Vec<FundRecord> {
    use FundCategory::*;

    let seeds: &[(&str, &str, &str, f64)] = match category {
        BitcoinEtf => &[
            ("iShares Bitcoin Trust", "IBIT", "iShares", 0.25),
            ("Fidelity Wise Origin Bitcoin Fund", "FBTC", "Fidelity", 0.25),
            ("Vanguard Bitcoin ETF", "HODL", "Vanguard", 0.25),
        ],
        MsciWorld => &[
            ("iShares Core MSCI World UCITS ETF", "IWDA", "iShares", 0.20),
            ("Vanguard FTSE Developed World UCITS ETF", "VEVE", "Vanguard", 0.12),
            ("Xtrackers MSCI World UCITS ETF", "XDWD", "Xtrackers", 0.19),
        ],
        Sp500 => &[
            ("Vanguard S&P 500 UCITS ETF", "VUSA", "Vanguard", 0.07),
            ("iShares Core S&P 500 UCITS ETF", "CSPX", "iShares", 0.07),
        ],
        EmergingMarkets => &[
            ("iShares Core MSCI EM IMI UCITS ETF", "EIMI", "iShares", 0.18),
            ("Vanguard FTSE EM UCITS ETF", "VFEM", "Vanguard", 0.22),
        ],
        EuroStoxx50 => &[("iShares EURO STOXX 50 UCITS ETF", "EUN2", "iShares", 0.10)],
        GlobalAggregateBond => &[(
            "iShares Core Global Aggregate Bond UCITS ETF",
            "AGGH",
            "iShares",
            0.10,
        )],
        GoldEtf => &[("iShares Physical Gold ETC", "SGLN", "iShares", 0.15)],
    };

    seeds
        .iter()
        .map(|(name, symbol, provider, ter)| FundRecord::seed(category, name, symbol, provider, *ter))
        .collect()
}

fn trim_opt(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

pub fn normalize(records: Vec<FundRecord>) -> Vec<FundRecord> {
    records
        .into_iter()
        .map(|mut record| {
            record.name = record.name.trim().to_string();
            record.provider = trim_opt(record.provider);
            record.expense_ratio = record.expense_ratio.filter(|ter| ter.is_finite());
            record.aum_millions = record.aum_millions.filter(|aum| aum.is_finite());
            record
        })
        .collect()
}

/// Drop later records whose isin, symbol or name (first one present,
/// case-insensitive) was already seen
pub fn dedupe(records: Vec<FundRecord>) -> Vec<FundRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.dedupe_key()))
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Heuristic score: cheap, well performing, tightly tracking, calm and
/// large funds rank first
pub fn score_fund(fund: &FundRecord) -> f64 {
    let ter = fund.expense_ratio.unwrap_or(0.5);
    let y1 = fund.y1.unwrap_or(0.0);
    let y3 = fund.y3.unwrap_or(0.0);
    let y5 = fund.y5.unwrap_or(0.0);
    let tracking = fund.tracking_difference.unwrap_or(0.0);
    let volatility = fund.volatility_y1.unwrap_or(0.0);
    let aum = fund.aum_millions.unwrap_or(0.0);

    let ter_score = (100.0 - ter * 100.0).max(0.0);
    let perf_score = y1 * 0.3 + y3 * 0.35 + y5 * 0.35;
    let tracking_score = (100.0 - tracking.max(0.0) * 100.0).max(0.0);
    let volatility_score = (100.0 - volatility * 10.0).max(0.0);
    let aum_score = (aum.max(1.0).log10() * 20.0).min(100.0);

    round2(
        ter_score * 0.25
            + perf_score * 0.45
            + tracking_score * 0.15
            + volatility_score * 0.05
            + aum_score * 0.10,
    )
}

/// Highest score first, at most `limit` entries
pub fn rank(records: Vec<FundRecord>, limit: usize) -> Vec<FundRecord> {
    let mut scored: Vec<FundRecord> = records
        .into_iter()
        .map(|mut record| {
            record.score = Some(score_fund(&record));
            record
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .unwrap_or(0.0)
            .partial_cmp(&a.score.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}

/// Query every backend at once, add the seed list, then merge and rank.
/// A failing backend contributes nothing.
pub async fn rank_funds(
    sources: &[Arc<dyn FundSource>],
    category: FundCategory,
    limit: usize,
) -> Vec<FundRecord> {
    let fetched = join_all(sources.iter().map(|source| async move {
        match source.fetch(category).await {
            Ok(records) => {
                log::debug!(
                    "{} returned {} funds for {}",
                    source.name(),
                    records.len(),
                    category
                );
                records
            }
            Err(err) => {
                log::warn!("Fund source {} failed for {}: {}", source.name(), category, err);
                Vec::new()
            }
        }
    }))
    .await;

    let all: Vec<FundRecord> = fetched
        .into_iter()
        .flatten()
        .chain(seed_funds(category))
        .map(|mut record| {
            record.category = Some(category);
            record
        })
        .collect();

    rank(dedupe(normalize(all)), limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::str::FromStr;

    struct StaticSource(Vec<FundRecord>);

    #[async_trait]
    impl FundSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(&self, _category: FundCategory) -> Result<Vec<FundRecord>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl FundSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch(&self, _category: FundCategory) -> Result<Vec<FundRecord>> {
            Err(Error::external("broken", "connection refused"))
        }
    }

    #[test]
    fn test_categories() {
        let all = categories();
        assert_eq!(all.len(), 7);
        assert_eq!(all[1].id, FundCategory::MsciWorld);
        assert_eq!(all[1].label, "MSCI World");
        assert_eq!(FundCategory::from_str("euro_stoxx_50").unwrap(), FundCategory::EuroStoxx50);
        assert_eq!(FundCategory::Sp500.to_string(), "sp500");
    }

    #[test]
    fn test_score_fund() {
        let ibit = &seed_funds(FundCategory::BitcoinEtf)[0];
        assert!((score_fund(ibit) - 38.75).abs() < 1e-9);

        let mut rich = FundRecord::seed(FundCategory::Sp500, "Big", "BIG", "X", 0.1);
        rich.aum_millions = Some(10_000.0);
        rich.y1 = Some(10.0);
        rich.y3 = Some(10.0);
        rich.y5 = Some(10.0);
        // 90*.25 + 10*.45 + 100*.15 + 100*.05 + 80*.10
        assert!((score_fund(&rich) - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_dedupe_prefers_first_and_isin() {
        let mut a = FundRecord::seed(FundCategory::Sp500, "A", "CSPX", "x", 0.07);
        a.data_source = Some("backend".into());
        let b = FundRecord::seed(FundCategory::Sp500, "B", "cspx", "y", 0.07);
        let mut c = FundRecord::seed(FundCategory::Sp500, "C", "CSPX", "z", 0.07);
        c.isin = Some("IE00B5BMR087".into());

        let unique = dedupe(vec![a, b, c]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].data_source.as_deref(), Some("backend"));
        assert_eq!(unique[1].name, "C");
    }

    #[tokio::test]
    async fn test_rank_funds_merges_sources_and_seeds() {
        let mut cheap = FundRecord::seed(FundCategory::GoldEtf, "  Cheap Gold  ", "GLDX", "Acme", 0.0);
        cheap.category = None;
        cheap.data_source = Some("static".into());

        let sources: Vec<Arc<dyn FundSource>> =
            vec![Arc::new(BrokenSource), Arc::new(StaticSource(vec![cheap]))];

        let ranked = rank_funds(&sources, FundCategory::GoldEtf, 10).await;
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "Cheap Gold");
        assert_eq!(ranked[0].category, Some(FundCategory::GoldEtf));
        assert!(ranked[0].score.unwrap() > ranked[1].score.unwrap());
        assert_eq!(ranked[1].symbol.as_deref(), Some("SGLN"));

        let limited = rank_funds(&sources, FundCategory::GoldEtf, 1).await;
        assert_eq!(limited.len(), 1);
    }
}
