use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use strum::IntoEnumIterator;

#[cfg(feature = "graphql")]
use async_graphql::{Enum, InputObject, SimpleObject};

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
pub enum StressScenario {
    InflationHigh,
    #[serde(rename = "recession_2025")]
    #[strum(serialize = "recession_2025")]
    Recession2025,
    TechCrash,
    SoftLanding,
}

impl StressScenario {
    pub fn parse(key: &str) -> Result<Self> {
        Self::from_str(key).map_err(|_| Error::not_found(format!("Scenario {}", key)))
    }

    pub fn title(self) -> &'static str {
        match self {
            StressScenario::InflationHigh => "Persistent High Inflation (5%)",
            StressScenario::Recession2025 => "Global Recession 2025",
            StressScenario::TechCrash => "AI / Tech Bubble Burst",
            StressScenario::SoftLanding => "Soft Landing",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StressScenario::InflationHigh => {
                "Inflation stays high and keeps rates up. Growth and consumer names suffer."
            }
            StressScenario::Recession2025 => {
                "Severe economic slowdown. Demand and earnings fall."
            }
            StressScenario::TechCrash => "Massive correction of stretched technology valuations.",
            StressScenario::SoftLanding => {
                "The economy cools without a recession while rates come down gradually."
            }
        }
    }

    /// Broad market move in percent
    pub fn market_impact(self) -> f64 {
        match self {
            StressScenario::InflationHigh => -10.0,
            StressScenario::Recession2025 => -20.0,
            StressScenario::TechCrash => -12.0,
            StressScenario::SoftLanding => 8.0,
        }
    }

    /// Expected move of a sector in percent. Unknown sectors take the
    /// scenario default.
    pub fn sector_impact(self, sector: Option<&str>) -> f64 {
        use StressScenario::*;

        match (self, sector.unwrap_or_default()) {
            (InflationHigh, "Technology") => -15.0,
            (InflationHigh, "Consumer Cyclical") => -10.0,
            (InflationHigh, "Real Estate") => -12.0,
            (InflationHigh, "Financial Services") => 5.0,
            (InflationHigh, "Energy") => 10.0,
            (InflationHigh, "Healthcare") => -2.0,
            (InflationHigh, "Utilities") => -5.0,
            (InflationHigh, "Communication Services") => -10.0,
            (InflationHigh, "Industrials") => -5.0,
            (InflationHigh, "Basic Materials") => 5.0,
            (InflationHigh, _) => -8.0,

            (Recession2025, "Technology") => -20.0,
            (Recession2025, "Consumer Cyclical") => -25.0,
            (Recession2025, "Real Estate") => -15.0,
            (Recession2025, "Financial Services") => -15.0,
            (Recession2025, "Energy") => -20.0,
            (Recession2025, "Healthcare") => 5.0,
            (Recession2025, "Utilities") => 2.0,
            (Recession2025, "Communication Services") => -15.0,
            (Recession2025, "Industrials") => -20.0,
            (Recession2025, "Basic Materials") => -15.0,
            (Recession2025, _) => -15.0,

            (TechCrash, "Technology") => -35.0,
            (TechCrash, "Consumer Cyclical") => -10.0,
            (TechCrash, "Communication Services") => -20.0,
            (TechCrash, "Real Estate") => -5.0,
            (TechCrash, "Financial Services") => -5.0,
            (TechCrash, "Energy") => -2.0,
            (TechCrash, "Healthcare") => 0.0,
            (TechCrash, "Utilities") => 0.0,
            (TechCrash, "Industrials") => -5.0,
            (TechCrash, "Basic Materials") => -2.0,
            (TechCrash, _) => -5.0,

            (SoftLanding, "Technology") => 10.0,
            (SoftLanding, "Consumer Cyclical") => 8.0,
            (SoftLanding, "Real Estate") => 15.0,
            (SoftLanding, "Financial Services") => 5.0,
            (SoftLanding, "Energy") => -5.0,
            (SoftLanding, "Healthcare") => 5.0,
            (SoftLanding, "Utilities") => 8.0,
            (SoftLanding, "Communication Services") => 8.0,
            (SoftLanding, "Industrials") => 5.0,
            (SoftLanding, "Basic Materials") => 5.0,
            (SoftLanding, _) => 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct ScenarioInfo {
    pub id: StressScenario,
    pub name: String,
    pub description: String,
    pub market_impact: f64,
}

pub fn scenarios() -> Vec<ScenarioInfo> {
    StressScenario::iter()
        .map(|id| ScenarioInfo {
            id,
            name: id.title().to_string(),
            description: id.description().to_string(),
            market_impact: id.market_impact(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(InputObject))]
pub struct RiskHolding {
    pub symbol: String,
    pub sector: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct HoldingImpact {
    pub symbol: String,
    pub current: f64,
    pub projected: f64,
    pub change: f64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    pub scenario: String,
    pub description: String,
    pub current_value: f64,
    pub projected_value: f64,
    pub projected_change: f64,
    pub projected_change_percent: f64,
    pub worst_hit: Option<HoldingImpact>,
    pub best_performer: Option<HoldingImpact>,
    /// Ordered from the worst hit to the best performer
    pub holdings_impact: Vec<HoldingImpact>,
}

/// Project every holding through the sector moves of `scenario`
pub fn analyze(holdings: &[RiskHolding], scenario: StressScenario) -> RiskAnalysis {
    let mut impacts: Vec<HoldingImpact> = holdings
        .iter()
        .map(|holding| {
            let change_percent = scenario.sector_impact(holding.sector.as_deref());
            let projected = holding.value * (1.0 + change_percent / 100.0);
            HoldingImpact {
                symbol: holding.symbol.clone(),
                current: holding.value,
                projected,
                change: projected - holding.value,
                change_percent,
            }
        })
        .collect();

    impacts.sort_by(|a, b| {
        a.change_percent
            .partial_cmp(&b.change_percent)
            .unwrap_or(Ordering::Equal)
    });

    let current_value: f64 = holdings.iter().map(|h| h.value).sum();
    let projected_value: f64 = impacts.iter().map(|i| i.projected).sum();
    let projected_change = projected_value - current_value;

    RiskAnalysis {
        scenario: scenario.title().to_string(),
        description: scenario.description().to_string(),
        current_value,
        projected_value,
        projected_change,
        projected_change_percent: if current_value > 0.0 {
            projected_change / current_value * 100.0
        } else {
            0.0
        },
        worst_hit: impacts.first().cloned(),
        best_performer: impacts.last().cloned(),
        holdings_impact: impacts,
    }
}
