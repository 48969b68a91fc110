use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[cfg(feature = "graphql")]
use async_graphql::{Enum, InputObject, SimpleObject};

pub const UNKNOWN: &str = "Unknown";
pub const INSIGHT_WINDOW_DAYS: u32 = 90;

/// Pearson correlation of the daily returns of two equally long price
/// series, clamped to [-1, 1]. Zero when there is not enough data.
pub fn correlation(prices_a: &[f64], prices_b: &[f64]) -> f64 {
    if prices_a.len() != prices_b.len() || prices_a.len() < 3 {
        return 0.0;
    }

    let returns = |prices: &[f64]| -> Vec<f64> {
        prices
            .windows(2)
            .map(|pair| (pair[1] - pair[0]) / pair[0])
            .collect()
    };
    let returns_a = returns(prices_a);
    let returns_b = returns(prices_b);
    let n = returns_a.len() as f64;

    let mean_a = returns_a.iter().sum::<f64>() / n;
    let mean_b = returns_b.iter().sum::<f64>() / n;

    let (mut covariance, mut variance_a, mut variance_b) = (0.0, 0.0, 0.0);
    for (a, b) in returns_a.iter().zip(&returns_b) {
        let da = a - mean_a;
        let db = b - mean_b;
        covariance += da * db;
        variance_a += da * da;
        variance_b += db * db;
    }

    if variance_a == 0.0 || variance_b == 0.0 {
        return 0.0;
    }

    let value = (covariance / n) / ((variance_a / n) * (variance_b / n)).sqrt();
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    Low,
}

pub fn significance(correlation: f64) -> Level {
    let strength = correlation.abs();
    if strength > 0.7 {
        Level::High
    } else if strength > 0.4 {
        Level::Medium
    } else {
        Level::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(InputObject))]
pub struct PriceSeries {
    pub symbol: String,
    /// Daily closes, oldest first
    pub prices: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct CorrelationPair {
    pub symbol1: String,
    pub symbol2: String,
    pub correlation: f64,
    pub period: String,
    pub significance: Level,
}

/// Every unordered pair of series that carry data
pub fn correlation_matrix(series: &[PriceSeries], period_days: u32) -> Vec<CorrelationPair> {
    let usable: Vec<&PriceSeries> = series.iter().filter(|s| !s.prices.is_empty()).collect();

    let mut pairs = Vec::new();
    for (i, first) in usable.iter().enumerate() {
        for second in &usable[i + 1..] {
            let value = correlation(&first.prices, &second.prices);
            pairs.push(CorrelationPair {
                symbol1: first.symbol.clone(),
                symbol2: second.symbol.clone(),
                correlation: value,
                period: format!("{} days", period_days),
                significance: significance(value),
            });
        }
    }
    pairs
}

/// A holding and its weight as a fraction of the portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(InputObject))]
pub struct WeightedPosition {
    pub symbol: String,
    pub percentage: f64,
    pub sector: Option<String>,
    pub region: Option<String>,
}

impl WeightedPosition {
    fn sector(&self) -> &str {
        self.sector.as_deref().unwrap_or(UNKNOWN)
    }

    fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(UNKNOWN)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct Allocation {
    pub name: String,
    pub percentage: f64,
    pub count: usize,
}

fn allocation<'a>(
    positions: &'a [WeightedPosition],
    group: impl Fn(&'a WeightedPosition) -> &'a str,
) -> Vec<Allocation> {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();

    for position in positions {
        let key = group(position);
        let entry = totals.entry(key).or_insert_with(|| {
            order.push(key);
            (0.0, 0)
        });
        entry.0 += position.percentage;
        entry.1 += 1;
    }

    let mut result: Vec<Allocation> = order
        .into_iter()
        .map(|name| {
            let (percentage, count) = totals[name];
            Allocation {
                name: name.to_string(),
                percentage,
                count,
            }
        })
        .collect();
    result.sort_by(|a, b| b.percentage.partial_cmp(&a.percentage).unwrap_or(Ordering::Equal));
    result
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct ConcentrationRisk {
    pub herfindahl_index: f64,
    pub max_single_holding: f64,
    pub top5_concentration: f64,
    pub risk_level: Level,
}

pub fn concentration_risk(positions: &[WeightedPosition]) -> ConcentrationRisk {
    let mut weights: Vec<f64> = positions.iter().map(|p| p.percentage).collect();
    weights.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    let herfindahl_index: f64 = weights.iter().map(|w| w * w).sum();
    let max_single_holding = weights.first().copied().unwrap_or(0.0);
    let top5_concentration: f64 = weights.iter().take(5).sum();

    let risk_level = if herfindahl_index > 0.25 || max_single_holding > 0.3 || top5_concentration > 0.7 {
        Level::High
    } else if herfindahl_index > 0.15 || max_single_holding > 0.2 || top5_concentration > 0.5 {
        Level::Medium
    } else {
        Level::Low
    };

    ConcentrationRisk {
        herfindahl_index,
        max_single_holding,
        top5_concentration,
        risk_level,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    HighCorrelation,
    LowCorrelation,
    NegativeCorrelation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct CorrelationInsight {
    #[serde(rename = "type")]
    #[cfg_attr(feature = "graphql", graphql(name = "type"))]
    pub insight_type: InsightType,
    pub pairs: Vec<CorrelationPair>,
    pub recommendation: String,
}

pub fn correlation_insights(correlations: &[CorrelationPair]) -> Vec<CorrelationInsight> {
    let pick = |keep: &dyn Fn(f64) -> bool, limit: usize| -> Vec<CorrelationPair> {
        correlations
            .iter()
            .filter(|pair| keep(pair.correlation))
            .take(limit)
            .cloned()
            .collect()
    };

    [
        (
            InsightType::HighCorrelation,
            pick(&|c| c.abs() > 0.7, usize::MAX),
            "Consider reducing exposure to highly correlated assets to improve diversification.",
        ),
        (
            InsightType::LowCorrelation,
            pick(&|c| c.abs() < 0.3, 3),
            "Excellent diversification: these assets have low correlation.",
        ),
        (
            InsightType::NegativeCorrelation,
            pick(&|c| c < -0.3, usize::MAX),
            "Negatively correlated assets provide excellent diversification.",
        ),
    ]
    .into_iter()
    .filter(|(_, pairs, _)| !pairs.is_empty())
    .map(|(insight_type, pairs, recommendation)| CorrelationInsight {
        insight_type,
        pairs,
        recommendation: recommendation.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct DiversificationAnalysis {
    pub sector_allocation: Vec<Allocation>,
    pub region_allocation: Vec<Allocation>,
    pub concentration_risk: ConcentrationRisk,
    pub correlation_insights: Vec<CorrelationInsight>,
}

pub fn analyze_diversification(
    positions: &[WeightedPosition],
    correlations: &[CorrelationPair],
) -> DiversificationAnalysis {
    DiversificationAnalysis {
        sector_allocation: allocation(positions, WeightedPosition::sector),
        region_allocation: allocation(positions, WeightedPosition::region),
        concentration_risk: concentration_risk(positions),
        correlation_insights: correlation_insights(correlations),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "lowercase")]
pub enum RebalanceAction {
    Reduce,
    Increase,
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct Rebalancing {
    #[serde(rename = "type")]
    #[cfg_attr(feature = "graphql", graphql(name = "type"))]
    pub action: RebalanceAction,
    pub symbol: String,
    pub current_weight: f64,
    pub recommended_weight: f64,
    pub reason: String,
}

/// Halve the lighter side of every pair correlated above 0.8 and trim each
/// holding of a sector weighing more than 40 % by a fifth
pub fn rebalancing_recommendations(
    positions: &[WeightedPosition],
    correlations: &[CorrelationPair],
) -> Vec<Rebalancing> {
    let mut recommendations = Vec::new();
    let find = |symbol: &str| positions.iter().find(|p| p.symbol == symbol);

    for pair in correlations.iter().filter(|pair| pair.correlation.abs() > 0.8) {
        if let (Some(first), Some(second)) = (find(&pair.symbol1), find(&pair.symbol2)) {
            let (lighter, other) = if first.percentage > second.percentage {
                (second, first)
            } else {
                (first, second)
            };
            recommendations.push(Rebalancing {
                action: RebalanceAction::Reduce,
                symbol: lighter.symbol.clone(),
                current_weight: lighter.percentage,
                recommended_weight: lighter.percentage * 0.5,
                reason: format!(
                    "High correlation ({:.1}%) with {}",
                    pair.correlation * 100.0,
                    other.symbol
                ),
            });
        }
    }

    for sector in allocation(positions, WeightedPosition::sector)
        .into_iter()
        .filter(|sector| sector.percentage > 0.4)
    {
        for position in positions.iter().filter(|p| p.sector() == sector.name) {
            recommendations.push(Rebalancing {
                action: RebalanceAction::Reduce,
                symbol: position.symbol.clone(),
                current_weight: position.percentage,
                recommended_weight: position.percentage * 0.8,
                reason: format!(
                    "Overweight in sector {} ({:.1}%)",
                    sector.name,
                    sector.percentage * 100.0
                ),
            });
        }
    }

    recommendations
}
