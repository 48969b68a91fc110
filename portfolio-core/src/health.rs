use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[cfg(feature = "graphql")]
use async_graphql::SimpleObject;

/// Raw fundamentals keyed by metric name. Values may be numbers or numeric
/// strings (with thousands separators), as data vendors return both.
pub type MetricMap = HashMap<String, Value>;

const MAX_PROFITABILITY: f64 = 75.0;
const MAX_GROWTH: f64 = 65.0;
const MAX_STABILITY: f64 = 70.0;
const MAX_EFFICIENCY: f64 = 50.0;
const MAX_VALUATION: f64 = 60.0;
const MAX_NOTES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct HealthBreakdown {
    pub profitability: u32,
    pub growth: u32,
    pub stability: u32,
    pub efficiency: u32,
    pub valuation: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct HealthScore {
    pub score: u32,
    pub grade: String,
    pub breakdown: HealthBreakdown,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

fn numeric(value: &Value) -> Option<f64> {
    let parsed: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.replace(',', "").trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// First metric among `names` holding a usable number
fn metric(metrics: &MetricMap, names: &[&str]) -> Option<f64> {
    names
        .iter()
        .find_map(|name| metrics.get(*name).and_then(numeric))
}

/// Ratios may come as fractions (0.23) or percentages (23)
fn as_fraction(value: f64) -> f64 {
    let value = value.abs();
    if value > 1.0 {
        value / 100.0
    } else {
        value
    }
}

/// Growth rates come as percentages, occasionally scaled twice
fn growth_fraction(value: f64) -> f64 {
    let growth = value / 100.0;
    if growth.abs() > 1.0 {
        growth / 100.0
    } else {
        growth
    }
}

/// Points of the first tier whose threshold `value` exceeds
fn tier_above(value: f64, tiers: &[(f64, u32)], otherwise: u32) -> u32 {
    tiers
        .iter()
        .find(|(threshold, _)| value > *threshold)
        .map(|(_, points)| *points)
        .unwrap_or(otherwise)
}

/// Points of the first tier whose threshold `value` stays under
fn tier_below(value: f64, tiers: &[(f64, u32)], otherwise: u32) -> u32 {
    tiers
        .iter()
        .find(|(threshold, _)| value < *threshold)
        .map(|(_, points)| *points)
        .unwrap_or(otherwise)
}

fn percent_of_max(points: u32, max: f64) -> u32 {
    ((points as f64 / max * 100.0).round() as u32).min(100)
}

pub fn grade(score: u32) -> &'static str {
    match score {
        95..=u32::MAX => "A+",
        90..=94 => "A",
        85..=89 => "A-",
        80..=84 => "B+",
        75..=79 => "B",
        70..=74 => "B-",
        65..=69 => "C+",
        60..=64 => "C",
        55..=59 => "C-",
        50..=54 => "D",
        _ => "F",
    }
}

#[derive(Default)]
struct Notes {
    strengths: Vec<String>,
    weaknesses: Vec<String>,
}

impl Notes {
    fn strength(&mut self, note: &str) {
        self.strengths.push(note.to_string());
    }

    fn weakness(&mut self, note: &str) {
        self.weaknesses.push(note.to_string());
    }
}

fn profitability(metrics: &MetricMap, notes: &mut Notes) -> u32 {
    let mut points = 0;

    if let Some(net_margin) = metric(
        metrics,
        &["netProfitMarginTTM", "netProfitMargin", "profitMargin", "netMargin", "netProfitMarginAnnual"],
    ) {
        let margin = as_fraction(net_margin);
        points += tier_above(margin, &[(0.2, 25), (0.1, 20), (0.05, 15), (0.0, 10)], 0);
        if margin > 0.15 {
            notes.strength("High profit margins");
        } else if net_margin < 0.0 {
            notes.weakness("Negative profit margin");
        }
    }

    if let Some(roe) = metric(metrics, &["roeTTM", "roe", "returnOnEquity", "returnOnEquityTTM", "roeAnnual"]) {
        let value = as_fraction(roe);
        points += tier_above(value, &[(0.2, 25), (0.15, 20), (0.1, 15), (0.05, 10)], 0);
        if value > 0.2 {
            notes.strength("Excellent ROE");
        } else if roe < 0.0 {
            notes.weakness("Negative ROE");
        }
    }

    if let Some(roa) = metric(metrics, &["roaTTM", "roa", "returnOnAssets", "returnOnAssetsTTM", "roaAnnual"]) {
        let value = as_fraction(roa);
        points += tier_above(value, &[(0.1, 25), (0.05, 20), (0.0, 15)], 0);
        if value > 0.1 {
            notes.strength("Solid ROA");
        } else if roa < 0.0 {
            notes.weakness("Negative ROA");
        }
    }

    points
}

fn growth(metrics: &MetricMap, quote_change_percent: Option<f64>, notes: &mut Notes) -> u32 {
    let mut points = 0;

    if let Some(revenue) = metric(
        metrics,
        &[
            "revenueGrowthTTM",
            "revenueGrowth",
            "revenueGrowth3Year",
            "revenueGrowthAnnual",
            "salesGrowth",
            "yearlyRevenueGrowth",
            "revenueGrowthRate",
        ],
    ) {
        let growth = growth_fraction(revenue);
        points += tier_above(growth, &[(0.2, 25), (0.1, 20), (0.05, 15), (0.0, 10)], 0);
        if growth > 0.15 {
            notes.strength("Strong revenue growth");
        } else if growth < 0.0 {
            notes.weakness("Declining revenue");
        }
    }

    if let Some(ebitda) = metric(
        metrics,
        &["ebitdaGrowthTTM", "ebitdaGrowth", "yearlyEbitdaGrowth", "operatingIncomeGrowth", "ebitdaGrowthRate"],
    ) {
        let growth = growth_fraction(ebitda);
        points += tier_above(growth, &[(0.2, 25), (0.1, 20), (0.0, 15)], 0);
        if growth > 0.15 {
            notes.strength("Solid EBITDA growth");
        } else if growth < 0.0 {
            notes.weakness("Declining EBITDA");
        }
    }

    if let Some(eps) = metric(
        metrics,
        &["epsGrowth", "epsGrowthTTM", "earningsGrowth", "yearlyEarningsGrowth", "epsGrowthRate"],
    ) {
        points += tier_above(growth_fraction(eps), &[(0.15, 15), (0.1, 12), (0.0, 8)], 0);
    }

    // No growth data at all: a rising price earns a token score
    if points == 0 {
        if let Some(change) = quote_change_percent.filter(|c| *c != 0.0) {
            let daily = change / 100.0;
            if daily.abs() * 250.0 > 0.1 && daily > 0.0 {
                points += 10;
            }
        }
    }

    points
}

fn stability(metrics: &MetricMap, notes: &mut Notes) -> u32 {
    let mut points = 0;

    if let Some(debt_to_equity) = metric(
        metrics,
        &["debtToEquityTTM", "debtToEquity", "totalDebtToEquity", "debtEquityRatio", "longTermDebtToEquity"],
    ) {
        let dte = debt_to_equity.abs();
        points += tier_below(dte, &[(0.5, 30), (1.0, 25), (2.0, 15), (3.0, 10)], 5);
        if dte < 0.5 {
            notes.strength("Low debt");
        } else if dte > 3.0 {
            notes.weakness("High leverage");
        }
    }

    if let Some(current) = metric(
        metrics,
        &["currentRatioTTM", "currentRatio", "currentAssetsToCurrentLiabilities", "workingCapitalRatio"],
    ) {
        points += tier_above(current, &[(2.0, 25), (1.5, 20), (1.0, 15), (0.5, 10)], 5);
        if current > 2.0 {
            notes.strength("Excellent liquidity");
        } else if current < 1.0 {
            notes.weakness("Liquidity concerns");
        }
    }

    if let Some(quick) = metric(metrics, &["quickRatioTTM", "quickRatio", "acidTestRatio", "liquidRatio"]) {
        points += tier_above(quick, &[(1.5, 15), (1.0, 12), (0.5, 8)], 5);
    }

    points
}

fn efficiency(metrics: &MetricMap, notes: &mut Notes) -> u32 {
    let mut points = 0;

    if let Some(operating) = metric(
        metrics,
        &["operatingMarginTTM", "operatingMargin", "operatingProfitMargin", "ebitMargin", "operatingMarginAnnual"],
    ) {
        let margin = as_fraction(operating);
        points += tier_above(margin, &[(0.2, 30), (0.15, 25), (0.1, 20), (0.05, 15), (0.0, 10)], 0);
        if margin > 0.2 {
            notes.strength("High operating efficiency");
        } else if operating < 0.0 {
            notes.weakness("Negative operating margin");
        }
    }

    if let Some(turnover) = metric(
        metrics,
        &["assetTurnoverTTM", "assetTurnover", "totalAssetTurnover", "assetsTurnover"],
    ) {
        points += tier_above(turnover, &[(1.0, 20), (0.5, 15), (0.3, 10), (0.1, 5)], 0);
    }

    points
}

fn valuation(metrics: &MetricMap, notes: &mut Notes) -> u32 {
    let mut points = 0;

    if let Some(pe) = metric(
        metrics,
        &["peTTM", "pe", "priceToEarnings", "peRatio", "priceEarningsRatio", "priceEarnings"],
    )
    .filter(|pe| *pe > 0.0)
    {
        points += tier_below(pe, &[(15.0, 25), (25.0, 20), (35.0, 15), (50.0, 10)], 5);
        if pe < 15.0 {
            notes.strength("Attractive valuation (low P/E)");
        } else if pe > 50.0 {
            notes.weakness("Overvalued (high P/E)");
        }
    }

    if let Some(pb) = metric(metrics, &["pbTTM", "pb", "priceToBook", "priceBookRatio", "priceBook"])
        .filter(|pb| *pb > 0.0)
    {
        points += tier_below(pb, &[(2.0, 20), (4.0, 15), (8.0, 10), (15.0, 5)], 0);
        if pb < 2.0 {
            notes.strength("Reasonable P/B");
        } else if pb > 10.0 {
            notes.weakness("Very high P/B");
        }
    }

    if let Some(ps) = metric(metrics, &["psTTM", "ps", "priceToSales", "priceSalesRatio", "priceSales"])
        .filter(|ps| *ps > 0.0)
    {
        points += tier_below(ps, &[(2.0, 15), (4.0, 12), (8.0, 8)], 5);
    }

    points
}

/// Score a company 0-100 from its fundamentals. `quote_change_percent` is
/// only used when no growth metric is available.
pub fn calculate_health_score(metrics: &MetricMap, quote_change_percent: Option<f64>) -> HealthScore {
    let mut notes = Notes::default();

    let breakdown = HealthBreakdown {
        profitability: percent_of_max(profitability(metrics, &mut notes), MAX_PROFITABILITY),
        growth: percent_of_max(growth(metrics, quote_change_percent, &mut notes), MAX_GROWTH),
        stability: percent_of_max(stability(metrics, &mut notes), MAX_STABILITY),
        efficiency: percent_of_max(efficiency(metrics, &mut notes), MAX_EFFICIENCY),
        valuation: percent_of_max(valuation(metrics, &mut notes), MAX_VALUATION),
    };

    let weighted = breakdown.profitability as f64 * 0.25
        + breakdown.growth as f64 * 0.20
        + breakdown.stability as f64 * 0.25
        + breakdown.efficiency as f64 * 0.15
        + breakdown.valuation as f64 * 0.15;
    let score = (weighted.round() as u32).min(100);

    notes.strengths.truncate(MAX_NOTES);
    notes.weaknesses.truncate(MAX_NOTES);

    HealthScore {
        score,
        grade: grade(score).to_string(),
        breakdown,
        strengths: notes.strengths,
        weaknesses: notes.weaknesses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metrics(value: Value) -> MetricMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_grades() {
        assert_eq!(grade(100), "A+");
        assert_eq!(grade(95), "A+");
        assert_eq!(grade(94), "A");
        assert_eq!(grade(70), "B-");
        assert_eq!(grade(50), "D");
        assert_eq!(grade(49), "F");
    }

    #[test]
    fn test_empty_metrics() {
        let score = calculate_health_score(&MetricMap::new(), None);
        assert_eq!(score.score, 0);
        assert_eq!(score.grade, "F");
        assert_eq!(score.breakdown, HealthBreakdown::default());
        assert!(score.strengths.is_empty());
    }

    #[test]
    fn test_strong_company() {
        let data = metrics(json!({
            "netProfitMarginTTM": 25.0,
            "roeTTM": "30",
            "roaTTM": 0.12,
            "revenueGrowthTTM": 25,
            "ebitdaGrowthTTM": 22,
            "epsGrowth": 18,
            "totalDebtToEquity": 0.3,
            "currentRatio": 2.5,
            "quickRatio": 1.8,
            "operatingMarginTTM": 30,
            "assetTurnoverTTM": 1.2,
            "peTTM": 12,
            "pbAnnual": 1.5,
            "pb": 1.5,
            "psTTM": 1.5
        }));

        let score = calculate_health_score(&data, None);
        assert_eq!(score.breakdown.profitability, 100);
        assert_eq!(score.breakdown.growth, 100);
        assert_eq!(score.breakdown.stability, 100);
        assert_eq!(score.breakdown.efficiency, 100);
        assert_eq!(score.breakdown.valuation, 100);
        assert_eq!(score.score, 100);
        assert_eq!(score.grade, "A+");
        assert_eq!(score.strengths.len(), 5);
        assert!(score.weaknesses.is_empty());
    }

    #[test]
    fn test_weak_company() {
        let data = metrics(json!({
            "netProfitMargin": -5,
            "debtToEquity": "4.5",
            "currentRatio": 0.8,
            "peTTM": 80,
            "pb": 0
        }));

        let score = calculate_health_score(&data, None);
        // margin 0.05 is not above 0.05
        assert_eq!(score.breakdown.profitability, 13);
        // 5 + 10 = 15 of 70
        assert_eq!(score.breakdown.stability, 21);
        // 5 of 60
        assert_eq!(score.breakdown.valuation, 8);
        assert_eq!(
            score.weaknesses,
            vec!["Negative profit margin", "High leverage", "Liquidity concerns", "Overvalued (high P/E)"]
        );
    }

    #[test]
    fn test_price_momentum_growth_fallback() {
        let rising = calculate_health_score(&MetricMap::new(), Some(1.5));
        assert_eq!(rising.breakdown.growth, 15);

        let falling = calculate_health_score(&MetricMap::new(), Some(-1.5));
        assert_eq!(falling.breakdown.growth, 0);
    }

    #[test]
    fn test_numeric_strings() {
        assert_eq!(numeric(&json!("1,234.5")), Some(1234.5));
        assert_eq!(numeric(&json!("")), None);
        assert_eq!(numeric(&json!(null)), None);
        assert_eq!(numeric(&json!("n/a")), None);
    }
}
