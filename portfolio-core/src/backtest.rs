use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(feature = "graphql")]
use async_graphql::{Enum, InputObject, SimpleObject};

/// Annual risk free rate in percent used by the Sharpe ratio
pub const RISK_FREE_RATE: f64 = 2.0;
pub const DEFAULT_HOLD_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject, InputObject))]
#[cfg_attr(feature = "graphql", graphql(input_name = "PricePointInput"))]
pub struct PricePoint {
    pub date: DateTime<Utc>,
    pub price: f64,
}

/// A finished trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedPick {
    pub symbol: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: DateTime<Utc>,
    pub exit_date: DateTime<Utc>,
}

/// A position opened by a strategy, to be closed by the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(InputObject))]
#[serde(rename_all = "camelCase")]
pub struct StrategyPick {
    pub symbol: String,
    pub entry_date: DateTime<Utc>,
    pub entry_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct BacktestMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub avg_hold_period: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "lowercase")]
pub enum PickStatus {
    Win,
    Loss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct PickResult {
    pub symbol: String,
    pub entry_price: f64,
    pub exit_price: f64,
    #[serde(rename = "return")]
    pub return_percent: f64,
    pub hold_period: i64,
    pub status: PickStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct BacktestPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkComparison {
    pub benchmark_return: f64,
    pub alpha: f64,
    pub beta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub strategy_id: String,
    pub strategy_name: String,
    pub period: BacktestPeriod,
    pub performance: BacktestMetrics,
    pub picks: Vec<PickResult>,
    pub vs_benchmark: BenchmarkComparison,
}

fn percent_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        0.0
    } else {
        (to - from) / from * 100.0
    }
}

fn whole_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_days().max(1)
}

fn std_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Aggregate statistics of an equally weighted set of trades
pub fn calculate_metrics(
    picks: &[ClosedPick],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> BacktestMetrics {
    if picks.is_empty() {
        return BacktestMetrics::default();
    }

    let returns: Vec<f64> = picks
        .iter()
        .map(|pick| percent_change(pick.entry_price, pick.exit_price))
        .collect();
    let n = returns.len() as f64;

    let total_return = returns.iter().sum::<f64>() / n;

    let years = whole_days(start, end) as f64 / 365.25;
    let annualized_return = if years > 0.0 {
        total_return / years
    } else {
        total_return
    };

    let worst = returns.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_drawdown = worst.min(0.0).abs();

    let deviation = std_deviation(&returns);
    let sharpe_ratio = if deviation > 0.0 {
        (total_return - RISK_FREE_RATE) / deviation
    } else {
        0.0
    };

    let wins = returns.iter().filter(|r| **r > 0.0).count() as f64;
    let hold_days: i64 = picks
        .iter()
        .map(|pick| whole_days(pick.entry_date, pick.exit_date))
        .sum();

    BacktestMetrics {
        total_return,
        annualized_return,
        max_drawdown,
        sharpe_ratio,
        win_rate: wins / n * 100.0,
        total_trades: picks.len(),
        avg_hold_period: (hold_days as f64 / n).round() as i64,
    }
}

/// First recorded price on or after `exit`, or within a day of it
fn find_exit_price(prices: &[PricePoint], exit: DateTime<Utc>) -> Option<f64> {
    prices
        .iter()
        .find(|point| point.date >= exit || (point.date - exit).num_milliseconds().abs() < 86_400_000)
        .map(|point| point.price)
}

/// Hold every pick for `hold_period_days` and compare with the benchmark
/// over the same window. Picks without a later price exit flat.
pub fn simulate_strategy(
    strategy_id: &str,
    strategy_name: &str,
    picks: &[StrategyPick],
    historical_prices: &HashMap<String, Vec<PricePoint>>,
    benchmark_prices: &[PricePoint],
    hold_period_days: i64,
) -> Result<BacktestResult> {
    if hold_period_days <= 0 {
        return Err(Error::invalid_field("holdPeriodDays", "Hold period must be positive"));
    }
    if let Some(pick) = picks.iter().find(|pick| pick.entry_price <= 0.0) {
        return Err(Error::invalid_field(
            "entryPrice",
            format!("Entry price of {} must be positive", pick.symbol),
        ));
    }

    let hold = Duration::days(hold_period_days);
    let start = picks.first().map(|pick| pick.entry_date).unwrap_or_else(Utc::now);
    let end = start + hold;

    let results: Vec<PickResult> = picks
        .iter()
        .map(|pick| {
            let exit = pick.entry_date + hold;
            let exit_price = historical_prices
                .get(&pick.symbol)
                .and_then(|prices| find_exit_price(prices, exit))
                .unwrap_or(pick.entry_price);
            let return_percent = percent_change(pick.entry_price, exit_price);

            PickResult {
                symbol: pick.symbol.clone(),
                entry_price: pick.entry_price,
                exit_price,
                return_percent,
                hold_period: whole_days(pick.entry_date, exit),
                status: if return_percent > 0.0 {
                    PickStatus::Win
                } else {
                    PickStatus::Loss
                },
            }
        })
        .collect();

    let benchmark_start = benchmark_prices.iter().find(|point| point.date >= start);
    let benchmark_end = benchmark_prices.iter().find(|point| point.date >= end);
    let benchmark_return = match (benchmark_start, benchmark_end) {
        (Some(from), Some(to)) => percent_change(from.price, to.price),
        _ => 0.0,
    };

    let closed: Vec<ClosedPick> = results
        .iter()
        .map(|pick| ClosedPick {
            symbol: pick.symbol.clone(),
            entry_price: pick.entry_price,
            exit_price: pick.exit_price,
            entry_date: start,
            exit_date: end,
        })
        .collect();
    let performance = calculate_metrics(&closed, start, end);

    Ok(BacktestResult {
        strategy_id: strategy_id.to_string(),
        strategy_name: strategy_name.to_string(),
        period: BacktestPeriod {
            start,
            end,
            days: hold_period_days,
        },
        vs_benchmark: BenchmarkComparison {
            benchmark_return,
            alpha: performance.total_return - benchmark_return,
            beta: 1.0,
        },
        performance,
        picks: results,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct SummaryLine {
    pub label: String,
    pub value: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct BacktestSummary {
    pub summary: String,
    pub details: Vec<SummaryLine>,
}

fn signed_percent(value: f64) -> String {
    let sign = if value > 0.0 { "+" } else { "" };
    format!("{}{:.2}%", sign, value)
}

fn sign_tone(value: f64) -> Tone {
    if value > 0.0 {
        Tone::Positive
    } else {
        Tone::Negative
    }
}

fn line(label: &str, value: String, tone: Tone) -> SummaryLine {
    SummaryLine {
        label: label.to_string(),
        value,
        tone,
    }
}

pub fn format_summary(result: &BacktestResult) -> BacktestSummary {
    let perf = &result.performance;
    let alpha = result.vs_benchmark.alpha;

    let details = vec![
        line("Total return", signed_percent(perf.total_return), sign_tone(perf.total_return)),
        line(
            "Annualized return",
            signed_percent(perf.annualized_return),
            sign_tone(perf.annualized_return),
        ),
        line("vs S&P 500", signed_percent(alpha), sign_tone(alpha)),
        line(
            "Win rate",
            format!("{:.1}%", perf.win_rate),
            if perf.win_rate > 50.0 {
                Tone::Positive
            } else {
                Tone::Neutral
            },
        ),
        line(
            "Sharpe ratio",
            format!("{:.2}", perf.sharpe_ratio),
            if perf.sharpe_ratio > 1.0 {
                Tone::Positive
            } else if perf.sharpe_ratio > 0.0 {
                Tone::Neutral
            } else {
                Tone::Negative
            },
        ),
        line(
            "Max drawdown",
            format!("{:.2}%", perf.max_drawdown),
            if perf.max_drawdown < 10.0 {
                Tone::Positive
            } else if perf.max_drawdown < 20.0 {
                Tone::Neutral
            } else {
                Tone::Negative
            },
        ),
    ];

    BacktestSummary {
        summary: format!(
            "{}: {} in {} days (vs S&P 500: {})",
            result.strategy_name,
            signed_percent(perf.total_return),
            result.period.days,
            signed_percent(alpha)
        ),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(n: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, n, 0, 0, 0).unwrap()
    }

    fn closed(entry: f64, exit: f64) -> ClosedPick {
        ClosedPick {
            symbol: "X".into(),
            entry_price: entry,
            exit_price: exit,
            entry_date: day(1),
            exit_date: day(11),
        }
    }

    #[test]
    fn test_empty_picks() {
        assert_eq!(calculate_metrics(&[], day(1), day(2)), BacktestMetrics::default());
    }

    #[test]
    fn test_metrics() {
        let picks = vec![closed(100.0, 110.0), closed(100.0, 90.0), closed(100.0, 130.0)];
        let metrics = calculate_metrics(&picks, day(1), day(11));

        assert!((metrics.total_return - 10.0).abs() < 1e-9);
        assert!((metrics.annualized_return - 10.0 / (10.0 / 365.25)).abs() < 1e-6);
        assert!((metrics.max_drawdown - 10.0).abs() < 1e-9);
        assert!((metrics.win_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(metrics.total_trades, 3);
        assert_eq!(metrics.avg_hold_period, 10);

        // population deviation of [10, -10, 30] around 10
        let deviation = (800.0f64 / 3.0).sqrt();
        assert!((metrics.sharpe_ratio - 8.0 / deviation).abs() < 1e-9);
    }

    #[test]
    fn test_all_winners_have_no_drawdown() {
        let metrics = calculate_metrics(&[closed(10.0, 11.0), closed(10.0, 11.0)], day(1), day(2));
        assert_eq!(metrics.max_drawdown, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.win_rate, 100.0);
    }

    #[test]
    fn test_simulate_strategy() {
        let picks = vec![
            StrategyPick {
                symbol: "AAA".into(),
                entry_date: day(1),
                entry_price: 50.0,
            },
            StrategyPick {
                symbol: "BBB".into(),
                entry_date: day(1),
                entry_price: 20.0,
            },
        ];
        let mut prices = HashMap::new();
        prices.insert(
            "AAA".to_string(),
            vec![
                PricePoint { date: day(5), price: 52.0 },
                PricePoint { date: day(11), price: 60.0 },
            ],
        );
        let benchmark = vec![
            PricePoint { date: day(1), price: 400.0 },
            PricePoint { date: day(12), price: 404.0 },
        ];

        let result = simulate_strategy("s1", "Momentum", &picks, &prices, &benchmark, 10).unwrap();
        assert_eq!(result.period.start, day(1));
        assert_eq!(result.period.end, day(11));
        assert_eq!(result.picks[0].exit_price, 60.0);
        assert_eq!(result.picks[0].status, PickStatus::Win);
        assert_eq!(result.picks[1].exit_price, 20.0);
        assert_eq!(result.picks[1].status, PickStatus::Loss);
        assert_eq!(result.picks[1].hold_period, 10);

        assert!((result.performance.total_return - 10.0).abs() < 1e-9);
        assert!((result.vs_benchmark.benchmark_return - 1.0).abs() < 1e-9);
        assert!((result.vs_benchmark.alpha - 9.0).abs() < 1e-9);

        let summary = format_summary(&result);
        assert_eq!(summary.summary, "Momentum: +10.00% in 10 days (vs S&P 500: +9.00%)");
        assert_eq!(summary.details.len(), 6);
        assert_eq!(summary.details[3].value, "50.0%");
        assert_eq!(summary.details[3].tone, Tone::Neutral);
    }

    #[test]
    fn test_simulate_rejects_bad_input() {
        assert!(simulate_strategy("s", "S", &[], &HashMap::new(), &[], 0).is_err());
        let picks = vec![StrategyPick {
            symbol: "Z".into(),
            entry_date: day(1),
            entry_price: 0.0,
        }];
        assert!(simulate_strategy("s", "S", &picks, &HashMap::new(), &[], 30).is_err());
    }
}
