use super::super::{current_user, get_context, to_graphql_error, GraphQLResult};
use crate::models::context::Context as ServerContext;
use async_graphql::{Context, InputObject, Json, Object, Result, SimpleObject};
use portfolio_core::backtest::{
    format_summary, simulate_strategy, BacktestResult, BacktestSummary, PricePoint, StrategyPick,
    DEFAULT_HOLD_PERIOD_DAYS,
};
use portfolio_core::diversification::{
    analyze_diversification, correlation_matrix, rebalancing_recommendations, CorrelationPair,
    DiversificationAnalysis, PriceSeries, Rebalancing, WeightedPosition, INSIGHT_WINDOW_DAYS,
};
use portfolio_core::health::{calculate_health_score, HealthScore, MetricMap};
use portfolio_core::risk::{analyze, scenarios, RiskAnalysis, RiskHolding, ScenarioInfo, StressScenario};
use portfolio_core::valuation::{
    estimate_beta, estimate_tax_rate, thesis_valuation, ThesisInputs, ThesisValuation,
};
use portfolio_core::{Error, Symbol};
use std::collections::HashMap;

#[derive(InputObject)]
pub struct SymbolPrices {
    pub symbol: String,
    pub prices: Vec<PricePoint>,
}

#[derive(SimpleObject)]
pub struct BacktestReport {
    pub result: BacktestResult,
    pub summary: BacktestSummary,
}

#[derive(SimpleObject)]
pub struct DiversificationReport {
    pub analysis: DiversificationAnalysis,
    pub correlations: Vec<CorrelationPair>,
    pub rebalancing: Vec<Rebalancing>,
}

/// Current value and sector of every position of a portfolio
async fn valued_positions(
    ctx: &ServerContext,
    user: &str,
    portfolio_id: &str,
) -> portfolio_core::Result<Vec<RiskHolding>> {
    let performance = ctx.portfolio_performance(user, portfolio_id).await?;
    Ok(performance
        .positions
        .into_iter()
        .map(|position| RiskHolding {
            sector: ctx
                .universe()
                .get(&position.symbol)
                .and_then(|profile| profile.sector),
            symbol: position.symbol,
            value: position.current_value,
        })
        .collect())
}

fn weights(holdings: &[RiskHolding]) -> Vec<WeightedPosition> {
    let total: f64 = holdings.iter().map(|h| h.value).sum();
    holdings
        .iter()
        .map(|holding| WeightedPosition {
            symbol: holding.symbol.clone(),
            percentage: if total > 0.0 { holding.value / total } else { 0.0 },
            sector: holding.sector.clone(),
            region: None,
        })
        .collect()
}

#[derive(Default)]
pub struct AnalysisQuery;

#[Object]
impl AnalysisQuery {
    /// Score a company from its reported metrics. Momentum falls back to
    /// the latest quote of `symbol` when the metrics carry no price moves.
    async fn health_score<'ctx>(
        &self,
        context: &Context<'ctx>,
        metrics: Json<MetricMap>,
        symbol: Option<String>,
    ) -> Result<HealthScore> {
        let change_percent = match symbol {
            Some(raw) => {
                let symbol = Symbol::parse(&raw).gql()?;
                get_context(context)
                    .quote(&symbol)
                    .await
                    .gql()?
                    .map(|quote| quote.change_percent)
            }
            None => None,
        };
        Ok(calculate_health_score(&metrics.0, change_percent))
    }

    async fn thesis_valuation(&self, input: ThesisInputs) -> Result<ThesisValuation> {
        thesis_valuation(&input).gql()
    }

    async fn estimated_beta(&self, sector: String) -> f64 {
        estimate_beta(&sector)
    }

    async fn estimated_tax_rate(&self, country: String) -> f64 {
        estimate_tax_rate(&country)
    }

    /// Replay a strategy's picks over historical prices
    async fn backtest(
        &self,
        strategy_id: String,
        strategy_name: String,
        picks: Vec<StrategyPick>,
        price_history: Vec<SymbolPrices>,
        benchmark: Vec<PricePoint>,
        hold_period_days: Option<i64>,
    ) -> Result<BacktestReport> {
        let history: HashMap<String, Vec<PricePoint>> = price_history
            .into_iter()
            .map(|series| (series.symbol.to_uppercase(), series.prices))
            .collect();

        let result = simulate_strategy(
            &strategy_id,
            &strategy_name,
            &picks,
            &history,
            &benchmark,
            hold_period_days.unwrap_or(DEFAULT_HOLD_PERIOD_DAYS),
        )
        .gql()?;
        let summary = format_summary(&result);
        Ok(BacktestReport { result, summary })
    }

    async fn stress_scenarios(&self) -> Vec<ScenarioInfo> {
        scenarios()
    }

    /// Project holdings, or the positions of a portfolio, through a stress
    /// scenario
    async fn stress_test<'ctx>(
        &self,
        context: &Context<'ctx>,
        scenario: StressScenario,
        holdings: Option<Vec<RiskHolding>>,
        portfolio_id: Option<String>,
    ) -> Result<RiskAnalysis> {
        let holdings = match (holdings, portfolio_id) {
            (Some(holdings), _) => holdings,
            (None, Some(id)) => {
                let user = current_user(context)?;
                valued_positions(get_context(context), user, &id).await.gql()?
            }
            (None, None) => {
                return Err(to_graphql_error(Error::validation(
                    "Either holdings or portfolioId is required",
                )))
            }
        };
        Ok(analyze(&holdings, scenario))
    }

    /// Allocation, concentration and correlation of a set of positions
    async fn diversification<'ctx>(
        &self,
        context: &Context<'ctx>,
        positions: Option<Vec<WeightedPosition>>,
        portfolio_id: Option<String>,
        prices: Option<Vec<PriceSeries>>,
        period_days: Option<u32>,
    ) -> Result<DiversificationReport> {
        let positions = match (positions, portfolio_id) {
            (Some(positions), _) => positions,
            (None, Some(id)) => {
                let user = current_user(context)?;
                weights(&valued_positions(get_context(context), user, &id).await.gql()?)
            }
            (None, None) => {
                return Err(to_graphql_error(Error::validation(
                    "Either positions or portfolioId is required",
                )))
            }
        };

        let correlations = correlation_matrix(
            &prices.unwrap_or_default(),
            period_days.unwrap_or(INSIGHT_WINDOW_DAYS),
        );
        Ok(DiversificationReport {
            analysis: analyze_diversification(&positions, &correlations),
            rebalancing: rebalancing_recommendations(&positions, &correlations),
            correlations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights() {
        let holdings = vec![
            RiskHolding {
                symbol: "AAPL".into(),
                sector: Some("Technology".into()),
                value: 750.0,
            },
            RiskHolding {
                symbol: "XOM".into(),
                sector: None,
                value: 250.0,
            },
        ];
        let weighted = weights(&holdings);
        assert_eq!(weighted[0].percentage, 0.75);
        assert_eq!(weighted[1].percentage, 0.25);
        assert!(weights(&[]).is_empty());
    }
}
