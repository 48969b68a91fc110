use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[cfg(feature = "graphql")]
use async_graphql::{Enum, InputObject, SimpleObject};

pub const DEFAULT_EQUITY_RISK_PREMIUM: f64 = 0.055;
pub const DEFAULT_TERMINAL_GROWTH: f64 = 0.025;
pub const MIN_SCENARIO_WACC: f64 = 0.05;
const TERMINAL_FALLBACK_MULTIPLE: f64 = 15.0;

/// Rates are fractions, `0.045` meaning 4.5 %
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(InputObject))]
#[serde(rename_all = "camelCase")]
pub struct WaccInputs {
    pub risk_free_rate: f64,
    pub beta: f64,
    pub equity_risk_premium: f64,
    pub cost_of_debt: f64,
    pub tax_rate: f64,
    pub debt_to_equity: f64,
}

impl WaccInputs {
    /// Fill beta and tax rate from sector and country when they are unknown
    pub fn estimated(
        sector: &str,
        country: &str,
        risk_free_rate: f64,
        cost_of_debt: f64,
        debt_to_equity: f64,
    ) -> Self {
        Self {
            risk_free_rate,
            beta: estimate_beta(sector),
            equity_risk_premium: DEFAULT_EQUITY_RISK_PREMIUM,
            cost_of_debt,
            tax_rate: estimate_tax_rate(country),
            debt_to_equity,
        }
    }
}

/// CAPM: `rf + beta * erp`
pub fn cost_of_equity(risk_free_rate: f64, beta: f64, equity_risk_premium: f64) -> f64 {
    risk_free_rate + beta * equity_risk_premium
}

pub fn wacc(inputs: &WaccInputs) -> f64 {
    let equity_weight = 1.0 / (1.0 + inputs.debt_to_equity);
    let debt_weight = inputs.debt_to_equity / (1.0 + inputs.debt_to_equity);

    let equity_cost = cost_of_equity(inputs.risk_free_rate, inputs.beta, inputs.equity_risk_premium);
    let after_tax_debt = inputs.cost_of_debt * (1.0 - inputs.tax_rate);

    equity_weight * equity_cost + debt_weight * after_tax_debt
}

/// Gordon growth value of the cash flow after the last projected year.
/// A discount rate at or below the growth rate falls back to 15x the
/// last cash flow.
pub fn terminal_value(last_fcf: f64, wacc: f64, growth: f64) -> f64 {
    if wacc <= growth {
        return last_fcf * TERMINAL_FALLBACK_MULTIPLE;
    }
    last_fcf * (1.0 + growth) / (wacc - growth)
}

pub fn intrinsic_value(
    projected_fcfs: &[f64],
    wacc: f64,
    terminal_value: f64,
    shares_outstanding: f64,
) -> f64 {
    if projected_fcfs.is_empty() || shares_outstanding <= 0.0 {
        return 0.0;
    }

    let pv_fcf: f64 = projected_fcfs
        .iter()
        .enumerate()
        .map(|(year, fcf)| fcf / (1.0 + wacc).powi(year as i32 + 1))
        .sum();
    let pv_terminal = terminal_value / (1.0 + wacc).powi(projected_fcfs.len() as i32);

    (pv_fcf + pv_terminal) / shares_outstanding
}

/// Percent of the intrinsic value by which the price is below it
pub fn margin_of_safety(current_price: f64, intrinsic_value: f64) -> f64 {
    if intrinsic_value <= 0.0 {
        return 0.0;
    }
    (intrinsic_value - current_price) / intrinsic_value * 100.0
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Undervalued,
    FairlyValued,
    Overvalued,
}

pub fn verdict(margin_of_safety: f64) -> Verdict {
    if margin_of_safety >= 15.0 {
        Verdict::Undervalued
    } else if margin_of_safety >= -10.0 {
        Verdict::FairlyValued
    } else {
        Verdict::Overvalued
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScenarioName {
    Bear,
    Base,
    Bull,
}

impl ScenarioName {
    /// `(price factor, wacc shift, terminal growth)`
    fn adjustments(self) -> (f64, f64, f64) {
        match self {
            ScenarioName::Bear => (0.65, 0.015, 0.015),
            ScenarioName::Base => (1.0, 0.0, 0.025),
            ScenarioName::Bull => (1.25, -0.01, 0.035),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct DcfScenario {
    pub name: ScenarioName,
    /// Percent
    pub wacc: f64,
    /// Percent
    pub terminal_growth: f64,
    pub target_price: f64,
    pub margin_of_safety: f64,
}

/// Bear, base and bull cases around a base intrinsic value
pub fn scenarios(base_intrinsic_value: f64, current_price: f64, base_wacc: f64) -> Vec<DcfScenario> {
    [ScenarioName::Bear, ScenarioName::Base, ScenarioName::Bull]
        .into_iter()
        .map(|name| {
            let (price_factor, wacc_shift, growth) = name.adjustments();
            let target_price = base_intrinsic_value * price_factor;
            DcfScenario {
                name,
                wacc: (base_wacc + wacc_shift).max(MIN_SCENARIO_WACC) * 100.0,
                terminal_growth: growth * 100.0,
                target_price,
                margin_of_safety: margin_of_safety(current_price, target_price),
            }
        })
        .collect()
}

pub fn estimate_beta(sector: &str) -> f64 {
    match sector {
        "Technology" => 1.2,
        "Healthcare" => 0.85,
        "Financials" => 1.15,
        "Consumer Cyclical" => 1.2,
        "Consumer Defensive" => 0.7,
        "Industrials" => 1.1,
        "Energy" => 1.3,
        "Utilities" => 0.5,
        "Real Estate" => 0.9,
        "Materials" => 1.1,
        "Communication Services" => 1.0,
        _ => 1.0,
    }
}

pub fn estimate_tax_rate(country: &str) -> f64 {
    match country {
        "US" => 0.21,
        "UK" => 0.25,
        "DE" | "JP" => 0.30,
        "CN" => 0.25,
        _ => 0.25,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(InputObject))]
#[serde(rename_all = "camelCase")]
pub struct ThesisInputs {
    pub current_price: f64,
    pub projected_fcfs: Vec<f64>,
    pub shares_outstanding: f64,
    pub wacc: WaccInputs,
    pub terminal_growth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct ThesisValuation {
    pub current_price: f64,
    pub intrinsic_value: f64,
    pub margin_of_safety: f64,
    pub verdict: Verdict,
    pub wacc: f64,
    pub cost_of_equity: f64,
    pub cost_of_debt: f64,
    pub terminal_value: f64,
    pub scenarios: Vec<DcfScenario>,
}

/// Full DCF valuation from projected free cash flows
pub fn thesis_valuation(inputs: &ThesisInputs) -> Result<ThesisValuation> {
    let last_fcf = *inputs
        .projected_fcfs
        .last()
        .ok_or_else(|| Error::invalid_field("projectedFcfs", "At least one projected cash flow is required"))?;
    if inputs.shares_outstanding <= 0.0 {
        return Err(Error::invalid_field(
            "sharesOutstanding",
            "Shares outstanding must be positive",
        ));
    }
    if inputs.current_price < 0.0 {
        return Err(Error::invalid_field("currentPrice", "Price must not be negative"));
    }

    let growth = inputs.terminal_growth.unwrap_or(DEFAULT_TERMINAL_GROWTH);
    let discount = wacc(&inputs.wacc);
    let terminal = terminal_value(last_fcf, discount, growth);
    let value = intrinsic_value(&inputs.projected_fcfs, discount, terminal, inputs.shares_outstanding);
    let margin = margin_of_safety(inputs.current_price, value);

    Ok(ThesisValuation {
        current_price: inputs.current_price,
        intrinsic_value: value,
        margin_of_safety: margin,
        verdict: verdict(margin),
        wacc: discount,
        cost_of_equity: cost_of_equity(
            inputs.wacc.risk_free_rate,
            inputs.wacc.beta,
            inputs.wacc.equity_risk_premium,
        ),
        cost_of_debt: inputs.wacc.cost_of_debt,
        terminal_value: terminal,
        scenarios: scenarios(value, inputs.current_price, discount),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_wacc() {
        assert!(close(cost_of_equity(0.04, 1.2, 0.055), 0.106));

        let inputs = WaccInputs {
            risk_free_rate: 0.04,
            beta: 1.0,
            equity_risk_premium: 0.06,
            cost_of_debt: 0.05,
            tax_rate: 0.2,
            debt_to_equity: 1.0,
        };
        // 0.5 * 0.10 + 0.5 * 0.04
        assert!(close(wacc(&inputs), 0.07));
    }

    #[test]
    fn test_terminal_value_fallback() {
        assert!(close(terminal_value(100.0, 0.1, 0.025), 100.0 * 1.025 / 0.075));
        assert!(close(terminal_value(100.0, 0.02, 0.025), 1500.0));
        assert!(close(terminal_value(100.0, 0.025, 0.025), 1500.0));
    }

    #[test]
    fn test_intrinsic_value() {
        assert_eq!(intrinsic_value(&[], 0.1, 100.0, 10.0), 0.0);
        assert_eq!(intrinsic_value(&[10.0], 0.1, 100.0, 0.0), 0.0);

        // (110/1.1 + 1210/1.1) / 10
        assert!(close(intrinsic_value(&[110.0], 0.1, 1210.0, 10.0), 120.0));
    }

    #[test]
    fn test_verdicts() {
        assert_eq!(margin_of_safety(10.0, 0.0), 0.0);
        assert!(close(margin_of_safety(80.0, 100.0), 20.0));
        assert_eq!(verdict(15.0), Verdict::Undervalued);
        assert_eq!(verdict(-10.0), Verdict::FairlyValued);
        assert_eq!(verdict(-10.01), Verdict::Overvalued);
        assert_eq!(Verdict::FairlyValued.to_string(), "FAIRLY_VALUED");
    }

    #[test]
    fn test_scenarios() {
        let cases = scenarios(100.0, 80.0, 0.055);
        assert_eq!(cases.len(), 3);

        let bear = &cases[0];
        assert_eq!(bear.name, ScenarioName::Bear);
        assert!(close(bear.target_price, 65.0));
        assert!(close(bear.wacc, 7.0));
        assert!(close(bear.terminal_growth, 1.5));

        let bull = &cases[2];
        assert!(close(bull.target_price, 125.0));
        assert!(close(bull.wacc, 5.0));
        assert!(close(bull.margin_of_safety, 36.0));
    }

    #[test]
    fn test_estimates() {
        assert_eq!(estimate_beta("Utilities"), 0.5);
        assert_eq!(estimate_beta("Crypto"), 1.0);
        assert_eq!(estimate_tax_rate("DE"), 0.30);
        assert_eq!(estimate_tax_rate("BR"), 0.25);

        let inputs = WaccInputs::estimated("Energy", "US", 0.045, 0.06, 0.5);
        assert_eq!(inputs.beta, 1.3);
        assert_eq!(inputs.tax_rate, 0.21);
    }

    #[test]
    fn test_thesis_valuation() {
        let inputs = ThesisInputs {
            current_price: 50.0,
            projected_fcfs: vec![100.0, 110.0, 120.0],
            shares_outstanding: 10.0,
            wacc: WaccInputs {
                risk_free_rate: 0.04,
                beta: 1.0,
                equity_risk_premium: 0.06,
                cost_of_debt: 0.05,
                tax_rate: 0.2,
                debt_to_equity: 0.0,
            },
            terminal_growth: None,
        };

        let valuation = thesis_valuation(&inputs).unwrap();
        assert!(close(valuation.wacc, 0.10));
        assert!(close(valuation.terminal_value, 120.0 * 1.025 / 0.075));
        assert!(valuation.intrinsic_value > 50.0);
        assert_eq!(valuation.verdict, Verdict::Undervalued);
        assert_eq!(valuation.scenarios[1].target_price, valuation.intrinsic_value);

        let empty = ThesisInputs {
            projected_fcfs: vec![],
            ..inputs
        };
        assert!(thesis_valuation(&empty).is_err());
    }
}
