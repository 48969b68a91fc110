use crate::error::{Error, Result};
use crate::quote::Quote;
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "graphql")]
use async_graphql::{Enum, SimpleObject};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertType {
    PriceAbove,
    PriceBelow,
    PriceChange,
    News,
    Earnings,
}

impl AlertType {
    /// News and earnings alerts are driven by events, not by quotes
    pub fn is_price_based(self) -> bool {
        matches!(
            self,
            AlertType::PriceAbove | AlertType::PriceBelow | AlertType::PriceChange
        )
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[cfg_attr(feature = "graphql", derive(Enum))]
pub enum Operator {
    #[serde(rename = ">")]
    #[strum(serialize = ">")]
    Gt,
    #[serde(rename = "<")]
    #[strum(serialize = "<")]
    Lt,
    #[serde(rename = ">=")]
    #[strum(serialize = ">=")]
    Ge,
    #[serde(rename = "<=")]
    #[strum(serialize = "<=")]
    Le,
    #[serde(rename = "==")]
    #[strum(serialize = "==")]
    Eq,
}

impl Operator {
    pub fn compare(self, observed: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => observed > threshold,
            Operator::Lt => observed < threshold,
            Operator::Ge => observed >= threshold,
            Operator::Le => observed <= threshold,
            Operator::Eq => (observed - threshold).abs() < 1e-9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct AlertCondition {
    pub operator: Operator,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "graphql", graphql(name = "type"))]
    pub alert_type: AlertType,
    pub condition: AlertCondition,
    pub is_active: bool,
    pub last_triggered: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        id: String,
        user_id: &str,
        symbol: &str,
        alert_type: AlertType,
        condition: AlertCondition,
    ) -> Result<Self> {
        let symbol = Symbol::parse(symbol)?;
        if !condition.value.is_finite() {
            return Err(Error::invalid_field("condition.value", "Alert threshold must be a number"));
        }

        Ok(Self {
            id,
            user_id: user_id.to_string(),
            symbol: symbol.into(),
            alert_type,
            condition,
            is_active: true,
            last_triggered: None,
            created_at: Utc::now(),
        })
    }

    /// Whether `quote` satisfies this alert. Inactive alerts, event alerts
    /// and quotes for other symbols never fire.
    pub fn evaluate(&self, quote: &Quote) -> bool {
        if !self.is_active || quote.symbol != self.symbol {
            return false;
        }

        let observed = match self.alert_type {
            AlertType::PriceAbove | AlertType::PriceBelow => quote.current_price,
            AlertType::PriceChange => quote.change_percent,
            AlertType::News | AlertType::Earnings => return false,
        };

        self.condition.operator.compare(observed, self.condition.value)
    }

    /// Evaluate and stamp `last_triggered` when the alert fires
    pub fn check(&mut self, quote: &Quote, now: DateTime<Utc>) -> bool {
        let fired = self.evaluate(quote);
        if fired {
            self.last_triggered = Some(now);
        }
        fired
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}
