use crate::error::{Error, Result};
use crate::quote::{Quote, QuoteLookup};
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "graphql")]
use async_graphql::{Enum, SimpleObject};

/// Shares of one symbol held at an average cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    pub company: String,
    pub shares: f64,
    pub avg_purchase_price: f64,
    pub purchase_date: DateTime<Utc>,
}

impl Position {
    pub fn new(
        symbol: &str,
        company: &str,
        shares: f64,
        avg_purchase_price: f64,
        purchase_date: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let symbol = Symbol::parse(symbol)?;
        let company = company.trim();

        if !shares.is_finite() || shares < 0.0 {
            return Err(Error::invalid_field("shares", "Shares must not be negative"));
        }
        if !avg_purchase_price.is_finite() || avg_purchase_price < 0.0 {
            return Err(Error::invalid_field(
                "avgPurchasePrice",
                "Average purchase price must not be negative",
            ));
        }

        Ok(Self {
            company: if company.is_empty() {
                symbol.to_string()
            } else {
                company.to_string()
            },
            symbol: symbol.into(),
            shares,
            avg_purchase_price,
            purchase_date: purchase_date.unwrap_or_else(Utc::now),
        })
    }

    pub fn invested(&self) -> f64 {
        self.shares * self.avg_purchase_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub symbol: String,
    #[serde(default)]
    pub company: Option<String>,
    pub side: TransactionSide,
    pub shares: f64,
    pub price: f64,
    pub executed_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        symbol: &str,
        side: TransactionSide,
        shares: f64,
        price: f64,
        executed_at: DateTime<Utc>,
    ) -> Result<Self> {
        let symbol = Symbol::parse(symbol)?;
        if !shares.is_finite() || shares <= 0.0 {
            return Err(Error::invalid_field("shares", "Shares must be positive"));
        }
        if !price.is_finite() || price < 0.0 {
            return Err(Error::invalid_field("price", "Price must not be negative"));
        }

        Ok(Self {
            symbol: symbol.into(),
            company: None,
            side,
            shares,
            price,
            executed_at,
        })
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }
}

/// Apply one transaction to a set of holdings with average-cost accounting
fn apply_transaction(positions: &mut Vec<Position>, tx: &Transaction) -> Result<()> {
    let existing = positions.iter().position(|p| p.symbol == tx.symbol);

    match (tx.side, existing) {
        (TransactionSide::Buy, Some(index)) => {
            let position = &mut positions[index];
            let shares = position.shares + tx.shares;
            position.avg_purchase_price = (position.invested() + tx.shares * tx.price) / shares;
            position.shares = shares;
        }
        (TransactionSide::Buy, None) => {
            let company = tx.company.as_deref().unwrap_or(&tx.symbol);
            positions.push(Position::new(
                &tx.symbol,
                company,
                tx.shares,
                tx.price,
                Some(tx.executed_at),
            )?);
        }
        (TransactionSide::Sell, Some(index)) => {
            let held = positions[index].shares;
            if tx.shares > held + f64::EPSILON {
                return Err(Error::invalid_field(
                    "shares",
                    format!(
                        "Cannot sell {} shares of {}, only {} held",
                        tx.shares, tx.symbol, held
                    ),
                ));
            }
            if (held - tx.shares).abs() <= f64::EPSILON {
                positions.remove(index);
            } else {
                positions[index].shares = held - tx.shares;
            }
        }
        (TransactionSide::Sell, None) => {
            return Err(Error::invalid_field(
                "symbol",
                format!("No holding of {} to sell", tx.symbol),
            ));
        }
    }

    Ok(())
}

/// Fold a transaction history, oldest first, into the current holdings
pub fn derive_holdings(transactions: &[Transaction]) -> Result<Vec<Position>> {
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by_key(|tx| tx.executed_at);

    let mut positions = Vec::new();
    for tx in ordered {
        apply_transaction(&mut positions, tx)?;
    }
    Ok(positions)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub positions: Vec<Position>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Portfolio {
    pub fn new(id: String, user_id: &str, name: &str, description: Option<&str>) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_field("name", "Portfolio name is required"));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            user_id: user_id.to_string(),
            name: name.to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            positions: Vec::new(),
            transactions: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.push(position);
        self.updated_at = Utc::now();
    }

    pub fn remove_position(&mut self, index: usize) -> Result<Position> {
        if index >= self.positions.len() {
            return Err(Error::invalid_field("index", "Invalid position index"));
        }
        self.updated_at = Utc::now();
        Ok(self.positions.remove(index))
    }

    /// Apply `tx` to the current holdings and keep it in the ledger. The
    /// portfolio is left untouched when the transaction is rejected.
    pub fn record_transaction(&mut self, tx: Transaction) -> Result<()> {
        let mut positions = self.positions.clone();
        apply_transaction(&mut positions, &tx)?;

        self.positions = positions;
        self.transactions.push(tx);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.positions
            .iter()
            .filter_map(|p| Symbol::parse(&p.symbol).ok())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct PositionPerformance {
    pub symbol: String,
    pub company: String,
    pub shares: f64,
    pub avg_purchase_price: f64,
    pub purchase_date: DateTime<Utc>,
    pub current_price: f64,
    pub invested: f64,
    pub current_value: f64,
    pub profit_loss: f64,
    pub profit_loss_percent: f64,
    pub is_real_data: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_invested: f64,
    pub total_current_value: f64,
    pub total_profit_loss: f64,
    pub total_profit_loss_percent: f64,
    pub position_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStatus {
    pub has_api_key: bool,
    pub is_online: bool,
    pub mock_data_count: usize,
    pub total_positions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRef {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPerformance {
    pub portfolio: PortfolioRef,
    pub positions: Vec<PositionPerformance>,
    pub summary: PerformanceSummary,
    pub status: PerformanceStatus,
}

fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

/// Value every position with the given quotes. Positions without a usable
/// quote are valued at their purchase price and reported as mock data.
pub fn performance(
    portfolio: &Portfolio,
    quotes: &impl QuoteLookup,
    has_quote_source: bool,
) -> PortfolioPerformance {
    let positions: Vec<PositionPerformance> = portfolio
        .positions
        .iter()
        .map(|position| {
            let quote = quotes
                .lookup_quote(&position.symbol)
                .filter(|quote| Quote::has_price(quote));
            let current_price = quote
                .map(|quote| quote.current_price)
                .unwrap_or(position.avg_purchase_price);

            let invested = position.invested();
            let current_value = position.shares * current_price;
            let profit_loss = current_value - invested;

            PositionPerformance {
                symbol: position.symbol.clone(),
                company: position.company.clone(),
                shares: position.shares,
                avg_purchase_price: position.avg_purchase_price,
                purchase_date: position.purchase_date,
                current_price,
                invested,
                current_value,
                profit_loss,
                profit_loss_percent: percent_of(profit_loss, invested),
                is_real_data: quote.is_some(),
            }
        })
        .collect();

    let total_invested: f64 = positions.iter().map(|p| p.invested).sum();
    let total_current_value: f64 = positions.iter().map(|p| p.current_value).sum();
    let total_profit_loss = total_current_value - total_invested;
    let mock_data_count = positions.iter().filter(|p| !p.is_real_data).count();

    log::debug!(
        "Valued portfolio {} ({} positions, {} without live quote)",
        portfolio.id,
        positions.len(),
        mock_data_count
    );

    PortfolioPerformance {
        portfolio: PortfolioRef {
            id: portfolio.id.clone(),
            name: portfolio.name.clone(),
            description: portfolio.description.clone(),
        },
        summary: PerformanceSummary {
            total_invested,
            total_current_value,
            total_profit_loss,
            total_profit_loss_percent: percent_of(total_profit_loss, total_invested),
            position_count: positions.len(),
        },
        status: PerformanceStatus {
            has_api_key: has_quote_source,
            is_online: true,
            mock_data_count,
            total_positions: positions.len(),
        },
        positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 15, 0, 0).unwrap()
    }

    fn sample() -> Portfolio {
        let mut portfolio = Portfolio::new("p1".into(), "u1", " Growth ", None).unwrap();
        portfolio.add_position(Position::new("aapl", "Apple", 10.0, 150.0, None).unwrap());
        portfolio.add_position(Position::new("MSFT", "", 5.0, 300.0, None).unwrap());
        portfolio
    }

    #[test]
    fn test_position_validation() {
        assert!(Position::new("AAPL", "Apple", -1.0, 10.0, None).is_err());
        assert!(Position::new("AAPL", "Apple", 1.0, -10.0, None).is_err());
        assert!(Position::new("not valid", "x", 1.0, 1.0, None).is_err());

        let position = Position::new("brk.b", "  ", 0.0, 0.0, None).unwrap();
        assert_eq!(position.symbol, "BRK.B");
        assert_eq!(position.company, "BRK.B");
    }

    #[test]
    fn test_performance_with_quotes_and_fallback() {
        let portfolio = sample();
        assert_eq!(portfolio.name, "Growth");

        let mut quotes = HashMap::new();
        let aapl = Symbol::parse("AAPL").unwrap();
        quotes.insert("AAPL".to_string(), Quote::new(&aapl, 180.0));

        let report = performance(&portfolio, &quotes, true);
        let apple = &report.positions[0];
        assert_eq!(apple.invested, 1500.0);
        assert_eq!(apple.current_value, 1800.0);
        assert_eq!(apple.profit_loss, 300.0);
        assert!((apple.profit_loss_percent - 20.0).abs() < 1e-9);
        assert!(apple.is_real_data);

        let msft = &report.positions[1];
        assert_eq!(msft.current_price, 300.0);
        assert_eq!(msft.profit_loss, 0.0);
        assert!(!msft.is_real_data);

        assert_eq!(report.summary.total_invested, 3000.0);
        assert_eq!(report.summary.total_current_value, 3300.0);
        assert!((report.summary.total_profit_loss_percent - 10.0).abs() < 1e-9);
        assert_eq!(report.status.mock_data_count, 1);
        assert_eq!(report.status.total_positions, 2);
        assert!(report.status.has_api_key);
    }

    #[test]
    fn test_empty_portfolio_is_all_zero() {
        let portfolio = Portfolio::new("p".into(), "u", "Empty", Some("  ")).unwrap();
        assert_eq!(portfolio.description, None);

        let report = performance(&portfolio, &HashMap::new(), false);
        assert_eq!(report.summary, PerformanceSummary::default());
        assert_eq!(report.status.mock_data_count, 0);
        assert!(report.positions.is_empty());
    }

    #[test]
    fn test_zero_cost_position_has_zero_percent() {
        let mut portfolio = Portfolio::new("p".into(), "u", "Gifts", None).unwrap();
        portfolio.add_position(Position::new("KO", "Coca-Cola", 3.0, 0.0, None).unwrap());

        let mut quotes = HashMap::new();
        quotes.insert("KO".to_string(), Quote::new(&Symbol::parse("KO").unwrap(), 60.0));

        let report = performance(&portfolio, &quotes, true);
        assert_eq!(report.positions[0].profit_loss, 180.0);
        assert_eq!(report.positions[0].profit_loss_percent, 0.0);
    }

    #[test]
    fn test_remove_position_bounds() {
        let mut portfolio = sample();
        assert!(portfolio.remove_position(5).is_err());
        assert_eq!(portfolio.remove_position(0).unwrap().symbol, "AAPL");
        assert_eq!(portfolio.positions.len(), 1);
    }

    #[test]
    fn test_derive_holdings_average_cost() {
        let transactions = vec![
            Transaction::new("NVDA", TransactionSide::Sell, 5.0, 130.0, at(20)).unwrap(),
            Transaction::new("NVDA", TransactionSide::Buy, 10.0, 100.0, at(2)).unwrap(),
            Transaction::new("NVDA", TransactionSide::Buy, 10.0, 120.0, at(10)).unwrap(),
            Transaction::new("AMD", TransactionSide::Buy, 4.0, 150.0, at(3))
                .unwrap()
                .with_company("Advanced Micro Devices"),
            Transaction::new("AMD", TransactionSide::Sell, 4.0, 160.0, at(15)).unwrap(),
        ];

        let holdings = derive_holdings(&transactions).unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].symbol, "NVDA");
        assert_eq!(holdings[0].shares, 15.0);
        assert!((holdings[0].avg_purchase_price - 110.0).abs() < 1e-9);
        assert_eq!(holdings[0].purchase_date, at(2));
    }

    #[test]
    fn test_oversell_is_rejected() {
        let transactions = vec![
            Transaction::new("T", TransactionSide::Buy, 1.0, 20.0, at(1)).unwrap(),
            Transaction::new("T", TransactionSide::Sell, 2.0, 21.0, at(2)).unwrap(),
        ];
        assert!(derive_holdings(&transactions).is_err());
        assert!(Transaction::new("T", TransactionSide::Buy, 0.0, 20.0, at(1)).is_err());
    }

    #[test]
    fn test_record_transaction_keeps_portfolio_on_error() {
        let mut portfolio = Portfolio::new("p".into(), "u", "Ledger", None).unwrap();
        portfolio
            .record_transaction(Transaction::new("PEP", TransactionSide::Buy, 2.0, 170.0, at(1)).unwrap())
            .unwrap();

        let oversell = Transaction::new("PEP", TransactionSide::Sell, 3.0, 175.0, at(2)).unwrap();
        assert!(portfolio.record_transaction(oversell).is_err());
        assert_eq!(portfolio.positions[0].shares, 2.0);
        assert_eq!(portfolio.transactions.len(), 1);

        let unknown = Transaction::new("KO", TransactionSide::Sell, 1.0, 60.0, at(3)).unwrap();
        assert!(portfolio.record_transaction(unknown).is_err());
    }
}
