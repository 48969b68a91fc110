use crate::alerts::{Alert, AlertCondition, AlertType};
use crate::error::{Error, Result};
use crate::investors::{initial_investors, FamousInvestor};
use crate::portfolio::{Portfolio, Position, Transaction};
use crate::quote::Quote;
use crate::screener::{SavedScreener, ScreenerFilters};
use crate::watchlist::{Watchlist, WatchlistItem};
use chrono::Utc;
use dashmap::DashMap;
use log::{debug, info};
use std::sync::OnceLock;
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// In-memory document store. Every record belongs to one user and is
/// invisible to everybody else.
#[derive(Default)]
pub struct PortfolioStore {
    portfolios: DashMap<String, Portfolio>,
    watchlists: DashMap<String, Watchlist>,
    alerts: DashMap<String, Alert>,
    screeners: DashMap<String, SavedScreener>,
    investors: OnceLock<Vec<FamousInvestor>>,
}

impl PortfolioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_portfolio(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Portfolio> {
        let portfolio = Portfolio::new(new_id(), user_id, name, description)?;
        self.portfolios
            .insert(portfolio.id.clone(), portfolio.clone());
        info!("Created portfolio {} for {}", portfolio.id, user_id);
        Ok(portfolio)
    }

    /// Newest first
    pub fn list_portfolios(&self, user_id: &str) -> Vec<Portfolio> {
        let mut portfolios: Vec<Portfolio> = self
            .portfolios
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        portfolios.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        portfolios
    }

    pub fn get_portfolio(&self, user_id: &str, id: &str) -> Result<Portfolio> {
        self.portfolios
            .get(id)
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::not_found("Portfolio"))
    }

    fn with_portfolio<T>(
        &self,
        user_id: &str,
        id: &str,
        f: impl FnOnce(&mut Portfolio) -> Result<T>,
    ) -> Result<T> {
        let mut entry = self
            .portfolios
            .get_mut(id)
            .filter(|entry| entry.user_id == user_id)
            .ok_or_else(|| Error::not_found("Portfolio"))?;
        f(entry.value_mut())
    }

    pub fn update_portfolio(
        &self,
        user_id: &str,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Portfolio> {
        self.with_portfolio(user_id, id, |portfolio| {
            if let Some(name) = name {
                let name = name.trim();
                if name.is_empty() {
                    return Err(Error::invalid_field("name", "Portfolio name is required"));
                }
                portfolio.name = name.to_string();
            }
            if let Some(description) = description {
                let description = description.trim();
                portfolio.description =
                    (!description.is_empty()).then(|| description.to_string());
            }
            portfolio.updated_at = Utc::now();
            Ok(portfolio.clone())
        })
    }

    pub fn delete_portfolio(&self, user_id: &str, id: &str) -> Result<()> {
        self.portfolios
            .remove_if(id, |_, portfolio| portfolio.user_id == user_id)
            .map(|_| info!("Deleted portfolio {}", id))
            .ok_or_else(|| Error::not_found("Portfolio"))
    }

    pub fn add_position(&self, user_id: &str, id: &str, position: Position) -> Result<Portfolio> {
        self.with_portfolio(user_id, id, |portfolio| {
            portfolio.add_position(position);
            Ok(portfolio.clone())
        })
    }

    pub fn remove_position(&self, user_id: &str, id: &str, index: usize) -> Result<Portfolio> {
        self.with_portfolio(user_id, id, |portfolio| {
            portfolio.remove_position(index)?;
            Ok(portfolio.clone())
        })
    }

    pub fn record_transaction(
        &self,
        user_id: &str,
        id: &str,
        transaction: Transaction,
    ) -> Result<Portfolio> {
        self.with_portfolio(user_id, id, |portfolio| {
            portfolio.record_transaction(transaction)?;
            Ok(portfolio.clone())
        })
    }

    pub fn watchlist(&self, user_id: &str) -> Vec<WatchlistItem> {
        self.watchlists
            .get(user_id)
            .map(|list| list.items())
            .unwrap_or_default()
    }

    pub fn add_to_watchlist(&self, user_id: &str, symbol: &str) -> Result<bool> {
        self.watchlists
            .entry(user_id.to_string())
            .or_default()
            .add(symbol)
    }

    pub fn remove_from_watchlist(&self, user_id: &str, symbol: &str) -> Result<bool> {
        match self.watchlists.get_mut(user_id) {
            Some(mut list) => list.remove(symbol),
            None => Ok(false),
        }
    }

    pub fn create_alert(
        &self,
        user_id: &str,
        symbol: &str,
        alert_type: AlertType,
        condition: AlertCondition,
    ) -> Result<Alert> {
        let alert = Alert::new(new_id(), user_id, symbol, alert_type, condition)?;
        self.alerts.insert(alert.id.clone(), alert.clone());
        debug!("Created {} alert {} on {}", alert.alert_type, alert.id, alert.symbol);
        Ok(alert)
    }

    /// Active alerts, newest first
    pub fn list_alerts(&self, user_id: &str) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.is_active)
            .map(|entry| entry.value().clone())
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts
    }

    /// Alerts are never removed, only switched off
    pub fn deactivate_alert(&self, user_id: &str, id: &str) -> Result<()> {
        let mut alert = self
            .alerts
            .get_mut(id)
            .filter(|entry| entry.user_id == user_id)
            .ok_or_else(|| Error::not_found("Alert"))?;
        alert.deactivate();
        Ok(())
    }

    /// Evaluate every active alert on the quote's symbol and return the
    /// ones that fired
    pub fn trigger_alerts(&self, quote: &Quote) -> Vec<Alert> {
        let now = Utc::now();
        self.alerts
            .iter_mut()
            .filter_map(|mut entry| entry.check(quote, now).then(|| entry.value().clone()))
            .collect()
    }

    pub fn save_screener(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
        filters: ScreenerFilters,
    ) -> Result<SavedScreener> {
        let screener = SavedScreener::new(new_id(), user_id, name, description, filters)?;
        let taken = self
            .screeners
            .iter()
            .any(|entry| entry.user_id == user_id && entry.name == screener.name);
        if taken {
            return Err(Error::invalid_field(
                "name",
                "A screener with this name already exists",
            ));
        }

        self.screeners.insert(screener.id.clone(), screener.clone());
        Ok(screener)
    }

    /// Newest first
    pub fn list_screeners(&self, user_id: &str) -> Vec<SavedScreener> {
        let mut screeners: Vec<SavedScreener> = self
            .screeners
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        screeners.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        screeners
    }

    pub fn get_screener(&self, user_id: &str, id: &str) -> Result<SavedScreener> {
        self.screeners
            .get(id)
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::not_found("Screener"))
    }

    pub fn delete_screener(&self, user_id: &str, id: &str) -> Result<()> {
        self.screeners
            .remove_if(id, |_, screener| screener.user_id == user_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("Screener"))
    }

    /// Sorted by name. The initial set is created on first access.
    pub fn investors(&self) -> Vec<FamousInvestor> {
        let mut investors = self
            .investors
            .get_or_init(|| {
                info!("Seeding famous investors");
                initial_investors(new_id)
            })
            .clone();
        investors.sort_by(|a, b| a.name.cmp(&b.name));
        investors
    }

    pub fn investor(&self, id: &str) -> Result<FamousInvestor> {
        self.investors()
            .into_iter()
            .find(|investor| investor.id == id)
            .ok_or_else(|| Error::not_found("Investor"))
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            portfolios: self.portfolios.len(),
            watchlists: self.watchlists.len(),
            alerts: self.alerts.len(),
            screeners: self.screeners.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(feature = "graphql", derive(async_graphql::SimpleObject))]
pub struct StoreStats {
    pub portfolios: usize,
    pub watchlists: usize,
    pub alerts: usize,
    pub screeners: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Operator;
    use crate::portfolio::TransactionSide;
    use crate::symbol::Symbol;

    #[test]
    fn test_portfolio_ownership() {
        let store = PortfolioStore::new();
        let portfolio = store.create_portfolio("alice", "  Growth ", None).unwrap();
        assert_eq!(portfolio.name, "Growth");

        assert_eq!(store.list_portfolios("alice").len(), 1);
        assert!(store.list_portfolios("bob").is_empty());
        assert_eq!(
            store.get_portfolio("bob", &portfolio.id).unwrap_err().status_code(),
            404
        );
        assert!(store.delete_portfolio("bob", &portfolio.id).is_err());
        assert!(store.get_portfolio("alice", &portfolio.id).is_ok());

        store.delete_portfolio("alice", &portfolio.id).unwrap();
        assert!(store.get_portfolio("alice", &portfolio.id).is_err());
    }

    #[test]
    fn test_positions_and_transactions() {
        let store = PortfolioStore::new();
        let id = store.create_portfolio("alice", "Main", None).unwrap().id;

        let position = Position::new("aapl", "Apple", 10.0, 150.0, None).unwrap();
        let updated = store.add_position("alice", &id, position).unwrap();
        assert_eq!(updated.positions[0].symbol, "AAPL");

        let err = store.remove_position("alice", &id, 3).unwrap_err();
        assert_eq!(err.to_string(), "Invalid position index");
        assert!(store.remove_position("alice", &id, 0).unwrap().positions.is_empty());

        let buy = Transaction::new("MSFT", TransactionSide::Buy, 2.0, 300.0, Utc::now()).unwrap();
        let updated = store.record_transaction("alice", &id, buy).unwrap();
        assert_eq!(updated.positions.len(), 1);

        let oversell =
            Transaction::new("MSFT", TransactionSide::Sell, 5.0, 310.0, Utc::now()).unwrap();
        assert!(store.record_transaction("alice", &id, oversell).is_err());
        assert_eq!(store.get_portfolio("alice", &id).unwrap().transactions.len(), 1);

        let renamed = store
            .update_portfolio("alice", &id, Some("Core"), Some(""))
            .unwrap();
        assert_eq!(renamed.name, "Core");
        assert!(renamed.description.is_none());
    }

    #[test]
    fn test_watchlist() {
        let store = PortfolioStore::new();
        assert!(store.add_to_watchlist("alice", "tsla").unwrap());
        assert!(!store.add_to_watchlist("alice", "TSLA").unwrap());
        assert!(store.add_to_watchlist("alice", "bad symbol!").is_err());
        assert_eq!(store.watchlist("alice").len(), 1);
        assert!(store.watchlist("bob").is_empty());
        assert!(!store.remove_from_watchlist("bob", "TSLA").unwrap());
        assert!(store.remove_from_watchlist("alice", "TSLA").unwrap());
    }

    #[test]
    fn test_alerts() {
        let store = PortfolioStore::new();
        let condition = AlertCondition {
            operator: Operator::Gt,
            value: 200.0,
        };
        let alert = store
            .create_alert("alice", "AAPL", AlertType::PriceAbove, condition)
            .unwrap();

        let quote = Quote::new(&Symbol::parse("AAPL").unwrap(), 210.0);
        let fired = store.trigger_alerts(&quote);
        assert_eq!(fired.len(), 1);
        assert!(fired[0].last_triggered.is_some());

        assert!(store.deactivate_alert("bob", &alert.id).is_err());
        store.deactivate_alert("alice", &alert.id).unwrap();
        assert!(store.list_alerts("alice").is_empty());
        assert!(store.trigger_alerts(&quote).is_empty());
    }

    #[test]
    fn test_screener_names_are_unique_per_user() {
        let store = PortfolioStore::new();
        store
            .save_screener("alice", "Value", None, ScreenerFilters::default())
            .unwrap();
        let err = store
            .save_screener("alice", " Value ", None, ScreenerFilters::default())
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(store
            .save_screener("bob", "Value", None, ScreenerFilters::default())
            .is_ok());
        assert_eq!(store.list_screeners("alice").len(), 1);
    }

    #[test]
    fn test_investors_seeded_once() {
        let store = PortfolioStore::new();
        let investors = store.investors();
        let names: Vec<_> = investors.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Bill Gates", "Ray Dalio", "Warren Buffett"]);

        let again = store.investors();
        assert_eq!(investors[0].id, again[0].id);
        assert_eq!(store.investor(&again[2].id).unwrap().name, "Warren Buffett");
        assert!(store.investor("missing").is_err());
    }
}
