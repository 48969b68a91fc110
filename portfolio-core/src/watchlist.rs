use crate::error::Result;
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "graphql")]
use async_graphql::SimpleObject;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItem {
    pub symbol: String,
    pub added_at: DateTime<Utc>,
}

/// Symbols a single user keeps an eye on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    items: Vec<WatchlistItem>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding a symbol twice keeps the original entry. Returns whether the
    /// symbol was new.
    pub fn add(&mut self, symbol: &str) -> Result<bool> {
        self.add_at(symbol, Utc::now())
    }

    pub fn add_at(&mut self, symbol: &str, added_at: DateTime<Utc>) -> Result<bool> {
        let symbol = Symbol::parse(symbol)?;
        if self.contains(&symbol) {
            return Ok(false);
        }

        self.items.push(WatchlistItem {
            symbol: symbol.into(),
            added_at,
        });
        Ok(true)
    }

    pub fn remove(&mut self, symbol: &str) -> Result<bool> {
        let symbol = Symbol::parse(symbol)?;
        let before = self.items.len();
        self.items.retain(|item| item.symbol != symbol.as_str());
        Ok(self.items.len() != before)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.items.iter().any(|item| item.symbol == symbol.as_str())
    }

    /// Newest first
    pub fn items(&self) -> Vec<WatchlistItem> {
        let mut items = self.items.clone();
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        items
    }

    pub fn symbols(&self) -> Vec<String> {
        self.items().into_iter().map(|item| item.symbol).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_add_is_idempotent_and_case_insensitive() {
        let mut watchlist = Watchlist::new();
        assert!(watchlist.add("tsla").unwrap());
        assert!(!watchlist.add("TSLA").unwrap());
        assert_eq!(watchlist.len(), 1);
        assert!(watchlist.add("bad symbol").is_err());
    }

    #[test]
    fn test_items_newest_first() {
        let now = Utc::now();
        let mut watchlist = Watchlist::new();
        watchlist.add_at("AAPL", now - Duration::days(2)).unwrap();
        watchlist.add_at("MSFT", now).unwrap();
        watchlist.add_at("GOOG", now - Duration::days(1)).unwrap();

        assert_eq!(watchlist.symbols(), vec!["MSFT", "GOOG", "AAPL"]);

        assert!(watchlist.remove("goog").unwrap());
        assert!(!watchlist.remove("GOOG").unwrap());
        assert_eq!(watchlist.symbols(), vec!["MSFT", "AAPL"]);
    }
}
