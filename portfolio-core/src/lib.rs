// Portfolio domain model, market analytics and the in-memory store

pub mod alerts;
pub mod backtest;
pub mod diversification;
mod error;
pub mod funds;
pub mod health;
pub mod investors;
pub mod portfolio;
pub mod quote;
pub mod risk;
pub mod screener;
pub mod store;
mod symbol;
pub mod valuation;
pub mod watchlist;

pub use error::{messages, Error, ErrorKind, Result};
pub use portfolio::{Portfolio, PortfolioPerformance, Position, Transaction, TransactionSide};
pub use quote::{CachedQuoteSource, Quote, QuoteBook, QuoteChain, QuoteLookup, QuoteSource};
pub use store::PortfolioStore;
pub use symbol::{validate_symbol, Symbol};
