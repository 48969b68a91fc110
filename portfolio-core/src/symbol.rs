use crate::error::{messages, Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_LENGTH: usize = 1;
pub const MAX_LENGTH: usize = 10;

lazy_static! {
    static ref SYMBOL_PATTERN: Regex = Regex::new(r"^[A-Z0-9.-]+$").unwrap();
}

/// Upper-cased, validated ticker symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_field("symbol", "Symbol parameter is required"));
        }

        let symbol = trimmed.to_uppercase();
        let length = symbol.chars().count();
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
            return Err(Error::invalid_field(
                "symbol",
                format!(
                    "Symbol must be between {} and {} characters",
                    MIN_LENGTH, MAX_LENGTH
                ),
            ));
        }

        if !SYMBOL_PATTERN.is_match(&symbol) {
            return Err(Error::invalid_field("symbol", messages::INVALID_SYMBOL));
        }

        Ok(Symbol(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Symbol::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate and normalise a ticker symbol
pub fn validate_symbol(raw: &str) -> Result<Symbol> {
    Symbol::parse(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalises_case_and_whitespace() {
        assert_eq!(validate_symbol("  brk.b ").unwrap().as_str(), "BRK.B");
        assert_eq!(validate_symbol("rds-a").unwrap().as_str(), "RDS-A");
    }

    #[test]
    fn test_rejects_bad_symbols() {
        assert_eq!(
            validate_symbol("   ").unwrap_err().to_string(),
            "Symbol parameter is required"
        );
        assert_eq!(
            validate_symbol("ABCDEFGHIJK").unwrap_err().to_string(),
            "Symbol must be between 1 and 10 characters"
        );
        assert_eq!(
            validate_symbol("AA PL").unwrap_err().to_string(),
            messages::INVALID_SYMBOL
        );
        assert!(validate_symbol("$TSLA").is_err());
    }

    #[test]
    fn test_serde_validates() {
        let symbol: Symbol = serde_json::from_str("\"nvda\"").unwrap();
        assert_eq!(symbol.to_string(), "NVDA");
        assert!(serde_json::from_str::<Symbol>("\"no way\"").is_err());
    }
}
