use crate::error::{Error, Result};
use crate::quote::{Quote, QuoteLookup};
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[cfg(feature = "graphql")]
use async_graphql::{Enum, InputObject, SimpleObject};

/// Symbols the screener scans when no explicit universe is given
pub const POPULAR_SYMBOLS: [&str; 40] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "TSLA", "META", "BRK.B", "JNJ", "V", "WMT", "JPM",
    "PG", "MA", "UNH", "HD", "DIS", "PYPL", "NFLX", "ADBE", "CRM", "CSCO", "PFE", "INTC", "VZ",
    "T", "KO", "PEP", "MRK", "ABT", "SPY", "QQQ", "IWM", "DIA", "VOO", "VTI", "URTH", "VWO",
    "GLD", "BITO",
];

const KNOWN_ETFS: [&str; 9] = ["SPY", "QQQ", "IWM", "VOO", "VTI", "URTH", "VWO", "GLD", "BITO"];

pub const ALL: &str = "all";

/// `"ETF"` for the tracked fund symbols, `"Stock"` otherwise
pub fn asset_type(symbol: &str) -> &'static str {
    let len = symbol.len();
    let plain = (3..=4).contains(&len) && symbol.chars().all(|c| c.is_ascii_uppercase());
    if plain && KNOWN_ETFS.contains(&symbol) {
        "ETF"
    } else {
        "Stock"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject, InputObject))]
#[cfg_attr(feature = "graphql", graphql(input_name = "ScreenerFiltersInput"))]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenerFilters {
    pub market_cap_min: f64,
    pub market_cap_max: f64,
    pub price_min: f64,
    pub price_max: f64,
    pub pe_min: f64,
    pub pe_max: f64,
    pub pb_min: f64,
    pub pb_max: f64,
    pub roe_min: f64,
    pub roe_max: f64,
    pub volume_min: f64,
    pub beta_min: f64,
    pub beta_max: f64,
    pub sector: String,
    pub exchange: String,
    pub asset_type: String,
    pub sort_by: String,
    pub sort_order: SortOrder,
}

impl Default for ScreenerFilters {
    fn default() -> Self {
        Self {
            market_cap_min: 0.0,
            market_cap_max: 1_000_000_000_000.0,
            price_min: 0.0,
            price_max: 10_000.0,
            pe_min: 0.0,
            pe_max: 100.0,
            pb_min: 0.0,
            pb_max: 10.0,
            roe_min: 0.0,
            roe_max: 100.0,
            volume_min: 0.0,
            beta_min: 0.0,
            beta_max: 3.0,
            sector: ALL.to_string(),
            exchange: ALL.to_string(),
            asset_type: ALL.to_string(),
            sort_by: "marketCap".to_string(),
            sort_order: SortOrder::Desc,
        }
    }
}

fn within(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}

fn matches_choice(filter: &str, value: &str) -> bool {
    filter == ALL || filter == value
}

impl ScreenerFilters {
    pub fn matches(&self, row: &ScreenerRow) -> bool {
        within(row.price, self.price_min, self.price_max)
            && within(row.market_cap, self.market_cap_min, self.market_cap_max)
            && (row.pe <= 0.0 || within(row.pe, self.pe_min, self.pe_max))
            && (row.pb <= 0.0 || within(row.pb, self.pb_min, self.pb_max))
            && (row.roe <= 0.0 || within(row.roe, self.roe_min, self.roe_max))
            && row.volume >= self.volume_min
            && within(row.beta, self.beta_min, self.beta_max)
            && matches_choice(&self.sector, &row.sector)
            && matches_choice(&self.exchange, &row.exchange)
            && matches_choice(&self.asset_type, &row.asset_type)
    }
}

/// Fundamentals of an instrument that quotes do not carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject, InputObject))]
#[cfg_attr(feature = "graphql", graphql(input_name = "InstrumentProfileInput"))]
#[serde(rename_all = "camelCase")]
pub struct InstrumentProfile {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub market_cap: f64,
    #[serde(default)]
    pub pe: f64,
    #[serde(default)]
    pub pb: f64,
    #[serde(default)]
    pub roe: f64,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct ScreenerRow {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub market_cap: f64,
    pub pe: f64,
    pub pb: f64,
    pub roe: f64,
    pub volume: f64,
    pub beta: f64,
    pub sector: String,
    pub exchange: String,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "graphql", graphql(name = "type"))]
    pub asset_type: String,
}

impl ScreenerRow {
    /// Combine a live quote with optional fundamentals. Missing fields take
    /// neutral defaults (beta 1, sector `Unknown`, exchange `US`).
    pub fn from_quote(quote: &Quote, profile: Option<&InstrumentProfile>) -> Self {
        let symbol = quote.symbol.clone();
        Self {
            name: profile
                .map(|p| p.name.clone())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| symbol.clone()),
            price: quote.current_price,
            change: quote.change,
            change_percent: quote.change_percent,
            market_cap: profile.map(|p| p.market_cap).unwrap_or(0.0),
            pe: profile.map(|p| p.pe).unwrap_or(0.0),
            pb: profile.map(|p| p.pb).unwrap_or(0.0),
            roe: profile.map(|p| p.roe).unwrap_or(0.0),
            volume: quote.volume,
            beta: profile.and_then(|p| p.beta).unwrap_or(1.0),
            sector: profile
                .and_then(|p| p.sector.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            exchange: profile
                .and_then(|p| p.exchange.clone())
                .unwrap_or_else(|| "US".to_string()),
            asset_type: asset_type(&symbol).to_string(),
            symbol,
        }
    }

    fn numeric_field(&self, name: &str) -> Option<f64> {
        match name {
            "price" => Some(self.price),
            "change" => Some(self.change),
            "changePercent" | "change_percent" => Some(self.change_percent),
            "marketCap" | "market_cap" => Some(self.market_cap),
            "pe" => Some(self.pe),
            "pb" => Some(self.pb),
            "roe" => Some(self.roe),
            "volume" => Some(self.volume),
            "beta" => Some(self.beta),
            _ => None,
        }
    }
}

/// Profiles of the instruments the screener knows about
#[derive(Default)]
pub struct ScreenerUniverse {
    profiles: DashMap<String, InstrumentProfile>,
}

impl ScreenerUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, mut profile: InstrumentProfile) -> Result<InstrumentProfile> {
        profile.symbol = Symbol::parse(&profile.symbol)?.into();
        self.profiles.insert(profile.symbol.clone(), profile.clone());
        Ok(profile)
    }

    pub fn get(&self, symbol: &str) -> Option<InstrumentProfile> {
        self.profiles.get(symbol).map(|p| p.clone())
    }

    /// Tracked symbols followed by the popular list, without duplicates
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<String> = self.profiles.iter().map(|p| p.key().clone()).collect();
        symbols.sort();
        for popular in POPULAR_SYMBOLS {
            if !symbols.iter().any(|s| s == popular) {
                symbols.push(popular.to_string());
            }
        }
        symbols
            .iter()
            .filter_map(|symbol| Symbol::parse(symbol).ok())
            .collect()
    }

    /// One row per symbol with a usable quote
    pub fn rows(&self, quotes: &impl QuoteLookup) -> Vec<ScreenerRow> {
        self.symbols()
            .iter()
            .filter_map(|symbol| {
                let quote = quotes
                    .lookup_quote(symbol.as_str())
                    .filter(|quote| quote.has_price())?;
                let profile = self.profiles.get(symbol.as_str());
                Some(ScreenerRow::from_quote(quote, profile.as_deref()))
            })
            .collect()
    }
}

/// Keep the rows matching `filters`, ordered by the requested numeric
/// column. An unknown sort column leaves the input order untouched.
pub fn screen(rows: Vec<ScreenerRow>, filters: &ScreenerFilters) -> Vec<ScreenerRow> {
    let mut results: Vec<ScreenerRow> = rows.into_iter().filter(|row| filters.matches(row)).collect();

    results.sort_by(|a, b| {
        match (
            a.numeric_field(&filters.sort_by),
            b.numeric_field(&filters.sort_by),
        ) {
            (Some(a), Some(b)) => {
                let ordering = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
                match filters.sort_order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            }
            _ => Ordering::Equal,
        }
    });

    results
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub const CSV_HEADER: &str =
    "Symbol,Name,Price,Change,Change %,Market Cap,P/E,P/B,ROE,Volume,Beta,Sector,Exchange,Type";

pub fn export_csv(rows: &[ScreenerRow]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(CSV_HEADER.to_string());

    for row in rows {
        lines.push(
            [
                csv_field(&row.symbol),
                csv_field(&row.name),
                format!("{:.2}", row.price),
                format!("{:.2}", row.change),
                format!("{:.2}", row.change_percent),
                format!("{:.0}", row.market_cap),
                format!("{:.2}", row.pe),
                format!("{:.2}", row.pb),
                format!("{:.2}", row.roe),
                format!("{:.0}", row.volume),
                format!("{:.2}", row.beta),
                csv_field(&row.sector),
                csv_field(&row.exchange),
                csv_field(&row.asset_type),
            ]
            .join(","),
        );
    }

    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct SavedScreener {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub filters: ScreenerFilters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedScreener {
    pub fn new(
        id: String,
        user_id: &str,
        name: &str,
        description: Option<&str>,
        filters: ScreenerFilters,
    ) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_field("name", "Screener name is required"));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            user_id: user_id.to_string(),
            name: name.to_string(),
            description: description.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string),
            filters,
            created_at: now,
            updated_at: now,
        })
    }
}
