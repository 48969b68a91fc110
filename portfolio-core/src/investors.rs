use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "graphql")]
use async_graphql::{Enum, SimpleObject};

/// Where a disclosed holding comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[cfg_attr(feature = "graphql", derive(Enum))]
pub enum HoldingSource {
    #[serde(rename = "13F")]
    #[strum(serialize = "13F")]
    Form13F,
    #[serde(rename = "public")]
    #[strum(serialize = "public")]
    Public,
    #[serde(rename = "estimated")]
    #[strum(serialize = "estimated")]
    Estimated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct InvestorPosition {
    pub symbol: String,
    pub company: String,
    pub shares: Option<f64>,
    pub value: Option<f64>,
    pub percentage: Option<f64>,
    pub source: Option<HoldingSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
#[serde(rename_all = "camelCase")]
pub struct FamousInvestor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub positions: Vec<InvestorPosition>,
    pub total_value: Option<f64>,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const SEED: &[(&str, &str, HoldingSource, &[(&str, &str)])] = &[
    (
        "Warren Buffett",
        "CEO of Berkshire Hathaway, known as the \"Oracle of Omaha\"",
        HoldingSource::Form13F,
        &[
            ("AAPL", "Apple Inc."),
            ("BAC", "Bank of America Corp"),
            ("KO", "The Coca-Cola Company"),
            ("AXP", "American Express Co"),
        ],
    ),
    (
        "Ray Dalio",
        "Founder of Bridgewater Associates, the largest hedge fund in the world",
        HoldingSource::Estimated,
        &[
            ("AAPL", "Apple Inc."),
            ("MSFT", "Microsoft Corporation"),
            ("GOOGL", "Alphabet Inc."),
        ],
    ),
    (
        "Bill Gates",
        "Microsoft founder, philanthropist and investment fund manager",
        HoldingSource::Public,
        &[
            ("MSFT", "Microsoft Corporation"),
            ("BRK.B", "Berkshire Hathaway Inc."),
            ("CNI", "Canadian National Railway"),
        ],
    ),
];

/// The initial investor set, ids produced by `next_id`
pub fn initial_investors(mut next_id: impl FnMut() -> String) -> Vec<FamousInvestor> {
    let now = Utc::now();
    SEED.iter()
        .map(|(name, description, source, positions)| FamousInvestor {
            id: next_id(),
            name: name.to_string(),
            description: description.to_string(),
            image: None,
            positions: positions
                .iter()
                .map(|(symbol, company)| InvestorPosition {
                    symbol: symbol.to_string(),
                    company: company.to_string(),
                    shares: None,
                    value: None,
                    percentage: None,
                    source: Some(*source),
                })
                .collect(),
            total_value: None,
            last_updated: now,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed() {
        let mut n = 0;
        let investors = initial_investors(|| {
            n += 1;
            format!("inv-{}", n)
        });

        assert_eq!(investors.len(), 3);
        assert_eq!(investors[0].id, "inv-1");
        assert_eq!(investors[0].positions.len(), 4);
        assert_eq!(investors[2].positions[1].symbol, "BRK.B");
        assert_eq!(investors[0].positions[0].source, Some(HoldingSource::Form13F));
        assert_eq!(HoldingSource::Form13F.to_string(), "13F");
        assert_eq!(
            serde_json::to_value(HoldingSource::Estimated).unwrap(),
            serde_json::json!("estimated")
        );
    }
}
