use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::VeryLow,
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::VeryHigh,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::VeryLow => "Very Low",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::VeryHigh => "Very High",
        }
    }

    /// Table lookup only. Totals are not normalized.
    pub fn allocation(self) -> Allocation {
        let slices: &[(&str, u32)] = match self {
            RiskLevel::VeryLow => &[("Bonds", 70), ("Cash", 20), ("Stocks", 10)],
            RiskLevel::Low => &[("Stocks", 60), ("Bonds", 40)],
            RiskLevel::Medium => &[("Stocks", 50), ("Bonds", 30), ("Crypto", 20)],
            RiskLevel::High => &[("Crypto", 50), ("Stocks", 50)],
            RiskLevel::VeryHigh => &[("Crypto", 60), ("Growth Stocks", 20), ("Options", 20)],
        };

        let allocation = Allocation {
            risk: self,
            slices: slices
                .iter()
                .map(|(asset, percentage)| AllocationSlice {
                    asset: asset.to_string(),
                    percentage: *percentage,
                })
                .collect(),
        };

        if allocation.total() != 100 {
            tracing::warn!(
                risk = self.label(),
                total = allocation.total(),
                "allocation table does not sum to 100"
            );
        }
        allocation
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RiskLevel {
    type Err = anyhow::Error;

    /// Accepts the display label or a kebab/snake form, case-insensitively.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        RiskLevel::ALL
            .into_iter()
            .find(|level| level.label().replace(' ', "").to_lowercase() == normalized)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown risk level {s:?}; expected one of: {}",
                    RiskLevel::ALL.map(RiskLevel::label).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSlice {
    pub asset: String,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub risk: RiskLevel,
    pub slices: Vec<AllocationSlice>,
}

impl Allocation {
    pub fn total(&self) -> u32 {
        self.slices.iter().map(|s| s.percentage).sum()
    }

    /// `{Stocks: 60%, Bonds: 40%}` for prompt text.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .slices
            .iter()
            .map(|s| format!("{}: {}%", s.asset, s.percentage))
            .collect();
        format!("{{{}}}", parts.join(", "))
    }

    /// Dollar amount per slice for an investment, in slice order.
    pub fn split(&self, investment: f64) -> Vec<(String, f64)> {
        self.slices
            .iter()
            .map(|s| (s.asset.clone(), investment * f64::from(s.percentage) / 100.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_loosely() {
        assert_eq!("Very High".parse::<RiskLevel>().unwrap(), RiskLevel::VeryHigh);
        assert_eq!("very-low".parse::<RiskLevel>().unwrap(), RiskLevel::VeryLow);
        assert_eq!(" MEDIUM ".parse::<RiskLevel>().unwrap(), RiskLevel::Medium);
        assert_eq!("high".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("extreme".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn label_round_trips_through_serde() {
        let v = serde_json::to_value(RiskLevel::VeryLow).unwrap();
        assert_eq!(v, serde_json::json!("Very Low"));
        let back: RiskLevel = serde_json::from_value(v).unwrap();
        assert_eq!(back, RiskLevel::VeryLow);
    }

    #[test]
    fn table_keeps_listed_order_and_values() {
        let low = RiskLevel::Low.allocation();
        assert_eq!(low.describe(), "{Stocks: 60%, Bonds: 40%}");

        let very_high = RiskLevel::VeryHigh.allocation();
        assert_eq!(very_high.slices[0].asset, "Crypto");
        assert_eq!(very_high.total(), 100);
    }

    #[test]
    fn every_level_has_slices() {
        for level in RiskLevel::ALL {
            assert!(!level.allocation().slices.is_empty(), "{level}");
        }
    }

    #[test]
    fn split_scales_investment() {
        let split = RiskLevel::Low.allocation().split(1000.0);
        assert_eq!(
            split,
            vec![("Stocks".to_string(), 600.0), ("Bonds".to_string(), 400.0)]
        );
    }
}
