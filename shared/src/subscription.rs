use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Marketplace {
    Amazon,
    Etsy,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Studio,
}

/// A subscription cap. `Unlimited` compares greater than any count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Finite(u32),
    Unlimited,
}

impl Limit {
    pub fn allows(&self, current: u64) -> bool {
        match self {
            Limit::Finite(limit) => current < u64::from(*limit),
            Limit::Unlimited => true,
        }
    }

    pub fn remaining(&self, current: u64) -> Option<u32> {
        match self {
            Limit::Finite(limit) => {
                Some(u64::from(*limit).saturating_sub(current).min(u64::from(u32::MAX)) as u32)
            }
            Limit::Unlimited => None,
        }
    }
}

impl From<u32> for Limit {
    fn from(value: u32) -> Self {
        Limit::Finite(value)
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Limit::Finite(value) => serializer.serialize_u32(*value),
            Limit::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

// Limits arrive as plain numbers, as "unlimited"/"infinity" strings, or as
// null (a JavaScript Infinity after JSON encoding).
impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(Limit::Unlimited),
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    Ok(Limit::Finite(v.min(u64::from(u32::MAX)) as u32))
                } else if n.as_f64().is_some_and(|f| f.is_infinite() || f > f64::from(u32::MAX)) {
                    Ok(Limit::Unlimited)
                } else {
                    Err(serde::de::Error::custom(format!("Invalid limit: {}", n)))
                }
            }
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "unlimited" | "infinity" | "inf" => Ok(Limit::Unlimited),
                other => other.parse::<u32>().map(Limit::Finite).map_err(|_| {
                    serde::de::Error::custom(format!("Invalid limit string: {}", s))
                }),
            },
            _ => Err(serde::de::Error::custom("Expected number, string or null")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub projects: Limit,
    pub api_calls: Limit,
    pub vision_boards: Limit,
    pub etsy_calls: Limit,
}

impl TierLimits {
    pub fn defaults_for(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                projects: Limit::Finite(4),
                api_calls: Limit::Finite(20),
                vision_boards: Limit::Finite(1),
                etsy_calls: Limit::Finite(10),
            },
            Tier::Pro => Self {
                projects: Limit::Finite(25),
                api_calls: Limit::Finite(250),
                vision_boards: Limit::Finite(10),
                etsy_calls: Limit::Finite(100),
            },
            Tier::Studio => Self {
                projects: Limit::Unlimited,
                api_calls: Limit::Finite(1000),
                vision_boards: Limit::Unlimited,
                etsy_calls: Limit::Finite(500),
            },
        }
    }
}

/// Monthly search counters as reported by the usage table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    #[serde(default)]
    pub amazon_total_count: u64,
    #[serde(default)]
    pub etsy_total_count: u64,
}

impl UsageCounters {
    pub fn count_for(&self, marketplace: Marketplace) -> u64 {
        match marketplace {
            Marketplace::Amazon => self.amazon_total_count,
            Marketplace::Etsy => self.etsy_total_count,
        }
    }
}

/// Marketplaces offered for a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarketplaceSet {
    amazon: bool,
    etsy: bool,
}

impl MarketplaceSet {
    pub fn all() -> Self {
        Self { amazon: true, etsy: true }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, marketplace: Marketplace) -> Self {
        self.insert(marketplace);
        self
    }

    pub fn insert(&mut self, marketplace: Marketplace) {
        match marketplace {
            Marketplace::Amazon => self.amazon = true,
            Marketplace::Etsy => self.etsy = true,
        }
    }

    pub fn contains(&self, marketplace: Marketplace) -> bool {
        match marketplace {
            Marketplace::Amazon => self.amazon,
            Marketplace::Etsy => self.etsy,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.amazon && !self.etsy
    }

    pub fn iter(&self) -> impl Iterator<Item = Marketplace> + '_ {
        Marketplace::iter().filter(move |m| self.contains(*m))
    }
}
