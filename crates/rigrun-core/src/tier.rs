//! Routing tiers.
//!
//! A tier is a dispatch destination for a query, totally ordered by cost
//! and capability: `cache < local < cloud < haiku < sonnet < opus`.
//! `gpt-4o` sits parallel to `opus` at the top of the order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A routing destination, ordered by cost and capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Served from the local response cache. Free.
    Cache,
    /// Local model host (e.g. an Ollama endpoint). Free.
    Local,
    /// Generic cloud routing (provider chosen downstream).
    Cloud,
    /// Anthropic Haiku.
    Haiku,
    /// Anthropic Sonnet.
    Sonnet,
    /// Anthropic Opus.
    Opus,
    /// OpenAI GPT-4o. Parallel to Opus in the order.
    #[serde(rename = "gpt-4o")]
    Gpt4o,
}

impl Tier {
    /// All tiers in ascending order. `Gpt4o` shares rank with `Opus`.
    pub const ALL: [Tier; 7] = [
        Tier::Cache,
        Tier::Local,
        Tier::Cloud,
        Tier::Haiku,
        Tier::Sonnet,
        Tier::Opus,
        Tier::Gpt4o,
    ];

    /// Rank in the total order. `Opus` and `Gpt4o` share the top rank.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Cache => 0,
            Self::Local => 1,
            Self::Cloud => 2,
            Self::Haiku => 3,
            Self::Sonnet => 4,
            Self::Opus | Self::Gpt4o => 5,
        }
    }

    /// Cost in cents per 1000 tokens. Cache and local are free.
    #[must_use]
    pub const fn cost_per_1k_cents(self) -> f64 {
        match self {
            Self::Cache | Self::Local => 0.0,
            Self::Cloud => 0.05,
            Self::Haiku => 0.025,
            Self::Sonnet => 0.3,
            Self::Opus => 1.5,
            Self::Gpt4o => 0.5,
        }
    }

    /// Whether this tier is served without leaving the machine.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Cache | Self::Local)
    }

    /// Whether this tier requires network egress to a model provider.
    #[must_use]
    pub const fn is_cloud(self) -> bool {
        !self.is_local()
    }

    /// The next tier in the escalation chain, or `None` if terminal.
    ///
    /// The chain is `cache → local → cloud → haiku → sonnet → opus`;
    /// `opus` and `gpt-4o` are terminal.
    #[must_use]
    pub const fn escalate(self) -> Option<Self> {
        match self {
            Self::Cache => Some(Self::Local),
            Self::Local => Some(Self::Cloud),
            Self::Cloud => Some(Self::Haiku),
            Self::Haiku => Some(Self::Sonnet),
            Self::Sonnet => Some(Self::Opus),
            Self::Opus | Self::Gpt4o => None,
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Local => "local",
            Self::Cloud => "cloud",
            Self::Haiku => "haiku",
            Self::Sonnet => "sonnet",
            Self::Opus => "opus",
            Self::Gpt4o => "gpt-4o",
        }
    }
}

/// Tiers order by [`Tier::rank`]. `Opus` and `Gpt4o` share the top rank
/// while remaining distinct values, so `Tier` is deliberately not `Ord`.
impl PartialOrd for Tier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.rank().cmp(&other.rank()))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cache" => Ok(Self::Cache),
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            "haiku" => Ok(Self::Haiku),
            "sonnet" => Ok(Self::Sonnet),
            "opus" => Ok(Self::Opus),
            "gpt-4o" | "gpt4o" => Ok(Self::Gpt4o),
            other => Err(CoreError::UnknownTier(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(Tier::Cache < Tier::Local);
        assert!(Tier::Local < Tier::Cloud);
        assert!(Tier::Cloud < Tier::Haiku);
        assert!(Tier::Haiku < Tier::Sonnet);
        assert!(Tier::Sonnet < Tier::Opus);
        // gpt-4o is parallel to opus: equal rank, distinct value
        assert!(Tier::Opus <= Tier::Gpt4o && Tier::Gpt4o <= Tier::Opus);
        assert_ne!(Tier::Opus, Tier::Gpt4o);
    }

    #[test]
    fn test_free_tiers() {
        assert_eq!(Tier::Cache.cost_per_1k_cents(), 0.0);
        assert_eq!(Tier::Local.cost_per_1k_cents(), 0.0);
        assert!(Tier::Opus.cost_per_1k_cents() > 0.0);
    }

    #[test]
    fn test_locality() {
        assert!(Tier::Cache.is_local());
        assert!(Tier::Local.is_local());
        assert!(!Tier::Cloud.is_local());
        assert!(Tier::Gpt4o.is_cloud());
    }

    #[test]
    fn test_escalation_chain_terminates() {
        let mut tier = Tier::Cache;
        let mut hops = 0u8;
        while let Some(next) = tier.escalate() {
            tier = next;
            hops = hops.saturating_add(1);
        }
        assert_eq!(tier, Tier::Opus);
        assert_eq!(hops, 5);
        assert!(Tier::Gpt4o.escalate().is_none());
    }

    #[test]
    fn test_parse_roundtrip() {
        for tier in Tier::ALL {
            assert_eq!(tier.as_str().parse::<Tier>().unwrap(), tier);
        }
        assert!("turbo".parse::<Tier>().is_err());
    }

    #[test]
    fn test_serde_kebab() {
        let json = serde_json::to_string(&Tier::Gpt4o).unwrap();
        assert_eq!(json, "\"gpt-4o\"");
        let back: Tier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Tier::Gpt4o);
    }
}
