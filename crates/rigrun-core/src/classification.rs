//! Classification levels and markings.
//!
//! Levels follow the DoD ordering `UNCLASSIFIED < CUI < CONFIDENTIAL <
//! SECRET < TOP SECRET`. A full marking may carry caveats after the level,
//! separated by `//`, e.g. `SECRET//NOFORN`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::tier::Tier;

/// A classification level controlling which tiers a query may reach.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationLevel {
    /// No classification. The only level allowed to reach cloud tiers.
    #[default]
    Unclassified,
    /// Controlled Unclassified Information.
    Cui,
    /// CONFIDENTIAL.
    Confidential,
    /// SECRET.
    Secret,
    /// TOP SECRET.
    TopSecret,
}

impl ClassificationLevel {
    /// Canonical marking text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unclassified => "UNCLASSIFIED",
            Self::Cui => "CUI",
            Self::Confidential => "CONFIDENTIAL",
            Self::Secret => "SECRET",
            Self::TopSecret => "TOP SECRET",
        }
    }

    /// Whether queries at this level may be routed to a cloud tier.
    ///
    /// Only `UNCLASSIFIED` may leave the machine.
    #[must_use]
    pub const fn can_route_to_cloud(self) -> bool {
        matches!(self, Self::Unclassified)
    }

    /// Whether this level forces local-only routing (any level ≥ CUI).
    #[must_use]
    pub const fn requires_local_only(self) -> bool {
        !self.can_route_to_cloud()
    }

    /// The maximum tier a query at this level may reach.
    #[must_use]
    pub const fn max_allowed_tier(self) -> Tier {
        match self {
            Self::Unclassified => Tier::Opus,
            Self::Cui | Self::Confidential | Self::Secret | Self::TopSecret => Tier::Local,
        }
    }

    /// Portion marking: the first letter of the level, parenthesized.
    ///
    /// `UNCLASSIFIED` → `(U)`, `TOP SECRET` → `(TS)`.
    #[must_use]
    pub const fn portion_marking(self) -> &'static str {
        match self {
            Self::Unclassified => "(U)",
            Self::Cui => "(CUI)",
            Self::Confidential => "(C)",
            Self::Secret => "(S)",
            Self::TopSecret => "(TS)",
        }
    }
}

impl fmt::Display for ClassificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassificationLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('_', " ");
        match normalized.as_str() {
            "UNCLASSIFIED" | "U" => Ok(Self::Unclassified),
            "CUI" | "CONTROLLED" => Ok(Self::Cui),
            "CONFIDENTIAL" | "C" => Ok(Self::Confidential),
            "SECRET" | "S" => Ok(Self::Secret),
            "TOP SECRET" | "TS" => Ok(Self::TopSecret),
            other => Err(CoreError::UnknownClassification(other.to_owned())),
        }
    }
}

/// A full classification marking: level plus dissemination caveats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Classification {
    /// The classification level.
    pub level: ClassificationLevel,
    /// Dissemination caveats (e.g. `NOFORN`, `REL TO USA`).
    pub caveats: Vec<String>,
}

impl Classification {
    /// A marking with no caveats.
    #[must_use]
    pub const fn new(level: ClassificationLevel) -> Self {
        Self {
            level,
            caveats: Vec::new(),
        }
    }

    /// Parse a marking of the form `LEVEL` or `LEVEL//CAVEAT//CAVEAT`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownClassification`] if the level segment is
    /// not a recognized marking.
    pub fn parse(marking: &str) -> Result<Self, CoreError> {
        let mut segments = marking.split("//");
        let level = segments
            .next()
            .unwrap_or_default()
            .parse::<ClassificationLevel>()?;
        let caveats = segments
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        Ok(Self { level, caveats })
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.level.as_str())?;
        for caveat in &self.caveats {
            write!(f, "//{caveat}")?;
        }
        Ok(())
    }
}

impl FromStr for Classification {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(ClassificationLevel::Unclassified < ClassificationLevel::Cui);
        assert!(ClassificationLevel::Cui < ClassificationLevel::Confidential);
        assert!(ClassificationLevel::Confidential < ClassificationLevel::Secret);
        assert!(ClassificationLevel::Secret < ClassificationLevel::TopSecret);
    }

    #[test]
    fn test_cloud_routing_gate() {
        assert!(ClassificationLevel::Unclassified.can_route_to_cloud());
        assert!(!ClassificationLevel::Cui.can_route_to_cloud());
        assert!(ClassificationLevel::Cui.requires_local_only());
        assert!(ClassificationLevel::TopSecret.requires_local_only());
    }

    #[test]
    fn test_max_allowed_tier() {
        assert_eq!(
            ClassificationLevel::Unclassified.max_allowed_tier(),
            Tier::Opus
        );
        assert_eq!(ClassificationLevel::Cui.max_allowed_tier(), Tier::Local);
        assert_eq!(ClassificationLevel::Secret.max_allowed_tier(), Tier::Local);
    }

    #[test]
    fn test_portion_markings() {
        assert_eq!(ClassificationLevel::Unclassified.portion_marking(), "(U)");
        assert_eq!(ClassificationLevel::Secret.portion_marking(), "(S)");
        assert_eq!(ClassificationLevel::TopSecret.portion_marking(), "(TS)");
    }

    #[test]
    fn test_parse_with_caveats() {
        let c = Classification::parse("SECRET//NOFORN").unwrap();
        assert_eq!(c.level, ClassificationLevel::Secret);
        assert_eq!(c.caveats, vec!["NOFORN".to_owned()]);
        assert_eq!(c.to_string(), "SECRET//NOFORN");
    }

    #[test]
    fn test_parse_multiple_caveats() {
        let c = Classification::parse("TOP SECRET//SI//NOFORN").unwrap();
        assert_eq!(c.level, ClassificationLevel::TopSecret);
        assert_eq!(c.caveats, vec!["SI".to_owned(), "NOFORN".to_owned()]);
    }

    #[test]
    fn test_parse_underscore_form() {
        let c = Classification::parse("TOP_SECRET").unwrap();
        assert_eq!(c.level, ClassificationLevel::TopSecret);
    }

    #[test]
    fn test_parse_unknown_level() {
        assert!(Classification::parse("EYES ONLY").is_err());
    }

    #[test]
    fn test_display_plain_level() {
        let c = Classification::new(ClassificationLevel::Confidential);
        assert_eq!(c.to_string(), "CONFIDENTIAL");
    }
}
