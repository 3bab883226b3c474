use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The subscription tier of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Band,
}

#[derive(Debug, Error)]
#[error("Unknown plan: {0}")]
pub struct UnknownPlan(pub String);

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Free, Plan::Pro, Plan::Band];

    /// The order of the tiers, used to tell upgrades from downgrades.
    pub fn rank(&self) -> u8 {
        match self {
            Plan::Free => 0,
            Plan::Pro => 1,
            Plan::Band => 2,
        }
    }

    /// Returns true for every tier above the free one
    pub fn is_paid(&self) -> bool {
        *self != Plan::Free
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Band => "band",
        }
    }
}

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "band" => Ok(Plan::Band),
            other => Err(UnknownPlan(other.to_string())),
        }
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_follow_tier_order() {
        assert!(Plan::Free.rank() < Plan::Pro.rank());
        assert!(Plan::Pro.rank() < Plan::Band.rank());
    }

    #[test]
    fn parses_stored_values() {
        for plan in Plan::ALL {
            assert_eq!(plan.as_str().parse::<Plan>().unwrap(), plan);
        }

        assert!("premium".parse::<Plan>().is_err());
    }
}
