use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    WorthDeeperLook,
    Marginal,
    LikelyNotWorthPursuing,
}

impl Verdict {
    /// Stable identifier used in the database and in CSV exports
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::WorthDeeperLook => "worth_deeper_look",
            Verdict::Marginal => "marginal",
            Verdict::LikelyNotWorthPursuing => "likely_not_worth_pursuing",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::WorthDeeperLook => "Worth a deeper look",
            Verdict::Marginal => "Marginal",
            Verdict::LikelyNotWorthPursuing => "Likely not worth pursuing",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "worth_deeper_look" => Ok(Verdict::WorthDeeperLook),
            "marginal" => Ok(Verdict::Marginal),
            "likely_not_worth_pursuing" => Ok(Verdict::LikelyNotWorthPursuing),
            other => Err(format!("Unknown verdict: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_identifiers_parse_back() {
        for verdict in [
            Verdict::WorthDeeperLook,
            Verdict::Marginal,
            Verdict::LikelyNotWorthPursuing,
        ] {
            assert_eq!(verdict.as_str().parse::<Verdict>(), Ok(verdict));
        }
        assert!("green".parse::<Verdict>().is_err());
    }

    #[test]
    fn serde_uses_storage_identifiers() {
        let json = serde_json::to_string(&Verdict::LikelyNotWorthPursuing).unwrap();
        assert_eq!(json, "\"likely_not_worth_pursuing\"");
    }
}
