use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wholesale suppliers the collection pipeline can pull from.
///
/// The lowercase string form is what gets persisted in the `source`
/// column and embedded in batch ids, so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Supplier {
    Ownerclan,
    Domeme,
    Gentrade,
}

#[derive(Debug, Error)]
#[error("unknown supplier: {0}")]
pub struct UnknownSupplier(pub String);

impl Supplier {
    pub const ALL: [Supplier; 3] = [Supplier::Ownerclan, Supplier::Domeme, Supplier::Gentrade];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Supplier::Ownerclan => "ownerclan",
            Supplier::Domeme => "domeme",
            Supplier::Gentrade => "gentrade",
        }
    }
}

impl std::fmt::Display for Supplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Supplier {
    type Err = UnknownSupplier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ownerclan" => Ok(Supplier::Ownerclan),
            "domeme" => Ok(Supplier::Domeme),
            "gentrade" => Ok(Supplier::Gentrade),
            other => Err(UnknownSupplier(other.to_string())),
        }
    }
}
