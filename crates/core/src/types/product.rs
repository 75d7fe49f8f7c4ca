//! Product categories carried by collection items.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Catalog category of a jewellery product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Ring,
    Necklace,
    Earring,
    Bracelet,
}

/// A catalog category string that maps to no known [`ProductType`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown product type: {0:?}")]
pub struct UnknownProductType(pub String);

impl ProductType {
    /// All known product types, in catalog navigation order.
    pub const ALL: [Self; 4] = [Self::Ring, Self::Necklace, Self::Earring, Self::Bracelet];

    /// Canonical lowercase name, as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ring => "ring",
            Self::Necklace => "necklace",
            Self::Earring => "earring",
            Self::Bracelet => "bracelet",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = UnknownProductType;

    /// Accepts singular and plural category names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ring" | "rings" => Ok(Self::Ring),
            "necklace" | "necklaces" => Ok(Self::Necklace),
            "earring" | "earrings" => Ok(Self::Earring),
            "bracelet" | "bracelets" => Ok(Self::Bracelet),
            _ => Err(UnknownProductType(s.to_owned())),
        }
    }
}
