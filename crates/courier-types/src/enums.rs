//! Enumeration types for live tracking.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Entity kind
// ---------------------------------------------------------------------------

/// The kind of entity reporting its position.
///
/// Serialized as the lowercase wire names used by the dashboard and the
/// tracking clients: `"bike"` and `"rider"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum EntityKind {
    /// A vehicle (motorbike) in the fleet.
    Bike,
    /// A volunteer rider carrying a tracking device.
    Rider,
}

impl EntityKind {
    /// Return the wire name of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bike => "bike",
            Self::Rider => "rider",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a recognized [`EntityKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntityKind(pub String);

impl core::fmt::Display for UnknownEntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown entity type '{}'", self.0)
    }
}

impl std::error::Error for UnknownEntityKind {}

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bike" => Ok(Self::Bike),
            "rider" => Ok(Self::Rider),
            other => Err(UnknownEntityKind(other.to_owned())),
        }
    }
}
