use std::fmt::{Display, Formatter};
use std::iter;
use std::str::FromStr;

use itertools::Itertools as _;
use mason_tile_utils::{MetaTileIndex, hilbert, legacy};
use serde::{Deserialize, Serialize};

/// Directory layout used to derive storage keys from metatile indices.
///
/// Every key ends in `{z}-{x}-{y}@{stride}{extension}` and differs only in the
/// directories above it:
///
/// - `simple`: `{z}/{x}/{y}`
/// - `legacy`: the level and 64×64 blocks numbered row by row
/// - `hilbert`: the level and 64×64 blocks numbered along a Hilbert curve
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// One directory per level, column and row.
    Simple,
    /// Row-major block sharding.
    Legacy,
    /// Hilbert curve block sharding.
    #[default]
    Hilbert,
}

impl KeyMode {
    /// Builds the storage key of `index` below `prefix`.
    ///
    /// Keys are always `/` separated; backends map them onto their own namespace.
    #[must_use]
    pub fn derive_key(self, prefix: &str, index: &MetaTileIndex, extension: &str) -> String {
        let (z, x, y) = (index.z(), index.x(), index.y());
        let dirs = match self {
            Self::Simple => vec![z.to_string(), x.to_string(), y.to_string()],
            Self::Legacy => legacy::coord_to_dir(z, x, y),
            Self::Hilbert => hilbert::coord_to_dir(z, x, y),
        };
        let name = format!("{z}-{x}-{y}@{}{extension}", index.stride());
        let prefix = prefix.trim_matches('/');

        iter::once(prefix)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .chain(dirs)
            .chain(iter::once(name))
            .join("/")
    }
}

impl Display for KeyMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Legacy => "legacy",
            Self::Hilbert => "hilbert",
        })
    }
}

impl FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "legacy" => Ok(Self::Legacy),
            "hilbert" => Ok(Self::Hilbert),
            _ => Err(format!(
                "Invalid key mode {s}, expected one of: simple, legacy, hilbert"
            )),
        }
    }
}
