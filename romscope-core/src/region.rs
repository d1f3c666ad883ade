use serde::Serialize;

/// Geographic regions for ROM releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Region {
    Japan,
    /// USA / North America
    Usa,
    /// Europe (PAL regions)
    Europe,
    Australia,
    Korea,
    China,
    /// Taiwan / Hong Kong
    Taiwan,
    Brazil,
    /// Region-free
    World,
    Unknown,
}

impl Region {
    /// Standard three-letter abbreviation.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Japan => "JPN",
            Self::Usa => "USA",
            Self::Europe => "EUR",
            Self::Australia => "AUS",
            Self::Korea => "KOR",
            Self::China => "CHN",
            Self::Taiwan => "TWN",
            Self::Brazil => "BRA",
            Self::World => "WLD",
            Self::Unknown => "UNK",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Japan => "Japan",
            Self::Usa => "USA",
            Self::Europe => "Europe",
            Self::Australia => "Australia",
            Self::Korea => "Korea",
            Self::China => "China",
            Self::Taiwan => "Taiwan",
            Self::Brazil => "Brazil",
            Self::World => "Region-Free",
            Self::Unknown => "Unknown",
        }
    }

    /// Region from the last character of a Nintendo-style game ID
    /// (e.g. the `E` in `RMGE01`).
    pub fn from_game_id_char(c: char) -> Self {
        match c.to_ascii_uppercase() {
            'J' => Self::Japan,
            'E' | 'N' => Self::Usa,
            'P' | 'D' | 'F' | 'S' | 'I' | 'H' | 'X' | 'Y' | 'Z' | 'L' | 'M' | 'V' => Self::Europe,
            'U' => Self::Australia,
            'K' | 'Q' | 'T' => Self::Korea,
            'C' => Self::China,
            'W' => Self::Taiwan,
            'A' => Self::World,
            _ => Self::Unknown,
        }
    }

    /// Region code used by GameTDB artwork paths.
    pub fn gametdb_code(&self, game_id_char: char) -> &'static str {
        match game_id_char.to_ascii_uppercase() {
            'D' => "DE",
            'F' => "FR",
            'S' => "ES",
            'I' => "IT",
            'H' => "NL",
            'U' => "AU",
            _ => match self {
                Self::Japan => "JA",
                Self::Usa => "US",
                Self::Korea => "KO",
                Self::China | Self::Taiwan => "ZH",
                _ => "EN",
            },
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One entry of a per-format region bit table.
pub type RegionBit = (u32, &'static str);

/// Describe a region bitmask using a per-format table.
///
/// Returns "Region-Free" when every bit in `all_mask` is set, the matching
/// names joined with ", " otherwise, and `fallback` when no known bit is set.
pub fn describe_region_bits(
    bits: u32,
    table: &[RegionBit],
    all_mask: u32,
    fallback: &'static str,
) -> String {
    if all_mask != 0 && bits & all_mask == all_mask {
        return Region::World.name().to_string();
    }
    let names: Vec<&str> = table
        .iter()
        .filter(|(bit, _)| bits & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        fallback.to_string()
    } else {
        names.join(", ")
    }
}
