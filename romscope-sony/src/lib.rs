//! Sony format parsers.
//!
//! - PlayStation memory card saves (PSV, MCS, raw `SC` blocks)

pub mod ps1_save;

pub use ps1_save::PlayStationSave;
