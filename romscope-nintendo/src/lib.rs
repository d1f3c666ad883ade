//! Nintendo format parsers.
//!
//! - NES / Famicom Disk System
//! - SNES (Super Famicom)
//! - Nintendo 64
//! - Game Boy / Game Boy Color
//! - Game Boy Advance
//! - Nintendo DS / DSi
//! - Nintendo 3DS (SMDH, 3DSX, CCI, CIA, NCCH)
//! - GameCube and Wii discs, with the encrypted Wii partition reader
//! - GameCube memory card saves (GCI, GCS, SAV)

pub mod ds;
pub mod gameboy;
pub mod gamecube;
pub(crate) mod gametdb;
pub mod gba;
pub mod gcn_banner;
pub mod gcn_fst;
pub mod gcn_save;
pub(crate) mod licensee;
pub mod n3ds;
pub mod n64;
pub(crate) mod n64_byteorder;
pub mod nes;
pub mod snes;
pub mod wii_partition;

pub use ds::NintendoDs;
pub use gameboy::GameBoy;
pub use gamecube::GameCubeDisc;
pub use gba::GameBoyAdvance;
pub use gcn_save::GameCubeSave;
pub use n3ds::Nintendo3ds;
pub use n64::N64;
pub use nes::Nes;
pub use snes::Snes;
pub use wii_partition::WiiPartition;
