//! Sega format parsers.
//!
//! - Mega Drive / Genesis, 32X and Pico cartridges (plain and SMD-interleaved)
//! - Master System / Game Gear cartridges
//! - Dreamcast VMU saves (VMS, VMI, DCI, ICONDATA_VMS)
//! - PowerVR and GameCube textures (PVR, GVR)

pub mod dreamcast_save;
pub mod master_system;
pub mod mega_drive;
pub mod pvr;

pub use dreamcast_save::DreamcastSave;
pub use master_system::MasterSystem;
pub use mega_drive::MegaDrive;
pub use pvr::SegaPvr;

#[cfg(test)]
pub(crate) mod test_util {
    use romscope_core::{DetectInfo, FieldList, MemStream, ParseContext, RomFormat};

    pub(crate) fn ctx() -> ParseContext {
        ParseContext::default().with_language("en")
    }

    pub(crate) fn detect_ext<F: RomFormat>(data: &[u8], ext: Option<&str>) -> Option<u32> {
        let precedence = ctx().save_precedence;
        let info = DetectInfo {
            header: &data[..data.len().min(F::HEADER_SIZE)],
            size: data.len() as u64,
            ext,
            save_precedence: &precedence,
        };
        F::detect(&info)
    }

    pub(crate) fn detect<F: RomFormat>(data: &[u8]) -> Option<u32> {
        detect_ext::<F>(data, None)
    }

    pub(crate) fn open<F: RomFormat>(data: Vec<u8>) -> F {
        let id = detect::<F>(&data).expect("detect failed");
        F::open(Box::new(MemStream::new(data)), id, &ctx()).expect("open failed")
    }

    pub(crate) fn load_fields<F: RomFormat>(data: Vec<u8>) -> FieldList {
        let mut rom = open::<F>(data);
        let mut fields = FieldList::new();
        rom.load_fields(&ctx(), &mut fields).expect("load_fields failed");
        fields
    }

    pub(crate) fn field_text(fields: &FieldList, label: &str) -> String {
        fields
            .get(label)
            .unwrap_or_else(|| panic!("missing field {label}"))
            .display_value()
    }
}
