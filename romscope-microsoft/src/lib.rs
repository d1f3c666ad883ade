//! Microsoft format parsers.
//!
//! - DOS and Windows executables (MZ, PE32, PE32+), with access to the
//!   resource section and the version resource
//! - DirectDraw Surface textures

pub mod dds;
pub mod exe;
pub mod pe_resource;
pub mod version;

pub use dds::DirectDrawSurface;
pub use exe::{Executable, Section};
pub use pe_resource::{PeResourceReader, ResourceData, ResourceName};
pub use version::{FixedFileInfo, StringTable, VersionInfo};

#[cfg(test)]
pub(crate) mod test_util {
    use romscope_core::{DetectInfo, FieldList, MemStream, ParseContext, RomFormat};

    pub(crate) fn ctx() -> ParseContext {
        ParseContext::default().with_language("en")
    }

    pub(crate) fn detect<F: RomFormat>(data: &[u8]) -> Option<u32> {
        let precedence = ctx().save_precedence;
        let info = DetectInfo {
            header: &data[..data.len().min(F::HEADER_SIZE)],
            size: data.len() as u64,
            ext: None,
            save_precedence: &precedence,
        };
        F::detect(&info)
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
