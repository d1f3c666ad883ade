//! System-name lookup.
//!
//! Each format keeps a table of `[long, short, abbreviation]` rows indexed
//! by a small enum of the systems it recognizes. Some formats keep a second
//! table for the names used in the ROM's own region (e.g. "Genesis" versus
//! "Mega Drive").

/// Which length of name to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameForm {
    #[default]
    Long,
    Short,
    Abbreviation,
}

/// Whether to use the worldwide name or the one used in the ROM's region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameRegion {
    #[default]
    Generic,
    RomLocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemNameVariant {
    pub form: NameForm,
    pub region: NameRegion,
}

impl SystemNameVariant {
    pub const LONG: Self = Self {
        form: NameForm::Long,
        region: NameRegion::Generic,
    };

    pub const SHORT: Self = Self {
        form: NameForm::Short,
        region: NameRegion::Generic,
    };

    pub const ABBREVIATION: Self = Self {
        form: NameForm::Abbreviation,
        region: NameRegion::Generic,
    };

    pub fn rom_local(self) -> Self {
        Self {
            region: NameRegion::RomLocal,
            ..self
        }
    }
}

/// A row of `[long, short, abbreviation]` names.
pub type SystemNameRow = [&'static str; 3];

/// Look up a name with bounds checking.
pub fn lookup(
    table: &[SystemNameRow],
    index: usize,
    variant: SystemNameVariant,
) -> Option<&'static str> {
    let row = table.get(index)?;
    let col = match variant.form {
        NameForm::Long => 0,
        NameForm::Short => 1,
        NameForm::Abbreviation => 2,
    };
    Some(row[col])
}
