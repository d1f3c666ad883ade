//! Ordered, typed field lists that every parser populates.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::RomError;

/// The declared kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldKind {
    String,
    Bitfield,
    DateTime,
    Numeric,
    Table,
}

/// How a numeric field is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NumberFormat {
    Decimal,
    /// `0x`-prefixed, zero-padded to the given number of digits
    Hex(u8),
}

/// An unsigned value plus the names of its bits, least significant first.
/// A `None` name marks an unused or reserved bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bitfield {
    pub value: u32,
    pub names: Vec<Option<&'static str>>,
}

impl Bitfield {
    pub fn new(value: u32, names: &[Option<&'static str>]) -> Self {
        Self {
            value,
            names: names.to_vec(),
        }
    }

    /// Every named bit with its state.
    pub fn flags(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(bit, name)| name.map(|n| (n, bit < 32 && self.value & (1 << bit) != 0)))
    }
}

/// A small table of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The value carried by a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Bitfield(Bitfield),
    DateTime(NaiveDateTime),
    Numeric { value: i64, format: NumberFormat },
    Table(Table),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::String(_) => FieldKind::String,
            Self::Bitfield(_) => FieldKind::Bitfield,
            Self::DateTime(_) => FieldKind::DateTime,
            Self::Numeric { .. } => FieldKind::Numeric,
            Self::Table(_) => FieldKind::Table,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Bitfield(bits) => {
                let set: Vec<&str> = bits
                    .flags()
                    .filter(|(_, on)| *on)
                    .map(|(name, _)| name)
                    .collect();
                if set.is_empty() {
                    f.write_str("(none)")
                } else {
                    f.write_str(&set.join(", "))
                }
            }
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Self::Numeric { value, format } => match format {
                NumberFormat::Decimal => write!(f, "{value}"),
                NumberFormat::Hex(digits) => {
                    write!(f, "0x{:0width$X}", value, width = *digits as usize)
                }
            },
            Self::Table(table) => {
                for (i, row) in table.rows.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    f.write_str(&row.join(" | "))?;
                }
                Ok(())
            }
        }
    }
}

/// One displayable record. `value == None` renders as "Unknown".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub label: String,
    pub kind: FieldKind,
    pub value: Option<FieldValue>,
}

impl Field {
    pub fn display_value(&self) -> String {
        match &self.value {
            Some(v) => v.to_string(),
            None => "Unknown".to_string(),
        }
    }
}

/// Ordered sequence of fields. Insertion order is display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldList {
    fields: Vec<Field>,
}

impl FieldList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, checking that `value` matches `kind`.
    pub fn push(
        &mut self,
        label: impl Into<String>,
        kind: FieldKind,
        value: Option<FieldValue>,
    ) -> Result<(), RomError> {
        let label = label.into();
        if let Some(v) = &value
            && v.kind() != kind
        {
            return Err(RomError::FieldKindMismatch {
                label,
                expected: kind,
                actual: v.kind(),
            });
        }
        self.fields.push(Field { label, kind, value });
        Ok(())
    }

    fn push_value(&mut self, label: impl Into<String>, value: FieldValue) {
        self.fields.push(Field {
            label: label.into(),
            kind: value.kind(),
            value: Some(value),
        });
    }

    pub fn add_string(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.push_value(label, FieldValue::String(value.into()));
    }

    pub fn add_bitfield(
        &mut self,
        label: impl Into<String>,
        value: u32,
        names: &[Option<&'static str>],
    ) {
        self.push_value(label, FieldValue::Bitfield(Bitfield::new(value, names)));
    }

    pub fn add_datetime(&mut self, label: impl Into<String>, value: NaiveDateTime) {
        self.push_value(label, FieldValue::DateTime(value));
    }

    pub fn add_numeric(&mut self, label: impl Into<String>, value: i64) {
        self.push_value(
            label,
            FieldValue::Numeric {
                value,
                format: NumberFormat::Decimal,
            },
        );
    }

    pub fn add_hex(&mut self, label: impl Into<String>, value: u64, digits: u8) {
        self.push_value(
            label,
            FieldValue::Numeric {
                value: value as i64,
                format: NumberFormat::Hex(digits),
            },
        );
    }

    pub fn add_table(
        &mut self,
        label: impl Into<String>,
        columns: &[&str],
        rows: Vec<Vec<String>>,
    ) {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.push_value(label, FieldValue::Table(Table { columns, rows }));
    }

    /// A field whose value could not be read.
    pub fn add_unknown(&mut self, label: impl Into<String>, kind: FieldKind) {
        self.fields.push(Field {
            label: label.into(),
            kind,
            value: None,
        });
    }

    /// Add a string if `value` is `Some`, otherwise an unknown string field.
    pub fn add_string_or_unknown(&mut self, label: impl Into<String>, value: Option<String>) {
        match value {
            Some(v) => self.add_string(label, v),
            None => self.add_unknown(label, FieldKind::String),
        }
    }

    pub fn get(&self, label: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.label == label)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'a> IntoIterator for &'a FieldList {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
#[path = "tests/fields_tests.rs"]
mod tests;
