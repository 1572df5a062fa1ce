//! Compatibility remap tables.
//!
//! Vendor tables for "the same" Japanese character set disagree on a handful
//! of symbols. Each entry pairs the strict Unicode code point with the one
//! the vendor table produces, and says in which direction the substitution
//! is made.

use crate::codec::Utf16Units;

/// Direction flags of a [`CompatEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatFlags(u8);

impl CompatFlags {
    /// Applied on the destination side: `unicode` becomes `native` before encoding
    pub const INBOUND: CompatFlags = CompatFlags(0b01);
    /// Applied on the source side: a decoded `native` becomes `unicode`
    pub const OUTBOUND: CompatFlags = CompatFlags(0b10);
    /// Both directions
    pub const BOTH: CompatFlags = CompatFlags(0b11);

    /// True when every flag in `other` is set in `self`.
    pub const fn contains(self, other: CompatFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// One entry of a compatibility table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatEntry {
    /// Strict Unicode code point
    pub unicode: u16,
    /// Code point the vendor table maps the same byte sequence to
    pub native: u16,
    /// Substitution directions
    pub flags: CompatFlags,
}

impl CompatEntry {
    const fn new(unicode: u16, native: u16, flags: CompatFlags) -> Self {
        Self {
            unicode,
            native,
            flags,
        }
    }
}

/// Windows-31J family.
pub(crate) static CP932_COMPAT: [CompatEntry; 9] = [
    CompatEntry::new(0x00A5, 0x005C, CompatFlags::INBOUND), // YEN SIGN
    CompatEntry::new(0x203E, 0x007E, CompatFlags::INBOUND), // OVERLINE
    CompatEntry::new(0x2014, 0x2015, CompatFlags::INBOUND), // EM DASH
    CompatEntry::new(0x301C, 0xFF5E, CompatFlags::BOTH),    // WAVE DASH
    CompatEntry::new(0x2016, 0x2225, CompatFlags::INBOUND), // DOUBLE VERTICAL LINE
    CompatEntry::new(0x2212, 0xFF0D, CompatFlags::INBOUND), // MINUS SIGN
    CompatEntry::new(0x00A2, 0xFFE0, CompatFlags::INBOUND), // CENT SIGN
    CompatEntry::new(0x00A3, 0xFFE1, CompatFlags::INBOUND), // POUND SIGN
    CompatEntry::new(0x00AC, 0xFFE2, CompatFlags::INBOUND), // NOT SIGN
];

/// Table attached to `codepage`, if any.
pub(crate) fn table_for(codepage: u32) -> Option<&'static [CompatEntry]> {
    match codepage {
        932 | 51932 | 50221 | 50222 => Some(&CP932_COMPAT),
        _ => None,
    }
}

/// Source-side substitution for one decoded unit.
pub(crate) fn outbound(table: &[CompatEntry], unit: u16) -> u16 {
    table
        .iter()
        .find(|e| e.flags.contains(CompatFlags::OUTBOUND) && e.native == unit)
        .map_or(unit, |e| e.unicode)
}

/// Destination-side substitution for one unit about to be encoded.
pub(crate) fn inbound(table: &[CompatEntry], unit: u16) -> u16 {
    table
        .iter()
        .find(|e| e.flags.contains(CompatFlags::INBOUND) && e.unicode == unit)
        .map_or(unit, |e| e.native)
}

/// Apply both sides of the remap step. Only single BMP units take part.
pub(crate) fn remap(
    units: &mut Utf16Units,
    source: Option<&[CompatEntry]>,
    destination: Option<&[CompatEntry]>,
) {
    let Some(mut unit) = units.single() else {
        return;
    };
    if let Some(table) = source {
        unit = outbound(table, unit);
    }
    if let Some(table) = destination {
        unit = inbound(table, unit);
    }
    *units = Utf16Units::from_unit(unit);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        assert!(CompatFlags::BOTH.contains(CompatFlags::INBOUND));
        assert!(CompatFlags::BOTH.contains(CompatFlags::OUTBOUND));
        assert!(!CompatFlags::INBOUND.contains(CompatFlags::OUTBOUND));
    }

    #[test]
    fn test_table_has_unique_keys() {
        for entry in &CP932_COMPAT {
            let same_unicode = CP932_COMPAT.iter().filter(|e| e.unicode == entry.unicode).count();
            let same_native = CP932_COMPAT.iter().filter(|e| e.native == entry.native).count();
            assert_eq!(same_unicode, 1);
            assert_eq!(same_native, 1);
        }
    }

    #[test]
    fn test_directional_lookup() {
        assert_eq!(inbound(&CP932_COMPAT, 0x301C), 0xFF5E);
        assert_eq!(outbound(&CP932_COMPAT, 0xFF5E), 0x301C);
        assert_eq!(inbound(&CP932_COMPAT, 0x2212), 0xFF0D);
        // Inbound-only entries are not reversed
        assert_eq!(outbound(&CP932_COMPAT, 0xFF0D), 0xFF0D);
        assert_eq!(inbound(&CP932_COMPAT, 0x3042), 0x3042);
    }

    #[test]
    fn test_remap_both_sides() {
        let mut units = Utf16Units::from_unit(0xFF5E);
        remap(&mut units, Some(&CP932_COMPAT), None);
        assert_eq!(units.as_slice(), &[0x301C]);

        let mut units = Utf16Units::from_unit(0xFF5E);
        remap(&mut units, Some(&CP932_COMPAT), Some(&CP932_COMPAT));
        assert_eq!(units.as_slice(), &[0xFF5E]);

        let mut pair = Utf16Units::new();
        pair.push(0xD83D);
        pair.push(0xDE00);
        remap(&mut pair, Some(&CP932_COMPAT), Some(&CP932_COMPAT));
        assert_eq!(pair.as_slice(), &[0xD83D, 0xDE00]);
    }

    #[test]
    fn test_tables_by_code_page() {
        assert!(table_for(932).is_some());
        assert!(table_for(50221).is_some());
        assert!(table_for(50220).is_none());
        assert!(table_for(65001).is_none());
    }
}
