//! Grid cell keys.
//!
//! A [`GridKey`] names one node of a correction grid by its column and row.
//! Keys have a packed 32-bit form used for hashing and persistence, and a
//! legacy six-digit hexadecimal form.
//!
//! # Legacy Key Format
//!
//! The legacy form concatenates the row and the column as three lowercase
//! hex digits each: `{row:03x}{column:03x}`.
//!
//! - `13928b` is row `0x139` (313), column `0x28b` (651)
//! - Only columns and rows up to `0xfff` (4095) have a legacy form

use std::fmt;

/// Largest column or row that fits the legacy hex form.
pub const LEGACY_MAX: u16 = 0xfff;

/// Column and row index of one grid node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridKey {
    /// Column index (eastings direction).
    pub column: u16,
    /// Row index (northings direction).
    pub row: u16,
}

impl GridKey {
    /// Create a key from a column and row.
    pub const fn new(column: u16, row: u16) -> Self {
        Self { column, row }
    }

    /// Pack the key into a single `u32`: row in the high half, column in the low half.
    ///
    /// Packed keys sort row-major, which is the canonical node order of a dataset.
    pub const fn packed(self) -> u32 {
        ((self.row as u32) << 16) | self.column as u32
    }

    /// Inverse of [`GridKey::packed`].
    pub const fn from_packed(packed: u32) -> Self {
        Self {
            column: (packed & 0xffff) as u16,
            row: (packed >> 16) as u16,
        }
    }

    /// Format the key in the legacy hex form, or `None` if it does not fit.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridshift::GridKey;
    ///
    /// assert_eq!(GridKey::new(651, 313).to_legacy_hex().as_deref(), Some("13928b"));
    /// assert_eq!(GridKey::new(5000, 0).to_legacy_hex(), None);
    /// ```
    pub fn to_legacy_hex(self) -> Option<String> {
        if self.column > LEGACY_MAX || self.row > LEGACY_MAX {
            return None;
        }
        Some(format!("{:03x}{:03x}", self.row, self.column))
    }

    /// Parse a legacy hex key.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridshift::GridKey;
    ///
    /// assert_eq!(GridKey::from_legacy_hex("13928b"), Some(GridKey::new(651, 313)));
    /// assert_eq!(GridKey::from_legacy_hex("13A28B"), Some(GridKey::new(651, 314)));
    /// assert_eq!(GridKey::from_legacy_hex("invalid"), None);
    /// ```
    pub fn from_legacy_hex(key: &str) -> Option<Self> {
        let key = key.trim();

        // Must be exactly 6 hex digits: rrrccc
        if key.len() != 6 || !key.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let row = u16::from_str_radix(&key[0..3], 16).ok()?;
        let column = u16::from_str_radix(&key[3..6], 16).ok()?;

        Some(Self { column, row })
    }
}

impl fmt::Display for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

impl From<(u16, u16)> for GridKey {
    fn from((column, row): (u16, u16)) -> Self {
        Self { column, row }
    }
}

impl From<GridKey> for (u16, u16) {
    fn from(key: GridKey) -> Self {
        (key.column, key.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_roundtrip() {
        let keys = [
            GridKey::new(0, 0),
            GridKey::new(651, 313),
            GridKey::new(u16::MAX, 0),
            GridKey::new(0, u16::MAX),
            GridKey::new(u16::MAX, u16::MAX),
        ];

        for key in keys {
            assert_eq!(GridKey::from_packed(key.packed()), key);
        }
    }

    #[test]
    fn test_packed_order_is_row_major() {
        let a = GridKey::new(700, 10);
        let b = GridKey::new(0, 11);
        assert!(a.packed() < b.packed());
    }

    #[test]
    fn test_legacy_hex_known_keys() {
        assert_eq!(GridKey::from_legacy_hex("13928b"), Some(GridKey::new(651, 313)));
        assert_eq!(GridKey::from_legacy_hex("13928c"), Some(GridKey::new(652, 313)));
        assert_eq!(GridKey::from_legacy_hex("13a28b"), Some(GridKey::new(651, 314)));
        assert_eq!(GridKey::from_legacy_hex("13a28c"), Some(GridKey::new(652, 314)));
        assert_eq!(GridKey::from_legacy_hex("000000"), Some(GridKey::new(0, 0)));
    }

    #[test]
    fn test_legacy_hex_invalid() {
        assert_eq!(GridKey::from_legacy_hex(""), None);
        assert_eq!(GridKey::from_legacy_hex("13928"), None); // Too short
        assert_eq!(GridKey::from_legacy_hex("13928b0"), None); // Too long
        assert_eq!(GridKey::from_legacy_hex("13928g"), None); // Not hex
        assert_eq!(GridKey::from_legacy_hex("+1392b"), None);
    }

    #[test]
    fn test_legacy_hex_roundtrip() {
        for key in [GridKey::new(0, 0), GridKey::new(700, 1250), GridKey::new(4095, 4095)] {
            let hex = key.to_legacy_hex().unwrap();
            assert_eq!(GridKey::from_legacy_hex(&hex), Some(key));
        }
        assert_eq!(GridKey::new(4096, 0).to_legacy_hex(), None);
        assert_eq!(GridKey::new(0, 4096).to_legacy_hex(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(GridKey::new(651, 313).to_string(), "(651, 313)");
    }
}
