//! Little-endian helpers for the persisted blob formats.
//!
//! Every multi-byte field in an index, dataset, or engine file is
//! little-endian. Readers never panic on short input: each accessor returns
//! `None` once the buffer is exhausted and the caller maps that to the
//! appropriate corruption error.

/// Sequential reader over a byte slice.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N)?.try_into().ok()
    }

    pub(crate) fn u16(&mut self) -> Option<u16> {
        self.array().map(u16::from_le_bytes)
    }

    pub(crate) fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_le_bytes)
    }

    pub(crate) fn u64(&mut self) -> Option<u64> {
        self.array().map(u64::from_le_bytes)
    }

    pub(crate) fn f64(&mut self) -> Option<f64> {
        self.array().map(f64::from_le_bytes)
    }
}

/// Read a little-endian `u16` at `offset`. The caller guarantees bounds.
#[inline]
pub(crate) fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Read a little-endian `u32` at `offset`. The caller guarantees bounds.
#[inline]
pub(crate) fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_sequence() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"ABCD");
        buf.extend_from_slice(&7u16.to_le_bytes());
        buf.extend_from_slice(&0xdead_beefu32.to_le_bytes());
        buf.extend_from_slice(&42u64.to_le_bytes());
        buf.extend_from_slice(&1.5f64.to_le_bytes());

        let mut reader = Reader::new(&buf);
        assert_eq!(reader.take(4), Some(&b"ABCD"[..]));
        assert_eq!(reader.u16(), Some(7));
        assert_eq!(reader.u32(), Some(0xdead_beef));
        assert_eq!(reader.u64(), Some(42));
        assert_eq!(reader.f64(), Some(1.5));
        assert_eq!(reader.u16(), None);
        assert_eq!(reader.take(0), Some(&[][..]));
    }

    #[test]
    fn test_reader_short_input() {
        let mut reader = Reader::new(&[1, 2, 3]);
        assert_eq!(reader.u32(), None);
        // A failed read does not consume anything
        assert_eq!(reader.u16(), Some(0x0201));
    }

    #[test]
    fn test_offset_reads() {
        let mut buf = vec![0u8; 2];
        buf.extend_from_slice(&(-5i32).to_le_bytes());
        buf.extend_from_slice(&0xbeefu16.to_le_bytes());
        assert_eq!(u32_at(&buf, 2), (-5i32) as u32);
        assert_eq!(u16_at(&buf, 6), 0xbeef);
        assert_eq!(u16_at(&buf, 0), 0);
    }
}
