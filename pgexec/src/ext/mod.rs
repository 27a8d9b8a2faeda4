use crate::row::DecodeError;

/// Fixed width big endian read from wire bytes.
pub trait SliceExt {
    /// Read `N` bytes at `offset` as array.
    ///
    /// Returns [`DecodeError::Length`] instead of panic when too short.
    fn be_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], DecodeError>;

    fn be_i16(&self, offset: usize) -> Result<i16, DecodeError> {
        self.be_array(offset).map(i16::from_be_bytes)
    }

    fn be_i32(&self, offset: usize) -> Result<i32, DecodeError> {
        self.be_array(offset).map(i32::from_be_bytes)
    }

    fn be_i64(&self, offset: usize) -> Result<i64, DecodeError> {
        self.be_array(offset).map(i64::from_be_bytes)
    }

    fn be_f32(&self, offset: usize) -> Result<f32, DecodeError> {
        self.be_array(offset).map(f32::from_be_bytes)
    }

    fn be_f64(&self, offset: usize) -> Result<f64, DecodeError> {
        self.be_array(offset).map(f64::from_be_bytes)
    }
}

impl SliceExt for [u8] {
    fn be_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], DecodeError> {
        match self.get(offset..offset + N) {
            Some(slice) => {
                let mut buf = [0u8; N];
                buf.copy_from_slice(slice);
                Ok(buf)
            }
            None => Err(DecodeError::Length { expected: offset + N, actual: self.len() }),
        }
    }
}

/// Helper trait to [`Display`][std::fmt::Display] bytes.
pub trait FmtExt {
    /// Lossy [`Display`][std::fmt::Display] bytes.
    fn lossy(&self) -> LossyFmt<'_>;
}

/// Lossy [`Display`][std::fmt::Display] implementation for bytes.
pub struct LossyFmt<'a>(pub &'a [u8]);

impl FmtExt for [u8] {
    fn lossy(&self) -> LossyFmt<'_> {
        LossyFmt(self)
    }
}

impl std::fmt::Display for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b.is_ascii_whitespace() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:x}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b\"{self}\"")
    }
}
