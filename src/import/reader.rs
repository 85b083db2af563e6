use crate::foundation::error::{MockupError, MockupResult};

/// Four ASCII bytes as a big-endian `u32` key.
pub(crate) const fn fourcc(s: &[u8; 4]) -> u32 {
    ((s[0] as u32) << 24) | ((s[1] as u32) << 16) | ((s[2] as u32) << 8) | (s[3] as u32)
}

/// Printable form of a four-byte key for diagnostics.
pub(crate) fn fourcc_to_string(cc: u32) -> String {
    cc.to_be_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            }
        })
        .collect()
}

/// Big-endian cursor over a borrowed byte slice.
#[derive(Clone, Debug)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn bytes(&mut self, n: usize) -> MockupResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(MockupError::import(format!(
                "unexpected end of data: need {n} bytes at offset {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn skip(&mut self, n: usize) -> MockupResult<()> {
        self.bytes(n).map(|_| ())
    }

    /// Split off the next `n` bytes as an independent reader.
    pub(crate) fn sub(&mut self, n: usize) -> MockupResult<ByteReader<'a>> {
        Ok(ByteReader::new(self.bytes(n)?))
    }

    fn array<const N: usize>(&mut self) -> MockupResult<[u8; N]> {
        let b = self.bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(b);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> MockupResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> MockupResult<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn i16(&mut self) -> MockupResult<i16> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> MockupResult<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn i32(&mut self) -> MockupResult<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> MockupResult<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub(crate) fn i64(&mut self) -> MockupResult<i64> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    pub(crate) fn f64(&mut self) -> MockupResult<f64> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    pub(crate) fn fourcc(&mut self) -> MockupResult<u32> {
        self.u32()
    }

    /// Section length: 4 bytes in PSD, 8 bytes in PSB.
    pub(crate) fn length(&mut self, wide: bool) -> MockupResult<usize> {
        let n = if wide {
            self.u64()?
        } else {
            u64::from(self.u32()?)
        };
        usize::try_from(n).map_err(|_| MockupError::import("section length exceeds address space"))
    }

    /// Pascal string whose total size (length byte included) is padded to `align`.
    pub(crate) fn pascal_string(&mut self, align: usize) -> MockupResult<String> {
        let len = usize::from(self.u8()?);
        let raw = self.bytes(len)?;
        let total = 1 + len;
        let padded = total.div_ceil(align) * align;
        self.skip(padded - total)?;
        Ok(raw.iter().map(|&b| b as char).collect())
    }

    /// UTF-16BE string prefixed by its length in code units; a trailing NUL is dropped.
    pub(crate) fn unicode_string(&mut self) -> MockupResult<String> {
        let units = self.u32()? as usize;
        let raw = self.bytes(units.checked_mul(2).ok_or_else(|| {
            MockupError::import("unicode string length overflows")
        })?)?;
        let code_units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        let mut s = String::from_utf16_lossy(&code_units);
        while s.ends_with('\0') {
            s.pop();
        }
        Ok(s)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/import/reader.rs"]
mod tests;
