use crate::models::error::WavError;

/// Bounds-checked little-endian cursor over a chunk body.
///
/// Every read names the chunk it belongs to so truncation errors say where
/// they happened.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    chunk: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], chunk: &'static str) -> Self {
        Self { buf, pos: 0, chunk }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], WavError> {
        if n > self.remaining() {
            return Err(WavError::MalformedChunk {
                chunk: self.chunk,
                reason: format!("needs {} bytes at offset {}, has {}", n, self.pos, self.remaining()),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), WavError> {
        self.bytes(n).map(|_| ())
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    pub fn tag(&mut self) -> Result<[u8; 4], WavError> {
        let b = self.bytes(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    pub fn u8(&mut self) -> Result<u8, WavError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16_le(&mut self) -> Result<u16, WavError> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u16_be(&mut self) -> Result<u16, WavError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32_le(&mut self) -> Result<u32, WavError> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u32_be(&mut self) -> Result<u32, WavError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Render a chunk tag for messages, replacing non-printable bytes.
pub(crate) fn tag_name(tag: &[u8; 4]) -> String {
    tag.iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}
