use crate::error::{Error, Result};

/// Big-endian cursor over raw classfile bytes.
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn read_u1(&mut self) -> Result<u8> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    pub fn read_u2(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u4(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(Error::UnexpectedEof)?;
        if end > self.bytes.len() {
            return Err(Error::UnexpectedEof);
        }
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len)?;
        Ok(())
    }

    pub fn ensure_empty(&self) -> Result<()> {
        let remaining = self.bytes.len() - self.pos;
        if remaining != 0 {
            return Err(Error::TrailingBytes(remaining));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_integers() {
        let mut reader = Reader::new(&[0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x41]);
        assert_eq!(reader.read_u4().unwrap(), 0xCAFE_BABE);
        assert_eq!(reader.read_u2().unwrap(), 0x41);
        assert!(reader.ensure_empty().is_ok());
    }

    #[test]
    fn short_input_is_unexpected_eof() {
        let mut reader = Reader::new(&[0x01]);
        assert!(matches!(reader.read_u2(), Err(Error::UnexpectedEof)));
    }
}
