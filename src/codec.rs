//! Little-endian wire codec: varints, cursor reader and buffer writer

use crate::error::{Result, TxError};

/// Bitcoin's variable-length unsigned integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt(pub u64);

impl VarInt {
    /// Number of bytes this value occupies on the wire
    pub fn size(&self) -> usize {
        match self.0 {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        }
    }

    pub fn size_of(value: usize) -> usize {
        VarInt(value as u64).size()
    }
}

impl From<usize> for VarInt {
    fn from(v: usize) -> Self {
        VarInt(v as u64)
    }
}

/// Cursor over a byte slice; every failed read is `MalformedInput`
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Bytes consumed since `start`
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.data[start..self.pos]
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(TxError::MalformedInput(format!(
                "unexpected end of data: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        match self.read_u8()? {
            0xfd => Ok(self.read_u16_le()? as u64),
            0xfe => Ok(self.read_u32_le()? as u64),
            0xff => self.read_u64_le(),
            b => Ok(b as u64),
        }
    }

    /// Read a count that must fit in the remaining data (each counted item is at least one byte)
    pub fn read_count(&mut self) -> Result<usize> {
        let count = self.read_varint()?;
        if count > self.remaining() as u64 {
            return Err(TxError::MalformedInput(format!(
                "count {} exceeds remaining {} bytes",
                count,
                self.remaining()
            )));
        }
        Ok(count as usize)
    }

    /// Varint length prefix followed by that many bytes
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            return Err(TxError::MalformedInput(format!(
                "declared length {} exceeds remaining {} bytes",
                len,
                self.remaining()
            )));
        }
        self.read_bytes(len as usize)
    }
}

/// Growable output buffer
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Writer { buf: Vec::with_capacity(capacity) }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    pub fn write_u32_le(&mut self, val: u32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_i32_le(&mut self, val: i32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u64_le(&mut self, val: u64) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_varint(&mut self, value: VarInt) {
        let v = value.0;
        if v < 0xfd {
            self.buf.push(v as u8);
        } else if v <= 0xffff {
            self.buf.push(0xfd);
            self.buf.extend_from_slice(&(v as u16).to_le_bytes());
        } else if v <= 0xffff_ffff {
            self.buf.push(0xfe);
            self.buf.extend_from_slice(&(v as u32).to_le_bytes());
        } else {
            self.buf.push(0xff);
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(VarInt::from(bytes.len()));
        self.write_bytes(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
