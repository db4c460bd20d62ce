//! Bit-level cursor over a received message
//!
//! Every sync message is packed most-significant-bit first with fields that
//! straddle byte boundaries, so all decoding goes through [`BitReader`].
//! Multi-byte integers are big-endian. [`BitWriter`] is the inverse and is
//! used by the chat codec and by anything that needs to build a payload.

use mudsync_core::{Result, SyncError};

/// Cursor over an immutable byte slice with a bit offset
///
/// # Purpose
/// Reads 1-32 bit fields MSB first, and the byte-sized integers, smart
/// integers and strings that make up the byte-aligned messages.
///
/// A read that would cross the end of the slice fails with
/// [`SyncError::TruncatedMessage`] and leaves the cursor where it was.
///
/// # Example
///
/// ```
/// use mudsync_protocol::BitReader;
///
/// let data = [0b1011_0000, 0xFF];
/// let mut reader = BitReader::new(&data);
/// assert_eq!(reader.read_bits(3).unwrap(), 0b101);
/// assert_eq!(reader.read_bits(5).unwrap(), 0b1_0000);
/// assert_eq!(reader.read_u8().unwrap(), 0xFF);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_offset: usize,
}

impl<'a> BitReader<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_offset: 0 }
    }

    /// Start reading at a byte offset into `data`
    #[inline]
    pub fn at_byte(data: &'a [u8], byte_offset: usize) -> Self {
        Self {
            data,
            bit_offset: byte_offset.min(data.len()) * 8,
        }
    }

    #[inline]
    pub fn bit_offset(&self) -> usize {
        self.bit_offset
    }

    /// Index of the byte holding the next unread bit
    #[inline]
    pub fn byte_offset(&self) -> usize {
        self.bit_offset >> 3
    }

    #[inline]
    pub fn len_bits(&self) -> usize {
        self.data.len() * 8
    }

    #[inline]
    pub fn remaining_bits(&self) -> usize {
        self.len_bits() - self.bit_offset
    }

    /// Whole bytes left after rounding the cursor up to a byte boundary
    #[inline]
    pub fn remaining_bytes(&self) -> usize {
        self.data.len() - self.bit_offset.div_ceil(8).min(self.data.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0
    }

    fn ensure(&self, bits: usize) -> Result<()> {
        let available = self.remaining_bits();
        if bits > available {
            return Err(SyncError::TruncatedMessage {
                offset: self.bit_offset,
                needed: bits,
                available,
            });
        }
        Ok(())
    }

    /// Read an `n`-bit unsigned field, 1 <= n <= 32, MSB first
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n == 0 || n > 32 {
            return Err(SyncError::InvalidData(format!("Cannot read a {}-bit field", n)));
        }
        self.ensure(n as usize)?;

        let mut value: u64 = 0;
        let mut remaining = n as usize;
        let mut offset = self.bit_offset;
        while remaining > 0 {
            let byte = self.data[offset >> 3];
            let used = offset & 7;
            let available = 8 - used;
            let take = available.min(remaining);
            let bits = (byte >> (available - take)) & (0xFFu8 >> (8 - take));
            value = (value << take) | bits as u64;
            remaining -= take;
            offset += take;
        }

        self.bit_offset = offset;
        Ok(value as u32)
    }

    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Read an `n`-bit two's-complement field
    pub fn read_signed_bits(&mut self, n: u32) -> Result<i32> {
        let raw = self.read_bits(n)?;
        if n < 32 && raw >= 1 << (n - 1) {
            Ok(raw as i32 - (1 << n))
        } else {
            Ok(raw as i32)
        }
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.read_bits(16)? as u16)
    }

    #[inline]
    pub fn read_u24(&mut self) -> Result<u32> {
        self.read_bits(24)
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bits(32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(64)?;
        let high = self.read_u32()? as u64;
        let low = self.read_u32()? as u64;
        Ok((high << 32) | low)
    }

    /// Look at the next byte without consuming it
    pub fn peek_u8(&self) -> Result<u8> {
        self.clone().read_u8()
    }

    /// Smart integer: one byte below 128, otherwise four bytes with the
    /// first byte biased by 128
    pub fn read_smart08_32(&mut self) -> Result<u32> {
        let first = self.peek_u8()?;
        if first < 0x80 {
            self.read_u8().map(u32::from)
        } else {
            Ok(self.read_u32()? - 0x8000_0000)
        }
    }

    /// Smart integer: one byte below 128, otherwise two bytes with the
    /// first byte biased by 128
    pub fn read_smart08_16(&mut self) -> Result<u16> {
        let first = self.peek_u8()?;
        if first < 0x80 {
            self.read_u8().map(u16::from)
        } else {
            Ok(self.read_u16()? - 0x8000)
        }
    }

    /// Skip to the next byte boundary
    #[inline]
    pub fn align_to_byte(&mut self) {
        self.bit_offset = self.bit_offset.div_ceil(8) * 8;
    }

    /// Borrow the unread bytes after aligning to a byte boundary
    pub fn remaining_slice(&mut self) -> &'a [u8] {
        self.align_to_byte();
        &self.data[self.byte_offset().min(self.data.len())..]
    }

    /// Borrow the next `len` bytes and advance past them
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.align_to_byte();
        self.ensure(len * 8)?;
        let start = self.byte_offset();
        self.bit_offset += len * 8;
        Ok(&self.data[start..start + len])
    }

    pub fn skip_bytes(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Zero-terminated Latin-1 string
    ///
    /// A missing terminator reads to the end of the message.
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = self.remaining_slice();
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let text = latin1_to_string(&rest[..len]);
        let consumed = (len + 1).min(rest.len());
        self.bit_offset += consumed * 8;
        Ok(text)
    }

    /// Rest of the message as Latin-1 text
    pub fn read_remaining_string(&mut self) -> String {
        let rest = self.remaining_slice();
        self.bit_offset = self.len_bits();
        latin1_to_string(rest)
    }
}

#[inline]
pub(crate) fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// MSB-first bit packer, the inverse of [`BitReader`]
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            bit_len: 0,
        }
    }

    #[inline]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Append the low `n` bits of `value`, MSB first
    pub fn put_bits(&mut self, n: u32, value: u32) {
        debug_assert!(n <= 32);
        let mut remaining = n as usize;
        while remaining > 0 {
            let used = self.bit_len & 7;
            if used == 0 {
                self.bytes.push(0);
            }
            let free = 8 - used;
            let take = free.min(remaining);
            let chunk = ((value as u64 >> (remaining - take)) & ((1u64 << take) - 1)) as u8;
            if let Some(last) = self.bytes.last_mut() {
                *last |= chunk << (free - take);
            }
            remaining -= take;
            self.bit_len += take;
        }
    }

    #[inline]
    pub fn put_bit(&mut self, bit: bool) {
        self.put_bits(1, bit as u32);
    }

    #[inline]
    pub fn put_u8(&mut self, value: u8) {
        self.put_bits(8, value as u32);
    }

    #[inline]
    pub fn put_u16(&mut self, value: u16) {
        self.put_bits(16, value as u32);
    }

    #[inline]
    pub fn put_u32(&mut self, value: u32) {
        self.put_bits(32, value);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.put_u32((value >> 32) as u32);
        self.put_u32(value as u32);
    }

    /// Inverse of [`BitReader::read_smart08_16`]; values must be below 0x8000
    pub fn put_smart08_16(&mut self, value: u16) {
        debug_assert!(value < 0x8000, "smart value {:#x} out of range", value);
        if value < 0x80 {
            self.put_u8(value as u8);
        } else {
            self.put_u16(value.wrapping_add(0x8000));
        }
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.put_u8(b);
        }
    }

    /// Packed bytes, zero-padded to a whole byte
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
