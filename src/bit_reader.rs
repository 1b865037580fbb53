#![forbid(unsafe_code)]

use std::io::BufRead;

use byteorder::ReadBytesExt;

use crate::error::DecodeError;

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitSequence {
    bits: u16,
    len: u8,
}

impl BitSequence {
    pub fn new(mut bits: u16, len: u8) -> Self {
        assert!(len <= 16);
        if len < 16 {
            bits &= !(!0u16 << len);
        }
        Self { bits, len }
    }

    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    pub fn bits(&self) -> u16 {
        self.bits
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    /// Append `other` after the lowest bit of `self`, treating both as
    /// most-significant-bit-first codes.
    pub fn concat(self, other: Self) -> Self {
        assert!(other.len() + self.len <= 16);
        Self {
            bits: (self.bits << other.len()) | other.bits,
            len: self.len + other.len,
        }
    }

    /// Bit `i` of the code, counting from the most significant one.
    pub fn bit_from_top(&self, i: u8) -> u16 {
        assert!(i < self.len);
        (self.bits >> (self.len - 1 - i)) & 1
    }
}

////////////////////////////////////////////////////////////////////////////////

const MAX_READ_BITS: u8 = 16;

/// Reads arbitrary-width values from a byte stream, least significant bit
/// first within every byte and across byte boundaries.
pub struct BitReader<T> {
    stream: T,
    buffer: u32,
    available: u8,
}

impl<T: BufRead> BitReader<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            buffer: 0,
            available: 0,
        }
    }

    pub fn read_bits(&mut self, len: u8) -> Result<BitSequence, DecodeError> {
        let value = self.peek_bits(len)?;
        self.buffer >>= len;
        self.available -= len;
        Ok(value)
    }

    /// Same as `read_bits`, but leaves the bits buffered for the next read.
    pub fn peek_bits(&mut self, len: u8) -> Result<BitSequence, DecodeError> {
        assert!(len <= MAX_READ_BITS);
        while self.available < len {
            let byte = self.stream.read_u8()?;
            self.buffer |= u32::from(byte) << self.available;
            self.available += 8;
        }
        Ok(BitSequence::new(self.buffer as u16, len))
    }

    /// Discard all the unread bits in the current byte and return a mutable reference
    /// to the underlying reader.
    pub fn borrow_reader_from_boundary(&mut self) -> &mut T {
        assert!(self.available < 8, "a whole byte is still buffered");
        self.buffer = 0;
        self.available = 0;
        &mut self.stream
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::is_prefix;
    use anyhow::Result;

    #[test]
    fn read_bits() -> Result<()> {
        let data: &[u8] = &[0b01100011, 0b01011011, 0b10101111];
        let mut reader = BitReader::new(data);
        assert_eq!(reader.read_bits(1)?, BitSequence::new(0b1, 1));
        assert_eq!(reader.read_bits(2)?, BitSequence::new(0b01, 2));
        assert_eq!(reader.read_bits(3)?, BitSequence::new(0b100, 3));
        assert_eq!(reader.read_bits(4)?, BitSequence::new(0b1101, 4));
        assert_eq!(reader.read_bits(5)?, BitSequence::new(0b10110, 5));
        assert_eq!(reader.read_bits(8)?, BitSequence::new(0b01011110, 8));
        assert!(matches!(
            reader.read_bits(2),
            Err(DecodeError::Truncated(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof
        ));
        Ok(())
    }

    #[test]
    fn read_wide_values() -> Result<()> {
        let data: &[u8] = &[0xff, 0x34, 0x12, 0x80];
        let mut reader = BitReader::new(data);
        assert_eq!(reader.read_bits(4)?.bits(), 0xf);
        assert_eq!(reader.read_bits(16)?.bits(), 0x234f);
        assert_eq!(reader.read_bits(0)?, BitSequence::empty());
        assert_eq!(reader.read_bits(12)?.bits(), 0x801);
        Ok(())
    }

    #[test]
    fn peek_does_not_consume() -> Result<()> {
        let data: &[u8] = &[0b10110100, 0b00000001];
        let mut reader = BitReader::new(data);
        assert_eq!(reader.peek_bits(3)?, BitSequence::new(0b100, 3));
        assert_eq!(reader.peek_bits(9)?, BitSequence::new(0b110110100, 9));
        assert_eq!(reader.read_bits(3)?, BitSequence::new(0b100, 3));
        assert_eq!(reader.read_bits(6)?, BitSequence::new(0b110110, 6));
        assert!(reader.peek_bits(8).is_err());
        Ok(())
    }

    #[test]
    fn borrow_reader_from_boundary() -> Result<()> {
        let data: &[u8] = &[0b01100011, 0b11011011, 0b10101111];
        let mut reader = BitReader::new(data);
        assert_eq!(reader.read_bits(3)?, BitSequence::new(0b011, 3));
        assert_eq!(reader.borrow_reader_from_boundary().read_u8()?, 0b11011011);
        assert_eq!(reader.read_bits(8)?, BitSequence::new(0b10101111, 8));
        Ok(())
    }

    #[test]
    fn prefixes() {
        let short = BitSequence::new(0b10, 2);
        assert!(is_prefix(short, BitSequence::new(0b101, 3)));
        assert!(is_prefix(short, short));
        assert!(!is_prefix(short, BitSequence::new(0b110, 3)));
        assert!(!is_prefix(BitSequence::new(0b101, 3), short));
        assert_eq!(BitSequence::new(0b100, 3).bit_from_top(0), 1);
        assert_eq!(BitSequence::new(0b100, 3).bit_from_top(2), 0);
    }
}
