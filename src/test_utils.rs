#![forbid(unsafe_code)]

//! Helpers for assembling DEFLATE streams bit by bit in tests.

use anyhow::{ensure, Result};
use crc::Crc;

use crate::bit_reader::BitSequence;
use crate::huffman_coding::{DistanceToken, HuffmanCoding, LitLenToken, TreeCodeToken};

////////////////////////////////////////////////////////////////////////////////

/// Whether `short` is a leading part of `long`.
pub fn is_prefix(short: BitSequence, long: BitSequence) -> bool {
    short.len() <= long.len()
        && u32::from(long.bits()) >> (long.len() - short.len()) == u32::from(short.bits())
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_count: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_bit(&mut self, bit: u8) {
        if self.bit_count % 8 == 0 {
            self.bytes.push(0);
        }
        if let Some(last) = self.bytes.last_mut() {
            *last |= (bit & 1) << (self.bit_count % 8);
        }
        self.bit_count += 1;
    }

    /// Least significant bit first, as header fields and extra bits are stored.
    pub fn write_bits(&mut self, value: u32, len: u8) {
        for i in 0..len {
            self.push_bit((value >> i) as u8 & 1);
        }
    }

    /// Most significant bit first, as Huffman codes are stored.
    pub fn write_code(&mut self, code: BitSequence) {
        for i in 0..code.len() {
            self.push_bit(code.bit_from_top(i) as u8);
        }
    }

    pub fn align_to_byte(&mut self) {
        while self.bit_count % 8 != 0 {
            self.push_bit(0);
        }
    }

    pub fn write_block_header(&mut self, is_final: bool, compression_type: u32) {
        self.write_bits(is_final as u32, 1);
        self.write_bits(compression_type, 2);
    }

    /// Write the dynamic block header describing `lit_lengths` and
    /// `dist_lengths`, without run-length codes, and return the tables.
    pub fn write_dynamic_header(
        &mut self,
        lit_lengths: &[u8],
        dist_lengths: &[u8],
    ) -> Result<(HuffmanCoding<LitLenToken>, HuffmanCoding<DistanceToken>)> {
        ensure!((257..=286).contains(&lit_lengths.len()));
        ensure!((1..=32).contains(&dist_lengths.len()));

        const ORDER: [usize; 19] = [
            16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
        ];
        let mut tree_lengths = [4u8; 19];
        tree_lengths[16..].fill(0);
        let tree_code = HuffmanCoding::<TreeCodeToken>::from_lengths(&tree_lengths)?;

        self.write_bits(lit_lengths.len() as u32 - 257, 5);
        self.write_bits(dist_lengths.len() as u32 - 1, 5);
        self.write_bits(15, 4);
        for symbol in ORDER {
            self.write_bits(tree_lengths[symbol].into(), 3);
        }
        for &len in lit_lengths.iter().chain(dist_lengths) {
            self.write_code(tree_code.code(len.into()).unwrap());
        }

        Ok((
            HuffmanCoding::from_lengths(lit_lengths)?,
            HuffmanCoding::from_lengths(dist_lengths)?,
        ))
    }

    /// Write `symbol` with its code in `coding`.
    pub fn write_symbol<T>(&mut self, coding: &HuffmanCoding<T>, symbol: u16)
    where
        T: TryFrom<crate::huffman_coding::HuffmanCodeWord, Error = anyhow::Error>,
    {
        self.write_code(coding.code(symbol).unwrap());
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Wrap a raw DEFLATE stream into a minimal gzip member.
pub fn gzip_member(deflate: &[u8], data: &[u8]) -> Vec<u8> {
    let crc = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
    let mut member = vec![0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 255];
    member.extend_from_slice(deflate);
    member.extend_from_slice(&crc.checksum(data).to_le_bytes());
    member.extend_from_slice(&(data.len() as u32).to_le_bytes());
    member
}
