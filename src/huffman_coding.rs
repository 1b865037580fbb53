#![forbid(unsafe_code)]

use std::{convert::TryFrom, io::BufRead, marker::PhantomData};

use anyhow::{bail, ensure, Result};
use log::*;

use crate::bit_reader::{BitReader, BitSequence};
use crate::error::DecodeError;

////////////////////////////////////////////////////////////////////////////////

/// Builds the tables used by fixed Huffman blocks.
pub fn get_fixed_coding() -> Result<(HuffmanCoding<LitLenToken>, HuffmanCoding<DistanceToken>)> {
    info!("fixed tree");
    let mut litlen_lengths = [0u8; 288];
    for (symbol, len) in litlen_lengths.iter_mut().enumerate() {
        *len = match symbol {
            0..=143 => 8,
            144..=255 => 9,
            256..=279 => 7,
            _ => 8,
        };
    }
    let dist_lengths = [5u8; 30];

    Ok((
        HuffmanCoding::<LitLenToken>::from_lengths(&litlen_lengths)?,
        HuffmanCoding::<DistanceToken>::from_lengths(&dist_lengths)?,
    ))
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TreeCodeToken {
    Length(u8),
    CopyPrev { base: u16, extra_bits: u8 },
    RepeatZero { base: u16, extra_bits: u8 },
}

impl TryFrom<HuffmanCodeWord> for TreeCodeToken {
    type Error = anyhow::Error;

    fn try_from(value: HuffmanCodeWord) -> Result<Self> {
        match value.0 {
            0..=15 => Ok(Self::Length(value.0 as u8)),
            16 => Ok(Self::CopyPrev {
                base: 3,
                extra_bits: 2,
            }),
            17 => Ok(Self::RepeatZero {
                base: 3,
                extra_bits: 3,
            }),
            18 => Ok(Self::RepeatZero {
                base: 11,
                extra_bits: 7,
            }),
            _ => Err(DecodeError::corrupt(format!("bad code length symbol {}", value.0)).into()),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

const LENGTH_EXTRA_BITS: [u8; 20] = [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5];
const LENGTH_BASE: [u16; 20] = [
    11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131, 163, 195, 227,
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LitLenToken {
    Literal(u8),
    EndOfBlock,
    Length { base: u16, extra_bits: u8 },
}

impl TryFrom<HuffmanCodeWord> for LitLenToken {
    type Error = anyhow::Error;

    fn try_from(value: HuffmanCodeWord) -> Result<Self> {
        match value.0 {
            0..=255 => Ok(Self::Literal(value.0 as u8)),
            256 => Ok(Self::EndOfBlock),
            257..=264 => Ok(Self::Length {
                base: value.0 - 257 + 3,
                extra_bits: 0,
            }),
            265..=284 => {
                let idx = usize::from(value.0 - 265);
                Ok(Self::Length {
                    base: LENGTH_BASE[idx],
                    extra_bits: LENGTH_EXTRA_BITS[idx],
                })
            }
            285 => Ok(Self::Length {
                base: 258,
                extra_bits: 0,
            }),
            _ => Err(DecodeError::corrupt(format!("bad literal/length symbol {}", value.0)).into()),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

const DIST_EXTRA_BITS: [u8; 26] = [
    1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13, 13,
];
const DIST_BASE: [u16; 26] = [
    5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537, 2049, 3073,
    4097, 6145, 8193, 12289, 16385, 24577,
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceToken {
    pub base: u16,
    pub extra_bits: u8,
}

impl TryFrom<HuffmanCodeWord> for DistanceToken {
    type Error = anyhow::Error;

    fn try_from(value: HuffmanCodeWord) -> Result<Self> {
        match value.0 {
            0..=3 => Ok(Self {
                base: value.0 + 1,
                extra_bits: 0,
            }),
            4..=29 => {
                let idx = usize::from(value.0 - 4);
                Ok(Self {
                    base: DIST_BASE[idx],
                    extra_bits: DIST_EXTRA_BITS[idx],
                })
            }
            _ => Err(DecodeError::corrupt(format!("bad distance symbol {}", value.0)).into()),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

const MAX_BITS: usize = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HuffmanCodeWord(pub u16);

/// Outcome of feeding one more bit into a partially read code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Continue(BitSequence),
    Leaf(HuffmanCodeWord),
    Invalid,
}

/// Canonical Huffman code rebuilt from per-symbol code lengths.
///
/// Symbols are kept sorted by (length, symbol), so the codes of one length
/// form a contiguous run starting at `first_code[len]` and a partial code
/// resolves with a single subtraction per bit.
pub struct HuffmanCoding<T> {
    bl_count: [u16; MAX_BITS + 1],
    first_code: [u16; MAX_BITS + 1],
    offset: [u16; MAX_BITS + 1],
    symbols: Vec<u16>,
    max_len: u8,
    token: PhantomData<T>,
}

impl<T> HuffmanCoding<T>
where
    T: TryFrom<HuffmanCodeWord, Error = anyhow::Error>,
{
    pub fn from_lengths(code_lengths: &[u8]) -> Result<Self> {
        debug!("creating huffman coding from lengths {:?}", code_lengths);

        let mut bl_count = [0u16; MAX_BITS + 1];
        for &len in code_lengths {
            ensure!(
                usize::from(len) <= MAX_BITS,
                DecodeError::corrupt(format!("code length {} is too long", len))
            );
            bl_count[usize::from(len)] += 1;
        }
        bl_count[0] = 0;

        let mut left: i32 = 1;
        for &count in &bl_count[1..] {
            left = (left << 1) - i32::from(count);
            ensure!(left >= 0, DecodeError::corrupt("over-subscribed code lengths"));
        }

        let mut next_code = [0u16; MAX_BITS + 1];
        let mut code: u16 = 0;
        for bits in 1..=MAX_BITS {
            code = (code + bl_count[bits - 1]) << 1;
            next_code[bits] = code;
        }
        let first_code = next_code;

        let mut offset = [0u16; MAX_BITS + 1];
        for bits in 1..MAX_BITS {
            offset[bits + 1] = offset[bits] + bl_count[bits];
        }

        let mut fill = offset;
        let mut symbols = vec![0u16; bl_count.iter().map(|&c| usize::from(c)).sum()];
        for (idx, &len) in code_lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let len_idx = usize::from(len);
            symbols[usize::from(fill[len_idx])] = idx as u16;
            fill[len_idx] += 1;

            trace!(
                "new code: {} -> {:?}",
                idx,
                BitSequence::new(next_code[len_idx], len)
            );
            next_code[len_idx] += 1;
        }

        Ok(Self {
            bl_count,
            first_code,
            offset,
            symbols,
            max_len: code_lengths.iter().copied().max().unwrap_or(0),
            token: PhantomData,
        })
    }

    /// Extend the partial code `state` by `bit`.
    pub fn step(&self, state: BitSequence, bit: u16) -> Step {
        let code = state.concat(BitSequence::new(bit, 1));
        let len = code.len();
        if len > self.max_len {
            return Step::Invalid;
        }

        let len_idx = usize::from(len);
        match code.bits().checked_sub(self.first_code[len_idx]) {
            Some(index) if index < self.bl_count[len_idx] => Step::Leaf(HuffmanCodeWord(
                self.symbols[usize::from(self.offset[len_idx] + index)],
            )),
            Some(_) if len < self.max_len => Step::Continue(code),
            _ => Step::Invalid,
        }
    }

    /// Decode a complete code, or `None` if `seq` is not exactly one code.
    #[allow(unused)]
    pub fn decode_symbol(&self, seq: BitSequence) -> Option<T> {
        let mut state = BitSequence::empty();
        for i in 0..seq.len() {
            match self.step(state, seq.bit_from_top(i)) {
                Step::Continue(next) => state = next,
                Step::Leaf(word) if i + 1 == seq.len() => return T::try_from(word).ok(),
                _ => return None,
            }
        }
        None
    }

    pub fn read_symbol<U: BufRead>(&self, bit_reader: &mut BitReader<U>) -> Result<T> {
        let mut state = BitSequence::empty();
        loop {
            let bit = bit_reader.read_bits(1)?.bits();
            match self.step(state, bit) {
                Step::Continue(next) => state = next,
                Step::Leaf(word) => return T::try_from(word),
                Step::Invalid => bail!(DecodeError::corrupt(format!(
                    "no code starts with {:0width$b}",
                    state.concat(BitSequence::new(bit, 1)).bits(),
                    width = usize::from(state.len()) + 1
                ))),
            }
        }
    }

    /// The code assigned to `symbol`, if it has one.
    #[cfg(test)]
    pub fn code(&self, symbol: u16) -> Option<BitSequence> {
        let position = self.symbols.iter().position(|&s| s == symbol)?;
        (1..=self.max_len).find_map(|len| {
            let idx = usize::from(len);
            let index = (position as u16).checked_sub(self.offset[idx])?;
            (index < self.bl_count[idx])
                .then(|| BitSequence::new(self.first_code[idx] + index, len))
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
