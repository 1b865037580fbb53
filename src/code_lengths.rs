#![forbid(unsafe_code)]

use std::io::BufRead;

use anyhow::{ensure, Result};
use log::*;

use crate::bit_reader::BitReader;
use crate::error::DecodeError;
use crate::huffman_coding::{DistanceToken, HuffmanCoding, LitLenToken, TreeCodeToken};

////////////////////////////////////////////////////////////////////////////////

pub const CODE_LENGTH_ALPHABET: usize = 19;

static TREE_CODE_ORDER: [usize; CODE_LENGTH_ALPHABET] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Counts and code-length-alphabet lengths at the start of a dynamic block.
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicHeader {
    pub hlit: usize,
    pub hdist: usize,
    pub hclen: usize,
    pub code_length_lengths: [u8; CODE_LENGTH_ALPHABET],
}

impl DynamicHeader {
    pub fn parse<T: BufRead>(bit_reader: &mut BitReader<T>) -> Result<Self> {
        let hlit = usize::from(bit_reader.read_bits(5)?.bits()) + 257;
        let hdist = usize::from(bit_reader.read_bits(5)?.bits()) + 1;
        let hclen = usize::from(bit_reader.read_bits(4)?.bits()) + 4;
        debug!("HLIT:\t{:?}", hlit);
        debug!("HDIST:\t{:?}", hdist);
        debug!("HCLEN:\t{:?}", hclen);

        let mut code_length_lengths = [0u8; CODE_LENGTH_ALPHABET];
        for &symbol in &TREE_CODE_ORDER[..hclen] {
            code_length_lengths[symbol] = bit_reader.read_bits(3)?.bits() as u8;
        }

        Ok(Self {
            hlit,
            hdist,
            hclen,
            code_length_lengths,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Rebuilds code-length arrays from the run-length coded form.
///
/// The last literal length is remembered across `expand` calls, so a repeat
/// at the start of the distance lengths copies the last literal/length one.
pub struct CodeLengthExpander<'a> {
    tree_code_huffman: &'a HuffmanCoding<TreeCodeToken>,
    prev_length: Option<u8>,
}

impl<'a> CodeLengthExpander<'a> {
    pub fn new(tree_code_huffman: &'a HuffmanCoding<TreeCodeToken>) -> Self {
        Self {
            tree_code_huffman,
            prev_length: None,
        }
    }

    pub fn expand<T: BufRead>(
        &mut self,
        target_size: usize,
        bit_reader: &mut BitReader<T>,
    ) -> Result<Vec<u8>> {
        let mut code_lengths = Vec::<u8>::with_capacity(target_size);
        while code_lengths.len() < target_size {
            let code = self.tree_code_huffman.read_symbol(bit_reader)?;
            trace!("decode: {:?}", code);
            let (value, count) = match code {
                TreeCodeToken::Length(len) => {
                    self.prev_length = Some(len);
                    (len, 1)
                }
                TreeCodeToken::CopyPrev { base, extra_bits } => {
                    let prev_len = self
                        .prev_length
                        .ok_or_else(|| DecodeError::corrupt("nothing to copy"))?;
                    let extra = bit_reader.read_bits(extra_bits)?.bits();
                    (prev_len, usize::from(base + extra))
                }
                TreeCodeToken::RepeatZero { base, extra_bits } => {
                    let extra = bit_reader.read_bits(extra_bits)?.bits();
                    (0, usize::from(base + extra))
                }
            };
            ensure!(
                code_lengths.len() + count <= target_size,
                DecodeError::corrupt(format!(
                    "run of {} lengths overshoots {} symbols",
                    count, target_size
                ))
            );
            code_lengths.resize(code_lengths.len() + count, value);
        }
        Ok(code_lengths)
    }
}

////////////////////////////////////////////////////////////////////////////////

pub fn decode_litlen_distance_trees<T: BufRead>(
    bit_reader: &mut BitReader<T>,
) -> Result<(HuffmanCoding<LitLenToken>, HuffmanCoding<DistanceToken>)> {
    info!("dynamic tree");

    let header = DynamicHeader::parse(bit_reader)?;
    let tree_code_huffman =
        HuffmanCoding::<TreeCodeToken>::from_lengths(&header.code_length_lengths)?;

    let mut expander = CodeLengthExpander::new(&tree_code_huffman);
    let lit_lengths = expander.expand(header.hlit, bit_reader)?;
    let dist_lengths = expander.expand(header.hdist, bit_reader)?;

    Ok((
        HuffmanCoding::<LitLenToken>::from_lengths(&lit_lengths)?,
        HuffmanCoding::<DistanceToken>::from_lengths(&dist_lengths)?,
    ))
}

////////////////////////////////////////////////////////////////////////////////
