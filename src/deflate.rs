#![forbid(unsafe_code)]

use std::io::{BufRead, Write};

use anyhow::{bail, ensure, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::*;

use crate::bit_reader::BitReader;
use crate::code_lengths::decode_litlen_distance_trees;
use crate::error::DecodeError;
use crate::huffman_coding::{self, DistanceToken, HuffmanCoding, LitLenToken};
use crate::output_window::OutputWindow;

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Default)]
pub struct BlockHeader {
    pub is_final: bool,
    pub compression_type: CompressionType,
}

#[derive(Debug, Default, PartialEq, PartialOrd)]
pub enum CompressionType {
    #[default]
    Uncompressed = 0,
    FixedTree = 1,
    DynamicTree = 2,
    Reserved = 3,
}

impl From<u16> for CompressionType {
    fn from(num: u16) -> Self {
        match num {
            0 => CompressionType::Uncompressed,
            1 => CompressionType::FixedTree,
            2 => CompressionType::DynamicTree,
            _ => CompressionType::Reserved,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Totals of one decoded DEFLATE stream.
#[derive(Debug)]
pub struct DeflateSummary<W> {
    pub byte_count: usize,
    pub crc32: u32,
    pub output: W,
}

pub struct DeflateReader<T> {
    bit_reader: BitReader<T>,
    reached_last: bool,
}

impl<T: BufRead> DeflateReader<T> {
    pub fn new(bit_reader: BitReader<T>) -> Self {
        Self {
            bit_reader,
            reached_last: false,
        }
    }

    pub fn next_block(&mut self) -> Option<Result<(BlockHeader, &mut BitReader<T>)>> {
        if self.reached_last {
            return None;
        }
        let mut header = BlockHeader::default();
        match self.bit_reader.read_bits(1) {
            Ok(is_final) => {
                header.is_final = is_final.bits() == 1;
                self.reached_last |= header.is_final
            }
            Err(err) => return Some(Err(err.into())),
        }
        match self.bit_reader.read_bits(2) {
            Ok(comp_type) => {
                header.compression_type = comp_type.bits().into();
            }
            Err(err) => return Some(Err(err.into())),
        }
        Some(Ok((header, &mut self.bit_reader)))
    }

    /// Decode blocks until the final one, streaming the output into `output`.
    pub fn deflate<W: Write>(&mut self, output: W) -> Result<DeflateSummary<W>> {
        let mut writer = OutputWindow::<W>::new(output);

        while let Some(result) = self.next_block() {
            let (block_header, bit_reader) = result?;
            info!("processing block");
            debug!("ISFINAL:\t{:?}", block_header.is_final);
            debug!("BTYPE:\t{:?}", block_header.compression_type);

            match block_header.compression_type {
                CompressionType::Uncompressed => read_stored_block(bit_reader, &mut writer)?,
                CompressionType::FixedTree => {
                    let (litlen, dist) = huffman_coding::get_fixed_coding()?;
                    decode_block(&litlen, &dist, bit_reader, &mut writer)?;
                }
                CompressionType::DynamicTree => {
                    info!("decoding trees");
                    let (litlen, dist) = decode_litlen_distance_trees(bit_reader)?;
                    decode_block(&litlen, &dist, bit_reader, &mut writer)?;
                }
                CompressionType::Reserved => bail!(DecodeError::UnsupportedBlock(3)),
            }

            writer.flush_excess()?;
        }

        let byte_count = writer.byte_count();
        let (crc32, output) = writer.finish()?;
        Ok(DeflateSummary {
            byte_count,
            crc32,
            output,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////

fn read_stored_block<T: BufRead, W: Write>(
    bit_reader: &mut BitReader<T>,
    writer: &mut OutputWindow<W>,
) -> Result<()> {
    let reader = bit_reader.borrow_reader_from_boundary();
    let len = reader
        .read_u16::<LittleEndian>()
        .map_err(DecodeError::from)?;
    let nlen = reader
        .read_u16::<LittleEndian>()
        .map_err(DecodeError::from)?;
    ensure!(len == !nlen, DecodeError::corrupt("nlen check failed"));

    debug!("copying {} bytes", len);
    let mut buffer = vec![0; len.into()];
    reader.read_exact(&mut buffer).map_err(DecodeError::from)?;
    writer.write_all(&buffer)?;
    Ok(())
}

/// Decode literal/length and distance symbols up to the end of the block.
pub fn decode_block<T: BufRead, W: Write>(
    litlen: &HuffmanCoding<LitLenToken>,
    dist: &HuffmanCoding<DistanceToken>,
    bit_reader: &mut BitReader<T>,
    writer: &mut OutputWindow<W>,
) -> Result<()> {
    info!("processing symbols");
    loop {
        let symbol = litlen.read_symbol(bit_reader)?;
        trace!("symbol: {:?}", symbol);
        match symbol {
            LitLenToken::Literal(lit) => writer.write_u8(lit)?,
            LitLenToken::Length { base, extra_bits } => {
                let extra_len = bit_reader.read_bits(extra_bits)?.bits();
                let actual_len = usize::from(base + extra_len);

                let dist = dist.read_symbol(bit_reader)?;
                let extra_dist = bit_reader.read_bits(dist.extra_bits)?.bits();
                let actual_dist = usize::from(dist.base + extra_dist);

                trace!("dist: {}, len: {}", actual_dist, actual_len);
                writer.write_previous(actual_dist, actual_len)?;
            }
            LitLenToken::EndOfBlock => {
                info!("reached end of block");
                break;
            }
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
