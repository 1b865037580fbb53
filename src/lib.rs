#![forbid(unsafe_code)]

//! DEFLATE decoder for gzip files.
//!
//! Errors come back as `anyhow::Error`; the decode failure kinds are
//! [`DecodeError`] values inside it.

use std::io::{BufRead, Write};

use anyhow::Result;

use crate::bit_reader::BitReader;
use crate::deflate::DeflateReader;
use crate::gzip::GzipReader;

mod bit_reader;
mod code_lengths;
mod deflate;
mod error;
mod gzip;
mod huffman_coding;
mod output_window;
#[cfg(test)]
mod test_utils;

pub use crate::error::DecodeError;
pub use crate::gzip::read_original_size;
pub use crate::output_window::WINDOW_SIZE;

/// Decompress every gzip member of `input` into `output`.
///
/// Returns the number of bytes written.
pub fn decompress<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<usize> {
    let mut total = 0;
    while !input.fill_buf()?.is_empty() {
        let gz_reader = GzipReader::new(input);
        let (new_input, summary) = gz_reader.decompress(output)?;
        total += summary.byte_count;
        input = new_input;
        output = summary.output;
    }
    Ok(total)
}

/// Decode a raw DEFLATE stream without any container around it.
///
/// Returns the number of bytes written.
pub fn inflate<R: BufRead, W: Write>(input: R, output: W) -> Result<usize> {
    let mut deflate_reader = DeflateReader::new(BitReader::new(input));
    Ok(deflate_reader.deflate(output)?.byte_count)
}
