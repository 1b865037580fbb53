#![forbid(unsafe_code)]

use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};

use anyhow::{ensure, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use crc::{Crc, Digest};
use log::*;

use crate::{
    bit_reader::BitReader,
    deflate::{DeflateReader, DeflateSummary},
    error::DecodeError,
};

////////////////////////////////////////////////////////////////////////////////

const ID1: u8 = 0x1f;
const ID2: u8 = 0x8b;

const CM_DEFLATE: u8 = 8;

const FTEXT: u8 = 1 << 0;
const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
const FRESERVED: u8 = 0b1110_0000;

static HEADER_CRC: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Default)]
pub struct MemberHeader {
    pub modification_time: u32,
    pub extra_flags: u8,
    pub os: u8,
    pub is_text: bool,
    pub extra: Option<Vec<u8>>,
    pub name: Option<String>,
    pub comment: Option<String>,
}

#[derive(Clone, Copy, Debug)]
struct MemberFlags(u8);

impl MemberFlags {
    fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }
}

/// Header strings are ISO 8859-1, which maps each byte to the same code point.
fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

////////////////////////////////////////////////////////////////////////////////

/// Reads header fields and keeps a CRC-32 of every byte consumed, for FHCRC.
struct HeaderReader<'a, T> {
    inner: &'a mut T,
    digest: Digest<'static, u32>,
}

impl<T: Read> Read for HeaderReader<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.digest.update(&buf[..read]);
        Ok(read)
    }
}

impl<'a, T: Read> HeaderReader<'a, T> {
    fn new(inner: &'a mut T) -> Self {
        Self {
            inner,
            digest: HEADER_CRC.digest(),
        }
    }

    fn read_zero_terminated(&mut self) -> io::Result<String> {
        let mut bytes = vec![];
        loop {
            match self.read_u8()? {
                0 => return Ok(latin1_string(&bytes)),
                byte => bytes.push(byte),
            }
        }
    }

    /// Give the reader back along with the low 16 bits of the CRC so far.
    fn finish(self) -> (&'a mut T, u16) {
        (self.inner, (self.digest.finalize() & 0xffff) as u16)
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub struct MemberFooter {
    pub data_crc32: u32,
    pub data_size: u32,
}

////////////////////////////////////////////////////////////////////////////////

/// Read the ISIZE field from the last four bytes of `source` and rewind it.
///
/// For a multi-member file this is the size of the last member only.
pub fn read_original_size<R: Read + Seek>(source: &mut R) -> Result<u32> {
    source.seek(SeekFrom::End(-4))?;
    let size = source.read_u32::<LittleEndian>()?;
    source.seek(SeekFrom::Start(0))?;
    debug!("ISIZE:\t{}", size);
    Ok(size)
}

////////////////////////////////////////////////////////////////////////////////

pub struct GzipReader<T> {
    reader: T,
}

impl<T: BufRead> GzipReader<T> {
    pub fn new(reader: T) -> Self {
        Self { reader }
    }

    pub fn decompress<W: Write>(mut self, output: W) -> Result<(T, DeflateSummary<W>)> {
        info!("parsing gzip header");
        let header = Self::parse_header(&mut self.reader)?;
        if let Some(name) = &header.name {
            info!("original name: {}", name);
        }

        info!("parsing deflate format");
        let mut deflate_reader = DeflateReader::new(BitReader::new(&mut self.reader));
        let summary = deflate_reader.deflate(output)?;

        let footer = Self::parse_footer(&mut self.reader)?;
        ensure!(
            footer.data_size == summary.byte_count as u32,
            DecodeError::Checksum("length")
        );
        ensure!(
            footer.data_crc32 == summary.crc32,
            DecodeError::Checksum("crc32")
        );
        Ok((self.reader, summary))
    }

    fn parse_header(input: &mut T) -> Result<MemberHeader> {
        let mut header = HeaderReader::new(input);

        let magic = [header.read_u8()?, header.read_u8()?];
        ensure!(magic == [ID1, ID2], DecodeError::format("wrong id values"));

        let method = header.read_u8()?;
        debug!("CM:\t{}", method);
        ensure!(
            method == CM_DEFLATE,
            DecodeError::format(format!("unsupported compression method {}", method))
        );

        let flags = MemberFlags(header.read_u8()?);
        debug!("FLG:\t{:#010b}", flags.0);
        ensure!(
            !flags.has(FRESERVED),
            DecodeError::format(format!("reserved flag bits set in {:#010b}", flags.0))
        );

        let mut member = MemberHeader {
            modification_time: header.read_u32::<LittleEndian>()?,
            extra_flags: header.read_u8()?,
            os: header.read_u8()?,
            is_text: flags.has(FTEXT),
            ..Default::default()
        };
        debug!("MTIME:\t{}", member.modification_time);
        debug!("XFL:\t{}", member.extra_flags);
        debug!("OS:\t{}", member.os);
        debug!("FTEXT:\t{}", member.is_text);

        if flags.has(FEXTRA) {
            let len: usize = header.read_u16::<LittleEndian>()?.into();
            let mut extra = vec![0; len];
            header.read_exact(&mut extra)?;
            member.extra = Some(extra);
            debug!("EXTRA:\t{:?}", member.extra);
        }

        if flags.has(FNAME) {
            member.name = Some(header.read_zero_terminated()?);
            debug!("NAME:\t{:?}", member.name);
        }

        if flags.has(FCOMMENT) {
            member.comment = Some(header.read_zero_terminated()?);
            debug!("COMMENT:\t{:?}", member.comment);
        }

        let (input, computed) = header.finish();
        if flags.has(FHCRC) {
            let stored = input.read_u16::<LittleEndian>()?;
            debug!("CRC16:\t{:#06x}", stored);
            ensure!(
                stored == computed,
                DecodeError::format("header crc16 check failed")
            );
        }

        Ok(member)
    }

    fn parse_footer(footer: &mut T) -> Result<MemberFooter> {
        let data_crc32 = footer.read_u32::<LittleEndian>()?;
        let data_size = footer.read_u32::<LittleEndian>()?;
        debug!("CRC32:\t{:#010x}", data_crc32);
        debug!("ISIZE:\t{}", data_size);
        Ok(MemberFooter {
            data_crc32,
            data_size,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
