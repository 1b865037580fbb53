use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Result;
use inflate_gz::{decompress, inflate, read_original_size, DecodeError};

fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn read(name: &str) -> Vec<u8> {
    std::fs::read(data_path(name)).unwrap()
}

fn decompress_file(name: &str) -> Result<Vec<u8>> {
    let input = BufReader::new(File::open(data_path(name))?);
    let mut output = Vec::new();
    let written = decompress(input, &mut output)?;
    assert_eq!(written, output.len());
    Ok(output)
}

#[test]
fn dynamic_blocks() -> Result<()> {
    assert_eq!(decompress_file("text.txt.gz")?, read("text.txt"));
    Ok(())
}

#[test]
fn many_blocks_with_sync_flushes() -> Result<()> {
    assert_eq!(decompress_file("blocks.gz")?, read("text.txt"));
    Ok(())
}

#[test]
fn fixed_blocks() -> Result<()> {
    assert_eq!(decompress_file("fixed.gz")?, &read("text.txt")[..5000]);
    Ok(())
}

#[test]
fn stored_blocks() -> Result<()> {
    assert_eq!(decompress_file("stored.gz")?, &read("text.txt")[..70000]);
    Ok(())
}

#[test]
fn multiple_members() -> Result<()> {
    let mut expected = read("small.txt");
    expected.extend_from_slice(&read("text.txt")[..3000]);
    assert_eq!(decompress_file("multi.gz")?, expected);
    Ok(())
}

#[test]
fn header_with_name() -> Result<()> {
    assert_eq!(decompress_file("named.gz")?, read("small.txt"));
    Ok(())
}

#[test]
fn empty_member() -> Result<()> {
    assert!(decompress_file("empty.gz")?.is_empty());
    Ok(())
}

#[test]
fn raw_deflate() -> Result<()> {
    let compressed = read("text.deflate");
    let mut output = Vec::new();
    let written = inflate(compressed.as_slice(), &mut output)?;
    assert_eq!(written, 100054);
    assert_eq!(output, read("text.txt"));
    Ok(())
}

#[test]
fn original_size_probe() -> Result<()> {
    let mut file = File::open(data_path("text.txt.gz"))?;
    assert_eq!(read_original_size(&mut file)?, 100054);

    let input = BufReader::new(file);
    let mut output = Vec::new();
    assert_eq!(decompress(input, &mut output)?, 100054);
    Ok(())
}

#[test]
fn truncated_input() {
    let compressed = read("text.txt.gz");
    let err = decompress(&compressed[..compressed.len() / 2], Vec::new()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DecodeError>(),
        Some(DecodeError::Truncated(_))
    ));
}

#[test]
fn corrupted_payload() {
    let mut compressed = read("text.txt.gz");
    let middle = compressed.len() / 2;
    for byte in &mut compressed[middle..middle + 16] {
        *byte ^= 0x5a;
    }
    let err = decompress(compressed.as_slice(), Vec::new()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DecodeError>(),
        Some(DecodeError::CorruptStream(_))
            | Some(DecodeError::Truncated(_))
            | Some(DecodeError::Checksum(_))
    ));
}

#[test]
fn not_gzip() {
    let err = decompress(&b"plain text, not gzip"[..], Vec::new()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DecodeError>(),
        Some(DecodeError::Format(_))
    ));
}
