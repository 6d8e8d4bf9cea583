//! ROOT compression blocks (ZL = zlib, L4 = LZ4, ZS = ZSTD, XZ = LZMA).
//!
//! ROOT writes compressed data as one or more 9-byte-header blocks:
//! ```text
//! bytes 0-1:  algorithm tag ("ZL", "XZ", "L4", "ZS")
//! byte  2:    method
//! bytes 3-5:  compressed size   (3-byte little-endian)
//! bytes 6-8:  uncompressed size (3-byte little-endian)
//! ```
//! The compressed payload immediately follows the 9-byte header. Reading
//! accepts all four algorithms; writing produces zlib blocks.

use std::io::{Read, Write};

use crate::error::{Result, RootError};

/// Size of a compression block header.
pub const BLOCK_HEADER_LEN: usize = 9;

/// Largest payload a single block can describe (3-byte size fields).
pub const MAX_BLOCK_LEN: usize = 0xFF_FFFF;

/// Up-front reservation is capped at this multiple of the compressed size.
const MAX_RESERVE_RATIO: usize = 64;

/// Method byte ROOT writes after the `ZL` tag (deflate).
const ZLIB_METHOD: u8 = 0x08;

std::thread_local! {
    static ZSTD_DECODER: std::cell::RefCell<ruzstd::decoding::FrameDecoder> =
        std::cell::RefCell::new(ruzstd::decoding::FrameDecoder::new());
}

/// Decompress ROOT-compressed data into `expected_len` bytes.
pub fn decompress(src: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let max_len = (src.len() / BLOCK_HEADER_LEN).saturating_mul(MAX_BLOCK_LEN);
    if expected_len > max_len {
        return Err(RootError::Decompression(format!(
            "{expected_len} bytes cannot come from {} compressed bytes",
            src.len()
        )));
    }
    let mut out = Vec::with_capacity(expected_len.min(src.len().saturating_mul(MAX_RESERVE_RATIO)));
    let mut offset = 0;

    while out.len() < expected_len && offset + BLOCK_HEADER_LEN <= src.len() {
        let tag = &src[offset..offset + 2];
        let c_size = read_le24(&src[offset + 3..offset + 6]);
        let u_size = read_le24(&src[offset + 6..offset + 9]);
        offset += BLOCK_HEADER_LEN;

        let end = offset + c_size;
        if end > src.len() {
            return Err(RootError::Decompression(format!(
                "compressed block claims {} bytes but only {} remain",
                c_size,
                src.len() - offset
            )));
        }

        let compressed = &src[offset..end];
        let decompressed = match tag {
            b"ZL" => decompress_zlib(compressed, u_size)?,
            b"L4" => decompress_lz4(compressed, u_size)?,
            b"ZS" => decompress_zstd(compressed, u_size)?,
            b"XZ" => decompress_xz(compressed, u_size)?,
            _ => {
                return Err(RootError::Decompression(format!(
                    "unsupported compression algorithm: {:?}",
                    String::from_utf8_lossy(tag)
                )));
            }
        };

        if decompressed.len() != u_size {
            return Err(RootError::Decompression(format!(
                "expected {} uncompressed bytes, got {}",
                u_size,
                decompressed.len()
            )));
        }

        out.extend_from_slice(&decompressed);
        offset = end;
    }

    if out.len() != expected_len {
        return Err(RootError::Decompression(format!(
            "total decompressed length {} != expected {}",
            out.len(),
            expected_len
        )));
    }

    Ok(out)
}

/// Compress `src` into a sequence of ROOT `ZL` blocks at the given zlib level (1-9).
///
/// Returns `None` when compression does not shrink the payload; ROOT then
/// stores the object uncompressed.
pub fn compress_zlib(src: &[u8], level: u32) -> Result<Option<Vec<u8>>> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut out = Vec::with_capacity(src.len() / 2 + BLOCK_HEADER_LEN);
    for chunk in src.chunks(MAX_BLOCK_LEN) {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.clamp(1, 9)));
        encoder.write_all(chunk).map_err(|e| RootError::Compression(format!("zlib: {e}")))?;
        let compressed =
            encoder.finish().map_err(|e| RootError::Compression(format!("zlib: {e}")))?;
        if compressed.len() > MAX_BLOCK_LEN {
            return Ok(None);
        }

        out.extend_from_slice(b"ZL");
        out.push(ZLIB_METHOD);
        write_le24(&mut out, compressed.len());
        write_le24(&mut out, chunk.len());
        out.extend_from_slice(&compressed);
    }

    if out.len() >= src.len() {
        return Ok(None);
    }
    Ok(Some(out))
}

fn decompress_zlib(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;

    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(expected);
    decoder.read_to_end(&mut out).map_err(|e| RootError::Decompression(format!("zlib: {e}")))?;
    Ok(out)
}

fn decompress_lz4(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    // ROOT LZ4 blocks carry an 8-byte xxhash64 of the payload first; it is not verified.
    if data.len() < 8 {
        return Err(RootError::Decompression("LZ4 block too small for checksum header".into()));
    }
    lz4_flex::decompress(&data[8..], expected)
        .map_err(|e| RootError::Decompression(format!("lz4: {e}")))
}

fn decompress_zstd(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; expected];
    let written = ZSTD_DECODER
        .with(|cell| cell.borrow_mut().decode_all(data, &mut out))
        .map_err(|e| RootError::Decompression(format!("zstd: {e}")))?;
    out.truncate(written);
    Ok(out)
}

fn decompress_xz(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut input = std::io::BufReader::new(data);
    let mut out = Vec::with_capacity(expected);
    lzma_rs::xz_decompress(&mut input, &mut out)
        .map_err(|e| RootError::Decompression(format!("xz: {e}")))?;
    Ok(out)
}

/// Read a 3-byte little-endian unsigned integer.
fn read_le24(b: &[u8]) -> usize {
    b[0] as usize | ((b[1] as usize) << 8) | ((b[2] as usize) << 16)
}

fn write_le24(out: &mut Vec<u8>, v: usize) {
    out.push((v & 0xFF) as u8);
    out.push(((v >> 8) & 0xFF) as u8);
    out.push(((v >> 16) & 0xFF) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a ROOT-style compression block from tag, compressed data, and original len.
    fn make_root_block(tag: &[u8; 2], method: u8, compressed: &[u8], u_len: usize) -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(tag);
        block.push(method);
        write_le24(&mut block, compressed.len());
        write_le24(&mut block, u_len);
        block.extend_from_slice(compressed);
        block
    }

    #[test]
    fn le24_values() {
        assert_eq!(read_le24(&[0x10, 0x00, 0x00]), 16);
        assert_eq!(read_le24(&[0xff, 0xff, 0xff]), 0xFF_FFFF);
        assert_eq!(read_le24(&[0x00, 0x01, 0x00]), 256);
    }

    #[test]
    fn zlib_blocks_inflate() {
        let original: Vec<u8> = b"recenter table payload ".iter().copied().cycle().take(4096).collect();
        let packed = compress_zlib(&original, 6).unwrap().expect("repetitive data compresses");
        assert_eq!(&packed[0..2], b"ZL");
        assert_eq!(decompress(&packed, original.len()).unwrap(), original);
    }

    #[test]
    fn highly_compressed_payload_outgrows_reservation() {
        let original = vec![0u8; 1 << 20];
        let packed = compress_zlib(&original, 9).unwrap().unwrap();
        assert!(packed.len() * MAX_RESERVE_RATIO < original.len());
        assert_eq!(decompress(&packed, original.len()).unwrap(), original);
    }

    #[test]
    fn oversized_expected_length_is_rejected() {
        let block = make_root_block(b"ZL", 8, &[0x78, 0x9c, 0x03, 0x00], 0);
        match decompress(&block, u32::MAX as usize) {
            Err(RootError::Decompression(msg)) => assert!(msg.contains("cannot come from")),
            other => panic!("expected Decompression error, got {other:?}"),
        }
        assert!(decompress(&[], 1).is_err());
    }

    #[test]
    fn incompressible_payload_is_left_alone() {
        let original = [0x01u8, 0x9a, 0x33];
        assert!(compress_zlib(&original, 6).unwrap().is_none());
    }

    #[test]
    fn zstd_block() {
        let original = b"Hello ROOT ZSTD compression! Repeated data: BBBBBBBBBB";
        let compressed = ruzstd::encoding::compress_to_vec(
            &original[..],
            ruzstd::encoding::CompressionLevel::Fastest,
        );
        let block = make_root_block(b"ZS", 0x04, &compressed, original.len());
        assert_eq!(decompress(&block, original.len()).unwrap(), &original[..]);
    }

    #[test]
    fn xz_block() {
        let original = b"Hello ROOT XZ compression! Repeated data: CCCCCCCCCC";
        let mut compressed = Vec::new();
        lzma_rs::xz_compress(&mut std::io::BufReader::new(&original[..]), &mut compressed).unwrap();
        let block = make_root_block(b"XZ", 0x05, &compressed, original.len());
        assert_eq!(decompress(&block, original.len()).unwrap(), &original[..]);
    }

    #[test]
    fn lz4_block_skips_checksum() {
        let original = b"lz4 lz4 lz4 lz4 lz4 lz4 lz4 lz4";
        let mut payload = vec![0u8; 8];
        payload.extend(lz4_flex::compress(original));
        let block = make_root_block(b"L4", 0x01, &payload, original.len());
        assert_eq!(decompress(&block, original.len()).unwrap(), &original[..]);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let block = make_root_block(b"QQ", 0, &[1, 2, 3], 3);
        assert!(matches!(decompress(&block, 3), Err(RootError::Decompression(_))));
    }
}
