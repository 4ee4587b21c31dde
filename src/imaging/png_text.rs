//! PNG text-chunk reader and writer.
//!
//! Screenshot tools store their scene description as a JSON document in a PNG
//! text chunk keyed `Description`. Reading goes through the `png` decoder, so
//! every text form is understood:
//!
//! - `tEXt`: plain Latin-1
//! - `zTXt`: deflated Latin-1
//! - `iTXt`: UTF-8, plain or deflated
//!
//! Text chunks after the image data are read too. A stream damaged after the
//! header keeps the chunks decoded before the damage.
//!
//! Writing works on the raw chunk stream: any chunk with the same keyword is
//! dropped and a fresh one is inserted right after `IHDR`, leaving pixel data
//! and every other chunk untouched.

use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Error, Debug)]
pub enum PngTextError {
    #[error("not a PNG file")]
    NotPng,
    #[error("PNG chunk stream is truncated")]
    Truncated,
    #[error("PNG has no IHDR chunk")]
    MissingHeader,
    #[error("invalid text keyword {0:?} (must be 1-79 Latin-1 characters)")]
    InvalidKeyword(String),
}

/// One decoded text chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub keyword: String,
    pub text: String,
}

/// Raw view of one chunk inside a PNG byte buffer.
struct RawChunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
    /// Byte range of the whole chunk (length + type + data + crc).
    start: usize,
    end: usize,
}

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(PNG_SIGNATURE)
}

/// Read the text stored under `keyword` from a PNG file on disk.
///
/// Returns `Ok(None)` for non-PNG files and PNGs without that keyword.
pub fn read_text(path: &Path, keyword: &str) -> std::io::Result<Option<String>> {
    let bytes = std::fs::read(path)?;
    Ok(find_text(&bytes, keyword))
}

/// Find the first readable text chunk with the given keyword.
pub fn find_text(data: &[u8], keyword: &str) -> Option<String> {
    read_text_chunks(data)
        .into_iter()
        .find(|chunk| chunk.keyword == keyword)
        .map(|chunk| chunk.text)
}

/// Decode every readable text chunk: `tEXt`, then `zTXt`, then `iTXt`, each
/// group in file order. Chunks whose text cannot be inflated or decoded are
/// left out.
pub fn read_text_chunks(data: &[u8]) -> Vec<TextChunk> {
    if !is_png(data) {
        return Vec::new();
    }
    let mut reader = match png::Decoder::new(Cursor::new(data)).read_info() {
        Ok(reader) => reader,
        Err(e) => {
            debug!(error = %e, "unreadable PNG header");
            return Vec::new();
        }
    };
    // Skips the pixel data and picks up text stored after it.
    if let Err(e) = reader.finish() {
        debug!(error = %e, "PNG stream ended early; using text read so far");
    }

    let info = reader.info();
    let mut chunks: Vec<TextChunk> = info
        .uncompressed_latin1_text
        .iter()
        .map(|chunk| TextChunk {
            keyword: chunk.keyword.clone(),
            text: chunk.text.clone(),
        })
        .collect();
    chunks.extend(info.compressed_latin1_text.iter().filter_map(|chunk| {
        chunk.get_text().ok().map(|text| TextChunk {
            keyword: chunk.keyword.clone(),
            text,
        })
    }));
    chunks.extend(info.utf8_text.iter().filter_map(|chunk| {
        chunk.get_text().ok().map(|text| TextChunk {
            keyword: chunk.keyword.clone(),
            text,
        })
    }));
    chunks
}

/// Return a copy of `data` with `text` stored under `keyword`.
///
/// Existing chunks with the same keyword are dropped. ASCII text is written
/// as `tEXt`, anything else as uncompressed `iTXt`.
pub fn embed_text(data: &[u8], keyword: &str, text: &str) -> Result<Vec<u8>, PngTextError> {
    if keyword.is_empty() || keyword.len() > 79 || !keyword.is_ascii() {
        return Err(PngTextError::InvalidKeyword(keyword.to_string()));
    }
    let chunks = walk_chunks(data)?;
    let header = chunks
        .first()
        .filter(|c| &c.kind == b"IHDR")
        .ok_or(PngTextError::MissingHeader)?;

    let fresh = if text.is_ascii() {
        let mut body = Vec::with_capacity(keyword.len() + 1 + text.len());
        body.extend_from_slice(keyword.as_bytes());
        body.push(0);
        body.extend_from_slice(text.as_bytes());
        encode_chunk(b"tEXt", &body)
    } else {
        let mut body = Vec::with_capacity(keyword.len() + 5 + text.len());
        body.extend_from_slice(keyword.as_bytes());
        // null separator, compression flag, compression method,
        // empty language tag, empty translated keyword
        body.extend_from_slice(&[0, 0, 0, 0, 0]);
        body.extend_from_slice(text.as_bytes());
        encode_chunk(b"iTXt", &body)
    };

    let mut out = Vec::with_capacity(data.len() + fresh.len());
    out.extend_from_slice(&data[..header.end]);
    out.extend_from_slice(&fresh);
    for chunk in &chunks[1..] {
        let replaced = matches!(&chunk.kind, b"tEXt" | b"iTXt" | b"zTXt")
            && chunk_keyword(chunk.data) == Some(keyword.as_bytes());
        if !replaced {
            out.extend_from_slice(&data[chunk.start..chunk.end]);
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Chunk stream
// ---------------------------------------------------------------------------

/// Split a PNG into chunks, stopping after `IEND`.
///
/// Chunk layout:
///   Bytes 0-3: data length (big-endian u32)
///   Bytes 4-7: chunk type
///   Bytes 8+:  data
///   Last 4:    CRC-32 over type + data
fn walk_chunks(data: &[u8]) -> Result<Vec<RawChunk<'_>>, PngTextError> {
    if !is_png(data) {
        return Err(PngTextError::NotPng);
    }
    let mut chunks = Vec::new();
    let mut pos = PNG_SIGNATURE.len();

    while pos + 8 <= data.len() {
        let length =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let kind = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];
        let data_start = pos + 8;
        let end = data_start + length + 4;
        if end > data.len() {
            break;
        }
        chunks.push(RawChunk {
            kind,
            data: &data[data_start..data_start + length],
            start: pos,
            end,
        });
        pos = end;
        if &kind == b"IEND" {
            return Ok(chunks);
        }
    }

    if chunks.is_empty() {
        Err(PngTextError::Truncated)
    } else {
        Ok(chunks)
    }
}

fn encode_chunk(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 12);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    let crc = crc32fast::hash(&out[4..]);
    out.extend_from_slice(&crc.to_be_bytes());
    out
}

fn chunk_keyword(data: &[u8]) -> Option<&[u8]> {
    let nul = data.iter().position(|&b| b == 0)?;
    Some(&data[..nul])
}
