//! File type detection from leading magic bytes.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use onebridge_shared::constants::{SILK_MAGIC, SILK_V3_HEADER};

use crate::error::{MediaError, Result};

/// Number of leading bytes inspected.
const SNIFF_LEN: u64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileKind {
    pub ext: &'static str,
    pub mime: &'static str,
}

const fn kind(ext: &'static str, mime: &'static str) -> Option<FileKind> {
    Some(FileKind { ext, mime })
}

/// Infer the file type from its first bytes. Returns `None` for anything
/// unrecognised, including plain text.
pub fn detect(bytes: &[u8]) -> Option<FileKind> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return kind("png", "image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return kind("jpg", "image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return kind("gif", "image/gif");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") {
        match &bytes[8..12] {
            b"WEBP" => return kind("webp", "image/webp"),
            b"WAVE" => return kind("wav", "audio/wav"),
            b"AVI " => return kind("avi", "video/x-msvideo"),
            _ => {}
        }
    }
    if bytes.starts_with(&SILK_MAGIC) || bytes.starts_with(SILK_V3_HEADER) {
        return kind("silk", "audio/silk");
    }
    if bytes.starts_with(b"#!AMR") {
        return kind("amr", "audio/amr");
    }
    if bytes.starts_with(b"OggS") {
        return kind("ogg", "audio/ogg");
    }
    if bytes.starts_with(b"fLaC") {
        return kind("flac", "audio/flac");
    }
    if bytes.starts_with(b"ID3") || is_mpeg_audio_frame(bytes) {
        return kind("mp3", "audio/mpeg");
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return match &bytes[8..12] {
            b"M4A " | b"M4B " => kind("m4a", "audio/mp4"),
            b"qt  " => kind("mov", "video/quicktime"),
            b"heic" | b"heix" | b"heim" | b"heis" | b"mif1" | b"msf1" => {
                kind("heic", "image/heic")
            }
            b"avif" | b"avis" => kind("avif", "image/avif"),
            b"isom" | b"iso2" | b"iso4" | b"iso5" | b"iso6" | b"mp41" | b"mp42" | b"avc1"
            | b"dash" | b"MSNV" | b"M4V " | b"f4v " | b"3gp4" | b"3gp5" | b"3g2a" => {
                kind("mp4", "video/mp4")
            }
            _ => None,
        };
    }
    if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        if bytes.windows(4).any(|w| w == b"webm") {
            return kind("webm", "video/webm");
        }
        return kind("mkv", "video/x-matroska");
    }
    if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        return kind("tif", "image/tiff");
    }
    if bytes.starts_with(b"BM") && bytes.len() >= 14 {
        return kind("bmp", "image/bmp");
    }
    if bytes.starts_with(b"%PDF") {
        return kind("pdf", "application/pdf");
    }
    if bytes.starts_with(&[b'P', b'K', 0x03, 0x04]) {
        return kind("zip", "application/zip");
    }
    if bytes.starts_with(&[0x1F, 0x8B]) {
        return kind("gz", "application/gzip");
    }
    None
}

// MPEG-1/2 layer III frame sync without an ID3 tag.
fn is_mpeg_audio_frame(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0 && bytes[1] & 0x06 == 0x02
}

/// Read the head of `path` and run [`detect`] over it.
pub async fn detect_file(path: &Path) -> Result<Option<FileKind>> {
    let file = File::open(path)
        .await
        .map_err(|e| MediaError::io(path, e))?;

    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    file.take(SNIFF_LEN)
        .read_to_end(&mut head)
        .await
        .map_err(|e| MediaError::io(path, e))?;

    Ok(detect(&head))
}
