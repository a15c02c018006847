//! Charset-aware writes.
//!
//! Payload bytes are decoded from their source encoding (UTF-8 unless a
//! character stream says otherwise; malformed sequences become U+FFFD) and
//! re-encoded into the configured charset chunk by chunk, through a buffered
//! writer. Characters the target charset cannot represent are written as `?`.
//!
//! ISO-8859-1 and UTF-16 are encoded here rather than through encoding_rs:
//! WHATWG folds the Latin-1 labels into windows-1252, and treats UTF-16 as
//! decode-only.

use encoding_rs::{CoderResult, Decoder, Encoder, EncoderResult, Encoding, UTF_16BE, UTF_16LE};
use std::fmt;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

use super::io_copy::{CopyResult, DurabilityMode, finish, open_target};
use crate::errors::{StoreError, StoreResult};

const REPLACEMENT: u8 = b'?';

const LATIN1_LABELS: &[&str] = &[
    "iso-8859-1",
    "iso8859-1",
    "iso_8859-1",
    "iso8859_1",
    "iso_8859_1",
    "iso_8859-1:1987",
    "8859_1",
    "latin1",
    "l1",
    "cp819",
    "ibm819",
    "ibm-819",
    "iso-ir-100",
    "csisolatin1",
];

/// A resolved target charset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// ISO-8859-1 proper: U+0000..=U+00FF map to one byte each.
    Latin1,
    /// UTF-16 in the given byte order, led by a byte order mark when `bom`.
    Utf16 { big_endian: bool, bom: bool },
    /// Any other charset encoding_rs can write.
    Other(&'static Encoding),
}

impl Charset {
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Latin1 => "ISO-8859-1",
            Charset::Utf16 { bom: true, .. } => "UTF-16",
            Charset::Utf16 { big_endian: true, .. } => "UTF-16BE",
            Charset::Utf16 { big_endian: false, .. } => "UTF-16LE",
            Charset::Other(enc) => enc.name(),
        }
    }

    fn encoder(&self) -> CharEncoder {
        match *self {
            Charset::Latin1 => CharEncoder::Latin1,
            Charset::Utf16 { big_endian, .. } => CharEncoder::Utf16 { big_endian },
            Charset::Other(enc) => CharEncoder::Other(enc.new_encoder()),
        }
    }

    fn bom(&self) -> &'static [u8] {
        match self {
            Charset::Utf16 { bom: true, big_endian: true } => &[0xFE, 0xFF],
            Charset::Utf16 { bom: true, big_endian: false } => &[0xFF, 0xFE],
            _ => &[],
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve a charset label (case-insensitive). Latin-1 and UTF-16 names are
/// taken literally; everything else goes through the WHATWG label table.
/// Labels encoding_rs can only decode are rejected.
pub fn lookup_charset(label: &str) -> StoreResult<Charset> {
    let norm = label.trim().to_ascii_lowercase();
    if LATIN1_LABELS.contains(&norm.as_str()) {
        return Ok(Charset::Latin1);
    }
    match norm.as_str() {
        "utf-16" | "utf16" | "utf_16" => {
            return Ok(Charset::Utf16 { big_endian: true, bom: true });
        }
        "utf-16be" | "utf_16be" | "x-utf-16be" => {
            return Ok(Charset::Utf16 { big_endian: true, bom: false });
        }
        "utf-16le" | "utf_16le" | "x-utf-16le" => {
            return Ok(Charset::Utf16 { big_endian: false, bom: false });
        }
        _ => {}
    }

    let enc = Encoding::for_label(norm.as_bytes())
        .ok_or_else(|| StoreError::UnsupportedCharset(label.to_string()))?;
    if enc == UTF_16BE || enc == UTF_16LE {
        return Ok(Charset::Utf16 { big_endian: enc == UTF_16BE, bom: false });
    }
    if enc.output_encoding() != enc {
        return Err(StoreError::UnsupportedCharset(label.to_string()));
    }
    Ok(Charset::Other(enc))
}

enum CharEncoder {
    Latin1,
    Utf16 { big_endian: bool },
    Other(Encoder),
}

impl CharEncoder {
    /// Append the encoding of `src` to `dst`. Returns how many characters
    /// were replaced.
    fn encode(&mut self, src: &str, dst: &mut Vec<u8>, last: bool) -> usize {
        match self {
            CharEncoder::Latin1 => {
                let mut replaced = 0;
                dst.extend(src.chars().map(|c| match u8::try_from(u32::from(c)) {
                    Ok(b) => b,
                    Err(_) => {
                        replaced += 1;
                        REPLACEMENT
                    }
                }));
                replaced
            }
            CharEncoder::Utf16 { big_endian } => {
                dst.reserve(src.len() * 2);
                for unit in src.encode_utf16() {
                    if *big_endian {
                        dst.extend_from_slice(&unit.to_be_bytes());
                    } else {
                        dst.extend_from_slice(&unit.to_le_bytes());
                    }
                }
                0
            }
            CharEncoder::Other(encoder) => encode_chunk(encoder, src, dst, last),
        }
    }
}

/// Stream `reader` into `target`: decoded as `source`, re-encoded as
/// `charset`, then the encoded `trailer` (if any). Returns the number of
/// encoded payload bytes written.
#[allow(clippy::too_many_arguments)]
pub(crate) fn write_encoded<R: Read + ?Sized>(
    reader: &mut R,
    target: &Path,
    append: bool,
    trailer: Option<&str>,
    source: &'static Encoding,
    charset: Charset,
    buf_size: usize,
    mode: DurabilityMode,
) -> io::Result<CopyResult> {
    let file = open_target(target, append)?;
    let fresh = file.metadata()?.len() == 0;
    let mut out = BufWriter::with_capacity(buf_size.max(1), file);
    let mut decoder = source.new_decoder_with_bom_removal();
    let mut encoder = charset.encoder();

    let mut input = vec![0u8; buf_size.max(1)];
    let mut text = String::new();
    let mut encoded = Vec::new();
    let mut bytes = 0u64;
    let mut replaced = 0usize;

    // An appended UTF-16 body continues the existing byte order mark.
    if fresh {
        out.write_all(charset.bom())?;
        bytes += charset.bom().len() as u64;
    }

    loop {
        let n = match reader.read(&mut input) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let eof = n == 0;
        text.clear();
        decode_chunk(&mut decoder, &input[..n], &mut text, eof);
        encoded.clear();
        replaced += encoder.encode(&text, &mut encoded, false);
        out.write_all(&encoded)?;
        bytes += encoded.len() as u64;
        if eof {
            break;
        }
    }

    encoded.clear();
    if let Some(t) = trailer {
        replaced += encoder.encode(t, &mut encoded, false);
    }
    // Flush any shift state held by stateful encoders.
    encoder.encode("", &mut encoded, true);
    out.write_all(&encoded)?;

    if replaced > 0 {
        debug!(
            path = %target.display(),
            charset = charset.name(),
            replaced,
            "unmappable characters written as '?'"
        );
    }

    let mut file = out.into_inner().map_err(|e| e.into_error())?;
    finish(&mut file, mode)?;
    Ok(CopyResult { bytes, buf_size, mode })
}

fn decode_chunk(decoder: &mut Decoder, mut src: &[u8], dst: &mut String, last: bool) {
    loop {
        let need = decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or(src.len() * 3 + 16);
        dst.reserve(need);
        let (result, read, _replaced) = decoder.decode_to_string(src, dst, last);
        src = &src[read..];
        match result {
            CoderResult::InputEmpty => return,
            CoderResult::OutputFull => dst.reserve(src.len() * 3 + 16),
        }
    }
}

fn encode_chunk(encoder: &mut Encoder, mut src: &str, dst: &mut Vec<u8>, last: bool) -> usize {
    let mut replaced = 0;
    loop {
        let need = encoder
            .max_buffer_length_from_utf8_without_replacement(src.len())
            .unwrap_or(src.len() * 4 + 16);
        dst.reserve(need);
        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(src, dst, last);
        src = &src[read..];
        match result {
            EncoderResult::InputEmpty => return replaced,
            EncoderResult::OutputFull => dst.reserve(src.len() * 4 + 16),
            // Stateful encoders are back in their ASCII state here.
            EncoderResult::Unmappable(_) => {
                dst.push(REPLACEMENT);
                replaced += 1;
            }
        }
    }
}
