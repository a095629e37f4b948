//! Byte-to-text decoding for SIE exports.
//!
//! The format predates Unicode: the installed base writes IBM PC8 (code page
//! 437), newer tools write ISO-8859-1, and some emit UTF-8 with a byte-order
//! mark. Detection scans the first 4KB for the byte values the Swedish
//! letters å/ä/ö take in each legacy encoding.

use crate::error::{Result, SieError};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const DETECTION_WINDOW: usize = 4096;

/// å/ä/ö and their upper-case forms in CP437.
const CP437_SWEDISH: [u8; 6] = [0x84, 0x86, 0x94, 0x8E, 0x8F, 0x99];
/// The same letters in ISO-8859-1.
const LATIN1_SWEDISH: [u8; 6] = [0xE4, 0xE5, 0xF6, 0xC4, 0xC5, 0xD6];

/// CP437 upper half, 0x80..=0xFF.
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedEncoding {
    Utf8,
    Cp437,
    Latin1,
}

/// Detection heuristic: a UTF-8 BOM wins; otherwise, Swedish-letter bytes of
/// only the ISO-8859-1 kind select ISO-8859-1; everything else defaults to
/// CP437.
pub fn detect_encoding(bytes: &[u8]) -> DetectedEncoding {
    if bytes.starts_with(&UTF8_BOM) {
        return DetectedEncoding::Utf8;
    }

    let window = &bytes[..bytes.len().min(DETECTION_WINDOW)];
    let has_cp437 = window.iter().any(|b| CP437_SWEDISH.contains(b));
    let has_latin1 = window.iter().any(|b| LATIN1_SWEDISH.contains(b));

    if has_latin1 && !has_cp437 {
        DetectedEncoding::Latin1
    } else {
        DetectedEncoding::Cp437
    }
}

fn decode_cp437(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b < 0x80 {
                b as char
            } else {
                CP437_HIGH[(b - 0x80) as usize]
            }
        })
        .collect()
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Decodes raw SIE bytes to text using the detection heuristic.
pub fn decode_bytes(bytes: &[u8]) -> Result<String> {
    match detect_encoding(bytes) {
        DetectedEncoding::Utf8 => String::from_utf8(bytes[UTF8_BOM.len()..].to_vec())
            .map_err(|e| SieError::Encoding(e.to_string())),
        DetectedEncoding::Cp437 => Ok(decode_cp437(bytes)),
        DetectedEncoding::Latin1 => Ok(decode_latin1(bytes)),
    }
}
