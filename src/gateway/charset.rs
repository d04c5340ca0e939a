// ABOUTME: Character-set codecs for SMPP short_message bodies, keyed by data_coding
// ABOUTME: Implements GSM 03.38 by hand; delegates ascii/latin-1/utf-16be to std/bytes facilities

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CharsetError {
    #[error("no codec registered for data_coding {0} and no override configured")]
    UnknownDataCoding(u8),
    #[error("bytes are not valid {codec} text")]
    Decode { codec: &'static str },
}

/// The character sets a DataCoding value can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Gsm0338,
    Ascii,
    Latin1,
    Utf16Be,
    Utf8,
}

impl Codec {
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "gsm0338" => Some(Codec::Gsm0338),
            "ascii" => Some(Codec::Ascii),
            "latin-1" | "latin1" => Some(Codec::Latin1),
            "utf-16be" | "utf16be" => Some(Codec::Utf16Be),
            "utf-8" | "utf8" => Some(Codec::Utf8),
            _ => None,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, CharsetError> {
        match self {
            Codec::Gsm0338 => Ok(gsm0338_decode(bytes)),
            Codec::Ascii => std::str::from_utf8(bytes)
                .map(|s| s.to_string())
                .map_err(|_| CharsetError::Decode { codec: "ascii" }),
            Codec::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Codec::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(CharsetError::Decode { codec: "utf-16be" });
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|_| CharsetError::Decode { codec: "utf-16be" })
            }
            Codec::Utf8 => std::str::from_utf8(bytes)
                .map(|s| s.to_string())
                .map_err(|_| CharsetError::Decode { codec: "utf-8" }),
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Codec::Gsm0338 => gsm0338_encode(text),
            Codec::Ascii | Codec::Utf8 => text.as_bytes().to_vec(),
            Codec::Latin1 => text.chars().map(|c| c as u8).collect(),
            Codec::Utf16Be => text
                .encode_utf16()
                .flat_map(|u| u.to_be_bytes())
                .collect(),
        }
    }
}

/// Resolves SMPP `data_coding` values to a `Codec`, honoring per-session overrides.
#[derive(Debug, Clone, Default)]
pub struct CharsetTable {
    overrides: HashMap<u8, Codec>,
}

impl CharsetTable {
    pub fn new(overrides: HashMap<u8, Codec>) -> Self {
        Self { overrides }
    }

    pub fn resolve(&self, data_coding: u8) -> Result<Codec, CharsetError> {
        if let Some(codec) = self.overrides.get(&data_coding) {
            return Ok(*codec);
        }
        match data_coding {
            0 => Ok(Codec::Gsm0338),
            1 => Ok(Codec::Ascii),
            3 => Ok(Codec::Latin1),
            8 => Ok(Codec::Utf16Be),
            other => Err(CharsetError::UnknownDataCoding(other)),
        }
    }
}

/// GSM 03.38 default alphabet, basic table only (no escape/extension table).
/// Index = GSM septet value, character = decoded Unicode scalar.
const GSM_BASIC_TABLE: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', 'Δ', '_',
    'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1b}', 'Æ', 'æ', 'ß', 'É', ' ', '!', '"', '#',
    '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', '0', '1', '2', '3', '4', '5',
    '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G',
    'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    'Ä', 'Ö', 'Ñ', 'Ü', '§', '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm',
    'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

fn gsm0338_decode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| GSM_BASIC_TABLE.get(b as usize).copied().unwrap_or('?'))
        .collect()
}

fn gsm0338_encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            GSM_BASIC_TABLE
                .iter()
                .position(|&g| g == c)
                .map(|pos| pos as u8)
                .unwrap_or(b'?')
        })
        .collect()
}
