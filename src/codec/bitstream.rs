//! Bit-level packing for the dictionary codec.
//!
//! Codes are written least-significant bit first into fixed-width units;
//! within a unit the first bit written ends up in the most significant
//! position. A [`Transport`] then maps every unit to one output character.

use super::CodecError;
use serde::{Deserialize, Serialize};

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const URI_SAFE_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-$";

/// Offset added to 15-bit units so every character is printable.
const UTF16_OFFSET: u32 = 32;

/// How packed units are rendered as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// 6-bit units over the standard base64 alphabet, `=`-padded.
    Base64,
    /// 6-bit units over an alphabet that survives URIs and data URLs unescaped.
    #[default]
    UriSafe,
    /// 15-bit units stored as BMP code points starting at U+0020.
    Utf16,
}

impl Transport {
    pub fn bits_per_unit(self) -> u32 {
        match self {
            Transport::Base64 | Transport::UriSafe => 6,
            Transport::Utf16 => 15,
        }
    }

    fn alphabet(self) -> Option<&'static [u8; 64]> {
        match self {
            Transport::Base64 => Some(BASE64_ALPHABET),
            Transport::UriSafe => Some(URI_SAFE_ALPHABET),
            Transport::Utf16 => None,
        }
    }

    /// Render packed units as text.
    pub fn render(self, units: &[u32]) -> String {
        match self.alphabet() {
            Some(alphabet) => {
                let mut out: String = units
                    .iter()
                    .map(|&u| alphabet[u as usize] as char)
                    .collect();
                if self == Transport::Base64 {
                    while out.len() % 4 != 0 {
                        out.push('=');
                    }
                }
                out
            }
            None => units
                .iter()
                .filter_map(|&u| char::from_u32(u + UTF16_OFFSET))
                .collect(),
        }
    }

    /// Parse text back into units, rejecting characters outside the alphabet.
    pub fn parse(self, text: &str) -> Result<Vec<u32>, CodecError> {
        let body = match self {
            Transport::Base64 => text.trim_end_matches('='),
            _ => text,
        };
        let max = 1u32 << self.bits_per_unit();
        body.chars()
            .enumerate()
            .map(|(offset, symbol)| {
                let value = match self.alphabet() {
                    Some(alphabet) => u8::try_from(symbol)
                        .ok()
                        .and_then(|b| alphabet.iter().position(|&a| a == b))
                        .map(|p| p as u32),
                    None => (symbol as u32)
                        .checked_sub(UTF16_OFFSET)
                        .filter(|&v| v < max),
                };
                value.ok_or(CodecError::InvalidSymbol { symbol, offset })
            })
            .collect()
    }
}

/// Accumulates codes into fixed-width units.
pub(crate) struct BitWriter {
    bits_per_unit: u32,
    units: Vec<u32>,
    current: u32,
    filled: u32,
}

impl BitWriter {
    pub fn new(bits_per_unit: u32) -> Self {
        Self {
            bits_per_unit,
            units: Vec::new(),
            current: 0,
            filled: 0,
        }
    }

    /// Write the low `width` bits of `value`, least significant first.
    pub fn write(&mut self, mut value: u32, width: u32) {
        for _ in 0..width {
            self.current = (self.current << 1) | (value & 1);
            value >>= 1;
            self.filled += 1;
            if self.filled == self.bits_per_unit {
                self.units.push(self.current);
                self.current = 0;
                self.filled = 0;
            }
        }
    }

    /// Zero-pad the partial unit and return all units.
    pub fn finish(mut self) -> Vec<u32> {
        if self.filled > 0 {
            self.current <<= self.bits_per_unit - self.filled;
            self.units.push(self.current);
        }
        self.units
    }
}

/// Reads codes back out of units produced by [`BitWriter`].
pub(crate) struct BitReader<'a> {
    units: &'a [u32],
    next: usize,
    current: u32,
    mask: u32,
    reset: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(units: &'a [u32], bits_per_unit: u32) -> Self {
        let reset = 1 << (bits_per_unit - 1);
        let (current, next, mask) = match units.first() {
            Some(&first) => (first, 1, reset),
            None => (0, 0, 0),
        };
        Self {
            units,
            next,
            current,
            mask,
            reset,
        }
    }

    fn read_bit(&mut self) -> Result<u32, CodecError> {
        if self.mask == 0 {
            return Err(CodecError::Truncated);
        }
        let bit = u32::from(self.current & self.mask != 0);
        self.mask >>= 1;
        if self.mask == 0 && self.next < self.units.len() {
            self.current = self.units[self.next];
            self.next += 1;
            self.mask = self.reset;
        }
        Ok(bit)
    }

    /// Read a `width`-bit value written by [`BitWriter::write`].
    pub fn read(&mut self, width: u32) -> Result<u32, CodecError> {
        let mut value = 0;
        for shift in 0..width {
            value |= self.read_bit()? << shift;
        }
        Ok(value)
    }
}
