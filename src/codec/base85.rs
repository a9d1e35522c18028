//! Base85 packing: 4 bytes → 5 symbols.
//!
//! Groups are big-endian and digits are written most significant first.
//! A trailing group of `n < 4` bytes is zero-padded and truncated to its
//! first `n + 1` digits, so the decoder recovers the byte count from
//! `len % 5` alone and no padding characters ever appear in the output.
//!
//! The alphabet is printable ASCII minus `" # % & ' < > \` and the backtick,
//! which keeps encoded payloads legal inside data URLs and quoted HTML
//! attributes without escaping.

use super::CodecError;

pub const ALPHABET: &[u8; 85] =
    b"!$()*+,-./0123456789:;=?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[]^_abcdefghijklmnopqrstuvwxyz{|}~";

const INVALID: u8 = 0xFF;

const DECODE_TABLE: [u8; 128] = {
    let mut table = [INVALID; 128];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Length of the encoded form of `len` input bytes.
pub fn encoded_len(len: usize) -> usize {
    let tail = len % 4;
    len / 4 * 5 + if tail == 0 { 0 } else { tail + 1 }
}

pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(bytes.len()));
    for chunk in bytes.chunks(4) {
        let mut group = [0u8; 4];
        group[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(group);

        let mut digits = [0u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = ALPHABET[(value % 85) as usize];
            value /= 85;
        }
        let significant = if chunk.len() == 4 { 5 } else { chunk.len() + 1 };
        out.extend(digits[..significant].iter().map(|&d| d as char));
    }
    out
}

pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    let symbols = text.as_bytes();
    if symbols.len() % 5 == 1 {
        return Err(CodecError::InvalidLength(symbols.len()));
    }

    let mut out = Vec::with_capacity(symbols.len() / 5 * 4 + 3);
    for (index, chunk) in symbols.chunks(5).enumerate() {
        let offset = index * 5;
        let mut value: u64 = 0;
        for position in 0..5 {
            let digit = match chunk.get(position) {
                Some(&symbol) => digit_of(text, symbol, offset + position)?,
                // Missing digits take the highest value so truncation rounds
                // back down to the original bytes.
                None => 84,
            };
            value = value * 85 + u64::from(digit);
        }
        if value > u64::from(u32::MAX) {
            return Err(CodecError::Overflow(offset));
        }
        let bytes = (value as u32).to_be_bytes();
        let produced = if chunk.len() == 5 { 4 } else { chunk.len() - 1 };
        out.extend_from_slice(&bytes[..produced]);
    }
    Ok(out)
}

fn digit_of(text: &str, symbol: u8, offset: usize) -> Result<u8, CodecError> {
    DECODE_TABLE
        .get(symbol as usize)
        .copied()
        .filter(|&d| d != INVALID)
        .ok_or_else(|| CodecError::InvalidSymbol {
            symbol: text
                .get(offset..)
                .and_then(|rest| rest.chars().next())
                .unwrap_or(symbol as char),
            offset,
        })
}
