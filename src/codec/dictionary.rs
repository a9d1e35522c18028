//! Adaptive-dictionary text compression (LZW family).
//!
//! The table starts empty apart from three reserved codes and learns every
//! phrase from the input itself. A character is assigned a code the first
//! time it is seen, but its literal value is only written the first time
//! that single-character phrase is emitted; the decoder allocates the same
//! code when it reads the literal, which keeps both tables in lockstep.
//!
//! ```text
//! code 0   8-bit literal follows
//! code 1   21-bit literal follows (any Unicode scalar value)
//! code 2   end of stream
//! code 3+  dictionary phrases
//! ```
//!
//! Code width starts at 2 bits and grows by one whenever the table crosses
//! the next power of two. Codes are packed with [`BitWriter`] and rendered
//! through a [`Transport`].

use super::CodecError;
use super::bitstream::{BitReader, BitWriter, Transport};
use std::collections::{HashMap, HashSet};

const NARROW_LITERAL: u32 = 0;
const WIDE_LITERAL: u32 = 1;
const END_OF_STREAM: u32 = 2;
const FIRST_CODE: u32 = 3;

const NARROW_BITS: u32 = 8;
const WIDE_BITS: u32 = 21;

/// Tracks the current code width and when it next grows.
#[derive(Debug, Clone, Copy)]
struct CodeWidth {
    bits: u32,
    enlarge_in: u32,
}

impl CodeWidth {
    fn new(bits: u32) -> Self {
        Self {
            bits,
            enlarge_in: 1 << (bits - 1),
        }
    }

    /// Account for one new table slot.
    fn tick(&mut self) {
        self.enlarge_in -= 1;
        if self.enlarge_in == 0 {
            self.enlarge_in = 1 << self.bits;
            self.bits += 1;
        }
    }
}

/// A phrase the compressor is currently extending.
#[derive(Debug, Clone, Copy)]
struct Phrase {
    code: u32,
    /// Set when the phrase is a single character.
    single: Option<char>,
}

struct Compressor {
    singles: HashMap<char, u32>,
    extensions: HashMap<(u32, char), u32>,
    unannounced: HashSet<char>,
    next_code: u32,
    width: CodeWidth,
    out: BitWriter,
    phrase: Option<Phrase>,
}

impl Compressor {
    fn new(bits_per_unit: u32) -> Self {
        Self {
            singles: HashMap::new(),
            extensions: HashMap::new(),
            unannounced: HashSet::new(),
            next_code: FIRST_CODE,
            width: CodeWidth::new(2),
            out: BitWriter::new(bits_per_unit),
            phrase: None,
        }
    }

    fn allocate(&mut self) -> u32 {
        let code = self.next_code;
        self.next_code += 1;
        code
    }

    fn single(&mut self, c: char) -> Phrase {
        let code = match self.singles.get(&c) {
            Some(&code) => code,
            None => {
                let code = self.allocate();
                self.singles.insert(c, code);
                self.unannounced.insert(c);
                code
            }
        };
        Phrase {
            code,
            single: Some(c),
        }
    }

    fn push(&mut self, c: char) {
        let next = self.single(c);
        let Some(phrase) = self.phrase.take() else {
            self.phrase = Some(next);
            return;
        };

        if let Some(&code) = self.extensions.get(&(phrase.code, c)) {
            self.phrase = Some(Phrase { code, single: None });
        } else {
            self.emit(phrase);
            let code = self.allocate();
            self.extensions.insert((phrase.code, c), code);
            self.phrase = Some(next);
        }
    }

    fn emit(&mut self, phrase: Phrase) {
        match phrase.single.filter(|c| self.unannounced.remove(c)) {
            Some(c) => {
                let value = c as u32;
                if value < (1 << NARROW_BITS) {
                    self.out.write(NARROW_LITERAL, self.width.bits);
                    self.out.write(value, NARROW_BITS);
                } else {
                    self.out.write(WIDE_LITERAL, self.width.bits);
                    self.out.write(value, WIDE_BITS);
                }
                // The literal occupies a slot of its own on the decoding side.
                self.width.tick();
            }
            None => self.out.write(phrase.code, self.width.bits),
        }
        self.width.tick();
    }

    fn finish(mut self) -> Vec<u32> {
        if let Some(phrase) = self.phrase.take() {
            self.emit(phrase);
        }
        self.out.write(END_OF_STREAM, self.width.bits);
        self.out.finish()
    }
}

/// Compress `text` and render the bitstream through `transport`.
pub fn compress(text: &str, transport: Transport) -> String {
    let mut compressor = Compressor::new(transport.bits_per_unit());
    for c in text.chars() {
        compressor.push(c);
    }
    transport.render(&compressor.finish())
}

/// Reverse [`compress`]. Any malformed or truncated stream is an error.
pub fn decompress(text: &str, transport: Transport) -> Result<String, CodecError> {
    let units = transport.parse(text)?;
    let mut reader = BitReader::new(&units, transport.bits_per_unit());

    // Reserved codes hold no phrase.
    let mut entries: Vec<String> = vec![String::new(); FIRST_CODE as usize];

    let first = match reader.read(2)? {
        NARROW_LITERAL => read_literal(&mut reader, NARROW_BITS)?,
        WIDE_LITERAL => read_literal(&mut reader, WIDE_BITS)?,
        END_OF_STREAM => return Ok(String::new()),
        code => {
            return Err(CodecError::InvalidCode {
                code,
                next: FIRST_CODE,
            });
        }
    };
    let mut previous = first.to_string();
    entries.push(previous.clone());
    let mut out = previous.clone();
    let mut width = CodeWidth::new(3);

    loop {
        let code = match reader.read(width.bits)? {
            END_OF_STREAM => return Ok(out),
            kind @ (NARROW_LITERAL | WIDE_LITERAL) => {
                let bits = if kind == NARROW_LITERAL {
                    NARROW_BITS
                } else {
                    WIDE_BITS
                };
                entries.push(read_literal(&mut reader, bits)?.to_string());
                width.tick();
                (entries.len() - 1) as u32
            }
            code => code,
        };

        let next = entries.len() as u32;
        let entry = match code.cmp(&next) {
            std::cmp::Ordering::Less => entries[code as usize].clone(),
            // The phrase being defined right now: previous + its own first char.
            std::cmp::Ordering::Equal => {
                let mut entry = previous.clone();
                entry.extend(previous.chars().next());
                entry
            }
            std::cmp::Ordering::Greater => return Err(CodecError::InvalidCode { code, next }),
        };

        out.push_str(&entry);
        let mut learned = previous;
        learned.extend(entry.chars().next());
        entries.push(learned);
        width.tick();
        previous = entry;
    }
}

fn read_literal(reader: &mut BitReader<'_>, bits: u32) -> Result<char, CodecError> {
    let value = reader.read(bits)?;
    char::from_u32(value).ok_or(CodecError::InvalidLiteral(value))
}
