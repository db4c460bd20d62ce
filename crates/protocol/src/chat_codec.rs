//! # Chat Codec
//!
//! Canonical prefix code used to compress chat, speech and quest text.
//!
//! # Format
//!
//! Every byte value has a fixed code length. Codes are handed out in byte
//! order, each one the next free code of its length, so both ends derive
//! identical tables from the length table alone. The packed stream carries
//! no terminator: the sender transmits the symbol count separately and the
//! decoder stops once it has produced that many symbols.
//!
//! Characters outside Latin-1 that have a Windows-1252 spelling travel as
//! the bytes 128-159; anything else becomes `'?'`.
//!
//! # Decoding
//!
//! Decoding never fails. Corrupt input yields garbled text, which then goes
//! through [`normalize`] to apply the case and formatting rules.
//!
//! # Example
//!
//! ```
//! use mudsync_protocol::init_codec;
//!
//! let codec = init_codec();
//! let encoded = codec.encode("hello world");
//! let decoded = codec.decode(&encoded.bytes, encoded.symbol_count);
//! assert_eq!(decoded.text, "hello world");
//! assert_eq!(decoded.bytes_consumed, encoded.byte_len());
//! ```

use crate::bit_reader::{BitReader, BitWriter};
use mudsync_core::Result;
use std::sync::Arc;

/// Longest chat line the client will send
pub const MAX_MESSAGE_LENGTH: usize = 80;

/// Code length in bits of every byte value
const CODE_LENGTHS: [u8; 256] = [
    22, 22, 22, 22, 22, 22, 21, 22, 22, 20, 22, 22, 22, 21, 22, 22,
    22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22,
    3, 8, 22, 16, 22, 16, 17, 7, 13, 13, 13, 16, 7, 10, 6, 16,
    10, 11, 12, 12, 12, 12, 13, 13, 14, 14, 11, 14, 19, 15, 17, 8,
    11, 9, 10, 10, 10, 10, 11, 10, 9, 7, 12, 11, 10, 10, 9, 10,
    10, 12, 10, 9, 8, 12, 12, 9, 14, 8, 12, 17, 16, 17, 22, 13,
    21, 4, 7, 6, 5, 3, 6, 6, 5, 4, 10, 7, 5, 6, 4, 4,
    6, 10, 5, 4, 4, 5, 7, 6, 10, 6, 10, 22, 19, 22, 14, 22,
    22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22,
    22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22,
    22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22,
    22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22,
    22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22,
    22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22,
    22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22, 22,
    22, 22, 22, 22, 22, 22, 22, 21, 22, 21, 22, 22, 22, 21, 22, 22,
];

/// Windows-1252 characters carried as the bytes 128-159
///
/// `'?'` marks the five undefined positions.
const C1_CHARACTERS: [char; 32] = [
    '\u{20ac}', '?', '\u{201a}', '\u{0192}', '\u{201e}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02c6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '?', '\u{017d}', '?',
    '?', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02dc}', '\u{2122}', '\u{0161}', '\u{203a}', '\u{0153}', '?', '\u{017e}', '\u{0178}',
];

/// Output of [`ChatCodec::encode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChat {
    /// Packed codes, zero-padded to a whole byte
    pub bytes: Vec<u8>,
    /// Number of symbols the decoder must produce
    pub symbol_count: usize,
}

impl EncodedChat {
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Output of [`ChatCodec::decode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedChat {
    pub text: String,
    /// Input bytes the decoder touched
    pub bytes_consumed: usize,
}

/// Prebuilt code and decode tables
///
/// Built once by [`init_codec`] and shared read-only afterwards.
#[derive(Debug)]
pub struct ChatCodec {
    /// Code of each byte value, left-aligned in 32 bits
    codes: [u32; 256],
    /// Flat decode trie. A 0 bit moves to the next slot, a 1 bit follows the
    /// slot's child index, and a negative slot is the complement of a symbol.
    trie: Vec<i32>,
}

/// Build the codec tables
///
/// # Returns
/// A shared handle to pass to every component that encodes or decodes chat.
pub fn init_codec() -> Arc<ChatCodec> {
    let codec = ChatCodec::build();
    tracing::debug!("Built chat codec ({} trie slots)", codec.trie.len());
    Arc::new(codec)
}

impl ChatCodec {
    fn build() -> Self {
        let mut codes = [0u32; 256];
        let mut trie = vec![0i32; 8];
        // next_code[len] is the next free code of that length
        let mut next_code = [0u32; 33];
        let mut next_free_slot = 0usize;

        for (symbol, &len) in CODE_LENGTHS.iter().enumerate() {
            let len = len as usize;
            let lowest_bit = 1u32 << (32 - len);
            let code = next_code[len];
            codes[symbol] = code;

            let successor = if code & lowest_bit == 0 {
                // Shorter lengths that shared this prefix move past it
                for shorter in (1..len).rev() {
                    let candidate = next_code[shorter];
                    if candidate != code {
                        break;
                    }
                    let shorter_bit = 1u32 << (32 - shorter);
                    if candidate & shorter_bit == 0 {
                        next_code[shorter] = candidate | shorter_bit;
                    } else {
                        next_code[shorter] = next_code[shorter - 1];
                        break;
                    }
                }
                code | lowest_bit
            } else {
                next_code[len - 1]
            };

            next_code[len] = successor;
            for longer in next_code.iter_mut().skip(len + 1) {
                if *longer == code {
                    *longer = successor;
                }
            }

            let mut slot = 0usize;
            for depth in 0..len {
                if code & (0x8000_0000u32 >> depth) == 0 {
                    slot += 1;
                } else {
                    if trie[slot] == 0 {
                        trie[slot] = next_free_slot as i32;
                    }
                    slot = trie[slot] as usize;
                }
                if slot >= trie.len() {
                    let grown = trie.len() * 2;
                    trie.resize(grown.max(slot + 1), 0);
                }
            }
            trie[slot] = !(symbol as i32);
            next_free_slot = next_free_slot.max(slot + 1);
        }

        Self { codes, trie }
    }

    /// Code length in bits for a byte value
    #[inline]
    pub fn code_length(&self, symbol: u8) -> u32 {
        CODE_LENGTHS[symbol as usize] as u32
    }

    /// Code for a byte value, right-aligned
    #[inline]
    pub fn code(&self, symbol: u8) -> u32 {
        self.codes[symbol as usize] >> (32 - self.code_length(symbol))
    }

    /// Lower-case, truncate to [`MAX_MESSAGE_LENGTH`] and pack `text`
    pub fn encode(&self, text: &str) -> EncodedChat {
        let symbols: Vec<u8> = text
            .chars()
            .flat_map(char::to_lowercase)
            .take(MAX_MESSAGE_LENGTH)
            .map(to_wire_byte)
            .collect();
        self.encode_bytes(&symbols)
    }

    /// Pack raw byte symbols without any text mapping
    pub fn encode_bytes(&self, symbols: &[u8]) -> EncodedChat {
        let mut writer = BitWriter::with_capacity(symbols.len());
        for &symbol in symbols {
            writer.put_bits(self.code_length(symbol), self.code(symbol));
        }
        EncodedChat {
            bytes: writer.into_bytes(),
            symbol_count: symbols.len(),
        }
    }

    /// Unpack up to `symbol_count` raw symbols
    ///
    /// # Returns
    /// The symbols and the number of input bytes read. Stops early when the
    /// input runs out.
    pub fn decode_bytes(&self, data: &[u8], symbol_count: usize) -> (Vec<u8>, usize) {
        let mut symbols = Vec::with_capacity(symbol_count.min(data.len() * 8));
        let mut consumed = 0;
        let mut slot = 0usize;

        if symbol_count == 0 {
            return (symbols, 0);
        }

        'input: for &byte in data {
            consumed += 1;
            for shift in (0..8).rev() {
                slot = if (byte >> shift) & 1 == 0 {
                    slot + 1
                } else {
                    self.trie.get(slot).copied().unwrap_or(0).max(0) as usize
                };

                match self.trie.get(slot) {
                    Some(&value) if value < 0 => {
                        symbols.push(!value as u8);
                        if symbols.len() >= symbol_count {
                            break 'input;
                        }
                        slot = 0;
                    }
                    Some(_) => {}
                    None => slot = 0,
                }
            }
        }

        (symbols, consumed)
    }

    /// Unpack `symbol_count` symbols into display text
    pub fn decode(&self, data: &[u8], symbol_count: usize) -> DecodedChat {
        let (symbols, bytes_consumed) = self.decode_bytes(data, symbol_count);
        let text: String = symbols.into_iter().filter_map(from_wire_byte).collect();
        DecodedChat {
            text: normalize(&text),
            bytes_consumed,
        }
    }

    /// Read a chat sub-record: a smart symbol count followed by packed codes
    ///
    /// The reader is left on the byte after the packed codes.
    pub fn read_message(&self, reader: &mut BitReader<'_>) -> Result<String> {
        let symbol_count = reader.read_smart08_16()? as usize;
        let decoded = self.decode(reader.remaining_slice(), symbol_count);
        reader.skip_bytes(decoded.bytes_consumed)?;
        Ok(decoded.text)
    }

    /// Write a chat sub-record in the form [`read_message`](Self::read_message) expects
    pub fn write_message(&self, writer: &mut BitWriter, text: &str) {
        let encoded = self.encode(text);
        writer.put_smart08_16(encoded.symbol_count as u16);
        writer.put_bytes(&encoded.bytes);
    }
}

fn to_wire_byte(c: char) -> u8 {
    let code = c as u32;
    // 128..=160 are substituted, so NBSP becomes '?'
    if code < 128 || (161..256).contains(&code) {
        return code as u8;
    }
    C1_CHARACTERS
        .iter()
        .position(|&special| special == c && special != '?')
        .map(|i| 128 + i as u8)
        .unwrap_or(b'?')
}

fn from_wire_byte(byte: u8) -> Option<char> {
    match byte {
        0 => None,
        128..=159 => Some(C1_CHARACTERS[(byte - 128) as usize]),
        _ => Some(byte as char),
    }
}

/// Apply the display rules to decoded chat text
///
/// - `@abc@` colour directives are dropped
/// - any other `@`, and `%`, becomes a space
/// - the first letter after `.` or `!` is upper-cased
pub fn normalize(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut capitalize = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '@' if is_directive(&chars[i..]) => {
                i += 5;
                continue;
            }
            '@' | '%' => out.push(' '),
            '.' | '!' => {
                capitalize = true;
                out.push(c);
            }
            'a'..='z' if capitalize => {
                capitalize = false;
                out.push(c.to_ascii_uppercase());
            }
            _ => out.push(c),
        }
        i += 1;
    }

    out
}

fn is_directive(rest: &[char]) -> bool {
    rest.len() >= 5 && rest[4] == '@' && rest[1..4].iter().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_codes_are_prefix_free() {
        let codec = ChatCodec::build();
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                if a == b {
                    continue;
                }
                let (la, lb) = (codec.code_length(a), codec.code_length(b));
                if la <= lb {
                    assert_ne!(
                        codec.code(b) >> (lb - la),
                        codec.code(a),
                        "code of {} is a prefix of code of {}",
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn test_code_lengths_match_table() {
        let codec = ChatCodec::build();
        for symbol in 0..=255u8 {
            let len = codec.code_length(symbol);
            assert_eq!(len, CODE_LENGTHS[symbol as usize] as u32);
            assert!(codec.code(symbol) < 1 << len);
            // Everything below the code's length is zero in the aligned form
            assert_eq!(codec.codes[symbol as usize] & ((1u64 << (32 - len)) - 1) as u32, 0);
        }
    }

    #[test]
    fn test_code_is_complete() {
        let total: u64 = CODE_LENGTHS.iter().map(|&len| 1u64 << (32 - len)).sum();
        assert_eq!(total, 1u64 << 32);
    }

    #[test]
    fn test_known_encoding() {
        let codec = init_codec();
        let encoded = codec.encode("hello world");
        assert_eq!(encoded.symbol_count, 11);
        assert_eq!(encoded.bytes, vec![131, 140, 112, 253, 149, 138, 128]);
    }

    #[test]
    fn test_hello_world_round_trip() {
        let codec = init_codec();
        let encoded = codec.encode("hello world");
        let decoded = codec.decode(&encoded.bytes, encoded.symbol_count);
        assert_eq!(decoded.text, "hello world");
        assert_eq!(decoded.bytes_consumed, encoded.byte_len());
    }

    #[test]
    fn test_random_lowercase_round_trip() {
        let codec = init_codec();
        let mut rng = StdRng::seed_from_u64(80);
        let alphabet: Vec<char> = "abcdefghijklmnopqrstuvwxyz ".chars().collect();
        for _ in 0..500 {
            let len = rng.gen_range(0..=MAX_MESSAGE_LENGTH);
            let text: String = (0..len).map(|_| alphabet[rng.gen_range(0..alphabet.len())]).collect();
            let encoded = codec.encode(&text);
            let decoded = codec.decode(&encoded.bytes, encoded.symbol_count);
            assert_eq!(decoded.text, text);
            assert_eq!(decoded.bytes_consumed, encoded.byte_len());
        }
    }

    #[test]
    fn test_every_byte_round_trips() {
        let codec = init_codec();
        let symbols: Vec<u8> = (0..=255u8).collect();
        let encoded = codec.encode_bytes(&symbols);
        let (decoded, consumed) = codec.decode_bytes(&encoded.bytes, symbols.len());
        assert_eq!(decoded, symbols);
        assert_eq!(consumed, encoded.byte_len());
    }

    #[test]
    fn test_encode_lowercases_and_truncates() {
        let codec = init_codec();
        let encoded = codec.encode("Hi There");
        assert_eq!(codec.decode(&encoded.bytes, encoded.symbol_count).text, "hi there");

        let long = "x".repeat(120);
        assert_eq!(codec.encode(&long).symbol_count, MAX_MESSAGE_LENGTH);
    }

    #[test]
    fn test_windows_1252_characters() {
        let codec = init_codec();
        let encoded = codec.encode("\u{20ac}5 \u{2019}\u{4e2d}");
        let (raw, _) = codec.decode_bytes(&encoded.bytes, encoded.symbol_count);
        assert_eq!(raw, vec![128, b'5', b' ', 146, b'?']);
        assert_eq!(
            codec.decode(&encoded.bytes, encoded.symbol_count).text,
            "\u{20ac}5 \u{2019}?"
        );
    }

    #[test]
    fn test_nbsp_is_substituted() {
        let codec = init_codec();
        let encoded = codec.encode("a\u{a0}b\u{a1}");
        let (raw, _) = codec.decode_bytes(&encoded.bytes, encoded.symbol_count);
        assert_eq!(raw, vec![b'a', b'?', b'b', 161]);
    }

    #[test]
    fn test_decode_survives_garbage() {
        let codec = init_codec();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let len = rng.gen_range(0..32);
            let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            let decoded = codec.decode(&data, rng.gen_range(0..200));
            assert!(decoded.bytes_consumed <= data.len());
        }
        assert_eq!(codec.decode(&[], 10).text, "");
        assert_eq!(codec.decode(&[0xFF], 0).bytes_consumed, 0);
    }

    #[test]
    fn test_normalize_rules() {
        assert_eq!(normalize("hello world"), "hello world");
        assert_eq!(normalize("hi. there! you"), "hi. There! You");
        assert_eq!(normalize("@red@warning"), "warning");
        assert_eq!(normalize("a%b@c"), "a b c");
        assert_eq!(normalize("ok. 42 go"), "ok. 42 Go");
    }

    #[test]
    fn test_read_message_advances_reader() {
        let codec = init_codec();
        let mut writer = BitWriter::new();
        writer.put_u16(0xBEEF);
        codec.write_message(&mut writer, "nice. weather");
        writer.put_u8(0x42);
        let data = writer.into_bytes();

        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(codec.read_message(&mut reader).unwrap(), "nice. Weather");
        assert_eq!(reader.read_u8().unwrap(), 0x42);
        assert!(reader.is_empty());
    }
}
