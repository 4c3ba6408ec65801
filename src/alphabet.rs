//! Symbol alphabet codec
//!
//! Maps text onto the fixed 74-symbol alphabet and back. The ordering is a
//! static constant shared by sender and receiver:
//!
//! - `a`..`z`: 0..=25
//! - `A`..`Z`: 26..=51
//! - `0`..`9`: 52..=61
//! - space `. , ! ? ' " : ; - ( )`: 62..=73
//!
//! Encoding rejects characters outside the alphabet instead of dropping
//! them. Callers who accept losing such characters must say so with
//! [`strip_unsupported`] before encoding.

use crate::error::{CypherError, ErrorCategory, ErrorKind, Result};

/// Number of symbols in the alphabet; every index, pad value and
/// ciphertext value lies in `[0, ALPHABET_SIZE)`.
pub const ALPHABET_SIZE: u8 = 74;

/// The alphabet in index order.
pub const SYMBOLS: [char; ALPHABET_SIZE as usize] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L',
    'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4',
    '5', '6', '7', '8', '9', ' ', '.', ',', '!', '?', '\'', '"', ':', ';', '-', '(', ')',
];

const UNMAPPED: u8 = u8::MAX;

/// ASCII lookup table; every alphabet symbol is ASCII.
const INDEX_TABLE: [u8; 128] = build_index_table();

const fn build_index_table() -> [u8; 128] {
    let mut table = [UNMAPPED; 128];
    let mut i = 0;
    while i < SYMBOLS.len() {
        table[SYMBOLS[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Index of a single symbol, or `None` if it is not in the alphabet.
pub fn symbol_index(c: char) -> Option<u8> {
    let code = c as u32;
    if code >= 128 {
        return None;
    }
    match INDEX_TABLE[code as usize] {
        UNMAPPED => None,
        index => Some(index),
    }
}

/// Symbol for an index, or `None` if the index is outside the alphabet.
pub fn symbol_at(index: u8) -> Option<char> {
    SYMBOLS.get(index as usize).copied()
}

/// Encode text into symbol indices.
///
/// Fails on the first character outside the alphabet; the error message
/// names the character and its position (counted in characters, not bytes).
pub fn encode(text: &str) -> Result<Vec<u8>> {
    let mut indices = Vec::with_capacity(text.len());
    for (pos, c) in text.chars().enumerate() {
        match symbol_index(c) {
            Some(index) => indices.push(index),
            None => {
                return Err(CypherError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::SymbolOutOfAlphabet,
                    format!("character {:?} at position {} is not in the alphabet", c, pos),
                ));
            }
        }
    }
    Ok(indices)
}

/// Decode symbol indices back into text.
///
/// Any index outside `[0, 74)` fails the whole call; nothing is substituted.
pub fn decode(indices: &[u8]) -> Result<String> {
    indices
        .iter()
        .enumerate()
        .map(|(pos, &index)| {
            symbol_at(index).ok_or_else(|| {
                CypherError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::IndexOutOfAlphabet,
                    format!(
                        "index {} at position {} is outside the alphabet (0..{})",
                        index, pos, ALPHABET_SIZE
                    ),
                )
            })
        })
        .collect()
}

/// Remove every character that [`encode`] would reject.
pub fn strip_unsupported(text: &str) -> String {
    text.chars().filter(|&c| symbol_index(c).is_some()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_alphabet_has_unique_symbols() {
        for (i, &c) in SYMBOLS.iter().enumerate() {
            assert_eq!(symbol_index(c), Some(i as u8), "symbol {:?}", c);
        }
    }

    #[test]
    fn test_known_positions() {
        assert_eq!(symbol_index('a'), Some(0));
        assert_eq!(symbol_index('z'), Some(25));
        assert_eq!(symbol_index('A'), Some(26));
        assert_eq!(symbol_index('Z'), Some(51));
        assert_eq!(symbol_index('0'), Some(52));
        assert_eq!(symbol_index('9'), Some(61));
        assert_eq!(symbol_index(' '), Some(62));
        assert_eq!(symbol_index(')'), Some(73));
    }

    #[test]
    fn test_encode_hi() {
        assert_eq!(encode("Hi!").unwrap(), vec![33, 8, 65]);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(encode("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode(&[]).unwrap(), "");
    }

    #[test]
    fn test_encode_rejects_unknown_symbol() {
        let err = encode("ok\u{e9}").expect_err("expected alphabet error");
        assert_eq!(err.kind, Some(ErrorKind::SymbolOutOfAlphabet));
        assert_eq!(err.category, ErrorCategory::User);
        assert!(err.to_string().contains("position 2"));
    }

    #[test]
    fn test_encode_rejects_newline_and_tab() {
        assert!(encode("line\nbreak").is_err());
        assert!(encode("tab\there").is_err());
    }

    #[test]
    fn test_decode_rejects_out_of_range() {
        let err = decode(&[0, 74]).expect_err("expected index error");
        assert_eq!(err.kind, Some(ErrorKind::IndexOutOfAlphabet));

        assert!(decode(&[255]).is_err());
    }

    #[test]
    fn test_strip_unsupported() {
        assert_eq!(strip_unsupported("caf\u{e9} @ 9pm\n"), "caf  9pm");
        assert_eq!(strip_unsupported("\u{1f600}"), "");
    }

    proptest! {
        #[test]
        fn test_encode_decode_roundtrip(indices in proptest::collection::vec(0u8..ALPHABET_SIZE, 0..256)) {
            let text: String = indices.iter().map(|&i| SYMBOLS[i as usize]).collect();
            let encoded = encode(&text).unwrap();
            prop_assert_eq!(&encoded, &indices);
            prop_assert_eq!(decode(&encoded).unwrap(), text);
        }

        #[test]
        fn test_stripped_text_always_encodes(text in ".*") {
            let stripped = strip_unsupported(&text);
            prop_assert!(encode(&stripped).is_ok());
        }
    }
}
