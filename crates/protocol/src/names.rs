//! Base-37 player name hashes
//!
//! Names travel as a `u64`: each character is a base-37 digit where 0 is a
//! space, 1-26 are `a`-`z` and 27-36 are `0`-`9`.

/// Longest name that fits the hash
pub const MAX_NAME_LENGTH: usize = 12;

/// Hash a display name
///
/// Letters are folded to lower case, anything that is not a letter or digit
/// becomes a space, and surrounding spaces are dropped.
pub fn encode_name(name: &str) -> u64 {
    let folded: String = name
        .chars()
        .take(MAX_NAME_LENGTH)
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();

    folded.trim().chars().fold(0u64, |hash, c| {
        let digit = match c {
            'a'..='z' => 1 + (c as u64 - 'a' as u64),
            '0'..='9' => 27 + (c as u64 - '0' as u64),
            _ => 0,
        };
        hash * 37 + digit
    })
}

/// Recover a display name, capitalising the first letter of each word
pub fn decode_name(hash: u64) -> String {
    if hash > i64::MAX as u64 {
        return "invalid_name".to_string();
    }

    let mut reversed = Vec::with_capacity(MAX_NAME_LENGTH);
    let mut rest = hash;
    while rest != 0 {
        let digit = (rest % 37) as u8;
        rest /= 37;
        let word_start = rest % 37 == 0;
        let c = match digit {
            0 => ' ',
            1..=26 if word_start => (b'A' + digit - 1) as char,
            1..=26 => (b'a' + digit - 1) as char,
            _ => (b'0' + digit - 27) as char,
        };
        reversed.push(c);
    }

    reversed.into_iter().rev().collect()
}
