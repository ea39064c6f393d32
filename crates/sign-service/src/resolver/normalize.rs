//! Arabic text normalization.
//!
//! Pure and idempotent. Diacritics and tatweel are removed, anything outside
//! the Arabic block that is not whitespace becomes a space, and whitespace
//! runs collapse to one ASCII space with no leading or trailing space.

use std::ops::RangeInclusive;

/// Harakat, tanwin, shadda and sukun.
const DIACRITICS: RangeInclusive<char> = '\u{064B}'..='\u{0652}';

const TATWEEL: char = '\u{0640}';

const ARABIC_BLOCK: RangeInclusive<char> = '\u{0600}'..='\u{06FF}';

/// Normalize `text` for resolution.
pub fn normalize(text: &str) -> String {
    let spaced: String = text
        .chars()
        .filter(|c| !DIACRITICS.contains(c) && *c != TATWEEL)
        .map(|c| {
            if ARABIC_BLOCK.contains(&c) || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
