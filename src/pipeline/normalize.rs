//! Text canonicalization and Cyrillic stemming for keyword matching.

/// Trailing characters the stemmer strips (vowels, soft/hard signs, й).
const STRIPPABLE_ENDINGS: &[char] = &[
    'а', 'я', 'е', 'ё', 'и', 'о', 'у', 'ы', 'ю', 'ь', 'ъ', 'й',
];

/// Stems never shrink below this many characters.
const MIN_STEM_LEN: usize = 3;

/// Canonicalize text for matching: lower-case and fold `ё` into `е`.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().replace('ё', "е")
}

/// True for lower-case Cyrillic letters of the matching alphabet (`а`–`я`, `ё`).
pub fn is_target_letter(c: char) -> bool {
    matches!(c, 'а'..='я' | 'ё')
}

/// True when the token contains at least one Cyrillic letter.
pub fn has_target_letters(token: &str) -> bool {
    token.chars().flat_map(char::to_lowercase).any(is_target_letter)
}

/// Reduce an inflected Cyrillic token to a matchable root.
///
/// Strips one trailing vowel/soft ending at a time while the token is longer than
/// [`MIN_STEM_LEN`] characters, so `москва` becomes `москв` and matches `москве`,
/// `москвы`, ... Tokens without Cyrillic letters are returned unchanged.
pub fn stem(token: &str) -> String {
    if !has_target_letters(token) {
        return token.to_string();
    }

    let mut chars: Vec<char> = token.chars().collect();
    while chars.len() > MIN_STEM_LEN {
        match chars.last() {
            Some(c) if STRIPPABLE_ENDINGS.contains(c) => {
                chars.pop();
            }
            _ => break,
        }
    }
    chars.into_iter().collect()
}
