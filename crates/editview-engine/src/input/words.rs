//! Word boundaries for word-wise deletion.

use std::sync::LazyLock;

use regex::Regex;

static WORD_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}\p{M}\p{Pc}]$").expect("valid regex"));
static SPACE_CHAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s$").expect("valid regex"));

/// Quote-like characters that join a word only when one continues past them
const CHAMELEONS: &[char] = &['\'', '\u{2019}', '\u{2018}', '"', '\u{201c}', '\u{201d}', '`'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Word,
    Space,
    Punct,
}

pub fn classify(c: char) -> CharClass {
    let mut buf = [0u8; 4];
    let s = c.encode_utf8(&mut buf);
    if WORD_CHAR.is_match(s) {
        CharClass::Word
    } else if SPACE_CHAR.is_match(s) {
        CharClass::Space
    } else {
        CharClass::Punct
    }
}

/// Class of `chars[index]` when scanning backward (or forward) over it
fn class_at(chars: &[char], index: usize, backward: bool) -> CharClass {
    let c = chars[index];
    if !CHAMELEONS.contains(&c) {
        return classify(c);
    }
    let next = if backward {
        index.checked_sub(1)
    } else {
        Some(index + 1).filter(|next| *next < chars.len())
    };
    match next {
        Some(next) if class_at(chars, next, backward) == CharClass::Word => CharClass::Word,
        _ => CharClass::Punct,
    }
}

/// Start of the word (or punctuation run) before `offset`, skipping
/// whitespace directly before it
pub fn word_start(chars: &[char], offset: usize) -> usize {
    let mut i = offset.min(chars.len());
    while i > 0 && class_at(chars, i - 1, true) == CharClass::Space {
        i -= 1;
    }
    if i == 0 {
        return 0;
    }
    let class = class_at(chars, i - 1, true);
    while i > 0 && class_at(chars, i - 1, true) == class {
        i -= 1;
    }
    i
}

/// End of the word (or punctuation run) after `offset`, skipping
/// whitespace directly after it
pub fn word_end(chars: &[char], offset: usize) -> usize {
    let mut i = offset.min(chars.len());
    while i < chars.len() && class_at(chars, i, false) == CharClass::Space {
        i += 1;
    }
    if i == chars.len() {
        return i;
    }
    let class = class_at(chars, i, false);
    while i < chars.len() && class_at(chars, i, false) == class {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    #[rstest]
    #[case('a', CharClass::Word)]
    #[case('é', CharClass::Word)]
    #[case('7', CharClass::Word)]
    #[case('_', CharClass::Word)]
    #[case('\u{301}', CharClass::Word)]
    #[case(' ', CharClass::Space)]
    #[case('\u{a0}', CharClass::Space)]
    #[case('.', CharClass::Punct)]
    #[case('\u{fffc}', CharClass::Punct)]
    fn test_classify(#[case] c: char, #[case] expected: CharClass) {
        assert_eq!(classify(c), expected);
    }

    #[rstest]
    #[case("hello world", 11, 6)]
    #[case("hello world  ", 13, 6)]
    #[case("hello, ", 7, 5)]
    #[case("don't", 5, 0)]
    #[case("say 'hi", 7, 5)]
    #[case("end '", 5, 4)]
    #[case("", 0, 0)]
    fn test_word_start(#[case] text: &str, #[case] offset: usize, #[case] expected: usize) {
        assert_eq!(word_start(&chars(text), offset), expected);
    }

    #[rstest]
    #[case("hello world", 0, 5)]
    #[case("hello world", 5, 11)]
    #[case("it's fine", 0, 4)]
    #[case("' x", 0, 1)]
    #[case("...x", 0, 3)]
    fn test_word_end(#[case] text: &str, #[case] offset: usize, #[case] expected: usize) {
        assert_eq!(word_end(&chars(text), offset), expected);
    }
}
