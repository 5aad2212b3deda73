//! Escaping of literal values for the index query syntax.
//!
//! Every reserved character, the backslash included, is prefixed with a
//! backslash. Inside an encoded literal a backslash therefore always starts a
//! two-character escape, which is what the query tokenizer relies on.
//! [`decode`] leaves a backslash that is not followed by a reserved character
//! untouched so documents from other writers still read back.

/// Escape marker inserted before reserved characters.
pub const ESCAPE: char = '\\';

/// Characters with syntactic meaning in the query language.
pub const RESERVED: &str = ",.<>{}[]\"':;!@#$%^&*()-+=~|/? `\\";

/// Returns true if `c` must be escaped inside a literal.
#[inline]
pub fn is_reserved(c: char) -> bool {
    RESERVED.contains(c)
}

/// Escapes every reserved character of `value`.
pub fn encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + value.len() / 4);
    for c in value.chars() {
        if is_reserved(c) {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Removes the escape markers [`encode`] inserted.
pub fn decode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            if let Some(&next) = chars.peek() {
                if is_reserved(next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
