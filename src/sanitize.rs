//! Illegal path character stripping with a positional mask
//!
//! Every input character maps to exactly one output position in the mask: the
//! original character where it was stripped, a space where it was kept. The
//! cleaned text carries the replacement string in place of each stripped
//! character, so positions line up between the two only when the replacement
//! is a single character. Alignment holds within one call; a composed path is
//! built from independently sanitized pieces.

use serde::{Deserialize, Serialize};

/// Reserved punctuation rejected on at least one common filesystem
const RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Whether `c` may not appear in a path component.
///
/// Illegal: ASCII control characters (0x00-0x1F), reserved punctuation and
/// anything outside ASCII.
pub fn is_illegal(c: char) -> bool {
    (c as u32) < 0x20 || RESERVED.contains(&c) || !c.is_ascii()
}

/// Result of sanitizing one string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sanitized {
    /// Input with every illegal character replaced
    pub cleaned: String,
    /// Same length as the input (in characters); illegal characters at their
    /// original positions, spaces elsewhere
    pub mask: String,
}

impl Sanitized {
    /// Whether anything was stripped
    pub fn is_clean(&self) -> bool {
        self.mask.chars().all(|c| c == ' ')
    }
}

/// Replaces illegal path characters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sanitizer {
    replacement: String,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            replacement: " ".to_string(),
        }
    }
}

impl Sanitizer {
    /// Create a sanitizer; an empty replacement deletes illegal characters.
    pub fn new(replacement: impl Into<String>) -> Self {
        Self {
            replacement: replacement.into(),
        }
    }

    /// The configured replacement text
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Sanitize `text`, returning the cleaned string and its mask.
    pub fn sanitize(&self, text: &str) -> Sanitized {
        let mut cleaned = String::with_capacity(text.len());
        let mut mask = String::with_capacity(text.len());

        for c in text.chars() {
            if is_illegal(c) {
                cleaned.push_str(&self.replacement);
                mask.push(c);
            } else {
                cleaned.push(c);
                mask.push(' ');
            }
        }

        Sanitized { cleaned, mask }
    }
}
