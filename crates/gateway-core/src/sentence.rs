//! NMEA 0183 sentence shape classification.
//!
//! Decoder output is a mix of sentences and free-form diagnostics. A line is
//! a sentence when it has the shape `^[!$][^*]*\*[0-9A-Fa-f]{2}$`: a start
//! marker, no embedded `*`, then `*` and two hex digits. Only the shape is
//! checked for forwarding; [`Sentence::checksum_matches`] computes the real
//! XOR checksum for diagnostics.

use regex::Regex;
use std::sync::OnceLock;

fn sentence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[!$][^*]*\*[0-9A-Fa-f]{2}$").expect("sentence pattern is valid")
    })
}

/// Result of classifying one line of decoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// A line with sentence shape, to be forwarded.
    Sentence(Sentence),
    /// Anything else: informational decoder output.
    Chatter,
}

/// Classify a single line (without its terminator).
pub fn classify_line(line: &str) -> LineKind {
    if sentence_pattern().is_match(line) {
        LineKind::Sentence(Sentence {
            raw: line.to_string(),
        })
    } else {
        LineKind::Chatter
    }
}

/// A line that passed the sentence shape check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    raw: String,
}

impl Sentence {
    /// The sentence text as emitted, without line terminator.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Consume the sentence, returning the raw text.
    pub fn into_string(self) -> String {
        self.raw
    }

    /// Talker and sentence type, e.g. `AIVDM` for `!AIVDM,...`.
    pub fn talker_and_type(&self) -> &str {
        let body = &self.raw[1..];
        let end = body.find([',', '*']).unwrap_or(body.len());
        &body[..end]
    }

    /// Checksum declared after the `*`.
    pub fn declared_checksum(&self) -> u8 {
        let (_, hex) = self.split_checksum();
        u8::from_str_radix(hex, 16).unwrap_or(0)
    }

    /// XOR of every byte between the start marker and the `*`.
    pub fn computed_checksum(&self) -> u8 {
        let (payload, _) = self.split_checksum();
        payload.bytes().fold(0u8, |acc, b| acc ^ b)
    }

    /// Whether the declared checksum equals the computed one.
    pub fn checksum_matches(&self) -> bool {
        self.declared_checksum() == self.computed_checksum()
    }

    fn split_checksum(&self) -> (&str, &str) {
        // Shape guarantees exactly one '*' followed by two hex digits.
        let star = self.raw.len() - 3;
        (&self.raw[1..star], &self.raw[star + 1..])
    }
}

impl std::fmt::Display for Sentence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
