//! Format sections
//!
//! A format string holds up to four `;`-separated sections: positive,
//! negative, zero and text.

use super::tokens::FormatToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SectionKind {
    Positive,
    Negative,
    Zero,
    Text,
}

impl SectionKind {
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(SectionKind::Positive),
            1 => Some(SectionKind::Negative),
            2 => Some(SectionKind::Zero),
            3 => Some(SectionKind::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FormatSection {
    pub kind: SectionKind,
    pub tokens: Vec<FormatToken>,
}

impl FormatSection {
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            tokens: Vec::new(),
        }
    }

    pub fn is_datetime(&self) -> bool {
        self.tokens.iter().any(|t| t.is_datetime())
    }

    pub fn is_numeric(&self) -> bool {
        self.tokens.iter().any(|t| t.is_numeric())
    }

    pub fn is_general(&self) -> bool {
        self.tokens.iter().any(|t| matches!(t, FormatToken::General))
    }

    /// Concatenated literal text, used by sections without placeholders
    /// (e.g. the `"-"` zero section of accounting formats).
    pub fn literal_text(&self) -> String {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                FormatToken::Literal(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }
}
