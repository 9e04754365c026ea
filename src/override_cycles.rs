// ==============================================================================
// override_cycles.rs - Override Cycles Grammar
// ==============================================================================
// Description: Token/segment model, parser and renderer for the BCL Convert
//              OverrideCycles instruction string
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Format: segments joined by ';' in read order Read1;Index1;Index2;Read2
//   token    = kind count | kind '*'
//   kind     = 'Y' (read) | 'I' (index) | 'N' (masked) | 'U' (UMI)
//   count    = positive integer
//   '*'      = consume the remaining cycles of the segment (last token only)
// Reads configured with zero cycles have no segment in the string.
// ==============================================================================

use crate::models::RunCycles;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OverrideCyclesError {
    #[error("override cycles segment is empty")]
    Empty,

    #[error("unexpected character '{ch}' in segment '{segment}'")]
    UnexpectedCharacter { ch: char, segment: String },

    #[error("token '{kind}' in segment '{segment}' has no cycle count")]
    MissingCount { kind: char, segment: String },

    #[error("token '{kind}' in segment '{segment}' has a zero cycle count")]
    ZeroCount { kind: char, segment: String },

    #[error("cycle count out of range in segment '{segment}'")]
    CountOutOfRange { segment: String },

    #[error("wildcard must be the last token of segment '{segment}'")]
    WildcardNotLast { segment: String },

    #[error("wildcard segment '{segment}' cannot be reversed")]
    WildcardNotReversible { segment: String },

    #[error("expected {expected} segments for this run, found {found}")]
    SegmentCount { expected: usize, found: usize },

    #[error("{read} segment '{segment}' uses {used} cycles but the read has {available}")]
    ExceedsCycles {
        read: ReadSegment,
        segment: String,
        used: u32,
        available: u32,
    },
}

/// The four reads of a run, in sequencing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ReadSegment {
    Read1,
    Index1,
    Index2,
    Read2,
}

impl ReadSegment {
    pub const ALL: [ReadSegment; 4] = [
        ReadSegment::Read1,
        ReadSegment::Index1,
        ReadSegment::Index2,
        ReadSegment::Read2,
    ];
}

impl fmt::Display for ReadSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadSegment::Read1 => "Read1",
            ReadSegment::Index1 => "Index1",
            ReadSegment::Index2 => "Index2",
            ReadSegment::Read2 => "Read2",
        };
        f.write_str(name)
    }
}

/// What a run of cycles is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `Y` - sequence read
    Read,
    /// `I` - index read
    Index,
    /// `N` - masked, ignored
    Mask,
    /// `U` - unique molecular identifier
    Umi,
}

impl TokenKind {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'Y' => Some(TokenKind::Read),
            'I' => Some(TokenKind::Index),
            'N' => Some(TokenKind::Mask),
            'U' => Some(TokenKind::Umi),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            TokenKind::Read => 'Y',
            TokenKind::Index => 'I',
            TokenKind::Mask => 'N',
            TokenKind::Umi => 'U',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenCount {
    Fixed(u32),
    /// `*` - whatever the segment has left
    Remaining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub count: TokenCount,
}

impl Token {
    pub fn fixed(kind: TokenKind, cycles: u32) -> Self {
        Token {
            kind,
            count: TokenCount::Fixed(cycles),
        }
    }

    pub fn remaining(kind: TokenKind) -> Self {
        Token {
            kind,
            count: TokenCount::Remaining,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.count == TokenCount::Remaining
    }

    /// Cycle count, `None` for a wildcard
    pub fn cycles(&self) -> Option<u32> {
        match self.count {
            TokenCount::Fixed(n) => Some(n),
            TokenCount::Remaining => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count {
            TokenCount::Fixed(n) => write!(f, "{}{}", self.kind.as_char(), n),
            TokenCount::Remaining => write!(f, "{}*", self.kind.as_char()),
        }
    }
}

/// One read's worth of tokens, e.g. `I8N2` or `U8Y*`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    tokens: Vec<Token>,
}

impl Segment {
    /// Build a segment from tokens, enforcing the grammar invariants
    /// (non-empty, positive counts, wildcard only in last position)
    pub fn new(tokens: Vec<Token>) -> Result<Self, OverrideCyclesError> {
        let segment = Segment { tokens };
        let rendered = segment.to_string();

        if segment.tokens.is_empty() {
            return Err(OverrideCyclesError::Empty);
        }
        let last = segment.tokens.len() - 1;
        for (i, token) in segment.tokens.iter().enumerate() {
            match token.count {
                TokenCount::Fixed(0) => {
                    return Err(OverrideCyclesError::ZeroCount {
                        kind: token.kind.as_char(),
                        segment: rendered,
                    })
                }
                TokenCount::Remaining if i != last => {
                    return Err(OverrideCyclesError::WildcardNotLast { segment: rendered })
                }
                _ => {}
            }
        }

        Ok(segment)
    }

    /// Shorthand for a single fixed token
    pub fn single(kind: TokenKind, cycles: u32) -> Result<Self, OverrideCyclesError> {
        Segment::new(vec![Token::fixed(kind, cycles)])
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn has_wildcard(&self) -> bool {
        self.tokens.iter().any(Token::is_wildcard)
    }

    /// Sum of the non-wildcard token counts
    pub fn fixed_cycles(&self) -> u32 {
        self.tokens
            .iter()
            .filter_map(Token::cycles)
            .fold(0u32, |total, n| total.saturating_add(n))
    }

    /// Resolve against a read of `available` cycles.
    ///
    /// A wildcard becomes the remaining cycle count, or is dropped when
    /// nothing remains. Fixed counts larger than the read are rejected.
    pub fn resolve(&self, read: ReadSegment, available: u32) -> Result<Segment, OverrideCyclesError> {
        let used = self.fixed_cycles();
        if used > available {
            return Err(OverrideCyclesError::ExceedsCycles {
                read,
                segment: self.to_string(),
                used,
                available,
            });
        }

        let remaining = available - used;
        let tokens = self
            .tokens
            .iter()
            .filter_map(|token| match token.count {
                TokenCount::Remaining if remaining == 0 => None,
                TokenCount::Remaining => Some(Token::fixed(token.kind, remaining)),
                TokenCount::Fixed(_) => Some(*token),
            })
            .collect();

        Segment::new(tokens)
    }

    /// Same tokens in reverse order (`I8N2` -> `N2I8`)
    pub fn reversed(&self) -> Segment {
        Segment {
            tokens: self.tokens.iter().rev().copied().collect(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

impl FromStr for Segment {
    type Err = OverrideCyclesError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let mut tokens = Vec::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            let kind = TokenKind::from_char(c).ok_or_else(|| OverrideCyclesError::UnexpectedCharacter {
                ch: c,
                segment: text.to_string(),
            })?;

            if chars.next_if_eq(&'*').is_some() {
                tokens.push(Token::remaining(kind));
                continue;
            }

            let mut digits = String::new();
            while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
                digits.push(d);
            }
            if digits.is_empty() {
                return Err(OverrideCyclesError::MissingCount {
                    kind: kind.as_char(),
                    segment: text.to_string(),
                });
            }
            let cycles: u32 = digits
                .parse()
                .map_err(|_| OverrideCyclesError::CountOutOfRange {
                    segment: text.to_string(),
                })?;
            tokens.push(Token::fixed(kind, cycles));
        }

        Segment::new(tokens)
    }
}

impl Serialize for Segment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

/// Parsed override cycles, one optional segment per read.
///
/// Stored in forward orientation. A read with zero configured cycles has no
/// segment, which keeps each slot addressable by `ReadSegment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverrideCycles {
    read1: Option<Segment>,
    index1: Option<Segment>,
    index2: Option<Segment>,
    read2: Option<Segment>,
}

impl OverrideCycles {
    pub fn new(
        read1: Option<Segment>,
        index1: Option<Segment>,
        index2: Option<Segment>,
        read2: Option<Segment>,
    ) -> Self {
        OverrideCycles {
            read1,
            index1,
            index2,
            read2,
        }
    }

    /// Parse a string against the run's read structure.
    ///
    /// One segment is expected per read with non-zero cycles. Wildcards are
    /// resolved to the remaining cycles of their read.
    pub fn parse(text: &str, run_cycles: &RunCycles) -> Result<Self, OverrideCyclesError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OverrideCyclesError::Empty);
        }

        let active: Vec<ReadSegment> = ReadSegment::ALL
            .into_iter()
            .filter(|read| run_cycles.cycles(*read) > 0)
            .collect();
        let parts: Vec<&str> = text.split(';').collect();
        if parts.len() != active.len() {
            return Err(OverrideCyclesError::SegmentCount {
                expected: active.len(),
                found: parts.len(),
            });
        }

        let mut parsed = OverrideCycles::new(None, None, None, None);
        for (read, part) in active.into_iter().zip(parts) {
            let segment = part.parse::<Segment>()?.resolve(read, run_cycles.cycles(read))?;
            *parsed.slot_mut(read) = Some(segment);
        }

        Ok(parsed)
    }

    pub fn segment(&self, read: ReadSegment) -> Option<&Segment> {
        match read {
            ReadSegment::Read1 => self.read1.as_ref(),
            ReadSegment::Index1 => self.index1.as_ref(),
            ReadSegment::Index2 => self.index2.as_ref(),
            ReadSegment::Read2 => self.read2.as_ref(),
        }
    }

    /// Present segments in read order
    pub fn segments(&self) -> impl Iterator<Item = (ReadSegment, &Segment)> + '_ {
        ReadSegment::ALL
            .into_iter()
            .filter_map(move |read| self.segment(read).map(|segment| (read, segment)))
    }

    /// Copy with the segment for `read` replaced
    pub fn with_segment(&self, read: ReadSegment, segment: Option<Segment>) -> Self {
        let mut updated = self.clone();
        *updated.slot_mut(read) = segment;
        updated
    }

    fn slot_mut(&mut self, read: ReadSegment) -> &mut Option<Segment> {
        match read {
            ReadSegment::Read1 => &mut self.read1,
            ReadSegment::Index1 => &mut self.index1,
            ReadSegment::Index2 => &mut self.index2,
            ReadSegment::Read2 => &mut self.read2,
        }
    }
}

impl fmt::Display for OverrideCycles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (_, segment)) in self.segments().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl Serialize for OverrideCycles {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
