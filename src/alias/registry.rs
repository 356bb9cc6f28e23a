//! Alias token registry
//!
//! Page content is generated with placeholder tokens that stand in for page numbers
//! not yet known. The registry holds every byte sequence the layout collaborator may
//! have written, the kind of value each one stands for, and the width it reserved.

use std::sync::OnceLock;

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Guard character framing tokens in [`TokenStyle::Guarded`]
const GUARD: char = '\u{1A}';

/// What a placeholder token stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AliasKind {
    TotalInGroup,
    GroupPageNumber,
    TotalPages,
    AbsolutePageNumber,
    RightShiftAnchor,
}

impl AliasKind {
    /// Substitution order: group-scoped kinds first, then document-scoped kinds
    pub const SUBSTITUTION_ORDER: [AliasKind; 4] = [
        AliasKind::TotalInGroup,
        AliasKind::GroupPageNumber,
        AliasKind::TotalPages,
        AliasKind::AbsolutePageNumber,
    ];

    /// Three-letter code used inside the token markup
    pub fn code(&self) -> &'static str {
        match self {
            AliasKind::TotalPages => "ptp",
            AliasKind::AbsolutePageNumber => "pnp",
            AliasKind::TotalInGroup => "ptg",
            AliasKind::GroupPageNumber => "png",
            AliasKind::RightShiftAnchor => "rsc",
        }
    }

    pub fn from_code(code: &str) -> Option<AliasKind> {
        match code {
            "ptp" => Some(AliasKind::TotalPages),
            "pnp" => Some(AliasKind::AbsolutePageNumber),
            "ptg" => Some(AliasKind::TotalInGroup),
            "png" => Some(AliasKind::GroupPageNumber),
            "rsc" => Some(AliasKind::RightShiftAnchor),
            _ => None,
        }
    }

    /// Markup text for this kind, e.g. `{:ptp:}` or the wrapped `{{:ptp:}}`
    pub fn markup(&self, style: TokenStyle, wrapped: bool) -> String {
        let core = format!("{{:{}:}}", self.code());
        let core = if wrapped { format!("{{{}}}", core) } else { core };
        match style {
            TokenStyle::Textual => core,
            TokenStyle::Guarded => format!("{GUARD}{core}{GUARD}"),
        }
    }
}

/// How token markup is framed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenStyle {
    /// Plain `{:xxx:}` text
    #[default]
    Textual,
    /// Framed by U+001A so printable user text can never match
    Guarded,
}

/// Byte encoding of text inside a page buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Encoding {
    /// One byte per character (Latin-1)
    Narrow,
    /// Two bytes per character, UTF-16BE without byte order mark
    Wide,
}

impl Encoding {
    pub fn bytes_per_char(&self) -> usize {
        match self {
            Encoding::Narrow => 1,
            Encoding::Wide => 2,
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Narrow => encode_narrow(text),
            Encoding::Wide => encode_wide(text),
        }
    }
}

/// Latin-1 bytes, `?` for characters outside it
pub fn encode_narrow(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// UTF-16BE bytes without BOM
pub fn encode_wide(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
}

/// One registered placeholder byte sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasToken {
    pub kind: AliasKind,
    pub encoding: Encoding,
    pub bytes: Vec<u8>,
    /// Width in bytes the layout reserved for the resolved value
    pub reserved_width: usize,
}

impl AliasToken {
    /// Token whose reserved width is its own byte length
    pub fn new(kind: AliasKind, encoding: Encoding, bytes: Vec<u8>) -> Self {
        let reserved_width = bytes.len();
        Self { kind, encoding, bytes, reserved_width }
    }

    pub fn with_reserved_width(mut self, reserved_width: usize) -> Self {
        self.reserved_width = reserved_width;
        self
    }

    /// Reserved width in characters of the token's encoding
    pub fn reserved_chars(&self) -> usize {
        self.reserved_width / self.encoding.bytes_per_char()
    }

    fn describe(&self) -> String {
        format!("{:?}/{:?} {:?}", self.kind, self.encoding, String::from_utf8_lossy(&self.bytes))
    }
}

/// The set of alias tokens the layout collaborator may have written
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: Vec<AliasToken>,
}

impl TokenRegistry {
    /// Empty registry for fully custom token sets
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of the standard markup tokens
    ///
    /// Every kind gets its wrapped and bare forms in narrow encoding. With a unicode
    /// font the layout writes text as UTF-16BE, so the wide encodings are registered too.
    pub fn standard(unicode: bool, style: TokenStyle) -> Self {
        let mut registry = Self::new();
        let kinds = AliasKind::SUBSTITUTION_ORDER
            .iter()
            .chain(std::iter::once(&AliasKind::RightShiftAnchor));

        for kind in kinds {
            for wrapped in [true, false] {
                let markup = kind.markup(style, wrapped);
                if unicode {
                    registry.tokens.push(AliasToken::new(*kind, Encoding::Wide, encode_wide(&markup)));
                }
                registry.tokens.push(AliasToken::new(*kind, Encoding::Narrow, encode_narrow(&markup)));
            }
        }

        registry.sort();
        registry
    }

    /// Register a custom token
    pub fn register(&mut self, token: AliasToken) -> Result<()> {
        if token.bytes.is_empty() {
            return Err(Error::InvalidConfig(format!("Empty alias token for {:?}", token.kind)));
        }
        if token.reserved_width % token.encoding.bytes_per_char() != 0 {
            return Err(Error::InvalidConfig(format!(
                "Reserved width {} of {} is not a whole number of characters",
                token.reserved_width,
                token.describe()
            )));
        }
        if let Some(existing) = self.tokens.iter().find(|t| t.bytes == token.bytes) {
            return Err(Error::InvalidConfig(format!(
                "Alias token {} is already registered as {:?}",
                token.describe(),
                existing.kind
            )));
        }

        // A token contained in another token of a different kind would consume part
        // of it before the longer token gets its turn.
        for other in &self.tokens {
            let (short, long) = if other.bytes.len() <= token.bytes.len() {
                (other, &token)
            } else {
                (&token, other)
            };
            if short.kind != long.kind && contains(&long.bytes, &short.bytes) {
                return Err(Error::InvalidConfig(format!(
                    "Alias token {} overlaps {}",
                    short.describe(),
                    long.describe()
                )));
            }
        }

        self.tokens.push(token);
        self.sort();
        Ok(())
    }

    /// Tokens in substitution order
    pub fn tokens(&self) -> &[AliasToken] {
        &self.tokens
    }

    /// Tokens of one kind, in substitution order
    pub fn tokens_of(&self, kind: AliasKind) -> impl Iterator<Item = &AliasToken> {
        self.tokens.iter().filter(move |token| token.kind == kind)
    }

    /// Look up the token registered for an exact byte sequence
    pub fn lookup(&self, bytes: &[u8]) -> Result<&AliasToken> {
        self.tokens
            .iter()
            .find(|token| token.bytes == bytes)
            .ok_or_else(|| Error::UnknownAliasToken(String::from_utf8_lossy(bytes).into_owned()))
    }

    /// Token-shaped byte runs in `buffer` that match no registered token
    ///
    /// Returns (offset, bytes) for each `{:xxx:}`-shaped run, narrow or UTF-16BE.
    pub fn unrecognized_tokens(&self, buffer: &[u8]) -> Vec<(usize, Vec<u8>)> {
        token_shape()
            .find_iter(buffer)
            .filter(|found| self.lookup(found.as_bytes()).is_err())
            .filter(|found| !self.is_part_of_registered(buffer, found.start(), found.end()))
            .map(|found| (found.start(), found.as_bytes().to_vec()))
            .collect()
    }

    /// Whether `buffer[start..end]` sits inside an occurrence of a registered token
    fn is_part_of_registered(&self, buffer: &[u8], start: usize, end: usize) -> bool {
        self.tokens.iter().any(|token| {
            let len = token.bytes.len();
            let from = end.saturating_sub(len);
            let to = start.min(buffer.len().saturating_sub(len));
            (from..=to).any(|offset| buffer[offset..].starts_with(&token.bytes))
        })
    }

    /// Kind priority, then wide before narrow, then longest first
    fn sort(&mut self) {
        self.tokens.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then(b.encoding.cmp(&a.encoding))
                .then(b.bytes.len().cmp(&a.bytes.len()))
        });
    }
}

fn token_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(r"(?-u)\{:[a-z]{3}:\}|\x00\{\x00:(?:\x00[a-z]){3}\x00:\x00\}")
            .unwrap_or_else(|error| panic!("invalid token shape pattern: {error}"))
    })
}

/// Whether `needle` occurs in `haystack`
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle, 0).is_some()
}

/// Offset of the first occurrence of `needle` at or after `from`
pub(crate) fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|position| position + from)
}
