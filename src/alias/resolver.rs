//! Alias resolver
//!
//! Turns the frozen counters into the numeral each alias kind stands for on a given
//! page, in both byte encodings.

use serde::{Deserialize, Serialize};

use crate::alias::counter::PageCounters;
use crate::alias::registry::{encode_narrow, encode_wide, AliasKind, AliasToken, Encoding};
use crate::error::{Error, Result};

/// How page numerals are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberingStyle {
    /// `1234`
    #[default]
    Decimal,
    /// `1.234`, thousands separated by a dot
    Grouped,
    /// `mcxxxiv`
    RomanLower,
    /// `MCCXXXIV`
    RomanUpper,
}

impl NumberingStyle {
    pub fn format(&self, value: usize) -> String {
        match self {
            NumberingStyle::Decimal => value.to_string(),
            NumberingStyle::Grouped => group_thousands(value),
            NumberingStyle::RomanLower => to_roman(value).to_lowercase(),
            NumberingStyle::RomanUpper => to_roman(value),
        }
    }
}

fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    grouped
}

/// Roman numeral; zero has no roman form and falls back to decimal
fn to_roman(mut value: usize) -> String {
    const NUMERALS: [(usize, &str); 13] = [
        (1000, "M"), (900, "CM"), (500, "D"), (400, "CD"),
        (100, "C"), (90, "XC"), (50, "L"), (40, "XL"),
        (10, "X"), (9, "IX"), (5, "V"), (4, "IV"), (1, "I"),
    ];

    if value == 0 {
        return "0".to_string();
    }
    let mut roman = String::new();
    for (weight, numeral) in NUMERALS {
        while value >= weight {
            roman.push_str(numeral);
            value -= weight;
        }
    }
    roman
}

/// A numeral ready to be patched into a page buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAlias {
    pub kind: AliasKind,
    pub value: usize,
    pub text: String,
    pub narrow: Vec<u8>,
    /// UTF-16BE with a unicode font, the narrow bytes otherwise
    pub wide: Vec<u8>,
    pub char_count: usize,
}

impl ResolvedAlias {
    fn new(kind: AliasKind, value: usize, style: NumberingStyle, unicode: bool) -> Self {
        let text = style.format(value);
        let narrow = encode_narrow(&text);
        let wide = if unicode { encode_wide(&text) } else { narrow.clone() };
        let char_count = text.chars().count();
        Self { kind, value, text, narrow, wide, char_count }
    }

    /// Bytes replacing a token written in `encoding`
    pub fn encoded(&self, encoding: Encoding) -> &[u8] {
        match encoding {
            Encoding::Narrow => &self.narrow,
            Encoding::Wide => &self.wide,
        }
    }

    /// Resolved length minus the token's reserved width, in bytes
    pub fn width_delta(&self, token: &AliasToken) -> i64 {
        self.encoded(token.encoding).len() as i64 - token.reserved_width as i64
    }

    /// Width delta in characters of the token's encoding
    pub fn unit_delta(&self, token: &AliasToken) -> i64 {
        let bytes_per_char = if token.encoding == Encoding::Wide && self.wide.len() == self.narrow.len() {
            // wide tokens in a non-unicode document carry narrow bytes
            1
        } else {
            token.encoding.bytes_per_char()
        };
        self.width_delta(token) / bytes_per_char as i64
    }
}

/// Resolved values for every alias kind on one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAliases {
    /// 1-based page index
    pub index: usize,
    pub absolute: ResolvedAlias,
    pub total: ResolvedAlias,
    pub group: Option<(ResolvedAlias, ResolvedAlias)>,
}

impl PageAliases {
    /// Value for `kind`, `None` for group kinds on ungrouped pages and for anchors
    pub fn get(&self, kind: AliasKind) -> Option<&ResolvedAlias> {
        match kind {
            AliasKind::AbsolutePageNumber => Some(&self.absolute),
            AliasKind::TotalPages => Some(&self.total),
            AliasKind::GroupPageNumber => self.group.as_ref().map(|(number, _)| number),
            AliasKind::TotalInGroup => self.group.as_ref().map(|(_, total)| total),
            AliasKind::RightShiftAnchor => None,
        }
    }
}

/// Computes alias values from frozen counters
#[derive(Debug, Clone)]
pub struct AliasResolver<'a> {
    counters: Option<&'a PageCounters>,
    starting_page_number: usize,
    style: NumberingStyle,
    unicode: bool,
}

impl<'a> AliasResolver<'a> {
    /// `counters` is `None` while generation is still running
    pub fn new(
        counters: Option<&'a PageCounters>,
        starting_page_number: usize,
        style: NumberingStyle,
        unicode: bool,
    ) -> Self {
        Self { counters, starting_page_number, style, unicode }
    }

    fn counters(&self) -> Result<&'a PageCounters> {
        self.counters.ok_or(Error::PrematureResolution)
    }

    /// Resolve one alias kind for the page at 1-based `index`
    pub fn resolve(&self, index: usize, kind: AliasKind) -> Result<Option<ResolvedAlias>> {
        let counters = self.counters()?;
        if index == 0 || index > counters.page_count() {
            return Err(Error::PageNotFound(index));
        }

        let value = match kind {
            AliasKind::AbsolutePageNumber => Some(self.offset(index)?),
            AliasKind::TotalPages => Some(self.offset(counters.page_count())?),
            AliasKind::GroupPageNumber => counters.position(index)?.map(|position| position.ordinal),
            AliasKind::TotalInGroup => counters.position(index)?.map(|position| position.total),
            AliasKind::RightShiftAnchor => None,
        };
        Ok(value.map(|value| ResolvedAlias::new(kind, value, self.style, self.unicode)))
    }

    /// Resolve every kind for the page at 1-based `index`
    pub fn resolve_page(&self, index: usize) -> Result<PageAliases> {
        let absolute = self.resolve(index, AliasKind::AbsolutePageNumber)?;
        let total = self.resolve(index, AliasKind::TotalPages)?;
        let group_number = self.resolve(index, AliasKind::GroupPageNumber)?;
        let group_total = self.resolve(index, AliasKind::TotalInGroup)?;

        match (absolute, total) {
            (Some(absolute), Some(total)) => Ok(PageAliases {
                index,
                absolute,
                total,
                group: group_number.zip(group_total),
            }),
            _ => Err(Error::InvalidState(format!("Page {} has no document counters", index))),
        }
    }

    /// Page number printed for the `n`th page
    fn offset(&self, n: usize) -> Result<usize> {
        (n - 1).checked_add(self.starting_page_number).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "Starting page number {} overflows at page {}",
                self.starting_page_number, n
            ))
        })
    }
}
