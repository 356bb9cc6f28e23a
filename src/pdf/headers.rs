//! Header and footer placeholder rewriting
//!
//! Header and footer markup uses user-facing placeholders like `{pageNumber}`. Before
//! the layout renders a band, those are rewritten into alias tokens so the numbers
//! can be filled in once every page exists.

use crate::alias::{AliasKind, TokenStyle};
use crate::config::HeaderFooterConfig;

/// Where a band sits on the page
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandPlacement {
    /// Distance from the top edge
    FromTop(f64),
    /// Distance from the bottom edge
    FromBottom(f64),
}

/// Header or footer markup ready for the layout collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBand {
    pub markup: String,
    pub placement: BandPlacement,
    /// Automatic page breaks must be off while the band is rendered
    pub suspend_page_break: bool,
}

/// Rewrites header/footer placeholders into alias tokens
#[derive(Debug, Clone)]
pub struct HeaderFooterRewriter {
    config: HeaderFooterConfig,
    unicode_font: bool,
    style: TokenStyle,
}

impl HeaderFooterRewriter {
    pub fn new(config: HeaderFooterConfig, unicode_font: bool, style: TokenStyle) -> Self {
        Self { config, unicode_font, style }
    }

    pub fn rewrite_header(&self) -> RenderedBand {
        RenderedBand {
            markup: self.rewrite(&self.config.header_html),
            placement: BandPlacement::FromTop(self.config.header_position),
            suspend_page_break: false,
        }
    }

    pub fn rewrite_footer(&self) -> RenderedBand {
        RenderedBand {
            markup: self.rewrite(&self.config.footer_html),
            placement: BandPlacement::FromBottom(self.config.footer_position),
            suspend_page_break: true,
        }
    }

    /// Replace the user-facing placeholders in `markup`
    pub fn rewrite(&self, markup: &str) -> String {
        let page_number = if self.config.use_group_numbers {
            AliasKind::GroupPageNumber
        } else {
            AliasKind::AbsolutePageNumber
        };

        markup
            .replace("{pageNumber}", &page_number.markup(self.style, false))
            .replace("{pageAbsoluteNumber}", &AliasKind::AbsolutePageNumber.markup(self.style, false))
            .replace("{totalPageNumber}", &AliasKind::TotalPages.markup(self.style, self.unicode_font))
    }
}

/// Text-showing operators for one line of band text at `(x, y)` in points
///
/// Tokens pass through untouched; the patcher resolves them after generation.
pub fn text_operators(text: &str, font_size: f64, x: f64, y: f64) -> String {
    let mut content = String::new();
    content.push_str("BT\n");
    content.push_str(&format!("/F1 {} Tf\n", font_size));
    content.push_str(&format!("1 0 0 1 {} {} Tm\n", x, y));
    content.push_str(&format!("({}) Tj\n", escape_pdf_string(text)));
    content.push_str("ET\n");
    content
}

/// Escape special characters in PDF strings
pub fn escape_pdf_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
        .replace('\r', "\\r")
        .replace('\n', "\\n")
}
