//! Document configuration
//!
//! Every layout constant and output switch lives in [`DocumentConfig`], loaded once
//! from JSON and passed to the components that need it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::alias::{NumberingStyle, PatchConfig, TokenStyle, MAX_SHIFT_RATIO};
use crate::date::{parse_timestamp_expression, TimestampExpression};
use crate::error::{Error, Result};
use crate::layout::{BoxName, Margins, Orientation, PageFormat, Unit};

/// Font family and size in points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    #[serde(default)]
    pub size: f64,
}

impl FontSpec {
    pub fn new(family: &str, size: f64) -> Self {
        Self { family: family.to_string(), size }
    }

    /// PDF base font name of the standard Type1 font for this family
    pub fn base_font(&self) -> &'static str {
        match self.family.to_ascii_lowercase().as_str() {
            "courier" => "Courier",
            "times" => "Times-Roman",
            "symbol" => "Symbol",
            "zapfdingbats" => "ZapfDingbats",
            _ => "Helvetica",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontConfig {
    pub main: FontSpec,
    pub data: FontSpec,
    pub monospaced: FontSpec,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            main: FontSpec::new("helvetica", 10.0),
            data: FontSpec::new("helvetica", 8.0),
            monospaced: FontSpec::new("courier", 0.0),
        }
    }
}

/// Header and footer markup with their vertical placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderFooterConfig {
    pub header_html: String,
    pub footer_html: String,
    /// Distance of the header from the top edge, in user units
    pub header_position: f64,
    /// Distance of the footer from the bottom edge, in user units
    pub footer_position: f64,
    /// Number pages within their group instead of across the document
    pub use_group_numbers: bool,
}

impl Default for HeaderFooterConfig {
    fn default() -> Self {
        Self {
            header_html: String::new(),
            footer_html: String::new(),
            header_position: 10.0,
            footer_position: 15.0,
            use_group_numbers: false,
        }
    }
}

/// Largest accepted [`DocumentConfig::starting_page_number`]
pub const MAX_STARTING_PAGE_NUMBER: usize = 1_000_000_000;

/// Configuration of a paginated document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentConfig {
    pub page_format: PageFormat,
    pub orientation: Orientation,
    pub unit: Unit,
    pub margins: Margins,
    pub fonts: FontConfig,
    pub image_scale_ratio: f64,
    pub cell_height_ratio: f64,
    /// Flate-compress page content streams
    pub compress: bool,
    /// Number shown on the first page
    pub starting_page_number: usize,
    /// Boxes written into every page dictionary
    pub page_boxes: Vec<BoxName>,
    /// Text is written with a unicode font, two bytes per character
    pub unicode: bool,
    pub numbering_style: NumberingStyle,
    pub token_style: TokenStyle,
    /// Omit transparency groups from page dictionaries
    pub pdfa_mode: bool,
    /// Omit `/LastModified` so an approval signature stays valid
    pub signature_approval: bool,
    /// Timestamp expression for `/LastModified`, see [`parse_timestamp_expression`]
    pub modification_timestamp: String,
    pub patch: PatchConfig,
    pub header_footer: HeaderFooterConfig,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            page_format: PageFormat::a4(),
            orientation: Orientation::Portrait,
            unit: Unit::Mm,
            margins: Margins::default(),
            fonts: FontConfig::default(),
            image_scale_ratio: 1.25,
            cell_height_ratio: 1.25,
            compress: true,
            starting_page_number: 1,
            page_boxes: BoxName::ALL.to_vec(),
            unicode: false,
            numbering_style: NumberingStyle::Decimal,
            token_style: TokenStyle::Textual,
            pdfa_mode: false,
            signature_approval: false,
            modification_timestamp: "now".to_string(),
            patch: PatchConfig::default(),
            header_footer: HeaderFooterConfig::default(),
        }
    }
}

impl DocumentConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DocumentConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.starting_page_number == 0 {
            return Err(Error::InvalidConfig("startingPageNumber must be at least 1".to_string()));
        }
        if self.starting_page_number > MAX_STARTING_PAGE_NUMBER {
            return Err(Error::InvalidConfig(format!(
                "startingPageNumber must be at most {}",
                MAX_STARTING_PAGE_NUMBER
            )));
        }
        if !self.page_boxes.contains(&BoxName::MediaBox) {
            return Err(Error::InvalidConfig("pageBoxes must include MediaBox".to_string()));
        }
        if !(0.0..=MAX_SHIFT_RATIO).contains(&self.patch.shift_ratio) {
            return Err(Error::InvalidConfig(format!(
                "Shift ratio {} is outside 0..={}",
                self.patch.shift_ratio, MAX_SHIFT_RATIO
            )));
        }
        self.timestamp_expression()?;
        Ok(())
    }

    pub fn timestamp_expression(&self) -> Result<TimestampExpression> {
        parse_timestamp_expression(&self.modification_timestamp)
    }
}
