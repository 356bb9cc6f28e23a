//! Page geometry: lengths, formats, margins and the per-page box dictionary

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Simple length type in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Length(pub f64);

impl Length {
    /// Create a length from millimeters
    pub fn from_mm(mm: f64) -> Self {
        Length(mm)
    }

    /// Create a length from inches
    pub fn from_inches(inches: f64) -> Self {
        Length(inches * 25.4)
    }

    /// Get the value in millimeters
    pub fn mm(&self) -> f64 {
        self.0
    }

    /// Get the value in points (1/72 inch)
    pub fn pt(&self) -> f64 {
        self.0 * 72.0 / 25.4
    }
}

/// User unit the layout collaborator measures in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Pt,
    #[default]
    Mm,
    Cm,
    In,
}

impl Unit {
    /// Scale factor: points per user unit
    pub fn scale_factor(&self) -> f64 {
        match self {
            Unit::Pt => 1.0,
            Unit::Mm => 72.0 / 25.4,
            Unit::Cm => 72.0 / 2.54,
            Unit::In => 72.0,
        }
    }
}

/// Page orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page format (paper size, portrait)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageFormat {
    pub width: Length,
    pub height: Length,
}

impl PageFormat {
    /// US Letter size (8.5" × 11")
    pub fn letter() -> Self {
        Self {
            width: Length::from_mm(215.9),
            height: Length::from_mm(279.4),
        }
    }

    /// A4 size (210mm × 297mm)
    pub fn a4() -> Self {
        Self {
            width: Length::from_mm(210.0),
            height: Length::from_mm(297.0),
        }
    }

    /// Width and height in points for the given orientation
    pub fn size_pt(&self, orientation: Orientation) -> (f64, f64) {
        let (w, h) = (self.width.pt(), self.height.pt());
        match orientation {
            Orientation::Portrait => (w.min(h), w.max(h)),
            Orientation::Landscape => (w.max(h), w.min(h)),
        }
    }
}

impl Default for PageFormat {
    fn default() -> Self {
        Self::a4()
    }
}

/// Margins for page content
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Margins {
    pub header: Length,
    pub footer: Length,
    pub top: Length,
    pub bottom: Length,
    pub left: Length,
    pub right: Length,
}

impl Default for Margins {
    /// Report layout margins: header 5, footer 10, top 27, bottom 25, sides 15 (mm)
    fn default() -> Self {
        Self {
            header: Length::from_mm(5.0),
            footer: Length::from_mm(10.0),
            top: Length::from_mm(27.0),
            bottom: Length::from_mm(25.0),
            left: Length::from_mm(15.0),
            right: Length::from_mm(15.0),
        }
    }
}

/// Names of the page boxes a page dictionary can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BoxName {
    MediaBox,
    CropBox,
    BleedBox,
    TrimBox,
    ArtBox,
}

impl BoxName {
    pub const ALL: [BoxName; 5] = [
        BoxName::MediaBox,
        BoxName::CropBox,
        BoxName::BleedBox,
        BoxName::TrimBox,
        BoxName::ArtBox,
    ];

    /// PDF name of the box key
    pub fn as_name(&self) -> &'static str {
        match self {
            BoxName::MediaBox => "MediaBox",
            BoxName::CropBox => "CropBox",
            BoxName::BleedBox => "BleedBox",
            BoxName::TrimBox => "TrimBox",
            BoxName::ArtBox => "ArtBox",
        }
    }
}

/// Rectangle in points, lower-left and upper-right corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self { llx, lly, urx, ury }
    }
}

/// Line style used when a viewer draws a page box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxLineStyle {
    /// `/S`
    Solid,
    /// `/D`
    Dashed,
}

impl BoxLineStyle {
    pub fn as_name(&self) -> &'static str {
        match self {
            BoxLineStyle::Solid => "S",
            BoxLineStyle::Dashed => "D",
        }
    }
}

/// Display metadata for one page box (`/BoxColorInfo` entry)
///
/// Width and dashes are in user units and get scaled to points on emission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxColorInfo {
    /// RGB components 0-255
    pub color: Option<[u8; 3]>,
    pub width: Option<f64>,
    pub style: Option<BoxLineStyle>,
    pub dashes: Option<Vec<f64>>,
}

impl BoxColorInfo {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.width.is_none() && self.style.is_none() && self.dashes.is_none()
    }
}

/// Transition style names (`/S`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionStyle {
    Split,
    Blinds,
    Box,
    Wipe,
    Dissolve,
    Glitter,
    R,
    Fly,
    Push,
    Cover,
    Uncover,
    Fade,
}

impl TransitionStyle {
    pub fn as_name(&self) -> &'static str {
        match self {
            TransitionStyle::Split => "Split",
            TransitionStyle::Blinds => "Blinds",
            TransitionStyle::Box => "Box",
            TransitionStyle::Wipe => "Wipe",
            TransitionStyle::Dissolve => "Dissolve",
            TransitionStyle::Glitter => "Glitter",
            TransitionStyle::R => "R",
            TransitionStyle::Fly => "Fly",
            TransitionStyle::Push => "Push",
            TransitionStyle::Cover => "Cover",
            TransitionStyle::Uncover => "Uncover",
            TransitionStyle::Fade => "Fade",
        }
    }
}

/// Split/Blinds dimension (`/Dm`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionDimension {
    H,
    V,
}

/// Split/Box motion (`/M`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionMotion {
    I,
    O,
}

/// Page transition descriptor for presentation mode
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Page display duration in seconds (`/Dur`, written on the page itself)
    pub display_duration: Option<f64>,
    pub style: Option<TransitionStyle>,
    /// Transition duration in seconds (`/D`)
    pub duration: Option<f64>,
    pub dimension: Option<TransitionDimension>,
    pub motion: Option<TransitionMotion>,
    /// Direction in degrees (`/Di`)
    pub direction: Option<i64>,
    /// Fly scale (`/SS`)
    pub scale: Option<f64>,
    /// Fly area opaque (`/B`)
    pub opaque: Option<bool>,
}

/// Per-page geometry and presentation metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDimensions {
    pub boxes: BTreeMap<BoxName, PageBox>,
    #[serde(default)]
    pub box_colors: BTreeMap<BoxName, BoxColorInfo>,
    #[serde(default)]
    pub rotate: i64,
    /// Preferred zoom factor (`/PZ`)
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default)]
    pub transition: Option<Transition>,
}

fn default_zoom() -> f64 {
    1.0
}

impl PageDimensions {
    /// All five boxes set to the full page of the given format
    pub fn from_format(format: &PageFormat, orientation: Orientation) -> Self {
        let (width, height) = format.size_pt(orientation);
        let media = PageBox::new(0.0, 0.0, width, height);
        Self {
            boxes: BoxName::ALL.iter().map(|name| (*name, media)).collect(),
            box_colors: BTreeMap::new(),
            rotate: 0,
            zoom: default_zoom(),
            transition: None,
        }
    }

    /// Box by name, falling back to the media box
    pub fn page_box(&self, name: BoxName) -> Option<&PageBox> {
        self.boxes.get(&name).or_else(|| self.boxes.get(&BoxName::MediaBox))
    }
}
