//! Physical sheet geometry. Every value here is in millimetres.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFormat {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageFormat {
    pub const A4: PageFormat = PageFormat {
        width_mm: 210.0,
        height_mm: 297.0,
    };

    pub const LETTER: PageFormat = PageFormat {
        width_mm: 215.9,
        height_mm: 279.4,
    };

    pub fn new(width_mm: f64, height_mm: f64) -> Self {
        Self {
            width_mm,
            height_mm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top_mm: f64,
    pub right_mm: f64,
    pub bottom_mm: f64,
    pub left_mm: f64,
}

impl Margins {
    pub fn new(top_mm: f64, right_mm: f64, bottom_mm: f64, left_mm: f64) -> Self {
        Self {
            top_mm,
            right_mm,
            bottom_mm,
            left_mm,
        }
    }

    pub fn all(value_mm: f64) -> Self {
        Self::new(value_mm, value_mm, value_mm, value_mm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardDimensions {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl CardDimensions {
    pub fn new(width_mm: f64, height_mm: f64) -> Self {
        Self {
            width_mm,
            height_mm,
        }
    }
}

/// Everything the grid engine needs to tile cards onto a sheet.
///
/// The gutter only separates adjacent cards; page edges are governed by the
/// margins alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub page_format: PageFormat,
    pub margins: Margins,
    pub card: CardDimensions,
    pub gutter_mm: f64,
}

impl LayoutConfig {
    pub fn new(
        page_format: PageFormat,
        margins: Margins,
        card: CardDimensions,
        gutter_mm: f64,
    ) -> Self {
        Self {
            page_format,
            margins,
            card,
            gutter_mm,
        }
    }

    pub fn usable_width_mm(&self) -> f64 {
        self.page_format.width_mm - self.margins.left_mm - self.margins.right_mm
    }

    pub fn usable_height_mm(&self) -> f64 {
        self.page_format.height_mm - self.margins.top_mm - self.margins.bottom_mm
    }

    /// Returns the name of the first dimension that is negative or not finite.
    pub(crate) fn first_invalid_dimension(&self) -> Option<&'static str> {
        let checks = [
            ("page width", self.page_format.width_mm),
            ("page height", self.page_format.height_mm),
            ("top margin", self.margins.top_mm),
            ("right margin", self.margins.right_mm),
            ("bottom margin", self.margins.bottom_mm),
            ("left margin", self.margins.left_mm),
            ("card width", self.card.width_mm),
            ("card height", self.card.height_mm),
            ("gutter", self.gutter_mm),
        ];
        checks
            .into_iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
            .map(|(name, _)| name)
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_format: PageFormat::A4,
            margins: Margins::all(10.0),
            card: CardDimensions::new(90.0, 55.0),
            gutter_mm: 4.0,
        }
    }
}
