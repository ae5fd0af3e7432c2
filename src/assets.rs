use std::borrow::Cow;

/// Path data in the compact `M/L/C/Q/A/Z` notation plus the coordinate space
/// it was authored in (`"min-x min-y width height"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathData {
    pub d: Cow<'static, str>,
    pub view_box: Cow<'static, str>,
}

impl PathData {
    pub const fn from_static(d: &'static str, view_box: &'static str) -> Self {
        Self {
            d: Cow::Borrowed(d),
            view_box: Cow::Borrowed(view_box),
        }
    }

    pub fn new(d: impl Into<String>, view_box: impl Into<String>) -> Self {
        Self {
            d: Cow::Owned(d.into()),
            view_box: Cow::Owned(view_box.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IllustrationPosition {
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
}

impl IllustrationPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            IllustrationPosition::TopRight => "top-right",
            IllustrationPosition::BottomLeft => "bottom-left",
            IllustrationPosition::BottomRight => "bottom-right",
        }
    }
}

/// A background tile repeated across the whole card at a fixed opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternAsset {
    pub path: PathData,
    pub tile_width_mm: f64,
    pub tile_height_mm: f64,
    pub opacity: f64,
}

/// Drawn once in each card corner.
#[derive(Debug, Clone, PartialEq)]
pub struct OrnamentAsset {
    pub path: PathData,
    pub width_mm: f64,
    pub height_mm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IllustrationAsset {
    pub path: PathData,
    pub width_mm: f64,
    pub height_mm: f64,
    pub position: IllustrationPosition,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThemeAssets {
    pub pattern: Option<PatternAsset>,
    pub corner_ornament: Option<OrnamentAsset>,
    pub illustration: Option<IllustrationAsset>,
}

impl ThemeAssets {
    pub fn is_empty(&self) -> bool {
        self.pattern.is_none() && self.corner_ornament.is_none() && self.illustration.is_none()
    }
}

pub const DOTS_PATTERN: PatternAsset = PatternAsset {
    path: PathData::from_static(
        "M 5 5 m -2 0 a 2 2 0 1 0 4 0 a 2 2 0 1 0 -4 0",
        "0 0 10 10",
    ),
    tile_width_mm: 4.0,
    tile_height_mm: 4.0,
    opacity: 0.05,
};

pub const HEARTS_PATTERN: PatternAsset = PatternAsset {
    path: PathData::from_static(
        "M 10 3 C 10 0 6 0 6 3 C 6 0 2 0 2 3 C 2 6 6 9 6 12 C 6 9 10 6 10 3 Z",
        "0 0 12 14",
    ),
    tile_width_mm: 5.0,
    tile_height_mm: 6.0,
    opacity: 0.08,
};

pub const WAVES_PATTERN: PatternAsset = PatternAsset {
    path: PathData::from_static(
        "M 0 5 C 5 0 10 10 15 5 C 20 0 25 10 30 5",
        "0 0 30 10",
    ),
    tile_width_mm: 8.0,
    tile_height_mm: 3.0,
    opacity: 0.06,
};

pub const STARS_PATTERN: PatternAsset = PatternAsset {
    path: PathData::from_static(
        "M 6 0 L 7.5 4 L 12 4.5 L 8.5 7.5 L 9.5 12 L 6 9.5 L 2.5 12 L 3.5 7.5 L 0 4.5 L 4.5 4 Z",
        "0 0 12 12",
    ),
    tile_width_mm: 5.0,
    tile_height_mm: 5.0,
    opacity: 0.1,
};

pub const FLOURISH_ORNAMENT: OrnamentAsset = OrnamentAsset {
    path: PathData::from_static(
        "M 0 20 C 0 10 5 5 10 2 C 12 1 14 0 16 0 C 14 2 10 5 8 8 C 12 6 16 4 20 4 C 16 6 12 9 10 12 C 14 10 18 8 20 8 C 16 10 12 14 10 16 C 8 18 4 20 0 20 Z",
        "0 0 20 20",
    ),
    width_mm: 6.0,
    height_mm: 6.0,
};

pub const LEAF_ORNAMENT: OrnamentAsset = OrnamentAsset {
    path: PathData::from_static(
        "M 0 16 C 2 12 6 8 12 4 C 14 3 16 2 18 2 C 16 4 14 6 12 8 C 10 10 6 14 4 16 C 3 17 2 18 0 18 Z M 4 12 C 6 10 8 8 12 6",
        "0 0 18 18",
    ),
    width_mm: 5.0,
    height_mm: 5.0,
};

pub const GEOMETRIC_ORNAMENT: OrnamentAsset = OrnamentAsset {
    path: PathData::from_static(
        "M 0 0 L 12 0 L 10 2 L 2 2 L 2 10 L 0 12 Z M 0 0 L 4 0 L 4 4 L 0 4 Z",
        "0 0 12 12",
    ),
    width_mm: 5.0,
    height_mm: 5.0,
};

pub const ROSE_ILLUSTRATION: IllustrationAsset = IllustrationAsset {
    path: PathData::from_static(
        "M 15 8 C 15 4 12 2 10 2 C 8 2 6 4 6 6 C 4 4 2 5 2 8 C 2 12 6 14 10 18 C 14 14 18 12 18 8 C 18 5 16 4 15 4 C 14 4 15 6 15 8 Z M 10 18 L 10 24 M 7 21 C 8 20 9 20 10 20 M 13 22 C 12 21 11 21 10 21",
        "0 0 20 26",
    ),
    width_mm: 10.0,
    height_mm: 13.0,
    position: IllustrationPosition::BottomRight,
};

pub const SUN_ILLUSTRATION: IllustrationAsset = IllustrationAsset {
    path: PathData::from_static(
        "M 15 15 m -6 0 a 6 6 0 1 0 12 0 a 6 6 0 1 0 -12 0 M 15 3 L 15 7 M 15 23 L 15 27 M 3 15 L 7 15 M 23 15 L 27 15 M 6.5 6.5 L 9.3 9.3 M 20.7 20.7 L 23.5 23.5 M 23.5 6.5 L 20.7 9.3 M 9.3 20.7 L 6.5 23.5",
        "0 0 30 30",
    ),
    width_mm: 10.0,
    height_mm: 10.0,
    position: IllustrationPosition::TopRight,
};

pub const MOON_ILLUSTRATION: IllustrationAsset = IllustrationAsset {
    path: PathData::from_static(
        "M 14 2 C 8 2 3 7 3 13 C 3 19 8 24 14 24 C 10 22 8 18 8 13 C 8 8 10 4 14 2 Z M 18 4 L 18.5 5.5 L 20 6 L 18.5 6.5 L 18 8 L 17.5 6.5 L 16 6 L 17.5 5.5 Z M 22 9 L 22.3 10 L 23 10.5 L 22.3 10.8 L 22 12 L 21.5 10.8 L 21 10.5 L 21.5 10 Z",
        "0 0 26 26",
    ),
    width_mm: 10.0,
    height_mm: 10.0,
    position: IllustrationPosition::TopRight,
};
