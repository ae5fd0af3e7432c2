use std::collections::HashSet;

use crate::assets::{
    DOTS_PATTERN, FLOURISH_ORNAMENT, GEOMETRIC_ORNAMENT, HEARTS_PATTERN, MOON_ILLUSTRATION,
    ROSE_ILLUSTRATION, STARS_PATTERN, SUN_ILLUSTRATION, ThemeAssets,
};
use crate::error::CouponSheetError;
use crate::types::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderStyle {
    #[default]
    Solid,
    Dashed,
    Double,
}

impl BorderStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorderStyle::Solid => "solid",
            BorderStyle::Dashed => "dashed",
            BorderStyle::Double => "double",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeCategory {
    Minimal,
    Romantic,
    Friendly,
    Playful,
}

impl ThemeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeCategory::Minimal => "minimal",
            ThemeCategory::Romantic => "romantic",
            ThemeCategory::Friendly => "friendly",
            ThemeCategory::Playful => "playful",
        }
    }
}

/// Visual style of every card on a sheet. Colours are `#rrggbb` or `#rgb`.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: ThemeCategory,
    pub background_color: String,
    pub border_color: String,
    pub text_color: String,
    pub title_color: String,
    pub accent_color: String,
    pub font_family: String,
    pub title_font_family: String,
    pub border_width_mm: f64,
    pub border_radius_mm: f64,
    pub border_style: BorderStyle,
    pub padding_mm: f64,
    pub assets: Option<ThemeAssets>,
}

/// A theme's colours, parsed once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ThemePalette {
    pub background: Color,
    pub border: Color,
    pub text: Color,
    pub title: Color,
    pub accent: Color,
}

impl Theme {
    pub(crate) fn palette(&self) -> Result<ThemePalette, CouponSheetError> {
        let parse = |field: &str, value: &str| {
            Color::from_hex(value).ok_or_else(|| {
                CouponSheetError::InvalidConfiguration(format!(
                    "theme {}: {field} {value:?} is not a #rrggbb colour",
                    self.id
                ))
            })
        };
        Ok(ThemePalette {
            background: parse("background colour", &self.background_color)?,
            border: parse("border colour", &self.border_color)?,
            text: parse("text colour", &self.text_color)?,
            title: parse("title colour", &self.title_color)?,
            accent: parse("accent colour", &self.accent_color)?,
        })
    }

    pub(crate) fn validate(&self) -> Result<ThemePalette, CouponSheetError> {
        for (field, value) in [
            ("padding", self.padding_mm),
            ("border width", self.border_width_mm),
            ("border radius", self.border_radius_mm),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CouponSheetError::InvalidConfiguration(format!(
                    "theme {}: {field} must be a non-negative number of millimetres, got {value}",
                    self.id
                )));
            }
        }
        self.palette()
    }
}

#[allow(clippy::too_many_arguments)]
fn theme(
    id: &str,
    name: &str,
    description: &str,
    category: ThemeCategory,
    colors: [&str; 5],
    font_family: &str,
    border: (f64, f64, BorderStyle),
    padding_mm: f64,
    assets: Option<ThemeAssets>,
) -> Theme {
    let [background, border_color, text, title, accent] = colors;
    Theme {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category,
        background_color: background.to_string(),
        border_color: border_color.to_string(),
        text_color: text.to_string(),
        title_color: title.to_string(),
        accent_color: accent.to_string(),
        font_family: font_family.to_string(),
        title_font_family: font_family.to_string(),
        border_width_mm: border.0,
        border_radius_mm: border.1,
        border_style: border.2,
        padding_mm,
        assets,
    }
}

pub fn classic_theme() -> Theme {
    theme(
        "classic",
        "Classic",
        "Clean and elegant",
        ThemeCategory::Minimal,
        ["#ffffff", "#333333", "#333333", "#333333", "#999999"],
        "Times",
        (0.5, 2.0, BorderStyle::Solid),
        4.0,
        None,
    )
}

pub fn romantic_theme() -> Theme {
    theme(
        "romantic",
        "Romantic",
        "Warm and intimate",
        ThemeCategory::Romantic,
        ["#fff0f3", "#c4687a", "#5c2434", "#9b3a54", "#e8a0b0"],
        "DancingScript",
        (0.4, 4.0, BorderStyle::Dashed),
        5.0,
        Some(ThemeAssets {
            pattern: Some(HEARTS_PATTERN),
            corner_ornament: Some(FLOURISH_ORNAMENT),
            illustration: Some(ROSE_ILLUSTRATION),
        }),
    )
}

pub fn sunshine_theme() -> Theme {
    theme(
        "sunshine",
        "Sunshine",
        "Bright and cheerful",
        ThemeCategory::Friendly,
        ["#fffbeb", "#d97706", "#78350f", "#92400e", "#fbbf24"],
        "Nunito",
        (1.0, 6.0, BorderStyle::Solid),
        5.0,
        Some(ThemeAssets {
            pattern: Some(DOTS_PATTERN),
            corner_ornament: None,
            illustration: Some(SUN_ILLUSTRATION),
        }),
    )
}

pub fn midnight_theme() -> Theme {
    theme(
        "midnight",
        "Midnight",
        "Bold and modern",
        ThemeCategory::Playful,
        ["#1e293b", "#94a3b8", "#e2e8f0", "#38bdf8", "#38bdf8"],
        "SpaceGrotesk",
        (0.6, 1.0, BorderStyle::Double),
        4.0,
        Some(ThemeAssets {
            pattern: Some(STARS_PATTERN),
            corner_ornament: Some(GEOMETRIC_ORNAMENT),
            illustration: Some(MOON_ILLUSTRATION),
        }),
    )
}

pub fn built_in_themes() -> Vec<Theme> {
    vec![
        classic_theme(),
        romantic_theme(),
        sunshine_theme(),
        midnight_theme(),
    ]
}

/// An ordered, non-empty set of themes with unique ids. The first theme is
/// the default.
#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    themes: Vec<Theme>,
}

impl ThemeRegistry {
    pub fn new(themes: Vec<Theme>) -> Result<Self, CouponSheetError> {
        if themes.is_empty() {
            return Err(CouponSheetError::InvalidConfiguration(
                "theme registry requires at least one theme".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = themes.iter().find(|t| !seen.insert(t.id.as_str())) {
            return Err(CouponSheetError::InvalidConfiguration(format!(
                "theme registry requires unique theme ids, {:?} appears twice",
                duplicate.id
            )));
        }
        Ok(Self { themes })
    }

    pub fn built_in() -> Self {
        Self {
            themes: built_in_themes(),
        }
    }

    pub fn all(&self) -> &[Theme] {
        &self.themes
    }

    pub fn default_theme(&self) -> &Theme {
        &self.themes[0]
    }

    pub fn get(&self, id: &str) -> Option<&Theme> {
        self.themes.iter().find(|t| t.id == id)
    }

    pub fn by_category(&self, category: ThemeCategory) -> Vec<&Theme> {
        self.themes
            .iter()
            .filter(|t| t.category == category)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_registry_defaults_to_classic() {
        let registry = ThemeRegistry::built_in();
        assert_eq!(registry.all().len(), 4);
        assert_eq!(registry.default_theme().id, "classic");
        assert_eq!(registry.get("midnight").map(|t| t.name.as_str()), Some("Midnight"));
        assert!(registry.get("neon").is_none());
    }

    #[test]
    fn registry_filters_by_category() {
        let registry = ThemeRegistry::built_in();
        let romantic = registry.by_category(ThemeCategory::Romantic);
        assert_eq!(romantic.len(), 1);
        assert_eq!(romantic[0].id, "romantic");
    }

    #[test]
    fn registry_rejects_empty_and_duplicate_lists() {
        assert!(matches!(
            ThemeRegistry::new(Vec::new()),
            Err(CouponSheetError::InvalidConfiguration(_))
        ));
        let err = ThemeRegistry::new(vec![classic_theme(), classic_theme()]).unwrap_err();
        assert!(err.to_string().contains("\"classic\""));
    }

    #[test]
    fn built_in_themes_validate() {
        for theme in built_in_themes() {
            theme.validate().expect(&theme.id);
        }
        assert!(classic_theme().assets.is_none());
        assert!(romantic_theme().assets.is_some());
    }

    #[test]
    fn bad_colour_or_padding_is_reported() {
        let mut theme = classic_theme();
        theme.accent_color = "grey".to_string();
        let err = theme.validate().unwrap_err();
        assert!(err.to_string().contains("accent colour"));

        let mut theme = classic_theme();
        theme.padding_mm = -1.0;
        assert!(theme.validate().unwrap_err().to_string().contains("padding"));
    }

    #[test]
    fn border_style_names() {
        assert_eq!(BorderStyle::Double.as_str(), "double");
        assert_eq!(ThemeCategory::Friendly.as_str(), "friendly");
    }
}
