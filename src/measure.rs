use std::sync::Arc;

use crate::font::FontRegistry;
use crate::types::{PT_TO_MM, Pt};

/// Width of a single line of text, in millimetres. An empty string is always 0.
pub trait TextMeasurer: Send + Sync {
    fn measure_text_width_mm(&self, text: &str, font_size_pt: f64, font_name: &str) -> f64;
}

/// Host-independent estimate: every character is assumed to be
/// `average_char_width_ratio` em wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatedTextMeasurer {
    average_char_width_ratio: f64,
}

impl EstimatedTextMeasurer {
    pub const DEFAULT_RATIO: f64 = 0.5;

    pub fn new(average_char_width_ratio: f64) -> Self {
        Self {
            average_char_width_ratio,
        }
    }

    pub fn ratio(&self) -> f64 {
        self.average_char_width_ratio
    }
}

impl Default for EstimatedTextMeasurer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RATIO)
    }
}

impl TextMeasurer for EstimatedTextMeasurer {
    fn measure_text_width_mm(&self, text: &str, font_size_pt: f64, _font_name: &str) -> f64 {
        text.chars().count() as f64 * font_size_pt * PT_TO_MM * self.average_char_width_ratio
    }
}

/// Measures with the advance widths of the fonts bound to the document.
#[derive(Debug, Clone)]
pub struct FontMetricsMeasurer {
    registry: Arc<FontRegistry>,
}

impl FontMetricsMeasurer {
    pub fn new(registry: Arc<FontRegistry>) -> Self {
        Self { registry }
    }
}

impl TextMeasurer for FontMetricsMeasurer {
    fn measure_text_width_mm(&self, text: &str, font_size_pt: f64, font_name: &str) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        let family = self.registry.resolve_family(font_name);
        self.registry
            .measure_text_width(&family, Pt::from_f64(font_size_pt), text)
            .to_mm()
    }
}

/// Which measurer a renderer is built with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasurerKind {
    Estimated { average_char_width_ratio: f64 },
    FontMetrics,
}

impl Default for MeasurerKind {
    fn default() -> Self {
        MeasurerKind::Estimated {
            average_char_width_ratio: EstimatedTextMeasurer::DEFAULT_RATIO,
        }
    }
}

impl MeasurerKind {
    pub(crate) fn instantiate(&self, registry: &Arc<FontRegistry>) -> Arc<dyn TextMeasurer> {
        match *self {
            MeasurerKind::Estimated {
                average_char_width_ratio,
            } => Arc::new(EstimatedTextMeasurer::new(average_char_width_ratio)),
            MeasurerKind::FontMetrics => Arc::new(FontMetricsMeasurer::new(Arc::clone(registry))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_scales_with_length_and_size() {
        let m = EstimatedTextMeasurer::new(0.5);
        let one = m.measure_text_width_mm("a", 10.0, "Helvetica");
        assert!((one - 10.0 * PT_TO_MM * 0.5).abs() < 1e-12);
        let four = m.measure_text_width_mm("abcd", 10.0, "Helvetica");
        assert!((four - 4.0 * one).abs() < 1e-12);
        assert_eq!(m.measure_text_width_mm("", 10.0, "Helvetica"), 0.0);
    }

    #[test]
    fn estimate_counts_characters_not_bytes() {
        let m = EstimatedTextMeasurer::default();
        assert_eq!(
            m.measure_text_width_mm("été", 12.0, "Times"),
            m.measure_text_width_mm("abc", 12.0, "Times")
        );
    }

    #[test]
    fn font_metrics_measurer_uses_base_family_widths() {
        let m = FontMetricsMeasurer::new(Arc::new(FontRegistry::new()));
        assert_eq!(m.measure_text_width_mm("", 10.0, "Nope"), 0.0);
        let wide = m.measure_text_width_mm("WWWWWWWWWW", 10.0, "Helvetica");
        let narrow = m.measure_text_width_mm("iiiiiiiiii", 10.0, "Helvetica");
        assert!((wide - 94.4 * PT_TO_MM).abs() < 0.001, "{wide}");
        assert!((narrow - 22.2 * PT_TO_MM).abs() < 0.001, "{narrow}");
        // Unknown families are drawn in Helvetica and measured the same way.
        assert_eq!(
            m.measure_text_width_mm("ab", 10.0, "Nope"),
            m.measure_text_width_mm("ab", 10.0, "Helvetica")
        );
        let times = m.measure_text_width_mm("ab", 10.0, "Times");
        assert!((times - 9.44 * PT_TO_MM).abs() < 0.001, "{times}");
    }

    #[test]
    fn registered_font_is_measured_from_its_own_tables() {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD as BASE64;

        // Skipped on hosts without the DejaVu family.
        let Ok(data) = std::fs::read("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf") else {
            return;
        };
        let mut registry = FontRegistry::new();
        registry
            .register_source(&crate::font::FontSource::new("DejaVu", BASE64.encode(&data)))
            .expect("register");
        let registry = Arc::new(registry);
        let face = ttf_parser::Face::parse(&data, 0).expect("face");
        let upem = face.units_per_em() as f64;
        let advance_pt = |ch: char, size: f64| {
            let gid = face.glyph_index(ch).expect("glyph");
            face.glyph_hor_advance(gid).expect("advance") as f64 / upem * size
        };

        let scaler = crate::text::TextScaler::new(
            6.0,
            1.3,
            MeasurerKind::FontMetrics.instantiate(&registry),
        );
        let m = scaler.measurer();
        let w = m.measure_text_width_mm("W", 10.0, "DejaVu");
        assert!((w - advance_pt('W', 10.0) * PT_TO_MM).abs() < 0.01, "{w}");
        assert!(w > m.measure_text_width_mm("i", 10.0, "DejaVu"));

        // cp1252 punctuation resolves to real glyphs.
        let quote = m.measure_text_width_mm("\u{2019}", 10.0, "DejaVu");
        assert!((quote - advance_pt('\u{2019}', 10.0) * PT_TO_MM).abs() < 0.01, "{quote}");

        // Pairs include any kerning the font declares.
        let font = registry.resolve("DejaVu").expect("registered");
        let kern = font.metrics.kerning_for('A', 'V');
        let pair = m.measure_text_width_mm("AV", 10.0, "DejaVu");
        let expected =
            (advance_pt('A', 10.0) + advance_pt('V', 10.0) + kern as f64 / 100.0) * PT_TO_MM;
        assert!((pair - expected).abs() < 0.01, "{pair} vs {expected}");

        // Text outside cp1252 goes through the shaper.
        let greek = "\u{03A9}\u{03BC}\u{03AD}\u{03B3}\u{03B1}";
        let shaped = m.measure_text_width_mm(greek, 10.0, "DejaVu");
        let nominal: f64 = greek.chars().map(|ch| advance_pt(ch, 10.0) * PT_TO_MM).sum();
        assert!(shaped > 0.0);
        assert!((shaped - nominal).abs() <= nominal * 0.1, "{shaped} vs {nominal}");
        let missing = font.metrics.missing_width as f64 / 100.0 * 5.0 * PT_TO_MM;
        assert!((shaped - missing).abs() > 0.01);

        // Repeated measurements come from the width cache.
        let lines = scaler.wrap_text("AV AV AV AV", 12.0, 10.0, "DejaVu");
        assert!(lines.len() > 1);
        assert_eq!(m.measure_text_width_mm("AV", 10.0, "DejaVu"), pair);
        assert!(registry.cached_width_count() > 0);
    }

    #[test]
    fn kind_builds_the_matching_measurer() {
        let registry = Arc::new(FontRegistry::new());
        let estimated = MeasurerKind::default().instantiate(&registry);
        assert!((estimated.measure_text_width_mm("ab", 10.0, "x") - 10.0 * PT_TO_MM).abs() < 1e-9);
        let metrics = MeasurerKind::FontMetrics.instantiate(&registry);
        assert!((metrics.measure_text_width_mm("ab", 10.0, "x") - 11.12 * PT_TO_MM).abs() < 0.001);
    }
}
