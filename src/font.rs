use crate::canvas::Canvas;
use crate::error::CouponSheetError;
use crate::types::Pt;
use crate::winansi;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use ttf_parser::GlyphId;

/// Family used whenever a theme asks for a font nobody registered.
pub const DEFAULT_FONT_FAMILY: &str = "Helvetica";

const BUILT_IN_FAMILIES: [&str; 3] = ["Helvetica", "Times", "Courier"];

/// A font program handed over by the caller, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSource {
    pub name: String,
    pub base64: String,
}

impl FontSource {
    pub fn new(name: impl Into<String>, base64: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base64: base64.into(),
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    font_index: usize,
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, Pt>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<Pt> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: Pt) {
        if self.map.contains_key(&key) {
            return;
        }
        self.map.insert(key.clone(), value);
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            match self.order.pop_front() {
                Some(old) => {
                    self.map.remove(&old);
                }
                None => break,
            }
        }
    }
}

/// Fonts known to one renderer: the three PDF base families plus whatever
/// the caller registered.
#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<Arc<RegisteredFont>>,
    lookup: HashMap<String, usize>,
    text_width_cache: Mutex<TextWidthCache>,
}

#[derive(Debug)]
pub struct RegisteredFont {
    /// Family name the caller registered the program under.
    pub family: String,
    /// Name written as `/BaseFont`.
    pub(crate) postscript_name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
}

#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) first_char: u8,
    pub(crate) last_char: u8,
    pub(crate) widths: Vec<u16>,
    glyph_ids: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
    kerning: HashMap<(u16, u16), i16>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            text_width_cache: Mutex::new(TextWidthCache::new(20_000)),
        }
    }

    /// Decodes and parses a font program. Registering a family twice keeps the
    /// first program.
    pub fn register_source(&mut self, source: &FontSource) -> Result<(), CouponSheetError> {
        let key = normalize_name(&source.name);
        if key.is_empty() {
            return Err(CouponSheetError::Font("font source has no name".to_string()));
        }
        let data = BASE64
            .decode(source.base64.trim())
            .map_err(|err| CouponSheetError::Font(format!("{}: invalid base64: {err}", source.name)))?;
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|err| CouponSheetError::Font(format!("{}: {err}", source.name)))?;
        if face.tables().cff.is_some() {
            return Err(CouponSheetError::Font(format!(
                "{}: CFF-flavoured OpenType is not supported, use a TrueType outline font",
                source.name
            )));
        }
        if self.lookup.contains_key(&key) {
            return Ok(());
        }

        let postscript_name = postscript_name(&face).unwrap_or_else(|| source.name.clone());
        let metrics = FontMetrics::from_face(&face);
        let index = self.fonts.len();
        self.fonts.push(Arc::new(RegisteredFont {
            family: source.name.clone(),
            postscript_name: sanitize_font_name(&postscript_name),
            data,
            metrics,
        }));
        self.lookup.insert(key, index);
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.is_built_in(name) || self.resolve(name).is_some()
    }

    pub fn is_built_in(&self, name: &str) -> bool {
        built_in_family(name).is_some()
    }

    /// The family name to draw with: registered and built-in names come back
    /// in canonical spelling, everything else becomes [`DEFAULT_FONT_FAMILY`].
    pub fn resolve_family(&self, name: &str) -> String {
        if let Some(font) = self.resolve(name) {
            return font.family.clone();
        }
        built_in_family(name)
            .unwrap_or(DEFAULT_FONT_FAMILY)
            .to_string()
    }

    /// Makes every registered program available to the document on `canvas`.
    pub fn register_all(&self, canvas: &mut Canvas) {
        for font in &self.fonts {
            canvas.embed_font(Arc::clone(font));
        }
    }

    pub fn registered(&self) -> impl Iterator<Item = &Arc<RegisteredFont>> {
        self.fonts.iter()
    }

    #[cfg(test)]
    pub(crate) fn cached_width_count(&self) -> usize {
        self.text_width_cache
            .lock()
            .map(|cache| cache.map.len())
            .unwrap_or(0)
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<&Arc<RegisteredFont>> {
        let key = normalize_name(name);
        self.lookup
            .get(&key)
            .and_then(|index| self.fonts.get(*index))
    }

    /// Advance width of `text`. Names nobody registered are measured with the
    /// built-in family they are drawn in.
    pub fn measure_text_width(&self, name: &str, font_size: Pt, text: &str) -> Pt {
        if text.is_empty() {
            return Pt::ZERO;
        }
        let key = normalize_name(name);
        let registered = self
            .lookup
            .get(&key)
            .copied()
            .and_then(|index| Some((index, self.fonts.get(index)?)));
        let Some((index, font)) = registered else {
            let family = built_in_family(name).unwrap_or(DEFAULT_FONT_FAMILY);
            return base_family_text_width(family, font_size, text);
        };
        let cache_key = TextWidthKey {
            font_index: index,
            size_milli: font_size.to_milli_i64(),
            text: text.to_string(),
        };
        if let Ok(cache) = self.text_width_cache.lock() {
            if let Some(value) = cache.get(&cache_key) {
                return value;
            }
        }
        let value = if font.metrics.is_winansi(text) {
            font.metrics.measure_text_width(font_size, text)
        } else {
            measure_text_width_shaped(font, font_size, text)
                .unwrap_or_else(|| font.metrics.measure_text_width(font_size, text))
        };
        if let Ok(mut cache) = self.text_width_cache.lock() {
            cache.insert(cache_key, value);
        }
        value
    }
}

// Characters outside cp1252 are drawn as `?` and measured as one.
fn base_family_text_width(family: &str, font_size: Pt, text: &str) -> Pt {
    let units = text
        .chars()
        .map(|ch| winansi::encode_char(ch).unwrap_or(b'?'))
        .map(|byte| winansi::base_family_width(family, byte) as i32)
        .fold(0i32, |acc, width| acc.saturating_add(width));
    font_size.mul_ratio(units, 1000)
}

fn built_in_family(name: &str) -> Option<&'static str> {
    let key = normalize_name(name);
    BUILT_IN_FAMILIES
        .iter()
        .copied()
        .find(|family| family.to_ascii_lowercase() == key)
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let first_char = 32u8;
        let last_char = 255u8;
        let glyph_ids = build_glyph_ids(face, first_char, last_char);
        let widths = build_widths(face, scale, &glyph_ids);
        let missing_width = widths
            .get((b' ' - first_char) as usize)
            .copied()
            .unwrap_or(0);

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);
        let kerning = build_kerning_pairs(face, &glyph_ids, scale);

        Self {
            first_char,
            last_char,
            widths,
            glyph_ids,
            ascent,
            descent,
            cap_height,
            italic_angle,
            bbox,
            missing_width,
            is_fixed_pitch: face.is_monospaced(),
            kerning,
        }
    }

    fn slot(&self, ch: char) -> Option<usize> {
        let code = winansi::encode_char(ch)?;
        if code < self.first_char || code > self.last_char {
            return None;
        }
        Some((code - self.first_char) as usize)
    }

    fn glyph_id_for_char(&self, ch: char) -> u16 {
        self.slot(ch)
            .and_then(|idx| self.glyph_ids.get(idx).copied())
            .unwrap_or(0)
    }

    fn advance_for_char(&self, ch: char) -> u16 {
        self.slot(ch)
            .and_then(|idx| self.widths.get(idx).copied())
            .unwrap_or(self.missing_width)
    }

    fn measure_text_width(&self, font_size: Pt, text: &str) -> Pt {
        let mut total_units: i32 = 0;
        let mut prev: Option<u16> = None;
        for ch in text.chars() {
            let gid = self.glyph_id_for_char(ch);
            total_units = total_units.saturating_add(self.advance_for_char(ch) as i32);
            if let Some(k) = prev.and_then(|prev_gid| self.kerning.get(&(prev_gid, gid))) {
                total_units = total_units.saturating_add(*k as i32);
            }
            prev = Some(gid);
        }
        if total_units <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(total_units, 1000)
    }

    #[cfg(test)]
    pub(crate) fn kerning_for(&self, left: char, right: char) -> i16 {
        let pair = (self.glyph_id_for_char(left), self.glyph_id_for_char(right));
        self.kerning.get(&pair).copied().unwrap_or(0)
    }

    fn is_winansi(&self, text: &str) -> bool {
        text.chars().all(|ch| self.slot(ch).is_some())
    }
}

/// Glyph per cp1252 byte, matching the `/WinAnsiEncoding` the font is
/// declared with.
fn build_glyph_ids(face: &ttf_parser::Face<'_>, first: u8, last: u8) -> Vec<u16> {
    (first..=last)
        .map(|code| {
            winansi::decode_byte(code)
                .and_then(|ch| face.glyph_index(ch))
                .map(|g| g.0)
                .unwrap_or(0)
        })
        .collect()
}

fn build_widths(face: &ttf_parser::Face<'_>, scale: f32, glyph_ids: &[u16]) -> Vec<u16> {
    glyph_ids
        .iter()
        .map(|&gid| {
            let width = if gid == 0 {
                0
            } else {
                face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0)
            };
            let scaled = (width as f32 * scale).round() as i32;
            scaled.clamp(0, u16::MAX as i32) as u16
        })
        .collect()
}

fn build_kerning_pairs(
    face: &ttf_parser::Face<'_>,
    glyph_ids: &[u16],
    scale: f32,
) -> HashMap<(u16, u16), i16> {
    let mut out = HashMap::new();
    let Some(kern) = face.tables().kern else {
        return out;
    };
    let subtables: Vec<_> = kern
        .subtables
        .into_iter()
        .filter(|s| s.horizontal && !s.has_cross_stream && !s.has_state_machine)
        .collect();
    if subtables.is_empty() {
        return out;
    }

    for &left in glyph_ids.iter().filter(|&&g| g != 0) {
        for &right in glyph_ids.iter().filter(|&&g| g != 0) {
            let total: i32 = subtables
                .iter()
                .filter_map(|sub| sub.glyphs_kerning(GlyphId(left), GlyphId(right)))
                .map(i32::from)
                .sum();
            if total == 0 {
                continue;
            }
            let clamped = total.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            let scaled = scale_i16(clamped, scale);
            if scaled != 0 {
                out.insert((left, right), scaled);
            }
        }
    }
    out
}

fn measure_text_width_shaped(font: &RegisteredFont, font_size: Pt, text: &str) -> Option<Pt> {
    let face = HbFace::from_slice(&font.data, 0)?;
    let units_per_em = face.units_per_em().max(1) as i64;

    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(detect_direction(text));
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let positions = output.glyph_positions();
    if positions.is_empty() {
        return None;
    }
    let total_units: i32 = positions
        .iter()
        .map(|pos| (((pos.x_advance as i64) * 1000 + (units_per_em / 2)) / units_per_em) as i32)
        .fold(0i32, |acc, adv| acc.saturating_add(adv));
    if total_units <= 0 {
        return Some(Pt::ZERO);
    }
    Some(font_size.mul_ratio(total_units, 1000))
}

fn detect_direction(text: &str) -> HbDirection {
    let rtl = text.chars().any(|ch| {
        matches!(
            ch as u32,
            0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF | 0x1EE00..=0x1EEFF
        )
    });
    if rtl {
        HbDirection::RightToLeft
    } else {
        HbDirection::LeftToRight
    }
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn postscript_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;
    face.names()
        .into_iter()
        .filter(|entry| entry.name_id == name_id::POST_SCRIPT_NAME)
        .find_map(|entry| entry.to_string())
}

fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '+'))
        .collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_families_are_case_insensitive() {
        let registry = FontRegistry::new();
        assert!(registry.is_built_in("helvetica"));
        assert!(registry.is_built_in(" Times "));
        assert!(registry.has("COURIER"));
        assert!(!registry.is_built_in("DancingScript"));
        assert!(!registry.has("DancingScript"));
    }

    #[test]
    fn unknown_family_falls_back_to_helvetica() {
        let registry = FontRegistry::new();
        assert_eq!(registry.resolve_family("Nunito"), "Helvetica");
        assert_eq!(registry.resolve_family("times"), "Times");
    }

    #[test]
    fn built_in_families_measure_with_their_own_widths() {
        let registry = FontRegistry::new();
        let size = Pt::from_f32(10.0);
        let wide = registry.measure_text_width("Helvetica", size, "WWWWWWWWWW");
        let narrow = registry.measure_text_width("Helvetica", size, "iiiiiiiiii");
        assert_eq!(wide, Pt::from_f32(94.4));
        assert_eq!(narrow, Pt::from_f32(22.2));
        assert_eq!(
            registry.measure_text_width("times", size, "Wi"),
            Pt::from_f32(12.22)
        );
        assert_eq!(
            registry.measure_text_width("Courier", size, "Wi"),
            Pt::from_f32(12.0)
        );
        // Drawn in Helvetica, so measured in Helvetica.
        assert_eq!(registry.measure_text_width("Nunito", size, "Wi"), Pt::from_f32(11.66));
        // Not in cp1252: drawn and measured as `?`.
        assert_eq!(
            registry.measure_text_width("Helvetica", size, "Ω"),
            registry.measure_text_width("Helvetica", size, "?")
        );
        assert_eq!(registry.measure_text_width("Helvetica", size, ""), Pt::ZERO);
    }

    #[test]
    fn invalid_sources_are_font_errors() {
        let mut registry = FontRegistry::new();
        let not_base64 = FontSource::new("Broken", "%%%");
        assert!(matches!(
            registry.register_source(&not_base64),
            Err(CouponSheetError::Font(_))
        ));
        let not_a_font = FontSource::new("Broken", BASE64.encode(b"definitely not a font"));
        assert!(matches!(
            registry.register_source(&not_a_font),
            Err(CouponSheetError::Font(_))
        ));
        assert!(!registry.has("Broken"));
    }

    #[test]
    fn unnamed_source_is_rejected() {
        let mut registry = FontRegistry::new();
        let err = registry
            .register_source(&FontSource::new("  ", ""))
            .unwrap_err();
        assert!(err.to_string().contains("no name"));
    }

    #[test]
    fn font_names_are_sanitized_for_pdf() {
        assert_eq!(sanitize_font_name("Dancing Script/Bold"), "DancingScriptBold");
        assert_eq!(sanitize_font_name("()"), "EmbeddedFont");
    }
}
