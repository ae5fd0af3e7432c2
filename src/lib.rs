mod assets;
mod canvas;
mod coupon;
mod coupon_layout;
mod debug;
mod decor;
mod error;
mod font;
mod geometry;
mod grid;
mod measure;
mod metrics;
mod path;
mod pdf;
mod pdfinspect;
mod perf;
mod text;
mod theme;
mod types;
mod winansi;

pub use assets::{
    DOTS_PATTERN, FLOURISH_ORNAMENT, GEOMETRIC_ORNAMENT, HEARTS_PATTERN, IllustrationAsset,
    IllustrationPosition, LEAF_ORNAMENT, MOON_ILLUSTRATION, OrnamentAsset, PathData,
    PatternAsset, ROSE_ILLUSTRATION, STARS_PATTERN, SUN_ILLUSTRATION, ThemeAssets, WAVES_PATTERN,
};
pub use canvas::{Canvas, Command, Document, Page};
pub use coupon::{Coupon, CouponId, PageData, PageEntry, SheetPreview};
pub use coupon_layout::{
    CouponTextLayout, CouponTextLayoutParams, CouponTextLayoutResult, ILLUSTRATION_GAP_MM,
    TITLE_BODY_GAP_MM, TextBlockLayout,
};
use debug::DebugLogger;
pub use decor::{CouponAssetRenderer, illustration_origin};
pub use error::CouponSheetError;
pub use font::{DEFAULT_FONT_FAMILY, FontRegistry, FontSource, RegisteredFont};
pub use geometry::{CardDimensions, LayoutConfig, Margins, PageFormat};
pub use grid::{GridPosition, GridSpec, LayoutEngine, Placement, PlacementStatus};
pub use measure::{EstimatedTextMeasurer, FontMetricsMeasurer, MeasurerKind, TextMeasurer};
pub use metrics::{DocumentMetrics, PageMetrics};
pub use path::{
    DrawPathParams, DrawingContext, PathCommand, PathRenderer, TiledPatternParams, ViewBox,
    parse_path, parse_view_box,
};
use pdf::PdfOptions;
pub use pdfinspect::{PdfInspectError, PdfInspectErrorCode, PdfInspectReport, inspect_pdf_bytes};
use perf::PerfLogger;
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
pub use text::{FONT_SIZE_STEP_PT, TextScaleParams, TextScaleResult, TextScaler};
use theme::ThemePalette;
pub use theme::{
    BorderStyle, Theme, ThemeCategory, ThemeRegistry, built_in_themes, classic_theme,
    midnight_theme, romantic_theme, sunshine_theme,
};
pub use types::{Color, PT_TO_MM, Pt, Rect, Size};

pub const PDF_MIME_TYPE: &str = "application/pdf";

const DASH_ON_MM: f64 = 2.0;
const DASH_OFF_MM: f64 = 1.0;
const CROP_MARK_COLOR: Color = Color {
    r: 0x99 as f32 / 255.0,
    g: 0x99 as f32 / 255.0,
    b: 0x99 as f32 / 255.0,
};
const CROP_MARK_WIDTH_MM: f64 = 0.1;
const CROP_MARK_OFFSET_MM: f64 = 1.0;
const CROP_MARK_LENGTH_MM: f64 = 3.0;
// Control point distance for a quarter circle drawn as one cubic.
const KAPPA: f64 = 0.552_284_749_8;

/// Renders coupon lists into print-ready PDF sheets. Built once from a
/// [`CouponSheetBuilder`]; every render is independent.
pub struct CouponSheet {
    engine: LayoutEngine,
    theme: Theme,
    palette: ThemePalette,
    font_registry: Arc<FontRegistry>,
    text_layout: CouponTextLayout,
    title_font: String,
    body_font: String,
    max_title_font_size_pt: f64,
    max_body_font_size_pt: f64,
    asset_renderer: CouponAssetRenderer,
    pdf_options: PdfOptions,
    debug: Option<Arc<DebugLogger>>,
    perf: Option<Arc<PerfLogger>>,
}

#[derive(Clone)]
pub struct CouponSheetBuilder {
    layout: LayoutConfig,
    theme: Theme,
    font_sources: Vec<FontSource>,
    measurer: MeasurerKind,
    min_font_size_pt: f64,
    line_height_ratio: f64,
    max_title_font_size_pt: f64,
    max_body_font_size_pt: f64,
    document_title: Option<String>,
    debug_path: Option<PathBuf>,
    perf_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBlockKind {
    Title,
    Body,
}

impl TextBlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextBlockKind::Title => "title",
            TextBlockKind::Body => "body",
        }
    }
}

/// A block that was drawn at the minimum size and still did not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextOverflow {
    pub card_index: usize,
    pub block: TextBlockKind,
}

#[derive(Debug, Clone)]
pub struct RenderedSheet {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    /// Pages holding cards. Zero for an empty or impossible sheet, whose
    /// document still carries one blank page.
    pub page_count: usize,
    pub metrics: DocumentMetrics,
    pub overflows: Vec<TextOverflow>,
}

impl CouponSheet {
    pub fn builder() -> CouponSheetBuilder {
        CouponSheetBuilder::new()
    }

    pub fn layout_engine(&self) -> &LayoutEngine {
        &self.engine
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn font_registry(&self) -> &FontRegistry {
        self.font_registry.as_ref()
    }

    /// Lays out, draws and serializes `coupons`. Any failure comes back as
    /// [`CouponSheetError::Rendering`] and no partial document is returned.
    pub fn render(&self, coupons: &[Coupon]) -> Result<RenderedSheet, CouponSheetError> {
        self.finish_render(self.render_inner(coupons))
    }

    /// Renders and writes the finished document to `writer`. Returns the
    /// number of bytes written.
    pub fn render_to_writer<W: Write>(
        &self,
        coupons: &[Coupon],
        writer: &mut W,
    ) -> Result<usize, CouponSheetError> {
        let result = self.render_inner(coupons).and_then(|sheet| {
            writer.write_all(&sheet.bytes)?;
            writer.flush()?;
            Ok(sheet.bytes.len())
        });
        self.finish_render(result)
    }

    pub fn render_to_file(
        &self,
        coupons: &[Coupon],
        path: impl AsRef<Path>,
    ) -> Result<usize, CouponSheetError> {
        let mut file = std::fs::File::create(path)?;
        self.render_to_writer(coupons, &mut file)
    }

    fn finish_render<T>(
        &self,
        result: Result<T, CouponSheetError>,
    ) -> Result<T, CouponSheetError> {
        let result = result
            .map_err(|err| CouponSheetError::rendering("could not produce coupon sheet", err));
        if let Some(debug) = &self.debug {
            debug.emit_summary("render");
            debug.flush();
        }
        if let Some(perf) = &self.perf {
            perf.flush();
        }
        result
    }

    fn render_inner(&self, coupons: &[Coupon]) -> Result<RenderedSheet, CouponSheetError> {
        let render_started = perf::start();

        let layout_started = perf::start();
        let placement = self.engine.place(coupons.len());
        self.log_debug(json!({
            "type": "layout.grid",
            "status": placement.status.as_str(),
            "theme": self.theme.id,
            "category": self.theme.category.as_str(),
            "border_style": self.theme.border_style.as_str(),
            "illustration": self
                .theme
                .assets
                .as_ref()
                .and_then(|assets| assets.illustration.as_ref())
                .map(|illustration| illustration.position.as_str()),
            "columns": placement.grid.columns,
            "rows": placement.grid.rows,
            "cards_per_page": placement.grid.cards_per_page,
            "coupons": coupons.len(),
            "pages": placement.page_count,
        }));
        self.log_perf("layout", None, perf::elapsed_ms(layout_started));

        let draw_started = perf::start();
        let config = self.engine.config();
        let mut canvas = Canvas::new(Size::from_mm(
            config.page_format.width_mm,
            config.page_format.height_mm,
        ));
        self.font_registry.register_all(&mut canvas);

        let mut metrics = DocumentMetrics::default();
        let mut overflows = Vec::new();
        if placement.status == PlacementStatus::Placed {
            for page in SheetPreview::pages(coupons, &placement.positions) {
                let page_started = perf::start();
                for (slot, entry) in page.entries.iter().enumerate() {
                    let card_index = page.page_number * placement.grid.cards_per_page + slot;
                    let bounds = Rect::new(
                        entry.position.x_mm,
                        entry.position.y_mm,
                        config.card.width_mm,
                        config.card.height_mm,
                    );
                    self.draw_card(&mut canvas, entry.coupon, card_index, bounds, &mut overflows);
                    draw_crop_marks(&mut canvas, bounds);
                }
                canvas.show_page();
                let render_ms = perf::elapsed_ms(page_started);
                self.log_perf("page", Some(page.page_number + 1), render_ms);
                metrics.pages.push(PageMetrics {
                    page_number: page.page_number + 1,
                    render_ms,
                    card_count: page.entries.len(),
                    ..PageMetrics::default()
                });
            }
        }
        let document = canvas.finish();
        self.log_perf("draw", None, perf::elapsed_ms(draw_started));

        let pdf_started = perf::start();
        let bytes = pdf::document_to_pdf(
            &document,
            Some(&mut metrics),
            &self.pdf_options,
            self.debug.as_deref(),
        )?;
        self.log_perf("pdf", None, perf::elapsed_ms(pdf_started));

        metrics.overflow_count = overflows.len();
        metrics.total_render_ms = perf::elapsed_ms(render_started);
        if let Some(perf) = &self.perf {
            perf.log_counts(
                "render",
                &[
                    ("coupons", coupons.len() as u64),
                    ("pages", placement.page_count as u64),
                    ("overflows", overflows.len() as u64),
                    ("bytes", bytes.len() as u64),
                ],
            );
        }

        Ok(RenderedSheet {
            bytes,
            mime_type: PDF_MIME_TYPE,
            page_count: placement.page_count,
            metrics,
            overflows,
        })
    }

    fn draw_card(
        &self,
        canvas: &mut Canvas,
        coupon: &Coupon,
        card_index: usize,
        bounds: Rect,
        overflows: &mut Vec<TextOverflow>,
    ) {
        canvas.meta("coupon", coupon.id.as_str());
        canvas.save_state();

        self.draw_background(canvas, bounds);
        let assets = self.theme.assets.as_ref();
        self.asset_renderer
            .render_assets(canvas, assets, bounds, self.palette.accent);

        let inner = bounds.inset(self.theme.padding_mm);
        let illustration = assets.and_then(|a| a.illustration.as_ref());
        let layout = self.text_layout.compute(&CouponTextLayoutParams {
            title: &coupon.title,
            text: &coupon.body,
            inner_width_mm: inner.width,
            inner_height_mm: inner.height,
            max_title_font_size_pt: self.max_title_font_size_pt,
            max_body_font_size_pt: self.max_body_font_size_pt,
            illustration,
        });

        let text_x = match illustration {
            Some(illustration) if illustration.position == IllustrationPosition::BottomLeft => {
                inner.x + illustration.width_mm + ILLUSTRATION_GAP_MM
            }
            _ => inner.x,
        };
        let content_height = layout.content_height_mm(self.text_layout.scaler());
        let text_y = if content_height <= inner.height {
            inner.y + (inner.height - content_height) / 2.0
        } else {
            inner.y
        };

        if let Some(title) = &layout.title {
            self.draw_block(
                canvas,
                title,
                &self.title_font,
                self.palette.title,
                text_x,
                text_y,
                layout.text_width_mm,
            );
            if !title.fits {
                self.record_overflow(overflows, coupon, card_index, TextBlockKind::Title, title);
            }
        }
        self.draw_block(
            canvas,
            &layout.body,
            &self.body_font,
            self.palette.text,
            text_x,
            text_y,
            layout.text_width_mm,
        );
        if !layout.body.fits {
            self.record_overflow(
                overflows,
                coupon,
                card_index,
                TextBlockKind::Body,
                &layout.body,
            );
        }

        canvas.restore_state();
    }

    fn draw_background(&self, canvas: &mut Canvas, bounds: Rect) {
        let theme = &self.theme;
        let has_border = theme.border_width_mm > 0.0;
        canvas.set_fill_color(self.palette.background);
        canvas.set_stroke_color(self.palette.border);
        canvas.set_line_width(Pt::from_mm(theme.border_width_mm));
        if has_border && theme.border_style == BorderStyle::Dashed {
            canvas.set_dash(
                vec![Pt::from_mm(DASH_ON_MM), Pt::from_mm(DASH_OFF_MM)],
                Pt::ZERO,
            );
        }
        rounded_rect(canvas, bounds, theme.border_radius_mm);
        if has_border {
            canvas.fill_stroke();
        } else {
            canvas.fill();
        }

        if has_border && theme.border_style == BorderStyle::Double {
            let gap = theme.padding_mm / 3.0;
            let radius = (theme.border_radius_mm - gap).max(0.0);
            rounded_rect(canvas, bounds.inset(gap), radius);
            canvas.stroke();
        }
        if has_border && theme.border_style == BorderStyle::Dashed {
            canvas.set_dash(Vec::new(), Pt::ZERO);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_block(
        &self,
        canvas: &mut Canvas,
        block: &TextBlockLayout,
        font: &str,
        color: Color,
        x: f64,
        top: f64,
        width: f64,
    ) {
        if block.lines.is_empty() {
            return;
        }
        let scaler = self.text_layout.scaler();
        let line_height = scaler.line_height_mm(block.font_size_pt);
        let half_leading = (line_height - block.font_size_pt * PT_TO_MM) / 2.0;
        canvas.set_fill_color(color);
        canvas.set_font_name(font);
        canvas.set_font_size(Pt::from_f64(block.font_size_pt));
        for (index, line) in block.lines.iter().enumerate() {
            let line_width =
                scaler
                    .measurer()
                    .measure_text_width_mm(line, block.font_size_pt, font);
            let line_x = x + (width - line_width) / 2.0;
            let line_y = top + block.offset_y_mm + index as f64 * line_height + half_leading;
            canvas.draw_string(Pt::from_mm(line_x), Pt::from_mm(line_y), line.as_str());
        }
    }

    fn record_overflow(
        &self,
        overflows: &mut Vec<TextOverflow>,
        coupon: &Coupon,
        card_index: usize,
        block: TextBlockKind,
        layout: &TextBlockLayout,
    ) {
        overflows.push(TextOverflow { card_index, block });
        if let Some(debug) = &self.debug {
            debug.log_event(json!({
                "type": "text.overflow",
                "card_index": card_index,
                "coupon_id": coupon.id.as_str(),
                "block": block.as_str(),
                "font_size_pt": layout.font_size_pt,
                "lines": layout.lines.len(),
            }));
            debug.increment("text.overflow", 1);
        }
    }

    fn log_debug(&self, event: serde_json::Value) {
        if let Some(debug) = &self.debug {
            debug.log_event(event);
        }
    }

    fn log_perf(&self, name: &str, page: Option<usize>, ms: f64) {
        if let Some(perf) = &self.perf {
            perf.log_span_ms(name, page, ms);
        }
    }
}

/// Closed outline of `rect` with quarter-circle corners. The radius is capped
/// at half the shorter side.
fn rounded_rect(canvas: &mut Canvas, rect: Rect, radius_mm: f64) {
    let r = radius_mm.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
    let (left, top, right, bottom) = (rect.x, rect.y, rect.right(), rect.bottom());
    let mm = Pt::from_mm;
    if r <= 0.0 {
        canvas.move_to(mm(left), mm(top));
        canvas.line_to(mm(right), mm(top));
        canvas.line_to(mm(right), mm(bottom));
        canvas.line_to(mm(left), mm(bottom));
        canvas.close_path();
        return;
    }
    let k = r * KAPPA;
    canvas.move_to(mm(left + r), mm(top));
    canvas.line_to(mm(right - r), mm(top));
    canvas.curve_to(
        mm(right - r + k),
        mm(top),
        mm(right),
        mm(top + r - k),
        mm(right),
        mm(top + r),
    );
    canvas.line_to(mm(right), mm(bottom - r));
    canvas.curve_to(
        mm(right),
        mm(bottom - r + k),
        mm(right - r + k),
        mm(bottom),
        mm(right - r),
        mm(bottom),
    );
    canvas.line_to(mm(left + r), mm(bottom));
    canvas.curve_to(
        mm(left + r - k),
        mm(bottom),
        mm(left),
        mm(bottom - r + k),
        mm(left),
        mm(bottom - r),
    );
    canvas.line_to(mm(left), mm(top + r));
    canvas.curve_to(
        mm(left),
        mm(top + r - k),
        mm(left + r - k),
        mm(top),
        mm(left + r),
        mm(top),
    );
    canvas.close_path();
}

/// Two short strokes pointing away from each card corner, clear of the
/// card edge.
fn draw_crop_marks(canvas: &mut Canvas, bounds: Rect) {
    canvas.set_stroke_color(CROP_MARK_COLOR);
    canvas.set_line_width(Pt::from_mm(CROP_MARK_WIDTH_MM));
    let corners = [
        (bounds.x, bounds.y, -1.0, -1.0),
        (bounds.right(), bounds.y, 1.0, -1.0),
        (bounds.x, bounds.bottom(), -1.0, 1.0),
        (bounds.right(), bounds.bottom(), 1.0, 1.0),
    ];
    let near = CROP_MARK_OFFSET_MM;
    let far = CROP_MARK_OFFSET_MM + CROP_MARK_LENGTH_MM;
    for (cx, cy, dx, dy) in corners {
        canvas.move_to(Pt::from_mm(cx + dx * near), Pt::from_mm(cy));
        canvas.line_to(Pt::from_mm(cx + dx * far), Pt::from_mm(cy));
        canvas.stroke();
        canvas.move_to(Pt::from_mm(cx), Pt::from_mm(cy + dy * near));
        canvas.line_to(Pt::from_mm(cx), Pt::from_mm(cy + dy * far));
        canvas.stroke();
    }
}

impl CouponSheetBuilder {
    pub fn new() -> Self {
        Self {
            layout: LayoutConfig::default(),
            theme: classic_theme(),
            font_sources: Vec::new(),
            measurer: MeasurerKind::default(),
            min_font_size_pt: 6.0,
            line_height_ratio: 1.3,
            max_title_font_size_pt: 14.0,
            max_body_font_size_pt: 10.0,
            document_title: None,
            debug_path: None,
            perf_path: None,
        }
    }

    pub fn layout_config(mut self, config: LayoutConfig) -> Self {
        self.layout = config;
        self
    }

    pub fn page_format(mut self, format: PageFormat) -> Self {
        self.layout.page_format = format;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.layout.margins = margins;
        self
    }

    pub fn card_dimensions(mut self, card: CardDimensions) -> Self {
        self.layout.card = card;
        self
    }

    pub fn gutter_mm(mut self, gutter_mm: f64) -> Self {
        self.layout.gutter_mm = gutter_mm;
        self
    }

    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn font_source(mut self, source: FontSource) -> Self {
        self.font_sources.push(source);
        self
    }

    pub fn measurer(mut self, measurer: MeasurerKind) -> Self {
        self.measurer = measurer;
        self
    }

    pub fn min_font_size_pt(mut self, size: f64) -> Self {
        self.min_font_size_pt = size;
        self
    }

    pub fn line_height_ratio(mut self, ratio: f64) -> Self {
        self.line_height_ratio = ratio;
        self
    }

    pub fn max_title_font_size_pt(mut self, size: f64) -> Self {
        self.max_title_font_size_pt = size;
        self
    }

    pub fn max_body_font_size_pt(mut self, size: f64) -> Self {
        self.max_body_font_size_pt = size;
        self
    }

    pub fn document_title(mut self, title: Option<String>) -> Self {
        self.document_title = title;
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<CouponSheet, CouponSheetError> {
        if let Some(field) = self.layout.first_invalid_dimension() {
            return Err(CouponSheetError::InvalidConfiguration(format!(
                "{field} must be a non-negative number of millimetres"
            )));
        }
        if self.layout.card.width_mm <= 0.0 || self.layout.card.height_mm <= 0.0 {
            return Err(CouponSheetError::InvalidConfiguration(format!(
                "card must have a positive size, got {}x{}mm",
                self.layout.card.width_mm, self.layout.card.height_mm
            )));
        }
        for (field, value) in [
            ("min_font_size_pt", self.min_font_size_pt),
            ("max_title_font_size_pt", self.max_title_font_size_pt),
            ("max_body_font_size_pt", self.max_body_font_size_pt),
            ("line_height_ratio", self.line_height_ratio),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CouponSheetError::InvalidConfiguration(format!(
                    "{field} must be positive, got {value}"
                )));
            }
        }
        if self.min_font_size_pt > self.max_title_font_size_pt
            || self.min_font_size_pt > self.max_body_font_size_pt
        {
            return Err(CouponSheetError::InvalidConfiguration(format!(
                "min_font_size_pt {} exceeds a maximum font size",
                self.min_font_size_pt
            )));
        }
        if let MeasurerKind::Estimated {
            average_char_width_ratio,
        } = self.measurer
        {
            if !average_char_width_ratio.is_finite() || average_char_width_ratio <= 0.0 {
                return Err(CouponSheetError::InvalidConfiguration(format!(
                    "average_char_width_ratio must be positive, got {average_char_width_ratio}"
                )));
            }
        }
        let palette = self.theme.validate()?;

        let mut registry = FontRegistry::new();
        for source in &self.font_sources {
            registry.register_source(source)?;
        }
        let font_registry = Arc::new(registry);

        let debug = match self.debug_path {
            Some(path) => Some(Arc::new(DebugLogger::new(path)?)),
            None => None,
        };
        let perf = match self.perf_path {
            Some(path) => Some(Arc::new(PerfLogger::new(path)?)),
            None => None,
        };

        let title_font = resolve_theme_font(
            &font_registry,
            &self.theme.title_font_family,
            "title",
            debug.as_deref(),
        );
        let body_font = resolve_theme_font(
            &font_registry,
            &self.theme.font_family,
            "body",
            debug.as_deref(),
        );

        let measurer = self.measurer.instantiate(&font_registry);
        let scaler = TextScaler::new(self.min_font_size_pt, self.line_height_ratio, measurer);
        let text_layout = CouponTextLayout::new(scaler, title_font.clone(), body_font.clone());

        Ok(CouponSheet {
            engine: LayoutEngine::new(self.layout),
            theme: self.theme,
            palette,
            font_registry,
            text_layout,
            title_font,
            body_font,
            max_title_font_size_pt: self.max_title_font_size_pt,
            max_body_font_size_pt: self.max_body_font_size_pt,
            asset_renderer: CouponAssetRenderer::new(PathRenderer::new()),
            pdf_options: PdfOptions {
                document_title: self.document_title,
            },
            debug,
            perf,
        })
    }
}

impl Default for CouponSheetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_theme_font(
    registry: &FontRegistry,
    requested: &str,
    role: &str,
    debug: Option<&DebugLogger>,
) -> String {
    let resolved = registry.resolve_family(requested);
    if !registry.has(requested) {
        if let Some(debug) = debug {
            debug.log_event(json!({
                "type": "font.fallback",
                "role": role,
                "requested": requested,
                "resolved": resolved,
            }));
            debug.increment("font.fallback", 1);
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::testing::SharedBuffer;

    fn coupons(n: usize) -> Vec<Coupon> {
        (0..n)
            .map(|i| {
                Coupon::new(
                    CouponId::new(format!("c{i}")),
                    format!("Coupon {i}"),
                    "Good for one breakfast in bed",
                )
            })
            .collect()
    }

    fn sheet() -> CouponSheet {
        CouponSheet::builder().build().expect("build")
    }

    fn with_debug(sheet: &mut CouponSheet) -> SharedBuffer {
        let buffer = SharedBuffer::default();
        sheet.debug = Some(Arc::new(DebugLogger::from_writer(buffer.clone())));
        buffer
    }

    fn draw_commands(sheet: &CouponSheet, coupon: &Coupon) -> Vec<Command> {
        let mut canvas = Canvas::new(Size::from_mm(210.0, 297.0));
        let mut overflows = Vec::new();
        sheet.draw_card(
            &mut canvas,
            coupon,
            0,
            Rect::new(10.0, 10.0, 90.0, 55.0),
            &mut overflows,
        );
        canvas.finish().pages.remove(0).commands
    }

    #[test]
    fn ten_coupons_fill_two_a4_pages() {
        let rendered = sheet().render(&coupons(10)).expect("render");
        assert_eq!(rendered.mime_type, "application/pdf");
        assert_eq!(rendered.page_count, 2);
        assert!(rendered.overflows.is_empty());

        let report = inspect_pdf_bytes(&rendered.bytes).expect("inspect");
        assert_eq!(report.page_count, 2);
        assert_eq!(report.pdf_version, "1.7");
        assert!((report.page_width_mm - 210.0).abs() < 0.01);
        assert!((report.page_height_mm - 297.0).abs() < 0.01);

        let cards: Vec<usize> = rendered.metrics.pages.iter().map(|p| p.card_count).collect();
        assert_eq!(cards, vec![8, 2]);
        assert_eq!(rendered.metrics.total_bytes, rendered.bytes.len());
        assert!(rendered.metrics.pages.iter().all(|p| p.content_bytes > 0));
    }

    #[test]
    fn empty_list_gives_one_blank_page() {
        let rendered = sheet().render(&[]).expect("render");
        assert_eq!(rendered.page_count, 0);
        let report = inspect_pdf_bytes(&rendered.bytes).expect("inspect");
        assert_eq!(report.page_count, 1);
        assert_eq!(rendered.metrics.pages.len(), 1);
        assert_eq!(rendered.metrics.pages[0].card_count, 0);
        assert_eq!(rendered.metrics.pages[0].command_count, 0);
    }

    #[test]
    fn oversized_card_renders_blank_and_reports_impossible_layout() {
        let mut sheet = CouponSheet::builder()
            .card_dimensions(CardDimensions::new(300.0, 55.0))
            .build()
            .expect("oversized card is not a configuration error");
        let buffer = with_debug(&mut sheet);
        let rendered = sheet.render(&coupons(3)).expect("render");
        assert_eq!(rendered.page_count, 0);
        assert_eq!(inspect_pdf_bytes(&rendered.bytes).expect("inspect").page_count, 1);

        let lines = buffer.lines();
        assert_eq!(lines[0]["type"], "layout.grid");
        assert_eq!(lines[0]["status"], "layout_impossible");
        assert_eq!(lines[0]["cards_per_page"], 0);
        assert_eq!(lines[0]["theme"], "classic");
        assert_eq!(lines[0]["border_style"], "solid");
        assert!(lines[0]["illustration"].is_null());
        assert_eq!(lines.last().expect("summary")["type"], "debug.summary");
    }

    #[test]
    fn document_title_and_page_size_are_written() {
        let rendered = CouponSheet::builder()
            .page_format(PageFormat::LETTER)
            .document_title(Some("Birthday coupons".to_string()))
            .build()
            .expect("build")
            .render(&coupons(1))
            .expect("render");
        let report = inspect_pdf_bytes(&rendered.bytes).expect("inspect");
        assert_eq!(report.title.as_deref(), Some("Birthday coupons"));
        assert!((report.page_width_mm - 215.9).abs() < 0.01);
    }

    #[test]
    fn card_draws_background_then_text_in_theme_colours() {
        let sheet = sheet();
        let coupon = Coupon::new(CouponId::new("a"), "Movie night", "Popcorn included");
        let commands = draw_commands(&sheet, &coupon);

        assert_eq!(
            commands[0],
            Command::Meta {
                key: "coupon".to_string(),
                value: "a".to_string()
            }
        );
        assert_eq!(commands[1], Command::SaveState);
        let fill_stroke = commands
            .iter()
            .position(|c| *c == Command::FillStroke)
            .expect("background");
        let first_text = commands
            .iter()
            .position(|c| matches!(c, Command::DrawString { .. }))
            .expect("text");
        assert!(fill_stroke < first_text);
        assert_eq!(commands.last(), Some(&Command::RestoreState));

        let texts: Vec<&str> = commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawString { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Movie night", "Popcorn included"]);
        // Classic is set in Times.
        assert!(commands.contains(&Command::SetFontName("Times".to_string())));
    }

    #[test]
    fn lines_are_centred_horizontally() {
        let sheet = sheet();
        let coupon = Coupon::new(CouponId::new("a"), "", "abcd");
        let commands = draw_commands(&sheet, &coupon);
        let x = commands
            .iter()
            .find_map(|c| match c {
                Command::DrawString { x, .. } => Some(*x),
                _ => None,
            })
            .expect("line");
        // Inner box is 82mm wide starting at 14mm; "abcd" at 10pt is four
        // half-em characters.
        let width = 4.0 * 10.0 * 0.5 * PT_TO_MM;
        let expected = 14.0 + (82.0 - width) / 2.0;
        assert!((x.to_mm() - expected).abs() < 0.01, "{}", x.to_mm());
    }

    #[test]
    fn font_metrics_measurer_centres_by_real_widths() {
        let sheet = CouponSheet::builder()
            .measurer(MeasurerKind::FontMetrics)
            .build()
            .expect("build");
        let xs: Vec<f64> = ["WWWW", "iiii"]
            .into_iter()
            .map(|body| {
                let coupon = Coupon::new(CouponId::new("a"), "", body);
                draw_commands(&sheet, &coupon)
                    .iter()
                    .find_map(|c| match c {
                        Command::DrawString { x, .. } => Some(x.to_mm()),
                        _ => None,
                    })
                    .expect("line")
            })
            .collect();
        // Classic body text is Times at 10pt: W is 944 units, i is 278.
        let wide = 4.0 * 9.44 * PT_TO_MM;
        let narrow = 4.0 * 2.78 * PT_TO_MM;
        assert!((xs[0] - (14.0 + (82.0 - wide) / 2.0)).abs() < 0.01, "{}", xs[0]);
        assert!((xs[1] - (14.0 + (82.0 - narrow) / 2.0)).abs() < 0.01, "{}", xs[1]);
    }

    #[test]
    fn dashed_border_sets_and_clears_the_dash() {
        let sheet = CouponSheet::builder()
            .theme(romantic_theme())
            .build()
            .expect("build");
        let coupon = Coupon::new(CouponId::new("a"), "", "x");
        let commands = draw_commands(&sheet, &coupon);
        let dashes: Vec<&Command> = commands
            .iter()
            .filter(|c| matches!(c, Command::SetDash { .. }))
            .collect();
        assert_eq!(dashes.len(), 2);
        assert_eq!(
            *dashes[0],
            Command::SetDash {
                pattern: vec![Pt::from_mm(2.0), Pt::from_mm(1.0)],
                phase: Pt::ZERO
            }
        );
        // Romantic also carries a pattern, so an opacity state is pushed.
        assert!(commands.iter().any(|c| matches!(c, Command::SetOpacity { .. })));
    }

    #[test]
    fn double_border_strokes_an_inner_outline() {
        let sheet = CouponSheet::builder()
            .theme(midnight_theme())
            .build()
            .expect("build");
        let coupon = Coupon::new(CouponId::new("a"), "", "x");
        let commands = draw_commands(&sheet, &coupon);
        let first_stroke = commands
            .iter()
            .position(|c| *c == Command::Stroke)
            .expect("inner outline");
        let fill_stroke = commands
            .iter()
            .position(|c| *c == Command::FillStroke)
            .expect("outer outline");
        assert!(fill_stroke < first_stroke);
    }

    #[test]
    fn crop_marks_sit_outside_each_corner() {
        let mut canvas = Canvas::new(Size::from_mm(210.0, 297.0));
        draw_crop_marks(&mut canvas, Rect::new(10.0, 10.0, 90.0, 55.0));
        let commands = canvas.finish().pages.remove(0).commands;
        assert_eq!(commands.iter().filter(|c| **c == Command::Stroke).count(), 8);
        assert_eq!(
            commands[2],
            Command::MoveTo {
                x: Pt::from_mm(9.0),
                y: Pt::from_mm(10.0)
            }
        );
        assert_eq!(
            commands[3],
            Command::LineTo {
                x: Pt::from_mm(6.0),
                y: Pt::from_mm(10.0)
            }
        );
    }

    #[test]
    fn overflowing_body_is_reported() {
        let mut sheet = CouponSheet::builder()
            .card_dimensions(CardDimensions::new(30.0, 12.0))
            .build()
            .expect("build");
        let buffer = with_debug(&mut sheet);
        let long = "word ".repeat(200);
        let rendered = sheet
            .render(&[Coupon::new(CouponId::new("big"), "", long)])
            .expect("render");
        assert_eq!(
            rendered.overflows,
            vec![TextOverflow {
                card_index: 0,
                block: TextBlockKind::Body
            }]
        );
        assert_eq!(rendered.metrics.overflow_count, 1);
        let lines = buffer.lines();
        let overflow = lines
            .iter()
            .find(|l| l["type"] == "text.overflow")
            .expect("overflow event");
        assert_eq!(overflow["coupon_id"], "big");
        assert_eq!(overflow["block"], "body");
    }

    #[test]
    fn unknown_theme_font_falls_back_to_helvetica() {
        let buffer = SharedBuffer::default();
        let debug = DebugLogger::from_writer(buffer.clone());
        let registry = FontRegistry::new();
        let resolved = resolve_theme_font(&registry, "Nunito", "body", Some(&debug));
        assert_eq!(resolved, "Helvetica");
        assert_eq!(resolve_theme_font(&registry, "courier", "title", Some(&debug)), "Courier");
        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "font.fallback");
        assert_eq!(lines[0]["requested"], "Nunito");
    }

    #[test]
    fn build_rejects_bad_configuration() {
        let bad = [
            CouponSheet::builder().gutter_mm(-1.0),
            CouponSheet::builder()
                .card_dimensions(CardDimensions::new(0.0, 0.0))
                .gutter_mm(1e-300),
            CouponSheet::builder().min_font_size_pt(0.0),
            CouponSheet::builder().min_font_size_pt(12.0),
            CouponSheet::builder().line_height_ratio(f64::NAN),
            CouponSheet::builder().measurer(MeasurerKind::Estimated {
                average_char_width_ratio: 0.0,
            }),
            CouponSheet::builder().theme(Theme {
                background_color: "white".to_string(),
                ..classic_theme()
            }),
        ];
        for builder in bad {
            assert!(matches!(
                builder.build(),
                Err(CouponSheetError::InvalidConfiguration(_))
            ));
        }
        assert!(matches!(
            CouponSheet::builder()
                .font_source(FontSource::new("Broken", "%%%"))
                .build(),
            Err(CouponSheetError::Font(_))
        ));
    }

    #[test]
    fn perf_log_records_phases_and_pages() {
        let mut sheet = sheet();
        let buffer = SharedBuffer::default();
        sheet.perf = Some(Arc::new(PerfLogger::from_writer(buffer.clone())));
        sheet.render(&coupons(9)).expect("render");

        let lines = buffer.lines();
        let spans: Vec<(&str, Option<u64>)> = lines
            .iter()
            .filter(|l| l["type"] == "perf.span")
            .map(|l| (l["name"].as_str().unwrap_or(""), l["page"].as_u64()))
            .collect();
        assert_eq!(
            spans,
            vec![
                ("layout", None),
                ("page", Some(1)),
                ("page", Some(2)),
                ("draw", None),
                ("pdf", None),
            ]
        );
        let counts = lines
            .iter()
            .find(|l| l["type"] == "perf.counts")
            .expect("counts");
        assert_eq!(counts["counts"]["pages"], 2);
        assert_eq!(counts["counts"]["coupons"], 9);
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failures_surface_as_rendering_errors() {
        let mut sheet = sheet();
        let buffer = with_debug(&mut sheet);
        let err = sheet
            .render_to_writer(&coupons(3), &mut FullDisk)
            .expect_err("writer refuses bytes");
        assert!(matches!(err, CouponSheetError::Rendering { .. }));
        assert!(err.to_string().starts_with("rendering failed: could not produce coupon sheet"));
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "io error: disk full");
        // Diagnostics are still flushed for the failed render.
        assert_eq!(buffer.lines().last().expect("summary")["type"], "debug.summary");
    }

    #[test]
    fn writer_and_file_receive_the_whole_document() {
        let sheet = sheet();
        let mut out = Vec::new();
        let written = sheet.render_to_writer(&coupons(9), &mut out).expect("render");
        assert_eq!(written, out.len());
        assert_eq!(inspect_pdf_bytes(&out).expect("inspect").page_count, 2);

        let path = std::env::temp_dir().join(format!("coupon-sheet-{}.pdf", std::process::id()));
        let written = sheet.render_to_file(&coupons(1), &path).expect("render to file");
        let bytes = std::fs::read(&path).expect("read back");
        let _ = std::fs::remove_file(&path);
        assert_eq!(written, bytes.len());
        assert_eq!(inspect_pdf_bytes(&bytes).expect("inspect").page_count, 1);
    }
}
