use crate::assets::IllustrationAsset;
use crate::text::{TextScaleParams, TextScaler};

/// Vertical space between the title block and the body block.
pub const TITLE_BODY_GAP_MM: f64 = 2.0;
/// Horizontal space kept free between text and an illustration.
pub const ILLUSTRATION_GAP_MM: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouponTextLayoutParams<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub inner_width_mm: f64,
    pub inner_height_mm: f64,
    pub max_title_font_size_pt: f64,
    pub max_body_font_size_pt: f64,
    pub illustration: Option<&'a IllustrationAsset>,
}

/// One wrapped block. `offset_y_mm` is measured from the top of the text area.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlockLayout {
    pub lines: Vec<String>,
    pub font_size_pt: f64,
    pub offset_y_mm: f64,
    pub fits: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CouponTextLayoutResult {
    pub title: Option<TextBlockLayout>,
    pub body: TextBlockLayout,
    /// Width the blocks were wrapped against, after any illustration.
    pub text_width_mm: f64,
}

impl CouponTextLayoutResult {
    /// Total height taken by both blocks. The title gap only counts when a
    /// body follows it.
    pub fn content_height_mm(&self, scaler: &TextScaler) -> f64 {
        if self.body.lines.is_empty() && self.title.is_some() {
            return (self.body.offset_y_mm - TITLE_BODY_GAP_MM).max(0.0);
        }
        let body = self.body.lines.len() as f64 * scaler.line_height_mm(self.body.font_size_pt);
        self.body.offset_y_mm + body
    }
}

/// Sizes the title and the body of one card independently: the title gets
/// first claim on the height, the body takes what is left.
#[derive(Debug, Clone)]
pub struct CouponTextLayout {
    scaler: TextScaler,
    title_font_name: String,
    body_font_name: String,
}

impl CouponTextLayout {
    pub fn new(
        scaler: TextScaler,
        title_font_name: impl Into<String>,
        body_font_name: impl Into<String>,
    ) -> Self {
        Self {
            scaler,
            title_font_name: title_font_name.into(),
            body_font_name: body_font_name.into(),
        }
    }

    pub fn scaler(&self) -> &TextScaler {
        &self.scaler
    }

    pub fn compute(&self, params: &CouponTextLayoutParams<'_>) -> CouponTextLayoutResult {
        let width = match params.illustration {
            Some(illustration) => {
                params.inner_width_mm - (illustration.width_mm + ILLUSTRATION_GAP_MM)
            }
            None => params.inner_width_mm,
        };
        if params.title.trim().is_empty() {
            self.body_only(params, width)
        } else {
            self.title_and_body(params, width)
        }
    }

    fn body_only(&self, params: &CouponTextLayoutParams<'_>, width: f64) -> CouponTextLayoutResult {
        let body = self.scaler.compute_font_size(&TextScaleParams {
            text: params.text,
            box_width_mm: width,
            box_height_mm: params.inner_height_mm,
            font_size_pt: params.max_body_font_size_pt,
            font_name: &self.body_font_name,
        });
        CouponTextLayoutResult {
            title: None,
            body: TextBlockLayout {
                lines: body.lines,
                font_size_pt: body.font_size_pt,
                offset_y_mm: 0.0,
                fits: body.fits,
            },
            text_width_mm: width,
        }
    }

    fn title_and_body(
        &self,
        params: &CouponTextLayoutParams<'_>,
        width: f64,
    ) -> CouponTextLayoutResult {
        let title = self.scaler.compute_font_size(&TextScaleParams {
            text: params.title,
            box_width_mm: width,
            box_height_mm: params.inner_height_mm,
            font_size_pt: params.max_title_font_size_pt,
            font_name: &self.title_font_name,
        });
        let title_height = title.lines.len() as f64 * self.scaler.line_height_mm(title.font_size_pt)
            + TITLE_BODY_GAP_MM;
        let body_height = (params.inner_height_mm - title_height).max(0.0);

        let body = self.scaler.compute_font_size(&TextScaleParams {
            text: params.text,
            box_width_mm: width,
            box_height_mm: body_height,
            font_size_pt: params.max_body_font_size_pt,
            font_name: &self.body_font_name,
        });

        CouponTextLayoutResult {
            title: Some(TextBlockLayout {
                lines: title.lines,
                font_size_pt: title.font_size_pt,
                offset_y_mm: 0.0,
                fits: title.fits,
            }),
            body: TextBlockLayout {
                lines: body.lines,
                font_size_pt: body.font_size_pt,
                offset_y_mm: title_height,
                fits: body.fits,
            },
            text_width_mm: width,
        }
    }
}
