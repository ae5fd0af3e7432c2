use crate::assets::{IllustrationAsset, IllustrationPosition, OrnamentAsset, ThemeAssets};
use crate::path::{DrawPathParams, DrawingContext, PathRenderer, TiledPatternParams};
use crate::types::{Color, Rect};

/// Paints a theme's decorative assets inside one card, all in the accent
/// colour: the background pattern first, then the corner ornaments, then the
/// illustration.
#[derive(Debug, Clone, Copy, Default)]
pub struct CouponAssetRenderer {
    paths: PathRenderer,
}

impl CouponAssetRenderer {
    pub fn new(paths: PathRenderer) -> Self {
        Self { paths }
    }

    pub fn render_assets<C: DrawingContext + ?Sized>(
        &self,
        ctx: &mut C,
        assets: Option<&ThemeAssets>,
        bounds: Rect,
        accent: Color,
    ) {
        let Some(assets) = assets else {
            return;
        };
        if let Some(pattern) = &assets.pattern {
            self.paths.draw_tiled_pattern(
                ctx,
                pattern,
                &TiledPatternParams {
                    x: bounds.x,
                    y: bounds.y,
                    width: bounds.width,
                    height: bounds.height,
                    color: accent,
                },
            );
        }
        if let Some(ornament) = &assets.corner_ornament {
            self.draw_corner_ornaments(ctx, ornament, bounds, accent);
        }
        if let Some(illustration) = &assets.illustration {
            let (x, y) = illustration_origin(illustration, bounds);
            self.paths.draw_path(
                ctx,
                &illustration.path,
                &DrawPathParams {
                    x,
                    y,
                    width: illustration.width_mm,
                    height: illustration.height_mm,
                    fill_color: accent,
                    stroke_color: None,
                },
            );
        }
    }

    // The same geometry is moved into every corner; it is never flipped.
    fn draw_corner_ornaments<C: DrawingContext + ?Sized>(
        &self,
        ctx: &mut C,
        ornament: &OrnamentAsset,
        bounds: Rect,
        accent: Color,
    ) {
        let w = ornament.width_mm;
        let h = ornament.height_mm;
        let corners = [
            (bounds.x, bounds.y),
            (bounds.right() - w, bounds.y),
            (bounds.x, bounds.bottom() - h),
            (bounds.right() - w, bounds.bottom() - h),
        ];
        for (index, (x, y)) in corners.into_iter().enumerate() {
            let isolated = index > 0;
            if isolated {
                ctx.save_state();
            }
            self.paths.draw_path(
                ctx,
                &ornament.path,
                &DrawPathParams {
                    x,
                    y,
                    width: w,
                    height: h,
                    fill_color: accent,
                    stroke_color: None,
                },
            );
            if isolated {
                ctx.restore_state();
            }
        }
    }
}

/// Top-left corner of the illustration's box for its anchor.
pub fn illustration_origin(illustration: &IllustrationAsset, bounds: Rect) -> (f64, f64) {
    let right = bounds.right() - illustration.width_mm;
    let bottom = bounds.bottom() - illustration.height_mm;
    match illustration.position {
        IllustrationPosition::TopRight => (right, bounds.y),
        IllustrationPosition::BottomLeft => (bounds.x, bottom),
        IllustrationPosition::BottomRight => (right, bottom),
    }
}
