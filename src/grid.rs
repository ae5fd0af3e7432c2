use crate::geometry::LayoutConfig;

/// How many cards fit on one sheet. Zero columns or rows is a valid answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub columns: usize,
    pub rows: usize,
    pub cards_per_page: usize,
}

/// Where one card lands: zero-based indices plus the absolute top-left corner
/// on its page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPosition {
    pub page: usize,
    pub row: usize,
    pub col: usize,
    pub x_mm: f64,
    pub y_mm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStatus {
    NothingRequested,
    LayoutImpossible,
    Placed,
}

impl PlacementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementStatus::NothingRequested => "nothing_requested",
            PlacementStatus::LayoutImpossible => "layout_impossible",
            PlacementStatus::Placed => "placed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub status: PlacementStatus,
    pub grid: GridSpec,
    pub positions: Vec<GridPosition>,
    pub page_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn compute_grid(&self) -> GridSpec {
        let gutter = self.config.gutter_mm;
        let columns = fit_count(
            self.config.usable_width_mm(),
            self.config.card.width_mm,
            gutter,
        );
        let rows = fit_count(
            self.config.usable_height_mm(),
            self.config.card.height_mm,
            gutter,
        );
        GridSpec {
            columns,
            rows,
            cards_per_page: columns.saturating_mul(rows),
        }
    }

    /// Row-major, page-major positions for `count` cards. Empty when nothing
    /// fits on a page.
    pub fn compute_positions(&self, count: usize) -> Vec<GridPosition> {
        let grid = self.compute_grid();
        if grid.cards_per_page == 0 {
            return Vec::new();
        }
        let step_x = self.config.card.width_mm + self.config.gutter_mm;
        let step_y = self.config.card.height_mm + self.config.gutter_mm;
        (0..count)
            .map(|index| {
                let page = index / grid.cards_per_page;
                let index_on_page = index % grid.cards_per_page;
                let row = index_on_page / grid.columns;
                let col = index_on_page % grid.columns;
                GridPosition {
                    page,
                    row,
                    col,
                    x_mm: self.config.margins.left_mm + col as f64 * step_x,
                    y_mm: self.config.margins.top_mm + row as f64 * step_y,
                }
            })
            .collect()
    }

    pub fn compute_page_count(&self, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        let grid = self.compute_grid();
        if grid.cards_per_page == 0 {
            return 0;
        }
        count.div_ceil(grid.cards_per_page)
    }

    /// Same as [`LayoutEngine::compute_positions`], but tells an empty request
    /// apart from a card that cannot fit on the sheet at all.
    pub fn place(&self, count: usize) -> Placement {
        let grid = self.compute_grid();
        let status = if count == 0 {
            PlacementStatus::NothingRequested
        } else if grid.cards_per_page == 0 {
            PlacementStatus::LayoutImpossible
        } else {
            PlacementStatus::Placed
        };
        Placement {
            status,
            grid,
            positions: self.compute_positions(count),
            page_count: self.compute_page_count(count),
        }
    }
}

fn fit_count(usable: f64, card: f64, gutter: f64) -> usize {
    let step = card + gutter;
    if !(step > 0.0) {
        return 0;
    }
    let count = ((usable + gutter) / step).floor();
    if count.is_finite() && count > 0.0 {
        count as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CardDimensions, Margins, PageFormat};
    use std::collections::HashSet;

    fn a4_engine(card_w: f64, card_h: f64, gutter: f64) -> LayoutEngine {
        LayoutEngine::new(LayoutConfig::new(
            PageFormat::A4,
            Margins::all(10.0),
            CardDimensions::new(card_w, card_h),
            gutter,
        ))
    }

    #[test]
    fn a4_business_cards_with_gutter() {
        let engine = a4_engine(90.0, 55.0, 4.0);
        assert_eq!(
            engine.compute_grid(),
            GridSpec {
                columns: 2,
                rows: 4,
                cards_per_page: 8
            }
        );
        let positions = engine.compute_positions(9);
        let ninth = positions[8];
        assert_eq!((ninth.page, ninth.row, ninth.col), (1, 0, 0));
        assert_eq!((ninth.x_mm, ninth.y_mm), (10.0, 10.0));
        assert_eq!(positions[1].x_mm, 104.0);
        assert_eq!(positions[2].y_mm, 69.0);
    }

    #[test]
    fn a4_business_cards_without_gutter() {
        let engine = a4_engine(90.0, 55.0, 0.0);
        assert_eq!(
            engine.compute_grid(),
            GridSpec {
                columns: 2,
                rows: 5,
                cards_per_page: 10
            }
        );
    }

    #[test]
    fn oversized_card_places_nothing() {
        let engine = a4_engine(200.0, 55.0, 4.0);
        let grid = engine.compute_grid();
        assert_eq!(grid.columns, 0);
        assert_eq!(grid.cards_per_page, 0);
        for count in [0, 1, 7, 100] {
            assert!(engine.compute_positions(count).is_empty());
            assert_eq!(engine.compute_page_count(count), 0);
        }
    }

    #[test]
    fn positions_are_unique_and_ordered() {
        let engine = a4_engine(90.0, 55.0, 4.0);
        for count in 0..40 {
            let positions = engine.compute_positions(count);
            assert_eq!(positions.len(), count);
            let triples: HashSet<_> = positions.iter().map(|p| (p.page, p.row, p.col)).collect();
            assert_eq!(triples.len(), count);
            for pair in positions.windows(2) {
                let a = (pair[0].page, pair[0].row, pair[0].col);
                let b = (pair[1].page, pair[1].row, pair[1].col);
                assert!(a < b, "{a:?} should precede {b:?}");
            }
        }
    }

    #[test]
    fn page_count_is_ceiling_division() {
        let engine = a4_engine(90.0, 55.0, 4.0);
        assert_eq!(engine.compute_page_count(0), 0);
        assert_eq!(engine.compute_page_count(1), 1);
        assert_eq!(engine.compute_page_count(8), 1);
        assert_eq!(engine.compute_page_count(9), 2);
        assert_eq!(engine.compute_page_count(16), 2);
        assert_eq!(engine.compute_page_count(17), 3);
    }

    #[test]
    fn grid_is_idempotent() {
        let engine = a4_engine(63.0, 88.0, 2.5);
        assert_eq!(engine.compute_grid(), engine.compute_grid());
    }

    #[test]
    fn placement_distinguishes_empty_from_impossible() {
        let fits = a4_engine(90.0, 55.0, 4.0);
        assert_eq!(fits.place(0).status, PlacementStatus::NothingRequested);
        let placed = fits.place(3);
        assert_eq!(placed.status, PlacementStatus::Placed);
        assert_eq!(placed.positions.len(), 3);
        assert_eq!(placed.page_count, 1);

        let impossible = a4_engine(200.0, 55.0, 4.0).place(3);
        assert_eq!(impossible.status, PlacementStatus::LayoutImpossible);
        assert!(impossible.positions.is_empty());
        assert_eq!(impossible.page_count, 0);
    }

    #[test]
    fn vanishing_step_caps_capacity_instead_of_overflowing() {
        let engine = a4_engine(0.0, 0.0, 1e-300);
        let grid = engine.compute_grid();
        assert_eq!(grid.columns, usize::MAX);
        assert_eq!(grid.cards_per_page, usize::MAX);
        assert_eq!(engine.compute_page_count(5), 1);
        assert_eq!(engine.compute_positions(2)[1].col, 1);
    }

    #[test]
    fn zero_sized_card_and_gutter_do_not_divide_by_zero() {
        let engine = a4_engine(0.0, 0.0, 0.0);
        assert_eq!(engine.compute_grid().cards_per_page, 0);
    }
}
