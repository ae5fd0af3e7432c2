use std::fmt;

use crate::grid::GridPosition;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CouponId(String);

impl CouponId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CouponId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One card's content. Either field may be empty; an empty title means the
/// body gets the whole card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coupon {
    pub id: CouponId,
    pub title: String,
    pub body: String,
}

impl Coupon {
    pub fn new(id: CouponId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry<'a> {
    pub coupon: &'a Coupon,
    pub position: GridPosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageData<'a> {
    pub page_number: usize,
    pub entries: Vec<PageEntry<'a>>,
}

/// Pairs coupons with grid positions and groups them by page.
pub struct SheetPreview;

impl SheetPreview {
    /// Zips by index; coupons without a position (or the reverse) are left
    /// out. Pages come back in ascending order, entries in input order.
    pub fn pages<'a>(coupons: &'a [Coupon], positions: &[GridPosition]) -> Vec<PageData<'a>> {
        let mut pages: Vec<PageData<'a>> = Vec::new();
        for (coupon, position) in coupons.iter().zip(positions.iter().copied()) {
            match pages.iter_mut().find(|p| p.page_number == position.page) {
                Some(page) => page.entries.push(PageEntry { coupon, position }),
                None => pages.push(PageData {
                    page_number: position.page,
                    entries: vec![PageEntry { coupon, position }],
                }),
            }
        }
        pages.sort_by_key(|p| p.page_number);
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LayoutConfig;
    use crate::grid::LayoutEngine;

    fn coupons(n: usize) -> Vec<Coupon> {
        (0..n)
            .map(|i| Coupon::new(CouponId::new(format!("c{i}")), format!("Title {i}"), "Body"))
            .collect()
    }

    #[test]
    fn coupon_ids_compare_by_value() {
        assert_eq!(CouponId::new("a"), CouponId::new("a"));
        assert_ne!(CouponId::new("a"), CouponId::new("b"));
        assert_eq!(CouponId::new("x-1").to_string(), "x-1");
    }

    #[test]
    fn pages_group_by_page_in_order() {
        let engine = LayoutEngine::new(LayoutConfig::default());
        let coupons = coupons(10);
        let positions = engine.compute_positions(coupons.len());
        let pages = SheetPreview::pages(&coupons, &positions);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 0);
        assert_eq!(pages[0].entries.len(), 8);
        assert_eq!(pages[1].entries.len(), 2);
        assert_eq!(pages[1].entries[0].coupon.id, CouponId::new("c8"));
    }

    #[test]
    fn unmatched_indices_are_skipped() {
        let engine = LayoutEngine::new(LayoutConfig::default());
        let coupons = coupons(3);
        let positions = engine.compute_positions(2);
        let pages = SheetPreview::pages(&coupons, &positions);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].entries.len(), 2);
        assert!(SheetPreview::pages(&[], &positions).is_empty());
    }

    #[test]
    fn out_of_order_positions_still_sort_pages() {
        let coupons = coupons(2);
        let at = |page| GridPosition {
            page,
            row: 0,
            col: 0,
            x_mm: 0.0,
            y_mm: 0.0,
        };
        let pages = SheetPreview::pages(&coupons, &[at(3), at(1)]);
        let numbers: Vec<usize> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }
}
