// ABOUTME: Pure bubble placement: vertical side choice, horizontal clamping and arrow offset.
// ABOUTME: Recomputed on every show, scroll and resize from fresh layout metrics.

//! Bubble positioning geometry.
//!
//! All inputs are viewport coordinates in CSS pixels. Nothing is cached: the
//! caller measures the wrapper, reference and bubble each time and calls
//! [`compute_placement`].

use serde::Serialize;

/// Minimum distance between a bubble and either horizontal viewport edge.
pub const VIEWPORT_GUTTER: f64 = 16.0;

/// Distance the arrow keeps from the bubble's rounded corners.
pub const ARROW_INSET: f64 = 12.0;

/// Vertical gap between the wrapper edge and the bubble.
pub const BUBBLE_GAP: f64 = 8.0;

/// A rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Which side of the wrapper the bubble opens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Above,
    Below,
}

impl Side {
    /// Style class recording the side, used to point the arrow.
    pub fn class_name(&self) -> &'static str {
        match self {
            Side::Above => "above",
            Side::Below => "below",
        }
    }
}

/// Where a bubble goes, relative to the viewport and to its wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub side: Side,
    /// Left edge in viewport coordinates.
    pub viewport_left: f64,
    /// Top edge in viewport coordinates.
    pub viewport_top: f64,
    /// Left offset from the wrapper's left edge.
    pub left: f64,
    /// Top offset from the wrapper's top edge.
    pub top: f64,
    /// Rendered width: the natural width, capped to fit between the gutters.
    pub width: f64,
    /// Maximum width allowed by the viewport.
    pub max_width: f64,
    /// Signed horizontal shift of the arrow from the bubble's center.
    pub arrow_shift: f64,
}

impl Placement {
    pub fn viewport_right(&self) -> f64 {
        self.viewport_left + self.width
    }
}

/// Computes a bubble placement.
///
/// The bubble opens below the wrapper unless there is strictly more room
/// above. It is centred on the wrapper and clamped inside the viewport
/// gutters; the arrow points at the reference's centre without leaving the
/// bubble's body.
pub fn compute_placement(viewport: Viewport, wrapper: Rect, reference: Rect, bubble: Size) -> Placement {
    let space_below = viewport.height - wrapper.bottom();
    let space_above = wrapper.top;
    let side = if space_below >= space_above {
        Side::Below
    } else {
        Side::Above
    };

    let max_width = (viewport.width - 2.0 * VIEWPORT_GUTTER).max(0.0);
    let width = bubble.width.min(max_width);

    let centered = wrapper.center_x() - width / 2.0;
    let max_left = (viewport.width - VIEWPORT_GUTTER - width).max(VIEWPORT_GUTTER);
    let viewport_left = centered.clamp(VIEWPORT_GUTTER, max_left);

    let viewport_top = match side {
        Side::Below => wrapper.bottom() + BUBBLE_GAP,
        Side::Above => wrapper.top - BUBBLE_GAP - bubble.height,
    };

    let arrow_limit = (width / 2.0 - ARROW_INSET).max(0.0);
    let arrow_shift = (reference.center_x() - (viewport_left + width / 2.0))
        .clamp(-arrow_limit, arrow_limit);

    Placement {
        side,
        viewport_left,
        viewport_top,
        left: viewport_left - wrapper.left,
        top: viewport_top - wrapper.top,
        width,
        max_width,
        arrow_shift,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW: Viewport = Viewport {
        width: 1000.0,
        height: 800.0,
    };

    fn wrapper_at(left: f64, top: f64) -> Rect {
        Rect::new(left, top, 20.0, 18.0)
    }

    #[test]
    fn near_bottom_opens_above() {
        let w = wrapper_at(500.0, 700.0);
        let p = compute_placement(VIEW, w, w, Size::new(200.0, 100.0));
        assert_eq!(p.side, Side::Above);
        assert_eq!(p.side.class_name(), "above");
        assert_eq!(p.viewport_top, 700.0 - BUBBLE_GAP - 100.0);
    }

    #[test]
    fn equal_space_opens_below() {
        // 391 above, 800 - 409 = 391 below
        let w = wrapper_at(500.0, 391.0);
        let p = compute_placement(VIEW, w, w, Size::new(200.0, 100.0));
        assert_eq!(p.side, Side::Below);
        assert_eq!(p.side.class_name(), "below");
        assert_eq!(p.top, 18.0 + BUBBLE_GAP);
    }

    #[test]
    fn centred_on_wrapper_when_room() {
        let w = wrapper_at(490.0, 100.0);
        let p = compute_placement(VIEW, w, w, Size::new(200.0, 50.0));
        assert_eq!(p.viewport_left, 400.0);
        assert_eq!(p.left, -90.0);
        assert_eq!(p.arrow_shift, 0.0);
    }

    #[test]
    fn clamped_at_left_gutter_with_arrow_following_reference() {
        let w = wrapper_at(0.0, 100.0);
        let p = compute_placement(VIEW, w, w, Size::new(200.0, 50.0));
        assert_eq!(p.viewport_left, VIEWPORT_GUTTER);
        // reference centre 10, bubble centre 116
        assert_eq!(p.arrow_shift, -88.0);
    }

    #[test]
    fn clamped_at_right_gutter() {
        let w = wrapper_at(980.0, 100.0);
        let p = compute_placement(VIEW, w, w, Size::new(200.0, 50.0));
        assert_eq!(p.viewport_right(), 1000.0 - VIEWPORT_GUTTER);
    }

    #[test]
    fn wide_bubble_is_capped_between_gutters() {
        let w = wrapper_at(300.0, 100.0);
        let p = compute_placement(VIEW, w, w, Size::new(2000.0, 50.0));
        assert!(p.viewport_left >= VIEWPORT_GUTTER);
        assert!(p.viewport_right() <= VIEW.width - VIEWPORT_GUTTER);
        assert_eq!(p.width, p.max_width);
        assert_eq!(p.max_width, 968.0);
    }

    #[test]
    fn arrow_never_leaves_bubble_body() {
        let w = wrapper_at(0.0, 100.0);
        let reference = Rect::new(-400.0, 100.0, 10.0, 18.0);
        let p = compute_placement(VIEW, w, reference, Size::new(100.0, 50.0));
        assert_eq!(p.arrow_shift, -(50.0 - ARROW_INSET));
    }

    #[test]
    fn tiny_viewport_does_not_panic() {
        let view = Viewport::new(20.0, 20.0);
        let w = Rect::new(5.0, 5.0, 5.0, 5.0);
        let p = compute_placement(view, w, w, Size::new(100.0, 10.0));
        assert_eq!(p.width, 0.0);
        assert_eq!(p.arrow_shift, 0.0);
    }
}
