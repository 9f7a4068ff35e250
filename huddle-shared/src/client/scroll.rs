/// Distance from the bottom, in pixels, within which new messages auto-scroll the view.
pub const NEAR_BOTTOM_THRESHOLD_PX: f64 = 80.0;

/// Scroll geometry of a message list viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollSnapshot {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollSnapshot {
    #[must_use]
    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - self.scroll_top - self.client_height).max(0.0)
    }

    #[must_use]
    pub fn is_near_bottom(&self) -> bool {
        self.distance_from_bottom() <= NEAR_BOTTOM_THRESHOLD_PX
    }
}

/// Scroll offset that keeps the same content under the viewport after older messages were
/// inserted above it: `P' = P + (H' - H)`.
#[must_use]
pub fn anchored_scroll_top(before: ScrollSnapshot, new_scroll_height: f64) -> f64 {
    (before.scroll_top + (new_scroll_height - before.scroll_height)).max(0.0)
}

/// Where to put the viewport after the content changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollAdjustment {
    Keep,
    ScrollTo(f64),
    ToBottom,
}

/// Picks the adjustment for a change: prepends keep the anchor, appends follow only when the
/// reader was already at the bottom, resets jump to the newest message.
#[must_use]
pub fn adjustment_for(
    change: super::Change,
    before: ScrollSnapshot,
    new_scroll_height: f64,
) -> ScrollAdjustment {
    use super::Change;

    match change {
        Change::Prepended => {
            ScrollAdjustment::ScrollTo(anchored_scroll_top(before, new_scroll_height))
        }
        Change::Appended if before.is_near_bottom() => ScrollAdjustment::ToBottom,
        Change::Reset => ScrollAdjustment::ToBottom,
        Change::Appended | Change::Updated | Change::None => ScrollAdjustment::Keep,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Change;

    #[test]
    fn prepend_preserves_visual_anchor() {
        let before = ScrollSnapshot {
            scroll_top: 40.0,
            scroll_height: 1000.0,
            client_height: 500.0,
        };
        assert!((anchored_scroll_top(before, 1600.0) - 640.0).abs() < f64::EPSILON);
        assert_eq!(
            adjustment_for(Change::Prepended, before, 1600.0),
            ScrollAdjustment::ScrollTo(640.0)
        );
    }

    #[test]
    fn near_bottom_uses_threshold() {
        let at_bottom = ScrollSnapshot {
            scroll_top: 500.0,
            scroll_height: 1000.0,
            client_height: 500.0,
        };
        let close = ScrollSnapshot {
            scroll_top: 430.0,
            ..at_bottom
        };
        let far = ScrollSnapshot {
            scroll_top: 100.0,
            ..at_bottom
        };

        assert!(at_bottom.is_near_bottom());
        assert!(close.is_near_bottom());
        assert!(!far.is_near_bottom());
    }

    #[test]
    fn appends_only_follow_when_reader_is_at_bottom() {
        let reading_history = ScrollSnapshot {
            scroll_top: 0.0,
            scroll_height: 2000.0,
            client_height: 500.0,
        };
        assert_eq!(
            adjustment_for(Change::Appended, reading_history, 2100.0),
            ScrollAdjustment::Keep
        );

        let following = ScrollSnapshot {
            scroll_top: 1500.0,
            ..reading_history
        };
        assert_eq!(
            adjustment_for(Change::Appended, following, 2100.0),
            ScrollAdjustment::ToBottom
        );
    }
}
