//! Asymmetric look-ahead buffer, sized and shifted by scroll velocity
//! (spec.md §4.7).

use crate::config::ScrollConfig;
use crate::range::Range;

/// Computes the pixel-space buffer region around `viewport` given velocity
/// `v` (px/ms, signed). At rest this is `buffer_half_width` on each side of
/// the viewport's center; under fast scroll it grows and shifts toward the
/// direction of travel, asymptoting to all-on-one-side.
pub fn compute(viewport: &Range<f64>, v: f64, config: &ScrollConfig) -> Range<f64> {
    let ratio = (v / config.corner_speed).atan() / std::f64::consts::PI + 0.5;
    let scale_factor = (v.abs() / 5.0).sqrt().max(1.0);
    let width = config.buffer_half_width * scale_factor;
    let vp_center = (viewport.top + viewport.bot) / 2.0;

    let top = vp_center - width * (1.0 - ratio);
    let bot = vp_center + width * ratio;
    // `top`/`bot` are always finite and ordered for finite `v`; pixel space
    // has no natural lower/upper clamp here, that happens once the caller
    // converts endpoints to rows via `RowHeightIndex::index_at`.
    Range { top, bot }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vp() -> Range<f64> {
        Range::new(1000.0, 1800.0).unwrap()
    }

    #[test]
    fn at_rest_is_symmetric_1000px_slab() {
        let cfg = ScrollConfig::default();
        let region = compute(&vp(), 0.0, &cfg);
        let center = (vp().top + vp().bot) / 2.0;
        assert!((region.top - (center - 1000.0)).abs() < 1e-6);
        assert!((region.bot - (center + 1000.0)).abs() < 1e-6);
    }

    #[test]
    fn fast_downward_scroll_grows_and_shifts_down() {
        let cfg = ScrollConfig::default();
        let at_rest = compute(&vp(), 0.0, &cfg);
        let fast = compute(&vp(), 20.0, &cfg);
        assert!(fast.height() > at_rest.height());
        // Asymmetric: far more buffer below the viewport than above.
        let center = (vp().top + vp().bot) / 2.0;
        assert!(fast.bot - center > center - fast.top);
    }

    #[test]
    fn fast_upward_scroll_mirrors_downward() {
        let cfg = ScrollConfig::default();
        let down = compute(&vp(), 20.0, &cfg);
        let up = compute(&vp(), -20.0, &cfg);
        let center = (vp().top + vp().bot) / 2.0;
        assert!((down.bot - center - (center - up.top)).abs() < 1e-6);
        assert!((up.bot - center - (center - down.top)).abs() < 1e-6);
    }

    #[test]
    fn ratio_asymptotes_near_corner_speed_bound() {
        let cfg = ScrollConfig::default();
        let region = compute(&vp(), 10.0, &cfg);
        let center = (vp().top + vp().bot) / 2.0;
        let ratio = (region.bot - center) / (region.bot - region.top);
        assert!(ratio > 0.85);
    }
}
