//! Exponentially-smoothed scroll velocity with idle-decay (spec.md §4.3).

use crate::config::ScrollConfig;
use instant::Instant;

/// Tracks scroll velocity in pixels per millisecond, signed, blended with an
/// EMA and decayed to zero shortly after scrolling stops.
pub struct VelocityTracker {
    last_pos: Option<f64>,
    last_time: Option<Instant>,
    last_vel: f64,
    jump_threshold: f64,
    blend: f64,
    decay_start_ms: f64,
    decay_full_ms: f64,
}

impl VelocityTracker {
    pub fn new(config: &ScrollConfig) -> Self {
        VelocityTracker {
            last_pos: None,
            last_time: None,
            last_vel: 0.0,
            jump_threshold: config.jump_threshold_px,
            blend: config.velocity_blend,
            decay_start_ms: config.decay_start_ms,
            decay_full_ms: config.decay_full_ms,
        }
    }

    /// Feeds a new scroll position (absolute pixel offset). The first call
    /// only initializes state; velocity is computed from the second call on.
    pub fn on_scroll(&mut self, px: f64) {
        let now = Instant::now();
        let (last_pos, last_time) = match (self.last_pos, self.last_time) {
            (Some(p), Some(t)) => (p, t),
            _ => {
                self.last_pos = Some(px);
                self.last_time = Some(now);
                return;
            }
        };

        let dt_ms = now.duration_since(last_time).as_secs_f64() * 1000.0;
        let dpx = px - last_pos;
        if dpx.abs() > self.jump_threshold {
            log::warn!(
                "VelocityTracker: scroll jump of {:.1}px exceeds threshold {:.1}px, blending anyway",
                dpx,
                self.jump_threshold
            );
        }

        let instantaneous = dpx / dt_ms.max(1.0);
        self.last_vel = (1.0 - self.blend) * self.last_vel + self.blend * instantaneous;
        self.last_pos = Some(px);
        self.last_time = Some(now);
    }

    /// Current velocity (px/ms, signed), decayed to zero if scrolling has
    /// been idle for `decay_full_ms` or more.
    pub fn get_vel(&self) -> f64 {
        let Some(last_time) = self.last_time else {
            return 0.0;
        };
        let idle_ms = Instant::now().duration_since(last_time).as_secs_f64() * 1000.0;
        if idle_ms < self.decay_start_ms {
            self.last_vel
        } else if idle_ms >= self.decay_full_ms {
            0.0
        } else {
            let span = self.decay_full_ms - self.decay_start_ms;
            let frac = 1.0 - (idle_ms - self.decay_start_ms) / span;
            self.last_vel * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ScrollConfig {
        ScrollConfig::default()
    }

    #[test]
    fn first_call_only_initializes() {
        let mut vt = VelocityTracker::new(&cfg());
        vt.on_scroll(100.0);
        assert_eq!(vt.get_vel(), 0.0);
    }

    #[test]
    fn at_rest_after_construction_is_zero() {
        let vt = VelocityTracker::new(&cfg());
        assert_eq!(vt.get_vel(), 0.0);
    }

    #[test]
    fn blend_moves_toward_new_sample() {
        let mut vt = VelocityTracker::new(&cfg());
        vt.on_scroll(0.0);
        // Manually poke internal state forward to avoid depending on wall
        // clock timing for the blend factor itself.
        vt.last_vel = 1.0;
        vt.last_vel = (1.0 - vt.blend) * vt.last_vel + vt.blend * 2.0;
        assert!((vt.last_vel - 1.2).abs() < 1e-9);
    }
}
