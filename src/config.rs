//! Tunable constants, collected into one `Serialize`/`Deserialize` struct so
//! a host can persist or override them, the way the teacher persists
//! `stores/settings_store.rs::AppSettings` via `serde_json`.

use serde::{Deserialize, Serialize};

/// Every constant `spec.md` names as a literal, gathered so hosts can tune
/// the pipeline without forking it. `ScrollConfig::default()` reproduces
/// `spec.md`'s numbers exactly.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrollConfig {
    /// Default row height (px) before a row is measured (§3).
    pub default_row_height: f64,
    /// `cornerSpeed` in the buffer-region `atan` ramp (§4.7).
    pub corner_speed: f64,
    /// Buffer-region half-width at rest (px) (§4.7).
    pub buffer_half_width: f64,
    /// Scroll-position jump logged (but still blended) above this (px) (§4.3).
    pub jump_threshold_px: f64,
    /// EMA blend factor for new velocity samples (§4.3).
    pub velocity_blend: f64,
    /// Below this idle time (ms), velocity is reported unchanged (§4.3).
    pub decay_start_ms: f64,
    /// At or above this idle time (ms), velocity decays to zero (§4.3).
    pub decay_full_ms: f64,
    /// Averaged-frame-duration floor below which load factor is 0 (§4.1).
    pub low_thresh_ms: f64,
    /// Averaged-frame-duration ceiling at which load factor saturates (§4.1).
    pub hi_thresh_ms: f64,
    /// Load-factor ceiling, never reached exactly (§4.1).
    pub max_load: f64,
    /// `prepare()` duration above which a block counts as "slow" for
    /// adaptive sizing (ms) (§4.4).
    pub preferred_block_time_ms: f64,
    /// Floor for `preferredBlockSize` (rows) (§4.4).
    pub min_block_size: usize,
    /// Initial `preferredBlockSize` (rows) (§4.4).
    pub initial_block_size: usize,
    /// Fraction of `targetRange`'s height used to pad `leaveRange` on each
    /// side (§4.4).
    pub leave_range_factor: f64,
    /// Minimum interval between `BlockSet::render` calls triggered by
    /// `do_work` (ms) (§4.4).
    pub render_throttle_ms: f64,
    /// Number of trailing `prepare` durations kept for adaptive sizing,
    /// and number of trailing frame durations `FrameTimer` averages (§4.2, §4.4).
    pub history_window: usize,
    /// Of `history_window` samples, at least this many exceeding
    /// `preferred_block_time_ms` triggers a shrink (§4.4).
    pub shrink_majority: usize,
    /// Fraction of `preferredBlockSize` shaved off on a shrink, rounded up
    /// (§4.4).
    pub shrink_ratio: f64,
    /// Runaway safeguard: max iterations of the grow loop in
    /// `ensure_covers` (§4.4).
    pub ensure_covers_iteration_cap: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        ScrollConfig {
            default_row_height: 30.0,
            corner_speed: 5.0,
            buffer_half_width: 2000.0,
            jump_threshold_px: 1000.0,
            velocity_blend: 0.2,
            decay_start_ms: 50.0,
            decay_full_ms: 200.0,
            low_thresh_ms: 25.0,
            hi_thresh_ms: 50.0,
            max_load: 0.95,
            preferred_block_time_ms: 12.0,
            min_block_size: 5,
            initial_block_size: 20,
            leave_range_factor: 1.0 / 3.0,
            render_throttle_ms: 10.0,
            history_window: 5,
            shrink_majority: 4,
            shrink_ratio: 0.2,
            ensure_covers_iteration_cap: 10,
        }
    }
}

impl ScrollConfig {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_json() {
        let cfg = ScrollConfig::default();
        let json = cfg.to_json().unwrap();
        let back = ScrollConfig::from_json(&json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg = ScrollConfig::from_json(r#"{"min_block_size": 8}"#).unwrap();
        assert_eq!(cfg.min_block_size, 8);
        assert_eq!(cfg.default_row_height, ScrollConfig::default().default_row_height);
    }
}
