//! Property-based tests for the core's structural invariants (spec.md §8).
//!
//! Grounded on `00d00882_Dicklesworthstone-frankenterm`'s
//! `tests/proptest_viewport_reflow_planner.rs` — same `proptest!` block
//! shape, one invariant per test, arbitrary-but-bounded input strategies.

use proptest::prelude::*;

use long_scroll::{Range, RowHeightIndex};

// ── Range invariants ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// `clamp_to` never produces a range wider than either input.
    #[test]
    fn clamp_to_never_grows_the_range(
        a_top in -10_000_i64..10_000,
        a_len in 0_i64..5_000,
        b_top in -10_000_i64..10_000,
        b_len in 0_i64..5_000,
    ) {
        let a = Range::new(a_top, a_top + a_len).unwrap();
        let b = Range::new(b_top, b_top + b_len).unwrap();
        let clamped = a.clamp_to(&b);
        prop_assert!(clamped.height() <= a.height());
        prop_assert!(clamped.height() <= b.height());
    }

    /// A non-empty `clamp_to` result is contained in both inputs.
    #[test]
    fn clamp_to_result_is_contained_in_both(
        a_top in -10_000_i64..10_000,
        a_len in 1_i64..5_000,
        b_top in -10_000_i64..10_000,
        b_len in 1_i64..5_000,
    ) {
        let a = Range::new(a_top, a_top + a_len).unwrap();
        let b = Range::new(b_top, b_top + b_len).unwrap();
        let clamped = a.clamp_to(&b);
        if !clamped.is_empty() {
            prop_assert!(a.contains_range(&clamped));
            prop_assert!(b.contains_range(&clamped));
        }
    }

    /// `expand_clamped` always keeps the original range inside its result,
    /// and never leaves `[0, n)`.
    #[test]
    fn expand_clamped_contains_the_original_and_stays_in_bounds(
        top in 0_i64..900,
        len in 1_i64..100,
        n in 100_i64..1000,
        frac in 0.0_f64..2.0,
    ) {
        let bot = (top + len).min(n);
        prop_assume!(top < bot);
        let r = Range::new(top, bot).unwrap();
        let expanded = r.expand_clamped(frac, n);
        prop_assert!(expanded.contains_range(&r));
        prop_assert!(expanded.top >= 0);
        prop_assert!(expanded.bot <= n);
    }
}

// ── RowHeightIndex invariants ────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// `index_at(prefix_sum(i))` recovers `i` for every row, under uniform
    /// heights.
    #[test]
    fn index_at_inverts_prefix_sum_uniform(n in 1_usize..2000, height in 1.0_f64..200.0) {
        let idx = RowHeightIndex::new(n, height);
        for i in 0..n {
            let px = idx.prefix_sum(i);
            prop_assert_eq!(idx.index_at(px), i);
        }
    }

    /// Same, with per-row heights set individually (variable-height rows).
    #[test]
    fn index_at_inverts_prefix_sum_variable(
        heights in prop::collection::vec(1.0_f64..300.0, 1..200),
    ) {
        let n = heights.len();
        let mut idx = RowHeightIndex::new(n, 30.0);
        for (i, h) in heights.iter().enumerate() {
            idx.set(i, *h);
        }
        for i in 0..n {
            let px = idx.prefix_sum(i);
            prop_assert_eq!(idx.index_at(px), i);
        }
    }

    /// `index_at` is monotone non-decreasing in its input.
    #[test]
    fn index_at_is_monotone(n in 1_usize..500, a in 0.0_f64..20_000.0, b in 0.0_f64..20_000.0) {
        let idx = RowHeightIndex::new(n, 37.0);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(idx.index_at(lo) <= idx.index_at(hi));
    }

    /// Setting a row's height changes `total()` by exactly the delta, and
    /// every other row's height is unaffected.
    #[test]
    fn set_conserves_total_by_exact_delta(
        n in 1_usize..300,
        row in 0_usize..299,
        new_height in 0.0_f64..500.0,
    ) {
        prop_assume!(row < n);
        let mut idx = RowHeightIndex::new(n, 30.0);
        let before_total = idx.total();
        let before_other: Vec<f64> = (0..n).filter(|&i| i != row).map(|i| idx.get(i)).collect();
        idx.set(row, new_height);
        prop_assert!((idx.total() - (before_total - 30.0 + new_height)).abs() < 1e-6);
        let after_other: Vec<f64> = (0..n).filter(|&i| i != row).map(|i| idx.get(i)).collect();
        prop_assert_eq!(before_other, after_other);
    }
}

// ── BlockSet coverage and adaptive sizing invariants ─────────────────────

mod block_set_support {
    use long_scroll::data_source::test_support::RecordingDataSource;
    use long_scroll::dom::{self, native};
    use long_scroll::{BlockSet, DataSource, RowHeightIndex, Scheduler, ScrollConfig, ScrollError};
    use std::cell::RefCell;
    use std::rc::Rc;

    pub fn fresh_block_set(n: usize) -> (Rc<RefCell<BlockSet>>, Scheduler) {
        native::reset();
        let pane = dom::create_pane();
        let scheduler = Scheduler::new();
        let ds: Rc<dyn DataSource> = Rc::new(RecordingDataSource::new(n));
        let geometry = Rc::new(RefCell::new(RowHeightIndex::new(n, 30.0)));
        let sink: Rc<dyn Fn(Vec<(i64, f64)>)> = Rc::new(|_| {});
        let error_sink: Rc<dyn Fn(ScrollError)> = Rc::new(|_| {});
        let bs = BlockSet::new_rc(n, pane, scheduler.clone(), ds, geometry, sink, error_sink, ScrollConfig::default());
        (bs, scheduler)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// After `set_target` and a drain, the covered range always contains
    /// the requested target range (clamped to the list's bounds).
    #[test]
    fn covered_range_always_contains_the_target(
        n in 50_usize..2000,
        top in 0_i64..49,
        len in 1_i64..40,
    ) {
        use long_scroll::{Range, SchedulerEvent};
        let (bs, scheduler) = block_set_support::fresh_block_set(n);
        let bot = (top + len).min(n as i64);
        prop_assume!(top < bot);
        let target = Range::new(top, bot).unwrap();
        let focus = (top + bot) / 2;
        bs.borrow_mut().set_target(target, focus);
        scheduler.drain(SchedulerEvent { last_frame_time: 16.0, load_factor: 0.0 });

        let covered = bs.borrow().covered_range();
        prop_assert!(covered.is_some());
        prop_assert!(covered.unwrap().contains_range(&target));
    }

    /// Calling `set_target` twice with the same range is a no-op on block
    /// count: covering is idempotent.
    #[test]
    fn repeated_set_target_is_idempotent(
        n in 50_usize..2000,
        top in 0_i64..49,
        len in 1_i64..40,
    ) {
        use long_scroll::{Range, SchedulerEvent};
        let (bs, scheduler) = block_set_support::fresh_block_set(n);
        let bot = (top + len).min(n as i64);
        prop_assume!(top < bot);
        let target = Range::new(top, bot).unwrap();
        let focus = (top + bot) / 2;

        bs.borrow_mut().set_target(target, focus);
        scheduler.drain(SchedulerEvent { last_frame_time: 16.0, load_factor: 0.0 });
        let count_after_first = bs.borrow().block_count();

        bs.borrow_mut().set_target(target, focus);
        scheduler.drain(SchedulerEvent { last_frame_time: 16.0, load_factor: 0.0 });
        prop_assert_eq!(bs.borrow().block_count(), count_after_first);
    }

    /// `preferred_block_size` never increases on its own — it only ever
    /// shrinks (or holds) as `prepare` durations are recorded.
    #[test]
    fn preferred_block_size_is_monotone_non_increasing(
        durations_ms in prop::collection::vec(0.0_f64..40.0, 1..60),
    ) {
        use long_scroll::{Range, SchedulerEvent};
        use std::time::Duration;
        let n = 5000;
        let (bs, scheduler) = block_set_support::fresh_block_set(n);
        bs.borrow_mut().set_target(Range::new(0i64, 30).unwrap(), 15);
        scheduler.drain(SchedulerEvent { last_frame_time: 16.0, load_factor: 0.0 });

        let mut last = bs.borrow().preferred_block_size();
        for ms in durations_ms {
            let rows = bs.borrow().preferred_block_size();
            bs.borrow_mut().record_prepare_duration(rows, Duration::from_secs_f64(ms / 1000.0));
            let now = bs.borrow().preferred_block_size();
            prop_assert!(now <= last);
            last = now;
        }
    }
}
