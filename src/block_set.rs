//! Maintains the ordered list of live blocks: grows/shrinks coverage,
//! prioritizes preparation by distance from the focal row, and adapts block
//! size to how expensive `prepare` is running (spec.md §4.4).

use crate::block::Block;
use crate::config::ScrollConfig;
use crate::data_source::DataSource;
use crate::dom::ElementHandle;
use crate::error::ScrollError;
use crate::range::Range;
use crate::row_height_index::RowHeightIndex;
use crate::scheduler::{next_owner_id, OwnerId, Scheduler, SchedulerEvent};
use instant::Instant;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;

pub struct BlockSet {
    n: usize,
    pane: ElementHandle,
    scheduler: Scheduler,
    data_source: Rc<dyn DataSource>,
    geometry: Rc<RefCell<RowHeightIndex>>,
    row_size_sink: Rc<dyn Fn(Vec<(i64, f64)>)>,
    error_sink: Rc<dyn Fn(ScrollError)>,
    config: ScrollConfig,
    owner: OwnerId,
    blocks: Vec<Block>,
    target_range: Option<Range<i64>>,
    leave_range: Option<Range<i64>>,
    target_row: i64,
    preferred_block_size: usize,
    prepare_history: VecDeque<f64>,
    last_render_at: Option<Instant>,
    self_ref: Weak<RefCell<BlockSet>>,
}

impl BlockSet {
    /// Built as an `Rc<RefCell<_>>` from the start: `ensure_covers` must run
    /// as a scheduled write task, and that task needs to reach back into
    /// this same `BlockSet` to mutate it.
    pub fn new_rc(
        n: usize,
        pane: ElementHandle,
        scheduler: Scheduler,
        data_source: Rc<dyn DataSource>,
        geometry: Rc<RefCell<RowHeightIndex>>,
        row_size_sink: Rc<dyn Fn(Vec<(i64, f64)>)>,
        error_sink: Rc<dyn Fn(ScrollError)>,
        config: ScrollConfig,
    ) -> Rc<RefCell<BlockSet>> {
        let preferred_block_size = config.initial_block_size;
        let block_set = BlockSet {
            n,
            pane,
            scheduler,
            data_source,
            geometry,
            row_size_sink,
            error_sink,
            config,
            owner: next_owner_id(),
            blocks: Vec::new(),
            target_range: None,
            leave_range: None,
            target_row: 0,
            preferred_block_size,
            prepare_history: VecDeque::new(),
            last_render_at: None,
            self_ref: Weak::new(),
        };
        let rc = Rc::new(RefCell::new(block_set));
        rc.borrow_mut().self_ref = Rc::downgrade(&rc);
        rc
    }

    pub fn preferred_block_size(&self) -> usize {
        self.preferred_block_size
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn target_range(&self) -> Option<Range<i64>> {
        self.target_range
    }

    pub fn leave_range(&self) -> Option<Range<i64>> {
        self.leave_range
    }

    /// The union of live block ranges, or `None` if the set is empty.
    pub fn covered_range(&self) -> Option<Range<i64>> {
        match (self.blocks.first(), self.blocks.last()) {
            (Some(first), Some(last)) => Range::new(first.range().top, last.range().bot).ok(),
            _ => None,
        }
    }

    /// Records the target, derives `leave_range`, and schedules
    /// `ensure_covers` under a write task.
    pub fn set_target(&mut self, range: Range<i64>, focus: i64) {
        self.target_range = Some(range);
        self.target_row = focus;
        let n = self.n as i64;
        self.leave_range = Some(range.expand_clamped(self.config.leave_range_factor, n));

        let Some(rc) = self.self_ref.upgrade() else {
            return;
        };
        self.scheduler.schedule_write(self.owner, move |res| {
            if let Err(err) = res {
                if err.is_cancelled() {
                    log::info!("block set: ensure_covers cancelled");
                } else {
                    log::error!("block set: ensure_covers failed: {}", err);
                }
                return;
            }
            rc.borrow_mut().ensure_covers();
        });
    }

    fn make_block(&mut self, range: Range<i64>) -> Block {
        Block::new(
            range,
            self.pane.clone(),
            self.scheduler.clone(),
            self.data_source.clone(),
            self.geometry.clone(),
            self.row_size_sink.clone(),
            self.error_sink.clone(),
        )
    }

    /// (a) frees blocks fully outside `leave_range`; (b) seeds one block if
    /// the set went empty; (c) grows outward until `target_range` is
    /// covered, bounded by `ensure_covers_iteration_cap`.
    pub fn ensure_covers(&mut self) {
        let (Some(leave), Some(target)) = (self.leave_range, self.target_range) else {
            return;
        };
        let n = self.n as i64;

        while let Some(first) = self.blocks.first() {
            if first.range().bot <= leave.top {
                self.blocks.remove(0).free();
            } else {
                break;
            }
        }
        while let Some(last) = self.blocks.last() {
            if last.range().top >= leave.bot {
                self.blocks.pop().unwrap().free();
            } else {
                break;
            }
        }

        if self.blocks.is_empty() {
            let half = self.preferred_block_size as i64 / 2;
            let top = (self.target_row - half).clamp(0, n);
            let bot = (top + self.preferred_block_size as i64).clamp(0, n);
            if let Ok(range) = Range::new(top, bot) {
                if !range.is_empty() {
                    let block = self.make_block(range);
                    self.blocks.push(block);
                }
            }
        }

        for _ in 0..self.config.ensure_covers_iteration_cap {
            let (need_front, need_back) = match (self.blocks.first(), self.blocks.last()) {
                (Some(first), Some(last)) => {
                    (first.range().top > target.top, last.range().bot < target.bot)
                }
                _ => break,
            };
            if !need_front && !need_back {
                break;
            }

            let mut grew = false;
            if need_front {
                let current_top = self.blocks.first().unwrap().range().top;
                let new_top = (current_top - self.preferred_block_size as i64).max(0);
                if new_top < current_top {
                    if let Ok(range) = Range::new(new_top, current_top) {
                        if !range.is_empty() {
                            let block = self.make_block(range);
                            self.blocks.insert(0, block);
                            grew = true;
                        }
                    }
                }
            }
            if need_back {
                let current_bot = self.blocks.last().unwrap().range().bot;
                let new_bot = (current_bot + self.preferred_block_size as i64).min(n);
                if new_bot > current_bot {
                    if let Ok(range) = Range::new(current_bot, new_bot) {
                        if !range.is_empty() {
                            let block = self.make_block(range);
                            self.blocks.push(block);
                            grew = true;
                        }
                    }
                }
            }
            if !grew {
                break;
            }
        }

        self.request_render();
    }

    fn block_index_containing(&self, row: i64) -> Option<usize> {
        self.blocks.iter().position(|b| b.range().contains_point(row))
    }

    fn find_next_unprepared(&self, center: usize) -> Option<usize> {
        if !self.blocks[center].is_prepared() {
            return Some(center);
        }
        let len = self.blocks.len();
        let mut offset = 1usize;
        loop {
            let mut probed = false;
            if offset <= center {
                let idx = center - offset;
                probed = true;
                if !self.blocks[idx].is_prepared() {
                    return Some(idx);
                }
            }
            let idx = center + offset;
            if idx < len {
                probed = true;
                if !self.blocks[idx].is_prepared() {
                    return Some(idx);
                }
            }
            if !probed {
                return None;
            }
            offset += 1;
        }
    }

    pub fn record_prepare_duration(&mut self, block_rows: usize, duration: Duration) {
        if block_rows != self.preferred_block_size {
            // Stale measurement at a size we've since moved away from.
            return;
        }
        let ms = duration.as_secs_f64() * 1000.0;
        self.prepare_history.push_back(ms);
        while self.prepare_history.len() > self.config.history_window {
            self.prepare_history.pop_front();
        }
        if self.prepare_history.len() < self.config.history_window {
            return;
        }
        let slow = self
            .prepare_history
            .iter()
            .filter(|&&d| d > self.config.preferred_block_time_ms)
            .count();
        if slow >= self.config.shrink_majority {
            let shrink_by = (self.preferred_block_size as f64 * self.config.shrink_ratio).ceil() as usize;
            let new_size = self
                .preferred_block_size
                .saturating_sub(shrink_by)
                .max(self.config.min_block_size);
            if new_size != self.preferred_block_size {
                log::info!(
                    "block set: shrinking preferred block size {} -> {}",
                    self.preferred_block_size,
                    new_size
                );
            }
            self.preferred_block_size = new_size;
            self.prepare_history.clear();
        }
    }

    /// Throttled pass over every live block's `render`.
    pub fn request_render(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_render_at {
            if now.duration_since(last).as_secs_f64() * 1000.0 < self.config.render_throttle_ms {
                return;
            }
        }
        self.last_render_at = Some(now);
        for block in &mut self.blocks {
            block.render();
        }
    }

    /// Repositions every live block; called after `RowHeightIndex` changes.
    pub fn update_row_size(&self) {
        for block in &self.blocks {
            block.update_pos();
        }
    }

    /// One unit of preparation work per frame tick, gated by a probabilistic
    /// skip proportional to `evt.load_factor`.
    pub fn do_work(&mut self, evt: SchedulerEvent) {
        let Some(center) = self.block_index_containing(self.target_row) else {
            return;
        };
        let u: f64 = rand::random();
        if u <= evt.load_factor {
            return;
        }
        let Some(idx) = self.find_next_unprepared(center) else {
            return;
        };
        let rows = self.blocks[idx].range().height() as usize;
        let duration = self.blocks[idx].prepare();
        self.record_prepare_duration(rows, duration);
        self.request_render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::test_support::RecordingDataSource;
    use crate::dom::{self, native};

    fn set_up(n: usize) -> Rc<RefCell<BlockSet>> {
        native::reset();
        let pane = dom::create_pane();
        let scheduler = Scheduler::new();
        let ds: Rc<dyn DataSource> = Rc::new(RecordingDataSource::new(n));
        let geometry = Rc::new(RefCell::new(RowHeightIndex::new(n, 30.0)));
        let sink: Rc<dyn Fn(Vec<(i64, f64)>)> = Rc::new(|_| {});
        let error_sink: Rc<dyn Fn(ScrollError)> = Rc::new(|_| {});
        BlockSet::new_rc(n, pane, scheduler, ds, geometry, sink, error_sink, ScrollConfig::default())
    }

    fn evt(load_factor: f64) -> SchedulerEvent {
        SchedulerEvent {
            last_frame_time: 16.0,
            load_factor,
        }
    }

    #[test]
    fn set_target_then_drain_covers_the_target_range() {
        let bs = set_up(1000);
        let scheduler = bs.borrow().scheduler.clone();
        bs.borrow_mut().set_target(Range::new(100, 130).unwrap(), 115);
        scheduler.drain(evt(0.0));

        let bs = bs.borrow();
        let covered = bs.covered_range().unwrap();
        assert!(covered.contains_range(&Range::new(100, 130).unwrap()));
        let leave = bs.leave_range().unwrap();
        assert!(leave.contains_range(&Range::new(90, 140).unwrap()));
    }

    #[test]
    fn idempotent_set_target_does_not_add_or_free_blocks() {
        let bs = set_up(1000);
        let scheduler = bs.borrow().scheduler.clone();
        let range = Range::new(100, 130).unwrap();
        bs.borrow_mut().set_target(range, 115);
        scheduler.drain(evt(0.0));
        let count_before = bs.borrow().block_count();

        bs.borrow_mut().set_target(range, 115);
        scheduler.drain(evt(0.0));
        assert_eq!(bs.borrow().block_count(), count_before);
    }

    #[test]
    fn do_work_prepares_block_containing_target_row_first() {
        let bs = set_up(1000);
        let scheduler = bs.borrow().scheduler.clone();
        bs.borrow_mut().set_target(Range::new(100, 130).unwrap(), 115);
        scheduler.drain(evt(0.0));

        bs.borrow_mut().do_work(evt(0.0));
        let center = bs.borrow().block_index_containing(115).unwrap();
        assert!(bs.borrow().blocks[center].is_prepared());
    }

    #[test]
    fn do_work_is_a_no_op_when_focal_row_has_no_live_block() {
        let bs = set_up(1000);
        // Never called set_target: no live blocks at all.
        bs.borrow_mut().do_work(evt(0.0));
        assert_eq!(bs.borrow().block_count(), 0);
    }

    #[test]
    fn adaptive_shrink_follows_the_ceiling_formula() {
        let bs = set_up(1000);
        bs.borrow_mut().preferred_block_size = 19;
        let expected = [15usize, 12, 9, 7, 5, 5];
        for target in expected {
            for _ in 0..5 {
                let rows = bs.borrow().preferred_block_size;
                bs.borrow_mut().record_prepare_duration(rows, Duration::from_millis(20));
            }
            assert_eq!(bs.borrow().preferred_block_size(), target);
        }
    }

    #[test]
    fn shrink_never_goes_below_min_block_size() {
        let bs = set_up(1000);
        bs.borrow_mut().preferred_block_size = 5;
        for _ in 0..50 {
            let rows = bs.borrow().preferred_block_size;
            bs.borrow_mut().record_prepare_duration(rows, Duration::from_millis(20));
        }
        assert_eq!(bs.borrow().preferred_block_size(), 5);
    }

    #[test]
    fn stale_size_measurements_are_ignored() {
        let bs = set_up(1000);
        bs.borrow_mut().preferred_block_size = 20;
        for _ in 0..5 {
            bs.borrow_mut().record_prepare_duration(19, Duration::from_millis(20));
        }
        assert_eq!(bs.borrow().preferred_block_size(), 20);
    }
}
