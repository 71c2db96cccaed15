//! Coordinator: wires scroll events, viewport, buffer region, and height
//! updates; owns the other components (spec.md §4.6).

use crate::block_set::BlockSet;
use crate::buffer_region;
use crate::config::ScrollConfig;
use crate::data_source::DataSource;
use crate::dom::{self, ElementHandle};
use crate::error::{ScrollError, ScrollResult};
use crate::frame_timer::FrameTimer;
use crate::range::Range;
use crate::row_height_index::RowHeightIndex;
use crate::scheduler::{compute_load_factor, next_owner_id, OwnerId, Scheduler, SchedulerEvent};
use crate::velocity_tracker::VelocityTracker;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::closure::Closure;

struct Inner {
    n: usize,
    data_source: Rc<dyn DataSource>,
    config: ScrollConfig,
    geometry: Rc<RefCell<RowHeightIndex>>,
    scheduler: Scheduler,
    frame_timer: FrameTimer,
    velocity: VelocityTracker,
    block_set: Option<Rc<RefCell<BlockSet>>>,
    container: Option<ElementHandle>,
    pane: Option<ElementHandle>,
    viewport: Option<Range<f64>>,
    owner: OwnerId,
    self_weak: Weak<RefCell<Inner>>,
    /// Host-registered error observer (spec.md §7); `None` until
    /// `on_error` is called, in which case violations are only logged.
    error_sink: Rc<RefCell<Option<Rc<dyn Fn(ScrollError)>>>>,
    #[cfg(target_arch = "wasm32")]
    scroll_closure: Option<Closure<dyn FnMut(web_sys::Event)>>,
}

/// Cheaply-cloneable handle to the scroll core. All instances cloned from
/// the same `new`/`with_config` call share one `Inner`.
#[derive(Clone)]
pub struct LongScroll {
    inner: Rc<RefCell<Inner>>,
}

impl LongScroll {
    pub fn new(data_source: Rc<dyn DataSource>) -> Self {
        Self::with_config(data_source, ScrollConfig::default())
    }

    pub fn with_config(data_source: Rc<dyn DataSource>, config: ScrollConfig) -> Self {
        let n = data_source.len();
        let geometry = Rc::new(RefCell::new(RowHeightIndex::new(n, config.default_row_height)));
        let inner = Inner {
            n,
            data_source,
            velocity: VelocityTracker::new(&config),
            frame_timer: FrameTimer::new(&config),
            config,
            geometry,
            scheduler: Scheduler::new(),
            block_set: None,
            container: None,
            pane: None,
            viewport: None,
            owner: next_owner_id(),
            self_weak: Weak::new(),
            error_sink: Rc::new(RefCell::new(None)),
            #[cfg(target_arch = "wasm32")]
            scroll_closure: None,
        };
        let rc = Rc::new(RefCell::new(inner));
        rc.borrow_mut().self_weak = Rc::downgrade(&rc);
        LongScroll { inner: rc }
    }

    /// Registers the host's sink for structural-invariant violations
    /// detected deep inside a scheduled phase (spec.md §7) — a measured
    /// height of 0, an out-of-bounds viewport read, and similar "denote
    /// bugs" conditions that would otherwise only reach a log line.
    /// Replaces any previously registered sink.
    pub fn on_error(&self, f: impl Fn(ScrollError) + 'static) {
        *self.inner.borrow().error_sink.borrow_mut() = Some(Rc::new(f));
    }

    /// Builds the inner pane inside `container`, attaches the scroll
    /// listener, and starts the frame timer.
    pub fn make_dom(&self, container: ElementHandle) {
        let pane = dom::create_pane();
        dom::append_child(&container, &pane);
        {
            let mut guard = self.inner.borrow_mut();
            guard.container = Some(container.clone());
            guard.pane = Some(pane);
        }
        self.reinit();

        #[cfg(target_arch = "wasm32")]
        {
            let this = self.clone();
            let closure = dom::attach_scroll_listener(&container, move || this.on_scroll());
            self.inner.borrow_mut().scroll_closure = Some(closure);
        }

        let this = self.clone();
        self.inner.borrow().frame_timer.start(move || this.tick());
    }

    /// Rebuilds `RowHeightIndex` and the block set from scratch. Called by
    /// `make_dom`, `on_resize`, and `on_data_change`; incremental repair is
    /// out of scope (documented; see the coordinator's notes module-level).
    pub fn reinit(&self) {
        let Some(pane) = self.inner.borrow().pane.clone() else {
            return;
        };
        let (n, config, scheduler, data_source, self_weak, error_sink_cell) = {
            let guard = self.inner.borrow();
            (
                guard.data_source.len(),
                guard.config.clone(),
                guard.scheduler.clone(),
                guard.data_source.clone(),
                guard.self_weak.clone(),
                guard.error_sink.clone(),
            )
        };
        let geometry = Rc::new(RefCell::new(RowHeightIndex::new(n, config.default_row_height)));
        dom::set_pane_height(&pane, geometry.borrow().total());

        let sink_weak = self_weak;
        let row_size_sink: Rc<dyn Fn(Vec<(i64, f64)>)> = Rc::new(move |changes| {
            LongScroll::handle_row_size_changes(sink_weak.clone(), changes);
        });
        let error_sink = Self::make_error_sink(error_sink_cell);

        let block_set = BlockSet::new_rc(
            n,
            pane,
            scheduler,
            data_source,
            geometry.clone(),
            row_size_sink,
            error_sink,
            config.clone(),
        );

        {
            let mut guard = self.inner.borrow_mut();
            guard.n = n;
            guard.geometry = geometry;
            guard.block_set = Some(block_set);
            guard.viewport = None;
            guard.velocity = VelocityTracker::new(&config);
        }
        self.on_scroll();
    }

    /// Wraps the host-registered `error_sink` cell in a stable `Fn`, falling
    /// back to a plain log line when no host handler is registered yet.
    fn make_error_sink(cell: Rc<RefCell<Option<Rc<dyn Fn(ScrollError)>>>>) -> Rc<dyn Fn(ScrollError)> {
        Rc::new(move |err: ScrollError| {
            let handler = cell.borrow().clone();
            match handler {
                Some(f) => f(err),
                None => log::error!("long_scroll: {}", err),
            }
        })
    }

    fn handle_row_size_changes(inner_weak: Weak<RefCell<Inner>>, changes: Vec<(i64, f64)>) {
        let Some(inner_rc) = inner_weak.upgrade() else {
            return;
        };
        let block_set = {
            let guard = inner_rc.borrow();
            let mut geometry = guard.geometry.borrow_mut();
            for (row, new_size) in &changes {
                geometry.set(*row as usize, *new_size);
            }
            // TODO: pane height is not re-stretched here when rows grow; it
            // only catches up on the next `reinit`. Re-reading `geometry.total()`
            // and calling `dom::set_pane_height` at this point would close the gap.
            guard.block_set.clone()
        };
        if let Some(block_set) = block_set {
            block_set.borrow().update_row_size();
        }
        LongScroll { inner: inner_rc }.update_viewport();
    }

    /// Requests an `updateViewport`; a no-op until `make_dom` has run.
    pub fn on_scroll(&self) {
        self.update_viewport();
    }

    /// Schedules a read that recomputes the viewport, feeds the velocity
    /// tracker, computes the buffer region, and sets the block set's target.
    pub fn update_viewport(&self) {
        let inner = self.inner.clone();
        let (owner, scheduler) = {
            let guard = inner.borrow();
            (guard.owner, guard.scheduler.clone())
        };
        scheduler.schedule_read(owner, move |res| {
            if let Err(err) = res {
                if err.is_cancelled() {
                    log::info!("long_scroll: update_viewport cancelled");
                } else {
                    log::error!("long_scroll: update_viewport failed: {}", err);
                }
                return;
            }
            let Some(container) = inner.borrow().container.clone() else {
                return; // no-op until make_dom
            };
            let (scroll_top, client_height) = dom::read_viewport(&container);
            let Ok(viewport) = Range::new(scroll_top, scroll_top + client_height) else {
                let msg = format!("invalid viewport geometry ({}, {})", scroll_top, client_height);
                log::error!("long_scroll: {}", msg);
                let handler = inner.borrow().error_sink.borrow().clone();
                match handler {
                    Some(f) => f(ScrollError::InvariantViolation(msg)),
                    None => {}
                }
                return;
            };

            let v = {
                let mut guard = inner.borrow_mut();
                guard.viewport = Some(viewport);
                guard.velocity.on_scroll(scroll_top);
                guard.velocity.get_vel()
            };

            let (config, n, block_set) = {
                let guard = inner.borrow();
                (guard.config.clone(), guard.n as i64, guard.block_set.clone())
            };
            let region = buffer_region::compute(&viewport, v, &config);

            let (lo, hi) = {
                let guard = inner.borrow();
                let geometry = guard.geometry.borrow();
                let clamp_row = |r: i64| if n <= 0 { 0 } else { r.clamp(0, n - 1) };
                let top_row = clamp_row(geometry.index_at(region.top) as i64);
                let bot_row = clamp_row(geometry.index_at(region.bot) as i64);
                (top_row.min(bot_row), top_row.max(bot_row))
            };
            let target_row = (lo + hi) / 2;
            let row_range = Range::new(lo, (hi + 1).min(n)).unwrap_or_else(|_| Range::empty_at(lo));

            if let Some(block_set) = block_set {
                block_set.borrow_mut().set_target(row_range, target_row);
                block_set.borrow_mut().request_render();
            }
        });
    }

    /// Applies measured row-size changes, repositions every block, and
    /// re-runs `update_viewport`.
    pub fn update_row_size(&self, changes: Vec<(i64, f64)>) {
        Self::handle_row_size_changes(self.inner.borrow().self_weak.clone(), changes);
    }

    /// Once per frame: queues `BlockSet::do_work` as an idle-write, then
    /// drains the scheduler.
    pub fn tick(&self) {
        let inner = self.inner.clone();
        let (owner, scheduler, block_set, avg_frame_ms, config) = {
            let guard = inner.borrow();
            (
                guard.owner,
                guard.scheduler.clone(),
                guard.block_set.clone(),
                guard.frame_timer.average_duration(),
                guard.config.clone(),
            )
        };
        let load_factor = compute_load_factor(avg_frame_ms, &config);
        if let Some(block_set) = block_set {
            scheduler.schedule_idle_write(owner, move |res| {
                let evt = match res {
                    Ok(evt) => evt,
                    Err(err) if err.is_cancelled() => {
                        log::info!("long_scroll: tick cancelled");
                        return;
                    }
                    Err(err) => {
                        log::error!("long_scroll: tick failed: {}", err);
                        return;
                    }
                };
                block_set.borrow_mut().do_work(evt);
            });
        }
        scheduler.drain(SchedulerEvent {
            last_frame_time: avg_frame_ms,
            load_factor,
        });
    }

    pub fn on_resize(&self) {
        self.reinit();
    }

    pub fn on_data_change(&self) {
        self.reinit();
    }

    pub fn viewport(&self) -> ScrollResult<Range<f64>> {
        self.inner.borrow().viewport.ok_or(ScrollError::InitRequired)
    }

    pub fn get_pane_height(&self) -> f64 {
        self.inner.borrow().geometry.borrow().total()
    }

    pub fn get_row_height(&self, i: i64) -> f64 {
        self.inner.borrow().geometry.borrow().get(i as usize)
    }

    pub fn get_row_top(&self, i: i64) -> f64 {
        self.inner.borrow().geometry.borrow().prefix_sum(i as usize)
    }

    pub fn get_row_at_px(&self, px: f64) -> ScrollResult<i64> {
        let guard = self.inner.borrow();
        if guard.pane.is_none() {
            return Err(ScrollError::InitRequired);
        }
        let geometry = guard.geometry.borrow();
        if px < 0.0 || px >= geometry.total() {
            return Err(ScrollError::InvariantViolation(format!(
                "pixel offset {} out of bounds [0, {})",
                px,
                geometry.total()
            )));
        }
        Ok(geometry.index_at(px) as i64)
    }

    pub fn get_clamped_row_at_px(&self, px: f64) -> i64 {
        let guard = self.inner.borrow();
        let geometry = guard.geometry.borrow();
        if geometry.is_empty() {
            return 0;
        }
        if px < 0.0 {
            return 0;
        }
        if px >= geometry.total() {
            return geometry.len() as i64 - 1;
        }
        geometry.index_at(px) as i64
    }

    #[cfg(test)]
    pub(crate) fn drain_for_test(&self) {
        let (scheduler, avg_frame_ms, config) = {
            let guard = self.inner.borrow();
            (guard.scheduler.clone(), guard.frame_timer.average_duration(), guard.config.clone())
        };
        let load_factor = compute_load_factor(avg_frame_ms, &config);
        scheduler.drain(SchedulerEvent {
            last_frame_time: avg_frame_ms,
            load_factor,
        });
    }

    #[cfg(test)]
    pub(crate) fn block_set(&self) -> Option<Rc<RefCell<BlockSet>>> {
        self.inner.borrow().block_set.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::test_support::RecordingDataSource;
    use crate::dom::native;

    fn set_up(n: usize) -> (LongScroll, dom::ElementHandle) {
        native::reset();
        let container = dom::create_pane();
        let ds: Rc<dyn DataSource> = Rc::new(RecordingDataSource::new(n));
        let ls = LongScroll::new(ds);
        ls.make_dom(container.clone());
        ls.drain_for_test(); // settle reinit's initial on_scroll -> update_viewport
        (ls, container)
    }

    #[test]
    fn make_dom_sizes_the_pane_to_the_initial_total() {
        let (ls, _container) = set_up(1000);
        assert_eq!(ls.get_pane_height(), 1000.0 * 30.0);
    }

    #[test]
    fn scroll_updates_viewport_and_covers_it_with_blocks() {
        let (ls, container) = set_up(1000);
        // scrollTop/clientHeight are read off the container `make_dom` was
        // given, not the pane it creates as a child.
        native::set_viewport(&container, 3000.0, 800.0);
        ls.on_scroll();
        ls.drain_for_test();

        let viewport = ls.viewport().unwrap();
        assert_eq!(viewport.top, 3000.0);
        assert_eq!(viewport.bot, 3800.0);

        let block_set = ls.block_set().unwrap();
        let covered = block_set.borrow().covered_range().unwrap();
        let expected_row = ls.get_clamped_row_at_px(3400.0);
        assert!(covered.contains_point(expected_row));
    }

    #[test]
    fn get_row_at_px_errors_before_make_dom() {
        let ds: Rc<dyn DataSource> = Rc::new(RecordingDataSource::new(10));
        let ls = LongScroll::new(ds);
        assert!(ls.get_row_at_px(0.0).is_err());
    }

    #[test]
    fn get_row_at_px_errors_out_of_bounds() {
        let (ls, _container) = set_up(10);
        assert!(ls.get_row_at_px(-1.0).is_err());
        assert!(ls.get_row_at_px(10.0 * 30.0).is_err());
        assert!(ls.get_row_at_px(299.0).is_ok());
    }

    #[test]
    fn get_clamped_row_at_px_saturates() {
        let (ls, _container) = set_up(10);
        assert_eq!(ls.get_clamped_row_at_px(-500.0), 0);
        assert_eq!(ls.get_clamped_row_at_px(1_000_000.0), 9);
    }

    #[test]
    fn on_data_change_rebuilds_from_scratch() {
        let (ls, _container) = set_up(10);
        ls.on_data_change();
        ls.drain_for_test();
        assert_eq!(ls.get_pane_height(), 300.0);
    }

    #[test]
    fn on_error_observes_invalid_viewport_geometry() {
        let (ls, container) = set_up(10);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        ls.on_error(move |e| seen_clone.borrow_mut().push(e));

        // A negative client height makes `scroll_top + client_height < scroll_top`,
        // an invalid `Range`.
        native::set_viewport(&container, 100.0, -50.0);
        ls.on_scroll();
        ls.drain_for_test();

        assert_eq!(seen.borrow().len(), 1);
        assert!(matches!(seen.borrow()[0], ScrollError::InvariantViolation(_)));
    }
}
