//! Owns the DOM subtree for one contiguous row range: placeholder first,
//! real content later (spec.md §4.5).

use crate::data_source::DataSource;
use crate::dom::{self, ElementHandle};
use crate::error::ScrollError;
use crate::range::Range;
use crate::row_height_index::RowHeightIndex;
use crate::scheduler::{next_owner_id, OwnerId, Scheduler};
use instant::Instant;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// A contiguous run of rows rendered and freed as a unit. `range` never
/// changes after construction; growing or shrinking coverage means creating
/// or freeing whole blocks, never resizing one.
pub struct Block {
    range: Range<i64>,
    host: ElementHandle,
    placeholder_elements: Vec<ElementHandle>,
    real_elements: Option<Vec<ElementHandle>>,
    dirty: bool,
    prepared: bool,
    owner: OwnerId,
    data_source: Rc<dyn DataSource>,
    geometry: Rc<RefCell<RowHeightIndex>>,
    scheduler: Scheduler,
    row_size_sink: Rc<dyn Fn(Vec<(i64, f64)>)>,
    error_sink: Rc<dyn Fn(ScrollError)>,
}

impl Block {
    /// Builds placeholders synchronously (must be cheap, per §6) and queues
    /// a write to attach the host to `pane`.
    pub fn new(
        range: Range<i64>,
        pane: ElementHandle,
        scheduler: Scheduler,
        data_source: Rc<dyn DataSource>,
        geometry: Rc<RefCell<RowHeightIndex>>,
        row_size_sink: Rc<dyn Fn(Vec<(i64, f64)>)>,
        error_sink: Rc<dyn Fn(ScrollError)>,
    ) -> Self {
        let owner = next_owner_id();
        let host = dom::create_host();

        let mut placeholder_elements = Vec::with_capacity(range.height().max(0) as usize);
        {
            let geom = geometry.borrow();
            for row in range.top..range.bot {
                let el = data_source.make_dummy_dom(row as usize);
                dom::set_dummy_height(&el, geom.get(row as usize));
                placeholder_elements.push(el);
            }
        }

        let top = range.top;
        let host_for_write = host.clone();
        let geometry_for_write = geometry.clone();
        scheduler.schedule_write(owner, move |res| match res {
            Ok(_) => {
                dom::append_child(&pane, &host_for_write);
                let y = geometry_for_write.borrow().prefix_sum(top as usize);
                dom::set_translate_y(&host_for_write, y);
            }
            Err(err) if err.is_cancelled() => {
                log::info!("block {}: attach cancelled before it ran", top);
            }
            Err(err) => log::error!("block {}: failed to attach: {}", top, err),
        });

        Block {
            range,
            host,
            placeholder_elements,
            real_elements: None,
            dirty: true,
            prepared: false,
            owner,
            data_source,
            geometry,
            scheduler,
            row_size_sink,
            error_sink,
        }
    }

    pub fn range(&self) -> Range<i64> {
        self.range
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    #[cfg(test)]
    pub(crate) fn real_elements(&self) -> Option<&[ElementHandle]> {
        self.real_elements.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn placeholder_elements(&self) -> &[ElementHandle] {
        &self.placeholder_elements
    }

    /// Builds real content via the data source. Synchronous and permitted to
    /// be slow — the returned duration drives `BlockSet`'s adaptive sizing.
    pub fn prepare(&mut self) -> Duration {
        let start = Instant::now();
        let mut real = Vec::with_capacity(self.range.height().max(0) as usize);
        for row in self.range.top..self.range.bot {
            real.push(self.data_source.make_dom(row as usize));
        }
        self.real_elements = Some(real);
        self.dirty = true;
        self.prepared = true;
        start.elapsed()
    }

    /// No-op if not dirty. Otherwise builds a detached fragment from
    /// whichever content is current (placeholder if not yet `prepare`d),
    /// queues an idle-write to swap it in, and — only for a real render —
    /// a follow-up read to measure and report size drift.
    pub fn render(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        // Cached up front: `prepared` may flip between this call and the
        // idle-write actually running.
        let is_placeholder_render = !self.prepared;
        let elements = if is_placeholder_render {
            self.placeholder_elements.clone()
        } else {
            self.real_elements.clone().unwrap_or_default()
        };

        let fragment = dom::create_fragment();
        for el in &elements {
            dom::append_child(&fragment, el);
        }

        let host = self.host.clone();
        let geometry = self.geometry.clone();
        let top = self.range.top;
        let owner = self.owner;
        let scheduler = self.scheduler.clone();
        let placeholder_elements = self.placeholder_elements.clone();
        let row_size_sink = self.row_size_sink.clone();
        let error_sink = self.error_sink.clone();
        let real_for_read = if is_placeholder_render {
            None
        } else {
            Some(elements.clone())
        };

        self.scheduler.schedule_idle_write(owner, move |res| {
            match res {
                Ok(_) => {}
                Err(err) if err.is_cancelled() => {
                    log::info!("block {}: render idle-write cancelled", top);
                    return;
                }
                Err(err) => {
                    log::error!("block {}: render idle-write failed: {}", top, err);
                    return;
                }
            }
            dom::clear_children(&host);
            dom::append_child(&host, &fragment);
            let y = geometry.borrow().prefix_sum(top as usize);
            dom::set_translate_y(&host, y);

            let Some(real) = real_for_read else {
                return;
            };
            let geometry_read = geometry.clone();
            let scheduler_read = scheduler.clone();
            let placeholder_elements = placeholder_elements.clone();
            let row_size_sink = row_size_sink.clone();
            let error_sink = error_sink.clone();

            scheduler.schedule_read(owner, move |res| {
                match res {
                    Ok(_) => {}
                    Err(err) if err.is_cancelled() => {
                        log::info!("block {}: render measurement read cancelled", top);
                        return;
                    }
                    Err(err) => {
                        log::error!("block {}: render measurement read failed: {}", top, err);
                        return;
                    }
                }
                if real.is_empty() {
                    return;
                }
                if dom::measure_height(&real[0]) == 0.0 {
                    let msg = format!(
                        "block {}: first real element measured height 0, likely a CSS bug",
                        top
                    );
                    log::error!("{}", msg);
                    error_sink(ScrollError::InvariantViolation(msg));
                }
                let mut changes = Vec::new();
                for (offset, el) in real.iter().enumerate() {
                    let row = top + offset as i64;
                    let measured = dom::measure_height(el);
                    let stored = geometry_read.borrow().get(row as usize);
                    if (measured - stored).abs() > f64::EPSILON {
                        changes.push((row, measured));
                    }
                }
                if changes.is_empty() {
                    return;
                }
                let changes_for_write = changes.clone();
                let placeholder_elements = placeholder_elements.clone();
                scheduler_read.schedule_write(owner, move |res| {
                    match res {
                        Ok(_) => {}
                        Err(err) if err.is_cancelled() => {
                            log::info!("block {}: placeholder resize cancelled", top);
                            return;
                        }
                        Err(err) => {
                            log::error!("block {}: placeholder resize failed: {}", top, err);
                            return;
                        }
                    }
                    for (row, new_size) in &changes_for_write {
                        let offset = (*row - top) as usize;
                        if let Some(ph) = placeholder_elements.get(offset) {
                            dom::set_dummy_height(ph, *new_size);
                        }
                    }
                });
                row_size_sink(changes);
            });
        });
    }

    /// Repositions the host to `RowHeightIndex::prefix_sum(range.top)`.
    /// Queued as a write, never called directly, per the layout discipline.
    pub fn update_pos(&self) {
        let host = self.host.clone();
        let geometry = self.geometry.clone();
        let top = self.range.top;
        self.scheduler.schedule_write(self.owner, move |res| {
            if let Err(err) = res {
                if err.is_cancelled() {
                    log::info!("block {}: update_pos cancelled", top);
                } else {
                    log::error!("block {}: update_pos failed: {}", top, err);
                }
                return;
            }
            let y = geometry.borrow().prefix_sum(top as usize);
            dom::set_translate_y(&host, y);
        });
    }

    /// Cancels every pending task owned by this block, surrenders its
    /// elements back to the data source, and disposes the host.
    pub fn free(&mut self) {
        self.scheduler.cancel_jobs(self.owner);
        if let Some(real) = self.real_elements.take() {
            for (offset, el) in real.into_iter().enumerate() {
                self.data_source.free_dom(self.range.top as usize + offset, el);
            }
        }
        for (offset, el) in self.placeholder_elements.drain(..).enumerate() {
            self.data_source.free_dummy_dom(self.range.top as usize + offset, el);
        }
        dom::remove_element(&self.host);
    }
}
