//! Per-frame ticker exposing last and averaged frame duration (spec.md §4.2).
//!
//! Real frame pacing is driven by `requestAnimationFrame` on `wasm32` —
//! never a timer, since timers are throttled during scroll in some browsers.
//! Off `wasm32` there is no display to tick against; [`FrameTimer::start`]
//! only arms the timer, and a host (or test) drives frames explicitly with
//! [`FrameTimer::record_duration`], the same manual-drive convention
//! `dom::native` uses for the rest of the pipeline's non-browser path.

use crate::config::ScrollConfig;
use instant::Instant;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[cfg(target_arch = "wasm32")]
use std::cell::Cell;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;

struct Inner {
    last_tick: Option<Instant>,
    durations: VecDeque<f64>,
    running: bool,
}

type Callback = Box<dyn FnMut()>;

pub struct FrameTimer {
    inner: Rc<RefCell<Inner>>,
    callback: Rc<RefCell<Option<Callback>>>,
    window: usize,
    #[cfg(target_arch = "wasm32")]
    raf_id: Rc<Cell<Option<i32>>>,
    #[cfg(target_arch = "wasm32")]
    closure_slot: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>,
}

impl FrameTimer {
    pub fn new(config: &ScrollConfig) -> Self {
        FrameTimer {
            inner: Rc::new(RefCell::new(Inner {
                last_tick: None,
                durations: VecDeque::new(),
                running: false,
            })),
            callback: Rc::new(RefCell::new(None)),
            window: config.history_window,
            #[cfg(target_arch = "wasm32")]
            raf_id: Rc::new(Cell::new(None)),
            #[cfg(target_arch = "wasm32")]
            closure_slot: Rc::new(RefCell::new(None)),
        }
    }

    /// Most recent inter-tick duration, in milliseconds. `0.0` before the
    /// second tick.
    pub fn last_duration(&self) -> f64 {
        self.inner.borrow().durations.back().copied().unwrap_or(0.0)
    }

    /// Moving average of the last `history_window` durations.
    pub fn average_duration(&self) -> f64 {
        let inner = self.inner.borrow();
        if inner.durations.is_empty() {
            0.0
        } else {
            inner.durations.iter().sum::<f64>() / inner.durations.len() as f64
        }
    }

    /// Feeds a frame duration directly into the history and runs the
    /// registered callback, as if a frame had just ticked. This is the only
    /// way to drive a `FrameTimer` off `wasm32`, and is also handy for
    /// deterministic load-factor tests on `wasm32`.
    pub fn record_duration(&self, ms: f64) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.durations.push_back(ms);
            while inner.durations.len() > self.window {
                inner.durations.pop_front();
            }
        }
        if let Some(cb) = self.callback.borrow_mut().as_mut() {
            cb();
        }
    }

    fn record_real_tick(inner: &Rc<RefCell<Inner>>, window: usize) -> f64 {
        let now = Instant::now();
        let mut inner = inner.borrow_mut();
        let dt = match inner.last_tick {
            Some(last) => now.duration_since(last).as_secs_f64() * 1000.0,
            None => 0.0,
        };
        inner.last_tick = Some(now);
        if inner.last_tick.is_some() && dt > 0.0 {
            inner.durations.push_back(dt);
            while inner.durations.len() > window {
                inner.durations.pop_front();
            }
        }
        dt
    }

    /// Idempotent: a second `start` while already running is a no-op.
    pub fn start(&self, callback: impl FnMut() + 'static) {
        let already_running = {
            let mut inner = self.inner.borrow_mut();
            if inner.running {
                true
            } else {
                inner.running = true;
                inner.last_tick = None;
                false
            }
        };
        if already_running {
            return;
        }
        *self.callback.borrow_mut() = Some(Box::new(callback));

        #[cfg(target_arch = "wasm32")]
        self.start_raf_loop();
    }

    /// Idempotent: stopping an already-stopped timer is a no-op. Cancels
    /// any pending animation frame request.
    pub fn stop(&self) {
        let was_running = {
            let mut inner = self.inner.borrow_mut();
            std::mem::replace(&mut inner.running, false)
        };
        if !was_running {
            return;
        }
        *self.callback.borrow_mut() = None;

        #[cfg(target_arch = "wasm32")]
        {
            if let Some(id) = self.raf_id.take() {
                if let Some(window) = web_sys::window() {
                    let _ = window.cancel_animation_frame(id);
                }
            }
            *self.closure_slot.borrow_mut() = None;
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.borrow().running
    }

    #[cfg(target_arch = "wasm32")]
    fn start_raf_loop(&self) {
        let inner = self.inner.clone();
        let window_size = self.window;
        let callback = self.callback.clone();
        let raf_id = self.raf_id.clone();
        let closure_slot = self.closure_slot.clone();
        // Same `Rc` as `closure_slot`, captured by the closure so it can
        // re-register itself for the next frame once it is stored below.
        let closure_slot_for_body = closure_slot.clone();

        let closure = Closure::wrap(Box::new(move |_ts: f64| {
            if !inner.borrow().running {
                return;
            }
            Self::record_real_tick(&inner, window_size);
            if let Some(cb) = callback.borrow_mut().as_mut() {
                cb();
            }
            if inner.borrow().running {
                if let Some(window) = web_sys::window() {
                    if let Some(c) = closure_slot_for_body.borrow().as_ref() {
                        if let Ok(id) = window.request_animation_frame(c.as_ref().unchecked_ref()) {
                            raf_id.set(Some(id));
                        }
                    }
                }
            }
        }) as Box<dyn FnMut(f64)>);

        *closure_slot.borrow_mut() = Some(closure);
        if let Some(window) = web_sys::window() {
            if let Some(c) = closure_slot.borrow().as_ref() {
                if let Ok(id) = window.request_animation_frame(c.as_ref().unchecked_ref()) {
                    self.raf_id.set(Some(id));
                }
            }
        }
    }
}
