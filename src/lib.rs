//! Virtualized long-list renderer core.
//!
//! Given a [`DataSource`] and a pair of elements (a scroll container and
//! somewhere to mount a pane inside it), [`LongScroll`] keeps a bounded
//! window of live DOM nodes positioned over a conceptually unbounded list of
//! variable-height rows: a [`RowHeightIndex`] tracks cumulative row heights,
//! a [`BlockSet`] grows and shrinks contiguous runs of prepared rows around
//! the viewport, and a [`Scheduler`] keeps every DOM read and write inside
//! its own animation-frame phase so scrolling never triggers layout
//! thrashing.
//!
//! This crate has no rendering framework opinion: a host supplies the
//! `DataSource` (real row content) and drives `LongScroll` from its own
//! scroll-container element.

pub mod block;
pub mod block_set;
pub mod buffer_region;
pub mod config;
pub mod data_source;
pub mod dom;
pub mod error;
pub mod frame_timer;
pub mod logging;
pub mod long_scroll;
pub mod range;
pub mod row_height_index;
pub mod scheduler;
pub mod velocity_tracker;

pub use block::Block;
pub use block_set::BlockSet;
pub use config::ScrollConfig;
pub use data_source::DataSource;
pub use dom::ElementHandle;
pub use error::{ScrollError, ScrollResult};
pub use frame_timer::FrameTimer;
pub use long_scroll::LongScroll;
pub use range::Range;
pub use row_height_index::RowHeightIndex;
pub use scheduler::{compute_load_factor, next_owner_id, OwnerId, Scheduler, SchedulerEvent};
pub use velocity_tracker::VelocityTracker;
