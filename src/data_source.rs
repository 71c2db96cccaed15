//! The row-data provider the core consumes but does not own (spec.md §6).

use crate::dom::ElementHandle;

/// Supplies real and placeholder row content. Implementations may pool
/// freed elements; the core never assumes an element it surrenders is
/// discarded.
pub trait DataSource {
    /// Number of rows. Constant between `LongScroll::reinit` calls.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds row `i`'s real content. May be expensive; always called off a
    /// `Block::prepare`, never from a read or write phase directly.
    fn make_dom(&self, i: usize) -> ElementHandle;

    /// Builds row `i`'s placeholder. Must be cheap; its height is controlled
    /// by the core, not by this element's natural content.
    fn make_dummy_dom(&self, i: usize) -> ElementHandle;

    /// The core is done with a real element it obtained from `make_dom`.
    fn free_dom(&self, i: usize, element: ElementHandle);

    /// The core is done with a placeholder element it obtained from
    /// `make_dummy_dom`.
    fn free_dummy_dom(&self, i: usize, element: ElementHandle);
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use crate::dom::native;
    use std::cell::RefCell;

    /// Records every `free_*` call so tests can assert a `Block::free` (or a
    /// `BlockSet` shrink) surrendered exactly the elements it should have.
    #[derive(Default)]
    pub struct RecordingDataSource {
        len: usize,
        pub freed_real: RefCell<Vec<usize>>,
        pub freed_dummy: RefCell<Vec<usize>>,
    }

    impl RecordingDataSource {
        pub fn new(len: usize) -> Self {
            RecordingDataSource {
                len,
                ..Default::default()
            }
        }
    }

    impl DataSource for RecordingDataSource {
        fn len(&self) -> usize {
            self.len
        }

        fn make_dom(&self, _i: usize) -> ElementHandle {
            native::create_leaf()
        }

        fn make_dummy_dom(&self, _i: usize) -> ElementHandle {
            native::create_leaf()
        }

        fn free_dom(&self, i: usize, _element: ElementHandle) {
            self.freed_real.borrow_mut().push(i);
        }

        fn free_dummy_dom(&self, i: usize, _element: ElementHandle) {
            self.freed_dummy.borrow_mut().push(i);
        }
    }
}
