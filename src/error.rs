//! Error kinds for the scroll core (spec.md §7).
//!
//! Kept as a plain enum with manual `Display`/`Error` impls, matching the
//! teacher's own style (`services/lnurl.rs::LnUrlError`,
//! `stores/cashu/errors.rs::CashuWalletError`) rather than pulling in a
//! derive-macro crate the teacher never depended on.

use std::fmt;

/// Error kinds produced by the scroll core.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollError {
    /// A structural invariant was violated: an invalid `Range`, measuring a
    /// prepared block with no real elements, a measured height of 0, or an
    /// out-of-bounds pixel lookup.
    InvariantViolation(String),
    /// Normal operating condition: a block was freed while one of its
    /// scheduled tasks was still pending. Callers must swallow this, not
    /// propagate it.
    TaskCancelled,
    /// The viewport or pane was accessed before `LongScroll::make_dom` ran.
    InitRequired,
}

impl fmt::Display for ScrollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollError::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
            ScrollError::TaskCancelled => write!(f, "task cancelled"),
            ScrollError::InitRequired => write!(f, "make_dom has not been called yet"),
        }
    }
}

impl std::error::Error for ScrollError {}

impl ScrollError {
    /// True for the one error kind that is a normal operating condition and
    /// must be swallowed (logged at info) rather than propagated.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScrollError::TaskCancelled)
    }
}

pub type ScrollResult<T> = Result<T, ScrollError>;
