//! Bounded parallel iteration.
//!
//! [`for_each_bounded`] applies an async body to every item of a sequence
//! with a cap on concurrent invocations, and lets bodies end the loop early
//! through [`LoopState::request_stop`] or [`LoopState::request_break`].

mod for_each;

pub use for_each::{LoopOptions, LoopResult, LoopState, for_each_bounded, for_each_bounded_with};
