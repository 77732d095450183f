//! Timers.
//!
//! - [`sleep`] completes after a duration,
//! - [`timeout`] bounds another future by a duration.
//!
//! Both rely on the timer thread owned by the runtime and must be polled from
//! inside it.

pub(crate) mod driver;

mod sleep;
mod timeout;

#[doc(inline)]
pub use sleep::{Sleep, sleep};

#[doc(inline)]
pub use timeout::{Timeout, timeout};
