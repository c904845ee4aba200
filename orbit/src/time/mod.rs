//! Time collaborator and the helpers built on it.
//!
//! The engine has no timer wheel: [`delay`] yields until a [`Clock`] reports
//! its deadline, and [`timeout`] races an operation against it with
//! [`any`](crate::any).

mod clock;
mod delay;
mod timeout;

pub use clock::{Clock, ManualClock, Millisecond, SystemClock};
pub use delay::delay;
pub use timeout::timeout;
