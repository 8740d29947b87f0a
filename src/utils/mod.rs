pub mod clock;
pub mod pagination;

pub use clock::{Clock, ManualClock, SystemClock};
pub use pagination::*;
