pub mod common;
pub mod prize;
pub mod wheel;

pub use common::*;
pub use prize::*;
pub use wheel::*;
