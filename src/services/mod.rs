pub mod allocation;
pub mod wheel_service;

pub use wheel_service::*;
