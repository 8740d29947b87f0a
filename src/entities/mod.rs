pub mod devices;
pub mod prize_states;
pub mod spin_records;

pub use devices as device_entity;
pub use prize_states as prize_state_entity;
pub use spin_records as spin_record_entity;
