//! Shared traits for the Keystone platform

pub mod clock;
pub mod transport;

// Re-export commonly used traits
pub use clock::{Clock, ControlledClock, SystemClock};
pub use transport::PartitionTransport;
