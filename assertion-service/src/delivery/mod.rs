pub mod outbox_worker;
pub mod registry;

pub use registry::{DeliveryOutcome, DeliveryRegistry};
