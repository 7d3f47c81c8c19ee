pub mod aggregator;
pub mod controller;
pub mod readiness;
pub mod record;
pub mod task;

pub use controller::HarvestController;
