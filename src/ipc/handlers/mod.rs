pub mod core;
pub mod reports;
pub mod schedule;
pub mod snapshot;
