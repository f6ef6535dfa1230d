//! Library crate for ping-rank-rs exposing reusable modules.
pub mod hosts;
pub mod lifecycle;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod types;
