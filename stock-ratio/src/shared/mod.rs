/// Shared modules for the pair ratio monitors
pub mod bridge;
pub mod calc;
pub mod chart;
pub mod config;
pub mod console;
pub mod error;
pub mod fetcher;
pub mod monitor;
pub mod poll;
pub mod ratio;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
