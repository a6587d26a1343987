// Library module for sweepy
// Re-exports modules for use in integration tests and the binary

pub mod cli;
pub mod config;
pub mod logging;
pub mod sweep;
