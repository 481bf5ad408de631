// Public API for integration tests and potential library usage

pub mod config;
pub mod gateway;
pub mod protocol;
pub mod provider;
pub mod registry;
pub mod round;
pub mod types;
