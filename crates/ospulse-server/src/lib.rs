//! Server binary glue: configuration and the periodic task schedulers.

pub mod config;
pub mod scheduler;
