//! Web-form intake: validation, abuse screening and templated email notification.

pub mod config;
pub mod error;
pub mod submissions;
pub mod telemetry;
