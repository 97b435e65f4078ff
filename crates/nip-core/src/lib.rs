pub mod admission;
pub mod batch;
pub mod checksum;
pub mod config;
pub mod control;
pub mod endpoint;
pub mod fetch;
pub mod logging;
pub mod partition;
