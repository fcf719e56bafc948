pub mod api;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod records;
pub mod storage;
pub mod store;
pub mod telemetry;
pub mod utils;
