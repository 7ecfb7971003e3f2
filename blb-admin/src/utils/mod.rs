//! Utility modules for blb-admin

pub mod pool_monitor;

pub use pool_monitor::{begin_monitored, MonitoredTransaction};
