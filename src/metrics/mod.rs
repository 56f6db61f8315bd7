pub mod handler;
pub mod monitor;

pub use monitor::{OperationStats, PerformanceMonitor, Timer};
