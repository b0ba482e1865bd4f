pub mod device_info;
pub mod filter;
pub mod measurement;
pub mod revolution;
pub mod scan_mode;
pub mod stats;

pub use device_info::{DeviceInfo, HealthStatus};
pub use measurement::{Measurement, MAX_QUALITY};
pub use revolution::Revolution;
pub use scan_mode::{ScanMode, UnknownScanMode};
pub use stats::RevolutionStats;
