use crate::error::SensorError;
use lidar_data::{Measurement, Revolution, ScanMode, MAX_QUALITY};
use lidar_driver::{Rplidar, RplidarError};
use std::time::{Duration, Instant};

/// Source of revolutions driven by the server.
pub trait Sensor {
    /// Starts scanning in `mode`, restarting if a scan is already running.
    fn start(&mut self, mode: ScanMode) -> Result<(), SensorError>;
    /// Blocks until the next revolution, at most `timeout`.
    fn next_revolution(&mut self, timeout: Duration) -> Result<Revolution, SensorError>;
    /// Stops scanning. Stopping an idle sensor is not an error.
    fn stop(&mut self) -> Result<(), SensorError>;
    /// Stops scanning and gives the device up. Later calls fail with
    /// `SensorError::Released`.
    fn release(&mut self) -> Result<(), SensorError>;
}

/// RPLIDAR on a serial port.
pub struct RplidarSensor {
    lidar: Option<Rplidar>,
}

impl RplidarSensor {
    pub fn open(port_name: &str) -> Result<RplidarSensor, SensorError> {
        let mut lidar = Rplidar::open(port_name)?;
        match lidar.device_info() {
            Ok(info) => log::info!(
                "RPLIDAR model {:#04X}, firmware {}.{:02}, hardware {}, serial {}",
                info.model,
                info.firmware_major_version,
                info.firmware_minor_version,
                info.hardware_version,
                info.serial_number_hex()
            ),
            Err(e) => log::warn!("Cannot read device info: {e}"),
        }
        match lidar.health() {
            Ok(status) => log::info!("RPLIDAR health: {status:?}"),
            Err(RplidarError::DeviceHealthError(code)) => {
                log::warn!("RPLIDAR reports error {code:#06X}, resetting");
                lidar.reset()?;
            }
            Err(e) => log::warn!("Cannot read device health: {e}"),
        }
        Ok(RplidarSensor { lidar: Some(lidar) })
    }

    fn lidar(&mut self) -> Result<&mut Rplidar, SensorError> {
        self.lidar.as_mut().ok_or(SensorError::Released)
    }
}

impl Sensor for RplidarSensor {
    fn start(&mut self, mode: ScanMode) -> Result<(), SensorError> {
        Ok(self.lidar()?.start(mode)?)
    }

    fn next_revolution(&mut self, timeout: Duration) -> Result<Revolution, SensorError> {
        match self.lidar()?.next_revolution(timeout) {
            Ok(revolution) => Ok(revolution),
            Err(RplidarError::NotScanning) => Err(SensorError::NotStarted),
            Err(e) => Err(e.into()),
        }
    }

    fn stop(&mut self) -> Result<(), SensorError> {
        Ok(self.lidar()?.stop()?)
    }

    fn release(&mut self) -> Result<(), SensorError> {
        let lidar = self.lidar.take().ok_or(SensorError::Released)?;
        lidar.release()?;
        log::info!("Serial port released");
        Ok(())
    }
}

/// Synthetic sensor standing in the middle of a rectangular room. Useful
/// without hardware; revolutions are deterministic.
pub struct SimulatedSensor {
    period: Duration,
    mode: Option<ScanMode>,
    released: bool,
    revolution_index: u64,
    next_due: Instant,
}

const ROOM_HALF_WIDTH_MM: f32 = 2000.;
const ROOM_HALF_DEPTH_MM: f32 = 3500.;
// every n-th sample carries no echo
const DROPOUT_EVERY: usize = 29;

impl SimulatedSensor {
    /// `period` is the time one revolution takes; the A1 spins at roughly 5.5 Hz.
    pub fn new(period: Duration) -> SimulatedSensor {
        SimulatedSensor {
            period,
            mode: None,
            released: false,
            revolution_index: 0,
            next_due: Instant::now(),
        }
    }

    fn points_per_revolution(mode: ScanMode) -> usize {
        match mode {
            ScanMode::Standard => 360,
            ScanMode::Express => 720,
        }
    }

    fn revolution(&self, mode: ScanMode) -> Revolution {
        let n = SimulatedSensor::points_per_revolution(mode);
        let step = 360. / n as f32;
        // start angle drifts from one revolution to the next, as on the device
        let offset = (self.revolution_index % 7) as f32 * 0.1;
        (0..n)
            .map(|i| {
                let angle = (offset + i as f32 * step) % 360.;
                let distance = if i % DROPOUT_EVERY == DROPOUT_EVERY - 1 {
                    0.
                } else {
                    wall_distance(angle)
                };
                let quality = mode
                    .reports_quality()
                    .then(|| if distance > 0. { MAX_QUALITY - (i % 4) as u8 } else { 0 });
                Measurement::new(quality, angle, distance)
            })
            .collect()
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        SimulatedSensor::new(Duration::from_millis(180))
    }
}

fn wall_distance(angle_deg: f32) -> f32 {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let to_side = if sin.abs() > f32::EPSILON {
        ROOM_HALF_WIDTH_MM / sin.abs()
    } else {
        f32::INFINITY
    };
    let to_front = if cos.abs() > f32::EPSILON {
        ROOM_HALF_DEPTH_MM / cos.abs()
    } else {
        f32::INFINITY
    };
    to_side.min(to_front)
}

impl Sensor for SimulatedSensor {
    fn start(&mut self, mode: ScanMode) -> Result<(), SensorError> {
        if self.released {
            return Err(SensorError::Released);
        }
        self.mode = Some(mode);
        self.next_due = Instant::now() + self.period;
        log::info!("Simulated sensor scanning in {mode} mode");
        Ok(())
    }

    fn next_revolution(&mut self, timeout: Duration) -> Result<Revolution, SensorError> {
        if self.released {
            return Err(SensorError::Released);
        }
        let mode = self.mode.ok_or(SensorError::NotStarted)?;
        let wait = self.next_due.saturating_duration_since(Instant::now());
        if wait > timeout {
            std::thread::sleep(timeout);
            return Err(RplidarError::Timeout.into());
        }
        std::thread::sleep(wait);
        self.next_due += self.period;

        let revolution = self.revolution(mode);
        self.revolution_index += 1;
        Ok(revolution)
    }

    fn stop(&mut self) -> Result<(), SensorError> {
        if self.released {
            return Err(SensorError::Released);
        }
        if self.mode.take().is_some() {
            log::info!("Simulated sensor stopped");
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), SensorError> {
        if self.released {
            return Err(SensorError::Released);
        }
        self.mode = None;
        self.released = true;
        Ok(())
    }
}
