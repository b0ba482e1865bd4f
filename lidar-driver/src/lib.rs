//! Serial driver for the RPLIDAR A1 family.
//!
//! The driver talks to the sensor over a serial port, decodes standard and
//! express scan data on background threads and hands out complete
//! revolutions.
//!
//! ```no_run
//! use lidar_data::ScanMode;
//! use lidar_driver::Rplidar;
//! use std::time::Duration;
//!
//! let mut lidar = Rplidar::open("/dev/ttyUSB0").unwrap();
//! lidar.start(ScanMode::Standard).unwrap();
//! for _ in 0..10 {
//!     let revolution = lidar.next_revolution(Duration::from_secs(2)).unwrap();
//!     println!("{} points", revolution.len());
//! }
//! lidar.release().unwrap();
//! ```

mod constants;
mod decoder;
mod driver_threads;
mod error;
mod numeric;
mod packet;
mod serial;
mod time;

use crate::constants::{
    BAUD_RATE, DESCRIPTOR_SIZE, LIDAR_ANS_LENGTH_DEVHEALTH, LIDAR_ANS_LENGTH_DEVINFO,
    LIDAR_ANS_TYPE_DEVHEALTH, LIDAR_ANS_TYPE_DEVINFO, LIDAR_CMD_GET_DEVICE_HEALTH,
    LIDAR_CMD_GET_DEVICE_INFO, LIDAR_CMD_RESET, REVOLUTION_QUEUE_DEPTH,
};
use crate::decoder::Decoder;
use crate::driver_threads::{parse_revolutions, read_device_signal};
pub use crate::driver_threads::DriverThreads;
pub use crate::error::RplidarError;
use crate::packet::validate_response_descriptor;
use crate::serial::{
    flush, read, send_command, start_motor, start_scan, stop_motor, stop_scan_and_flush,
};
use crate::time::sleep_ms;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use lidar_data::{DeviceInfo, HealthStatus, Revolution, ScanMode};
use serialport::SerialPort;
use std::sync::mpsc;
use std::time::Duration;

/// Queries the health of the device. A warning is returned as
/// `HealthStatus::Warning`, an error state as `RplidarError::DeviceHealthError`.
pub fn check_device_health(port: &mut Box<dyn SerialPort>) -> Result<HealthStatus, RplidarError> {
    send_command(port, LIDAR_CMD_GET_DEVICE_HEALTH)?;
    let header = read(port, DESCRIPTOR_SIZE)?;
    validate_response_descriptor(
        &header,
        Some(LIDAR_ANS_LENGTH_DEVHEALTH),
        LIDAR_ANS_TYPE_DEVHEALTH,
    )?;
    let health = read(port, LIDAR_ANS_LENGTH_DEVHEALTH as usize)?;
    let error_code = u16::from_le_bytes([health[1], health[2]]);

    match HealthStatus::from_raw(health[0], error_code) {
        HealthStatus::Error(code) => Err(RplidarError::DeviceHealthError(code)),
        status => Ok(status),
    }
}

pub fn get_device_info(port: &mut Box<dyn SerialPort>) -> Result<DeviceInfo, RplidarError> {
    send_command(port, LIDAR_CMD_GET_DEVICE_INFO)?;
    let header = read(port, DESCRIPTOR_SIZE)?;
    validate_response_descriptor(
        &header,
        Some(LIDAR_ANS_LENGTH_DEVINFO),
        LIDAR_ANS_TYPE_DEVINFO,
    )?;
    let info = read(port, LIDAR_ANS_LENGTH_DEVINFO as usize)?;
    let mut serial_number = [0u8; 16];
    serial_number.copy_from_slice(&info[4..20]);
    Ok(DeviceInfo {
        model: info[0],
        firmware_minor_version: info[1],
        firmware_major_version: info[2],
        hardware_version: info[3],
        serial_number,
    })
}

/// Opens `port_name` with the settings the sensor expects.
pub fn open_port(port_name: &str) -> Result<Box<dyn SerialPort>, RplidarError> {
    let port = serialport::new(port_name, BAUD_RATE)
        .timeout(Duration::from_millis(10))
        .open()?;
    Ok(port)
}

/// Function to launch a scan.
/// # Arguments
///
/// * `port` - Port of an idle device. A clone of it is moved to the reader thread.
/// * `mode` - Scan mode requested from the device.
///
/// Revolutions arrive on the returned receiver until the threads are dropped.
pub fn run_driver(
    port: &mut Box<dyn SerialPort>,
    mode: ScanMode,
) -> Result<(DriverThreads, Receiver<Revolution>), RplidarError> {
    start_motor(port)?;
    start_scan(port, mode)?;
    let reader_port = port.try_clone()?;

    let (reader_terminator_tx, reader_terminator_rx) = bounded(10);
    let (parser_terminator_tx, parser_terminator_rx) = bounded(10);
    let (raw_tx, raw_rx) = mpsc::sync_channel::<Vec<u8>>(200);

    let reader_thread = Some(std::thread::spawn(move || {
        read_device_signal(reader_port, raw_tx, reader_terminator_rx);
    }));

    let (revolution_tx, revolution_rx) = bounded::<Revolution>(REVOLUTION_QUEUE_DEPTH);
    let overflow_rx = revolution_rx.clone();
    let decoder = Decoder::for_mode(mode);
    let parser_thread = Some(std::thread::spawn(move || {
        parse_revolutions(raw_rx, parser_terminator_rx, decoder, revolution_tx, overflow_rx);
    }));

    let driver_threads = DriverThreads {
        reader_thread,
        parser_thread,
        reader_terminator_tx,
        parser_terminator_tx,
    };

    Ok((driver_threads, revolution_rx))
}

struct ActiveScan {
    mode: ScanMode,
    threads: DriverThreads,
    revolution_rx: Receiver<Revolution>,
}

/// Owned handle on one sensor.
pub struct Rplidar {
    port: Box<dyn SerialPort>,
    scan: Option<ActiveScan>,
}

impl Rplidar {
    pub fn open(port_name: &str) -> Result<Rplidar, RplidarError> {
        Rplidar::from_port(open_port(port_name)?)
    }

    /// Wraps an already opened port. Any scan left running by a previous
    /// owner is stopped and pending input is discarded.
    pub fn from_port(mut port: Box<dyn SerialPort>) -> Result<Rplidar, RplidarError> {
        stop_scan_and_flush(&mut port)?;
        Ok(Rplidar { port, scan: None })
    }

    pub fn device_info(&mut self) -> Result<DeviceInfo, RplidarError> {
        self.ensure_idle()?;
        get_device_info(&mut self.port)
    }

    pub fn health(&mut self) -> Result<HealthStatus, RplidarError> {
        self.ensure_idle()?;
        check_device_health(&mut self.port)
    }

    /// Reboots the sensor core and discards its boot banner.
    pub fn reset(&mut self) -> Result<(), RplidarError> {
        self.stop()?;
        send_command(&mut self.port, LIDAR_CMD_RESET)?;
        sleep_ms(10);
        flush(&mut self.port)?;
        Ok(())
    }

    /// Spins the motor up and starts scanning in `mode`. A scan already
    /// running is stopped first.
    pub fn start(&mut self, mode: ScanMode) -> Result<(), RplidarError> {
        self.stop()?;
        let (threads, revolution_rx) = run_driver(&mut self.port, mode)?;
        log::info!("Sensor scanning in {mode} mode");
        self.scan = Some(ActiveScan {
            mode,
            threads,
            revolution_rx,
        });
        Ok(())
    }

    /// Blocks until the next complete revolution, at most `timeout`.
    pub fn next_revolution(&self, timeout: Duration) -> Result<Revolution, RplidarError> {
        let scan = self.scan.as_ref().ok_or(RplidarError::NotScanning)?;
        scan.revolution_rx
            .recv_timeout(timeout)
            .map_err(|e| match e {
                RecvTimeoutError::Timeout => RplidarError::Timeout,
                RecvTimeoutError::Disconnected => RplidarError::Disconnected,
            })
    }

    pub fn mode(&self) -> Option<ScanMode> {
        self.scan.as_ref().map(|scan| scan.mode)
    }

    pub fn is_scanning(&self) -> bool {
        self.scan.is_some()
    }

    /// Stops the scan and the motor. Does nothing when idle.
    pub fn stop(&mut self) -> Result<(), RplidarError> {
        let Some(mut scan) = self.scan.take() else {
            return Ok(());
        };
        scan.threads.join();
        stop_motor(&mut self.port)?;
        log::info!("Sensor stopped");
        Ok(())
    }

    /// Stops the sensor and closes the port.
    pub fn release(mut self) -> Result<(), RplidarError> {
        self.stop()
    }

    fn ensure_idle(&self) -> Result<(), RplidarError> {
        match self.scan {
            Some(_) => Err(RplidarError::Scanning),
            None => Ok(()),
        }
    }
}

impl Drop for Rplidar {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Failed to stop the sensor: {e}");
        }
    }
}
