//! Streams LiDAR revolutions over TCP.
//!
//! A [`Server`] owns the sensor and serves one client at a time. Each client
//! first sends a scan mode token, then receives one length-prefixed frame per
//! revolution (see [`wire`]). [`LidarClient`] is the receiving side.

pub mod client;
pub mod config;
pub mod error;
pub mod handshake;
pub mod retry;
pub mod sensor;
pub mod server;
pub mod wire;

pub use client::{ClientSession, ClientState, FramePhase, LidarClient};
pub use config::{ClientConfig, ServerConfig};
pub use error::{ClientError, ConfigError, ErrorKind, SensorError, ServerError, WireError};
pub use retry::{retry, RetryPolicy, Sleeper, ThreadSleeper};
pub use sensor::{RplidarSensor, Sensor, SimulatedSensor};
pub use server::{Server, ServerState, SessionEnd, SessionReport, ShutdownHandle};
pub use wire::{decode_revolution, encode_revolution, recv_exact, FrameBounds};

pub use lidar_data::{Measurement, Revolution, ScanMode};
