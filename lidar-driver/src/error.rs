use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RplidarError {
    #[error("Response descriptor must be always seven bytes. Actually {0} bytes.")]
    InvalidDescriptorLength(usize),
    #[error("Response must start with 0xA5 0x5A. Observed = {0}.")]
    InvalidMagicNumber(String),
    #[error("Expected response length of {0} bytes but found {1} bytes.")]
    InvalidResponseLength(u32, u32),
    #[error("Expected type code {0:#04X} but obtained {1:#04X}.")]
    InvalidTypeCode(u8, u8),
    #[error("Device health error. Error code = {0:#06X}. See the protocol manual for details.")]
    DeviceHealthError(u16),
    #[error("Checksum mismatched. Calculated = {1:02X}, expected = {0:02X}.")]
    ChecksumMismatch(u8, u8),
    #[error("Operation timed out")]
    Timeout,
    #[error("Scan has not been started")]
    NotScanning,
    #[error("Command not allowed while a scan is running")]
    Scanning,
    #[error("Driver threads are no longer running")]
    Disconnected,
    #[error(transparent)]
    Serial(#[from] serialport::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
