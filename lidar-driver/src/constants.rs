pub(crate) const BAUD_RATE: u32 = 115_200;
pub(crate) const DESCRIPTOR_SIZE: usize = 7;
pub(crate) const LIDAR_CMD_SYNC_BYTE: u8 = 0xA5;
pub(crate) const LIDAR_ANS_SYNC_BYTE: u8 = 0x5A;
pub(crate) const LIDAR_CMD_STOP: u8 = 0x25;
pub(crate) const LIDAR_CMD_RESET: u8 = 0x40;
pub(crate) const LIDAR_CMD_SCAN: u8 = 0x20;
pub(crate) const LIDAR_CMD_EXPRESS_SCAN: u8 = 0x82;
pub(crate) const LIDAR_CMD_GET_DEVICE_INFO: u8 = 0x50;
pub(crate) const LIDAR_CMD_GET_DEVICE_HEALTH: u8 = 0x52;
pub(crate) const LIDAR_CMD_SET_MOTOR_PWM: u8 = 0xF0;
pub(crate) const LIDAR_ANS_TYPE_DEVINFO: u8 = 0x04;
pub(crate) const LIDAR_ANS_LENGTH_DEVINFO: u32 = 20;
pub(crate) const LIDAR_ANS_TYPE_DEVHEALTH: u8 = 0x06;
pub(crate) const LIDAR_ANS_LENGTH_DEVHEALTH: u32 = 3;
pub(crate) const LIDAR_ANS_TYPE_MEASUREMENT: u8 = 0x81;
pub(crate) const LIDAR_ANS_LENGTH_MEASUREMENT: u32 = 5;
pub(crate) const LIDAR_ANS_TYPE_EXPRESS: u8 = 0x82;
pub(crate) const LIDAR_ANS_LENGTH_EXPRESS: u32 = 84;
pub(crate) const STANDARD_NODE_SIZE: usize = 5;
pub(crate) const EXPRESS_CAPSULE_SIZE: usize = 84;
pub(crate) const EXPRESS_SAMPLES_PER_CAPSULE: usize = 32;
pub(crate) const DEFAULT_MOTOR_PWM: u16 = 660;
pub(crate) const N_READ_TRIALS: usize = 100;
// Revolutions with this many samples or fewer are partial sweeps
pub(crate) const MIN_REVOLUTION_LEN: usize = 5;
pub(crate) const REVOLUTION_QUEUE_DEPTH: usize = 10;
