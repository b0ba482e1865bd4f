use crate::constants::{
    DEFAULT_MOTOR_PWM, DESCRIPTOR_SIZE, LIDAR_ANS_LENGTH_EXPRESS, LIDAR_ANS_LENGTH_MEASUREMENT,
    LIDAR_ANS_TYPE_EXPRESS, LIDAR_ANS_TYPE_MEASUREMENT, LIDAR_CMD_EXPRESS_SCAN, LIDAR_CMD_SCAN,
    LIDAR_CMD_SET_MOTOR_PWM, LIDAR_CMD_STOP, LIDAR_CMD_SYNC_BYTE, N_READ_TRIALS,
};
use crate::error::RplidarError;
use crate::packet::{build_payload_command, validate_response_descriptor};
use crate::time::sleep_ms;
use lidar_data::ScanMode;
use serialport::SerialPort;
use std::io::{Read, Write};

pub(crate) fn start_scan(port: &mut Box<dyn SerialPort>, mode: ScanMode) -> Result<(), RplidarError> {
    match mode {
        ScanMode::Standard => {
            send_command(port, LIDAR_CMD_SCAN)?;
            let header = read(port, DESCRIPTOR_SIZE)?;
            validate_response_descriptor(
                &header,
                Some(LIDAR_ANS_LENGTH_MEASUREMENT),
                LIDAR_ANS_TYPE_MEASUREMENT,
            )?;
        }
        ScanMode::Express => {
            // legacy express mode: working mode 0, no flags, no parameter
            send_payload_command(port, LIDAR_CMD_EXPRESS_SCAN, &[0; 5])?;
            let header = read(port, DESCRIPTOR_SIZE)?;
            validate_response_descriptor(
                &header,
                Some(LIDAR_ANS_LENGTH_EXPRESS),
                LIDAR_ANS_TYPE_EXPRESS,
            )?;
        }
    }
    Ok(())
}

fn stop_scan(port: &mut Box<dyn SerialPort>) -> Result<(), RplidarError> {
    send_command(port, LIDAR_CMD_STOP)?;
    Ok(())
}

pub(crate) fn stop_scan_and_flush(port: &mut Box<dyn SerialPort>) -> Result<(), RplidarError> {
    stop_scan(port)?;
    // the device needs at least 1ms before it accepts the next command
    sleep_ms(2);
    flush(port)?;
    Ok(())
}

pub(crate) fn start_motor(port: &mut Box<dyn SerialPort>) -> Result<(), RplidarError> {
    // A1 adapter boards drive the motor from DTR (active low)
    if let Err(e) = port.write_data_terminal_ready(false) {
        log::warn!("Cannot clear DTR, motor may not spin: {e}");
    }
    set_motor_pwm(port, DEFAULT_MOTOR_PWM)?;
    Ok(())
}

pub(crate) fn stop_motor(port: &mut Box<dyn SerialPort>) -> Result<(), RplidarError> {
    set_motor_pwm(port, 0)?;
    if let Err(e) = port.write_data_terminal_ready(true) {
        log::warn!("Cannot set DTR, motor may keep spinning: {e}");
    }
    Ok(())
}

fn set_motor_pwm(port: &mut Box<dyn SerialPort>, pwm: u16) -> std::io::Result<()> {
    send_payload_command(port, LIDAR_CMD_SET_MOTOR_PWM, &pwm.to_le_bytes())
}

pub(crate) fn send_command(port: &mut Box<dyn SerialPort>, command: u8) -> std::io::Result<()> {
    let data: [u8; 2] = [LIDAR_CMD_SYNC_BYTE, command];
    port.write_all(&data)
}

pub(crate) fn send_payload_command(
    port: &mut Box<dyn SerialPort>,
    command: u8,
    payload: &[u8],
) -> std::io::Result<()> {
    port.write_all(&build_payload_command(command, payload))
}

pub(crate) fn get_n_read(port: &mut Box<dyn SerialPort>) -> Result<usize, RplidarError> {
    let n_u32: u32 = port.bytes_to_read()?;
    Ok(n_u32.try_into().unwrap_or(0))
}

pub(crate) fn flush(port: &mut Box<dyn SerialPort>) -> Result<(), RplidarError> {
    let n_read: usize = get_n_read(port).unwrap_or(0);
    if n_read == 0 {
        return Ok(());
    }
    let mut packet: Vec<u8> = vec![0; n_read];
    port.read_exact(packet.as_mut_slice())?;
    Ok(())
}

pub(crate) fn read(
    port: &mut Box<dyn SerialPort>,
    data_size: usize,
) -> Result<Vec<u8>, RplidarError> {
    if data_size == 0 {
        return Ok(Vec::new());
    }
    for _ in 0..N_READ_TRIALS {
        let n_read: usize = get_n_read(port)?;

        if n_read < data_size {
            sleep_ms(10);
            continue;
        }

        let mut packet: Vec<u8> = vec![0; data_size];
        port.read_exact(packet.as_mut_slice())?;
        return Ok(packet);
    }
    Err(RplidarError::Timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::TTYPort;
    use std::io::{Read, Write};

    #[test]
    fn test_start_standard_scan() {
        let (mut master, slave) = TTYPort::pair().expect("Unable to create ptty pair");
        master
            .write_all(&[0xA5, 0x5A, 0x05, 0x00, 0x00, 0x40, 0x81])
            .unwrap();

        let mut slave_ptr = Box::new(slave) as Box<dyn SerialPort>;
        start_scan(&mut slave_ptr, ScanMode::Standard).unwrap();

        sleep_ms(10);

        let mut buf = [0u8; 2];
        master.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xA5, 0x20]);
    }

    #[test]
    fn test_start_express_scan() {
        let (mut master, slave) = TTYPort::pair().expect("Unable to create ptty pair");
        master
            .write_all(&[0xA5, 0x5A, 0x54, 0x00, 0x00, 0x40, 0x82])
            .unwrap();

        let mut slave_ptr = Box::new(slave) as Box<dyn SerialPort>;
        start_scan(&mut slave_ptr, ScanMode::Express).unwrap();

        sleep_ms(10);

        let mut buf = [0u8; 9];
        master.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xA5, 0x82, 0x05, 0, 0, 0, 0, 0, 0x22]);
    }

    #[test]
    fn test_start_scan_rejects_wrong_answer_type() {
        let (mut master, slave) = TTYPort::pair().expect("Unable to create ptty pair");
        master
            .write_all(&[0xA5, 0x5A, 0x05, 0x00, 0x00, 0x40, 0x81])
            .unwrap();

        let mut slave_ptr = Box::new(slave) as Box<dyn SerialPort>;
        assert!(matches!(
            start_scan(&mut slave_ptr, ScanMode::Express),
            Err(RplidarError::InvalidResponseLength(84, 5))
        ));
    }

    #[test]
    fn test_stop_scan() {
        let (master, mut slave) = TTYPort::pair().expect("Unable to create ptty pair");
        let mut master_ptr = Box::new(master) as Box<dyn SerialPort>;
        stop_scan(&mut master_ptr).unwrap();

        sleep_ms(10);

        let mut buf = [0u8; 2];
        slave.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xA5, 0x25]);
    }

    #[test]
    fn test_start_motor_sets_pwm() {
        let (master, mut slave) = TTYPort::pair().expect("Unable to create ptty pair");
        let mut master_ptr = Box::new(master) as Box<dyn SerialPort>;
        start_motor(&mut master_ptr).unwrap();

        sleep_ms(10);

        let mut buf = [0u8; 6];
        slave.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xA5, 0xF0, 0x02, 0x94, 0x02, 0xC1]);
    }

    #[test]
    fn test_flush() {
        let (mut master, slave) = TTYPort::pair().expect("Unable to create ptty pair");
        master
            .write_all(&[0xA5, 0x5A, 0x03, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00])
            .unwrap();

        let mut slave_ptr = Box::new(slave) as Box<dyn SerialPort>;

        sleep_ms(10);

        assert_eq!(slave_ptr.bytes_to_read().unwrap(), 10);
        flush(&mut slave_ptr).unwrap();
        assert_eq!(slave_ptr.bytes_to_read().unwrap(), 0);

        // when zero bytes to read
        flush(&mut slave_ptr).unwrap();
        assert_eq!(slave_ptr.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn test_read_times_out() {
        let (_master, slave) = TTYPort::pair().expect("Unable to create ptty pair");
        let mut slave_ptr = Box::new(slave) as Box<dyn SerialPort>;
        assert!(matches!(read(&mut slave_ptr, 4), Err(RplidarError::Timeout)));
    }
}
