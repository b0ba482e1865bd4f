use crate::decoder::{Decoder, RevolutionBuilder};
use crate::serial::{get_n_read, read, stop_scan_and_flush};
use crate::time::sleep_ms;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use lidar_data::Revolution;
use serialport::SerialPort;
use std::collections::VecDeque;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Reader and parser threads of a running scan. Dropping it terminates and
/// joins both threads, which also stops the scan on the device.
pub struct DriverThreads {
    pub(crate) reader_terminator_tx: Sender<bool>,
    pub(crate) parser_terminator_tx: Sender<bool>,
    pub(crate) reader_thread: Option<JoinHandle<()>>,
    pub(crate) parser_thread: Option<JoinHandle<()>>,
}

pub(crate) fn read_device_signal(
    mut port: Box<dyn SerialPort>,
    raw_tx: mpsc::SyncSender<Vec<u8>>,
    reader_terminator_rx: Receiver<bool>,
) {
    loop {
        if do_terminate(&reader_terminator_rx) {
            if let Err(e) = stop_scan_and_flush(&mut port) {
                log::warn!("Failed to stop the scan: {e}");
            }
            return;
        }

        let n_read: usize = get_n_read(&mut port).unwrap_or(0);
        if n_read == 0 {
            sleep_ms(1);
            continue;
        }

        if let Ok(signal) = read(&mut port, n_read) {
            if raw_tx.send(signal).is_err() {
                // parser is gone, nobody left to feed
                return;
            }
        }
    }
}

pub(crate) fn parse_revolutions(
    raw_rx: mpsc::Receiver<Vec<u8>>,
    parser_terminator_rx: Receiver<bool>,
    mut decoder: Decoder,
    revolution_tx: Sender<Revolution>,
    overflow_rx: Receiver<Revolution>,
) {
    let mut buffer = VecDeque::<u8>::new();
    let mut builder = RevolutionBuilder::new();
    while !do_terminate(&parser_terminator_rx) {
        match raw_rx.recv_timeout(Duration::from_millis(10)) {
            Ok(data) => buffer.extend(data),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }

        for sample in decoder.drain(&mut buffer) {
            let Some(revolution) = builder.push(sample) else {
                continue;
            };
            if !publish(&revolution_tx, &overflow_rx, revolution) {
                return;
            }
        }
    }
}

/// Sends `revolution` without blocking. When the consumer is behind, the
/// oldest pending revolution is dropped to make room. Returns `false` once
/// every receiver is gone.
fn publish(tx: &Sender<Revolution>, overflow_rx: &Receiver<Revolution>, revolution: Revolution) -> bool {
    match tx.try_send(revolution) {
        Ok(()) => true,
        Err(TrySendError::Full(revolution)) => {
            if overflow_rx.try_recv().is_ok() {
                log::debug!("Revolution queue full, dropped the oldest revolution");
            }
            !matches!(tx.try_send(revolution), Err(TrySendError::Disconnected(_)))
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

pub(crate) fn do_terminate(terminator_rx: &Receiver<bool>) -> bool {
    terminator_rx.try_recv().unwrap_or(false)
}

impl DriverThreads {
    /// Terminates and joins both threads. Called automatically on drop.
    pub fn join(&mut self) {
        // a send fails only when the thread has already exited
        let _ = self.reader_terminator_tx.send(true);
        let _ = self.parser_terminator_tx.send(true);

        if let Some(thread) = self.reader_thread.take() {
            if thread.join().is_err() {
                log::error!("Serial reader thread panicked");
            }
        }
        if let Some(thread) = self.parser_thread.take() {
            if thread.join().is_err() {
                log::error!("Revolution parser thread panicked");
            }
        }
    }
}

impl Drop for DriverThreads {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use lidar_data::Measurement;

    fn revolution(n: usize) -> Revolution {
        (0..n)
            .map(|i| Measurement::new(None, i as f32, 100.))
            .collect()
    }

    #[test]
    fn test_publish_drops_oldest_when_full() {
        let (tx, rx) = bounded(2);
        assert!(publish(&tx, &rx, revolution(1)));
        assert!(publish(&tx, &rx, revolution(2)));
        assert!(publish(&tx, &rx, revolution(3)));

        assert_eq!(rx.try_recv().unwrap().len(), 2);
        assert_eq!(rx.try_recv().unwrap().len(), 3);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_do_terminate() {
        let (tx, rx) = bounded(1);
        assert!(!do_terminate(&rx));
        tx.send(true).unwrap();
        assert!(do_terminate(&rx));
    }
}
