use crate::constants::{EXPRESS_CAPSULE_SIZE, MIN_REVOLUTION_LEN, STANDARD_NODE_SIZE};
use crate::packet::{
    express_samples, is_capsule_start, parse_express_capsule, parse_standard_node, ExpressCapsule,
    Sample,
};
use lidar_data::{Revolution, ScanMode};
use std::collections::VecDeque;

/// Turns the raw byte stream of a running scan into samples.
pub(crate) enum Decoder {
    Standard,
    Express { previous: Option<ExpressCapsule> },
}

impl Decoder {
    pub(crate) fn for_mode(mode: ScanMode) -> Decoder {
        match mode {
            ScanMode::Standard => Decoder::Standard,
            ScanMode::Express => Decoder::Express { previous: None },
        }
    }

    /// Consumes every complete node or capsule at the front of `buffer`.
    /// Bytes that cannot start a packet are skipped one at a time until the
    /// stream is aligned again. Incomplete trailing bytes stay in `buffer`.
    pub(crate) fn drain(&mut self, buffer: &mut VecDeque<u8>) -> Vec<Sample> {
        match self {
            Decoder::Standard => drain_standard(buffer),
            Decoder::Express { previous } => drain_express(buffer, previous),
        }
    }
}

fn drain_standard(buffer: &mut VecDeque<u8>) -> Vec<Sample> {
    let mut samples = Vec::new();
    while buffer.len() >= STANDARD_NODE_SIZE {
        let node: Vec<u8> = buffer.iter().take(STANDARD_NODE_SIZE).copied().collect();
        match parse_standard_node(&node) {
            Some(sample) => {
                buffer.drain(..STANDARD_NODE_SIZE);
                samples.push(sample);
            }
            None => {
                buffer.pop_front();
            }
        }
    }
    samples
}

fn drain_express(buffer: &mut VecDeque<u8>, previous: &mut Option<ExpressCapsule>) -> Vec<Sample> {
    let mut samples = Vec::new();
    while buffer.len() >= EXPRESS_CAPSULE_SIZE {
        if !is_capsule_start(buffer[0], buffer[1]) {
            buffer.pop_front();
            continue;
        }
        let raw: Vec<u8> = buffer.iter().take(EXPRESS_CAPSULE_SIZE).copied().collect();
        let capsule = match parse_express_capsule(&raw) {
            Ok(capsule) => capsule,
            Err(e) => {
                log::debug!("Dropping express capsule: {e}");
                buffer.pop_front();
                continue;
            }
        };
        buffer.drain(..EXPRESS_CAPSULE_SIZE);

        if capsule.new_scan {
            // first capsule after the scan request; nothing to pair it with
            *previous = None;
        }
        if let Some(prev) = previous.as_ref() {
            samples.extend(express_samples(prev, capsule.start_angle));
        }
        *previous = Some(capsule);
    }
    samples
}

/// Groups samples into revolutions at each new-scan flag.
#[derive(Default)]
pub(crate) struct RevolutionBuilder {
    current: Revolution,
    started: bool,
}

impl RevolutionBuilder {
    pub(crate) fn new() -> RevolutionBuilder {
        RevolutionBuilder::default()
    }

    /// Returns the finished revolution when `sample` opens a new one.
    pub(crate) fn push(&mut self, sample: Sample) -> Option<Revolution> {
        let mut finished = None;
        if sample.new_scan {
            let revolution = std::mem::take(&mut self.current);
            if self.started && revolution.len() > MIN_REVOLUTION_LEN {
                finished = Some(revolution);
            }
            self.started = true;
        }
        if self.started && sample.measurement.is_valid() {
            self.current.push(sample.measurement);
        }
        finished
    }
}
