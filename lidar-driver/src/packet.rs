use crate::constants::{
    DESCRIPTOR_SIZE, EXPRESS_CAPSULE_SIZE, EXPRESS_SAMPLES_PER_CAPSULE, LIDAR_ANS_SYNC_BYTE,
    LIDAR_CMD_SYNC_BYTE, STANDARD_NODE_SIZE,
};
use crate::error::RplidarError;
use crate::numeric::{to_angle, to_distance, to_quality, to_string, to_u16, xor_checksum};
use lidar_data::Measurement;

/// One decoded sample together with the sensor's "first sample of a new
/// revolution" flag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Sample {
    pub(crate) measurement: Measurement,
    pub(crate) new_scan: bool,
}

pub(crate) fn build_payload_command(command: u8, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(payload.len() + 4);
    data.push(LIDAR_CMD_SYNC_BYTE);
    data.push(command);
    data.push(payload.len() as u8);
    data.extend_from_slice(payload);
    data.push(xor_checksum(&data));
    data
}

pub(crate) fn validate_response_descriptor(
    header: &[u8],
    maybe_response_length: Option<u32>,
    type_code: u8,
) -> Result<(), RplidarError> {
    if header.len() != DESCRIPTOR_SIZE {
        return Err(RplidarError::InvalidDescriptorLength(header.len()));
    }
    if header[0..2] != [LIDAR_CMD_SYNC_BYTE, LIDAR_ANS_SYNC_BYTE] {
        return Err(RplidarError::InvalidMagicNumber(to_string(&header[0..2])));
    }
    if let Some(len) = maybe_response_length {
        let actual = response_length(header);
        if actual != len {
            return Err(RplidarError::InvalidResponseLength(len, actual));
        }
    }
    if header[6] != type_code {
        return Err(RplidarError::InvalidTypeCode(type_code, header[6]));
    }
    Ok(())
}

// 30-bit little-endian length; the top two bits hold the send mode.
fn response_length(header: &[u8]) -> u32 {
    let raw = u32::from_le_bytes([header[2], header[3], header[4], header[5]]);
    raw & 0x3FFF_FFFF
}

/// Decodes a 5-byte standard scan node. Returns `None` when the start flag
/// and its inverse agree or the check bit is cleared, which means the stream
/// is not aligned on a node boundary.
pub(crate) fn parse_standard_node(node: &[u8]) -> Option<Sample> {
    if node.len() < STANDARD_NODE_SIZE {
        return None;
    }
    let new_scan = node[0] & 0x01 == 1;
    let inversed = (node[0] >> 1) & 0x01 == 1;
    if new_scan == inversed || node[1] & 0x01 != 1 {
        return None;
    }
    let measurement = Measurement::new(
        Some(to_quality(node[0])),
        to_angle(node[1], node[2]),
        to_distance(node[3], node[4]),
    );
    Some(Sample {
        measurement,
        new_scan,
    })
}

/// Decoded express (legacy) capsule. Absolute angles of its samples are only
/// known once the start angle of the following capsule has been read.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ExpressCapsule {
    pub(crate) start_angle: f32,
    pub(crate) new_scan: bool,
    pub(crate) distances: [f32; EXPRESS_SAMPLES_PER_CAPSULE],
    pub(crate) angle_offsets: [f32; EXPRESS_SAMPLES_PER_CAPSULE],
}

pub(crate) fn is_capsule_start(b0: u8, b1: u8) -> bool {
    b0 >> 4 == 0xA && b1 >> 4 == 0x5
}

pub(crate) fn parse_express_capsule(capsule: &[u8]) -> Result<ExpressCapsule, RplidarError> {
    if capsule.len() != EXPRESS_CAPSULE_SIZE {
        return Err(RplidarError::InvalidResponseLength(
            EXPRESS_CAPSULE_SIZE as u32,
            capsule.len() as u32,
        ));
    }
    if !is_capsule_start(capsule[0], capsule[1]) {
        return Err(RplidarError::InvalidMagicNumber(to_string(&capsule[0..2])));
    }
    let expected = (capsule[0] & 0x0F) | ((capsule[1] & 0x0F) << 4);
    let calculated = xor_checksum(&capsule[2..]);
    if expected != calculated {
        return Err(RplidarError::ChecksumMismatch(expected, calculated));
    }

    let start_q6 = to_u16(capsule[3] & 0x7F, capsule[2]);
    let mut distances = [0f32; EXPRESS_SAMPLES_PER_CAPSULE];
    let mut angle_offsets = [0f32; EXPRESS_SAMPLES_PER_CAPSULE];
    for cabin in 0..EXPRESS_SAMPLES_PER_CAPSULE / 2 {
        let i = 4 + cabin * 5;
        let c = &capsule[i..i + 5];
        distances[2 * cabin] = cabin_distance(c[0], c[1]);
        angle_offsets[2 * cabin] = cabin_angle_offset(c[4] & 0x0F, c[0]);
        distances[2 * cabin + 1] = cabin_distance(c[2], c[3]);
        angle_offsets[2 * cabin + 1] = cabin_angle_offset(c[4] >> 4, c[2]);
    }

    Ok(ExpressCapsule {
        start_angle: (start_q6 as f32) / 64.,
        new_scan: capsule[3] >> 7 == 1,
        distances,
        angle_offsets,
    })
}

fn cabin_distance(b0: u8, b1: u8) -> f32 {
    (((b0 >> 2) as u16) + ((b1 as u16) << 6)) as f32
}

// Q3 offset; bit 0 of the distance byte is the fifth offset bit, bit 1 the sign.
fn cabin_angle_offset(nibble: u8, distance_byte: u8) -> f32 {
    let magnitude = (nibble + ((distance_byte & 0x01) << 4)) as f32 / 8.;
    if distance_byte & 0x02 == 0 {
        magnitude
    } else {
        -magnitude
    }
}

/// Resolves the samples of `capsule` using the start angle of the capsule
/// that followed it.
pub(crate) fn express_samples(capsule: &ExpressCapsule, next_start_angle: f32) -> Vec<Sample> {
    let diff = (next_start_angle - capsule.start_angle).rem_euclid(360.);
    let step = diff / EXPRESS_SAMPLES_PER_CAPSULE as f32;
    let nominal = |k: usize| capsule.start_angle + step * (k + 1) as f32;
    // the sweep restarts at the first sample past 360 degrees; the last
    // sample lands on the next start angle, so it wraps at the latest
    let wrap_at = (next_start_angle < capsule.start_angle).then(|| {
        (0..EXPRESS_SAMPLES_PER_CAPSULE)
            .position(|k| nominal(k) >= 360.)
            .unwrap_or(EXPRESS_SAMPLES_PER_CAPSULE - 1)
    });
    (0..EXPRESS_SAMPLES_PER_CAPSULE)
        .map(|k| {
            let angle = (nominal(k) - capsule.angle_offsets[k]).rem_euclid(360.);
            Sample {
                measurement: Measurement::new(None, angle, capsule.distances[k]),
                new_scan: wrap_at == Some(k),
            }
        })
        .collect()
}
