//! Wire format shared by the server and the client.
//!
//! After the mode handshake the server sends one frame per revolution:
//!
//! ```text
//! u32_be(payload_len) || payload
//! ```
//!
//! and the payload follows schema version 1:
//!
//! ```text
//! offset size  field
//! 0      2     magic b"LR"
//! 2      1     schema version
//! 3      4     measurement count, u32 big-endian
//! 7      ...   records
//!
//! record:
//!        1     quality tag: 0 = absent, 1 = present
//!        0|1   quality, 0..=15 (tag = 1 only)
//!        4     angle in degrees, f32 big-endian
//!        4     distance in millimeters, f32 big-endian
//! ```

use crate::error::{ClientError, WireError};
use lidar_data::{Measurement, Revolution, MAX_QUALITY};
use std::fmt;
use std::io::{self, Read, Write};

pub const MAGIC: [u8; 2] = *b"LR";
pub const SCHEMA_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 7;
pub const PREFIX_LEN: usize = 4;
pub const DEFAULT_MIN_FRAME_LEN: u32 = 100;
pub const DEFAULT_MAX_FRAME_LEN: u32 = 50_000;

const TAG_ABSENT: u8 = 0;
const TAG_PRESENT: u8 = 1;
const VALUE_LEN: usize = 4;

/// Accepted payload lengths, inclusive on both ends. A length prefix outside
/// the bounds is rejected before any payload byte is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameBounds {
    pub min: u32,
    pub max: u32,
}

impl FrameBounds {
    pub fn new(min: u32, max: u32) -> FrameBounds {
        FrameBounds { min, max }
    }

    pub fn contains(&self, length: u32) -> bool {
        (self.min..=self.max).contains(&length)
    }
}

impl Default for FrameBounds {
    fn default() -> Self {
        FrameBounds::new(DEFAULT_MIN_FRAME_LEN, DEFAULT_MAX_FRAME_LEN)
    }
}

impl fmt::Display for FrameBounds {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

fn record_len(measurement: &Measurement) -> usize {
    let quality_len = if measurement.quality.is_some() { 1 } else { 0 };
    1 + quality_len + 2 * VALUE_LEN
}

/// Size in bytes of the encoded payload of `revolution`.
pub fn payload_len(revolution: &Revolution) -> usize {
    HEADER_LEN + revolution.iter().map(record_len).sum::<usize>()
}

fn validate(measurement: &Measurement) -> Result<(), WireError> {
    if let Some(quality) = measurement.quality {
        if quality > MAX_QUALITY {
            return Err(WireError::QualityOutOfRange(quality));
        }
    }
    if !measurement.angle.is_finite() {
        return Err(WireError::NonFinite {
            field: "angle",
            value: measurement.angle,
        });
    }
    if !measurement.distance.is_finite() {
        return Err(WireError::NonFinite {
            field: "distance",
            value: measurement.distance,
        });
    }
    if measurement.distance < 0.0 {
        return Err(WireError::NegativeDistance(measurement.distance));
    }
    Ok(())
}

/// Encodes `revolution` as a schema version 1 payload. Measurements the
/// decoder would reject are refused here as well.
pub fn encode_revolution(revolution: &Revolution) -> Result<Vec<u8>, WireError> {
    let count = u32::try_from(revolution.len())
        .map_err(|_| WireError::TooManyMeasurements(revolution.len()))?;

    let mut payload = Vec::with_capacity(payload_len(revolution));
    payload.extend_from_slice(&MAGIC);
    payload.push(SCHEMA_VERSION);
    payload.extend_from_slice(&count.to_be_bytes());
    for measurement in revolution {
        validate(measurement)?;
        match measurement.quality {
            Some(quality) => {
                payload.push(TAG_PRESENT);
                payload.push(quality);
            }
            None => payload.push(TAG_ABSENT),
        }
        payload.extend_from_slice(&measurement.angle.to_be_bytes());
        payload.extend_from_slice(&measurement.distance.to_be_bytes());
    }
    Ok(payload)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let available = self.data.len() - self.pos;
        if available < n {
            return Err(WireError::Truncated {
                needed: self.pos + n,
                available: self.data.len(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, WireError> {
        let b = self.take(VALUE_LEN)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_f32(&mut self) -> Result<f32, WireError> {
        let b = self.take(VALUE_LEN)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

pub fn decode_revolution(payload: &[u8]) -> Result<Revolution, WireError> {
    let mut cursor = Cursor {
        data: payload,
        pos: 0,
    };
    let magic = cursor.take(MAGIC.len())?;
    if magic != MAGIC {
        return Err(WireError::BadMagic([magic[0], magic[1]]));
    }
    let version = cursor.read_u8()?;
    if version != SCHEMA_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let count = cursor.read_u32()? as usize;

    // every record takes at least 9 bytes; do not trust `count` for the allocation
    let capacity = count.min(cursor.remaining() / (1 + 2 * VALUE_LEN));
    let mut revolution = Revolution::with_capacity(capacity);
    for _ in 0..count {
        let quality = match cursor.read_u8()? {
            TAG_ABSENT => None,
            TAG_PRESENT => Some(cursor.read_u8()?),
            tag => return Err(WireError::UnknownQualityTag(tag)),
        };
        let measurement = Measurement::new(quality, cursor.read_f32()?, cursor.read_f32()?);
        validate(&measurement)?;
        revolution.push(measurement);
    }

    match cursor.remaining() {
        0 => Ok(revolution),
        n => Err(WireError::TrailingBytes(n)),
    }
}

/// Big-endian length prefix for a payload of `len` bytes. Fails when the
/// length does not fit a `u32`.
pub fn length_prefix(len: usize) -> io::Result<[u8; PREFIX_LEN]> {
    u32::try_from(len).map(u32::to_be_bytes).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("payload of {len} bytes does not fit a u32 length prefix"),
        )
    })
}

/// Prepends the big-endian length prefix to `payload`.
pub fn frame(payload: &[u8]) -> io::Result<Vec<u8>> {
    let prefix = length_prefix(payload.len())?;
    let mut data = Vec::with_capacity(PREFIX_LEN + payload.len());
    data.extend_from_slice(&prefix);
    data.extend_from_slice(payload);
    Ok(data)
}

/// Writes one complete frame. Prefix and payload go out in a single write
/// call so a reader never sees a prefix without its payload following.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    writer.write_all(&frame(payload)?)?;
    writer.flush()
}

pub(crate) struct PartialRead {
    pub(crate) filled: usize,
    pub(crate) error: ClientError,
}

/// Fills `buf` completely. On failure reports how many bytes were consumed
/// from the stream before the error.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), PartialRead> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(PartialRead {
                    filled,
                    error: ClientError::ConnectionClosed,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(PartialRead {
                    filled,
                    error: ClientError::from_read(e),
                })
            }
        }
    }
    Ok(())
}

/// Reads exactly `n` bytes. A zero-length read means the peer closed the
/// connection and is reported as `ClientError::ConnectionClosed`; a short
/// buffer is never returned.
pub fn recv_exact<R: Read>(reader: &mut R, n: usize) -> Result<Vec<u8>, ClientError> {
    let mut buf = vec![0u8; n];
    read_full(reader, &mut buf).map_err(|partial| partial.error)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Hands out at most `chunk` bytes per read, then reports end of stream.
    struct ChunkedReader {
        data: VecDeque<u8>,
        chunk: usize,
        reads: usize,
    }

    impl ChunkedReader {
        fn new(data: &[u8], chunk: usize) -> ChunkedReader {
            ChunkedReader {
                data: data.iter().copied().collect(),
                chunk,
                reads: 0,
            }
        }
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            let n = buf.len().min(self.chunk).min(self.data.len());
            for (dst, src) in buf.iter_mut().zip(self.data.drain(..n)) {
                *dst = src;
            }
            Ok(n)
        }
    }

    fn sample_revolution() -> Revolution {
        vec![
            Measurement::new(Some(15), 0.0, 1000.0),
            Measurement::new(Some(0), 359.75, 0.0),
            Measurement::new(Some(7), 180.5, 12000.25),
        ]
        .into()
    }

    #[test]
    fn test_round_trip() {
        let revolution = sample_revolution();
        let payload = encode_revolution(&revolution).unwrap();
        assert_eq!(payload.len(), payload_len(&revolution));
        assert_eq!(payload.len(), 7 + 3 * 10);
        assert_eq!(decode_revolution(&payload).unwrap(), revolution);
    }

    #[test]
    fn test_round_trip_empty() {
        let payload = encode_revolution(&Revolution::new()).unwrap();
        assert_eq!(payload, vec![b'L', b'R', 1, 0, 0, 0, 0]);
        assert_eq!(decode_revolution(&payload).unwrap(), Revolution::new());
    }

    #[test]
    fn test_round_trip_without_quality() {
        let revolution: Revolution = vec![
            Measurement::new(None, 12.5, 300.0),
            Measurement::new(None, 13.0, 0.0),
        ]
        .into();
        let payload = encode_revolution(&revolution).unwrap();
        assert_eq!(payload.len(), 7 + 2 * 9);
        let decoded = decode_revolution(&payload).unwrap();
        assert!(decoded.iter().all(|m| m.quality.is_none()));
        assert_eq!(decoded, revolution);
    }

    #[test]
    fn test_encoding_layout() {
        let revolution: Revolution = vec![Measurement::new(Some(3), 1.0, 2.0)].into();
        let payload = encode_revolution(&revolution).unwrap();
        assert_eq!(
            payload,
            vec![
                b'L', b'R', 1, 0, 0, 0, 1, // header
                1, 3, // quality
                0x3F, 0x80, 0x00, 0x00, // 1.0
                0x40, 0x00, 0x00, 0x00, // 2.0
            ]
        );
    }

    #[test]
    fn test_encode_rejects_invalid_measurements() {
        let cases = [
            (Measurement::new(Some(16), 0.0, 1.0), WireError::QualityOutOfRange(16)),
            (Measurement::new(None, 0.0, -1.0), WireError::NegativeDistance(-1.0)),
        ];
        for (measurement, expected) in cases {
            let revolution: Revolution = vec![measurement].into();
            assert_eq!(encode_revolution(&revolution), Err(expected));
        }

        let revolution: Revolution = vec![Measurement::new(None, f32::NAN, 1.0)].into();
        assert!(matches!(
            encode_revolution(&revolution),
            Err(WireError::NonFinite { field: "angle", .. })
        ));
        let revolution: Revolution = vec![Measurement::new(None, 1.0, f32::INFINITY)].into();
        assert!(matches!(
            encode_revolution(&revolution),
            Err(WireError::NonFinite { field: "distance", .. })
        ));
    }

    #[test]
    fn test_decode_rejects_malformed_payloads() {
        let payload = encode_revolution(&sample_revolution()).unwrap();

        let mut bad_magic = payload.clone();
        bad_magic[0] = b'X';
        assert_eq!(
            decode_revolution(&bad_magic),
            Err(WireError::BadMagic([b'X', b'R']))
        );

        let mut bad_version = payload.clone();
        bad_version[2] = 2;
        assert_eq!(
            decode_revolution(&bad_version),
            Err(WireError::UnsupportedVersion(2))
        );

        assert!(matches!(
            decode_revolution(&payload[..payload.len() - 1]),
            Err(WireError::Truncated { .. })
        ));
        assert!(matches!(
            decode_revolution(&payload[..1]),
            Err(WireError::Truncated { .. })
        ));

        let mut bad_tag = payload.clone();
        bad_tag[7] = 2;
        assert_eq!(
            decode_revolution(&bad_tag),
            Err(WireError::UnknownQualityTag(2))
        );

        let mut bad_quality = payload.clone();
        bad_quality[8] = 16;
        assert_eq!(
            decode_revolution(&bad_quality),
            Err(WireError::QualityOutOfRange(16))
        );

        let mut trailing = payload.clone();
        trailing.push(0);
        assert_eq!(decode_revolution(&trailing), Err(WireError::TrailingBytes(1)));
    }

    #[test]
    fn test_decode_rejects_negative_distance() {
        let mut payload = vec![b'L', b'R', 1, 0, 0, 0, 1, 0];
        payload.extend_from_slice(&10f32.to_be_bytes());
        payload.extend_from_slice(&(-5f32).to_be_bytes());
        assert_eq!(
            decode_revolution(&payload),
            Err(WireError::NegativeDistance(-5.0))
        );
    }

    #[test]
    fn test_decode_huge_count_is_truncated() {
        let payload = vec![b'L', b'R', 1, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            decode_revolution(&payload),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn test_frame_prefix() {
        let framed = frame(&[0xAA; 300]).unwrap();
        assert_eq!(&framed[..4], &[0, 0, 0x01, 0x2C]);
        assert_eq!(framed.len(), 304);

        let mut out = Vec::new();
        write_frame(&mut out, &[1, 2, 3]).unwrap();
        assert_eq!(out, vec![0, 0, 0, 3, 1, 2, 3]);
    }

    #[test]
    fn test_length_prefix_limit() {
        assert_eq!(length_prefix(u32::MAX as usize).unwrap(), [0xFF; 4]);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(
            length_prefix(u32::MAX as usize + 1).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_recv_exact_one_byte_chunks() {
        let data: Vec<u8> = (0..=255).collect();
        let mut reader = ChunkedReader::new(&data, 1);
        assert_eq!(recv_exact(&mut reader, 256).unwrap(), data);
        assert_eq!(reader.reads, 256);
    }

    #[test]
    fn test_recv_exact_early_close() {
        let mut reader = ChunkedReader::new(&[1, 2, 3], 2);
        assert!(matches!(
            recv_exact(&mut reader, 4),
            Err(ClientError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_recv_exact_zero_bytes() {
        let mut reader = ChunkedReader::new(&[], 1);
        assert_eq!(recv_exact(&mut reader, 0).unwrap(), Vec::<u8>::new());
        assert_eq!(reader.reads, 0);
    }

    #[test]
    fn test_read_full_reports_consumed_bytes() {
        let mut reader = ChunkedReader::new(&[1, 2, 3], 1);
        let mut buf = [0u8; 8];
        let partial = read_full(&mut reader, &mut buf).err().unwrap();
        assert_eq!(partial.filled, 3);
        assert!(matches!(partial.error, ClientError::ConnectionClosed));
    }

    struct InterruptOnce {
        interrupted: bool,
    }

    impl Read for InterruptOnce {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::ErrorKind::Interrupted.into());
            }
            buf.fill(7);
            Ok(buf.len())
        }
    }

    #[test]
    fn test_recv_exact_retries_interrupted() {
        let mut reader = InterruptOnce { interrupted: false };
        assert_eq!(recv_exact(&mut reader, 3).unwrap(), vec![7, 7, 7]);
    }

    #[test]
    fn test_frame_bounds() {
        let bounds = FrameBounds::default();
        assert!(!bounds.contains(50));
        assert!(bounds.contains(100));
        assert!(bounds.contains(50_000));
        assert!(!bounds.contains(10_000_000));
        assert_eq!(bounds.to_string(), "100..=50000");
    }
}
