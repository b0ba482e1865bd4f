use lidar_data::ScanMode;
use std::io::{self, Read};
use std::net::TcpStream;
use std::time::Duration;

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Longest token the server reads. `STANDARD` is the longest valid one.
pub const DEFAULT_HANDSHAKE_BUDGET: usize = 10;

/// What the server made of the client's first bytes.
#[derive(Debug)]
pub enum Negotiation {
    /// A known token was received.
    Requested(ScanMode),
    /// Bytes arrived but are not a known token.
    Unknown(String),
    /// Nothing usable arrived: timeout, closed socket or read error.
    Missing(io::Error),
}

impl Negotiation {
    /// Every outcome resolves to a mode; the handshake never fails a
    /// connection.
    pub fn mode(&self) -> ScanMode {
        match self {
            Negotiation::Requested(mode) => *mode,
            Negotiation::Unknown(_) | Negotiation::Missing(_) => ScanMode::default(),
        }
    }
}

/// Performs a single read of at most `budget` bytes and interprets it as a
/// mode token.
pub fn read_mode_token<R: Read>(reader: &mut R, budget: usize) -> Negotiation {
    let mut buf = vec![0u8; budget];
    let n = loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                return Negotiation::Missing(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "client closed before sending a mode",
                ))
            }
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Negotiation::Missing(e),
        }
    };

    let token = match std::str::from_utf8(&buf[..n]) {
        Ok(token) => token,
        Err(e) => return Negotiation::Missing(io::Error::new(io::ErrorKind::InvalidData, e)),
    };
    match token.parse::<ScanMode>() {
        Ok(mode) => Negotiation::Requested(mode),
        Err(_) => Negotiation::Unknown(token.trim().to_string()),
    }
}

/// Reads the client's mode token with a bounded wait, then puts the stream
/// back into blocking reads.
pub fn negotiate_mode(stream: &mut TcpStream, timeout: Duration, budget: usize) -> Negotiation {
    if let Err(e) = stream.set_read_timeout(Some(timeout)) {
        return Negotiation::Missing(e);
    }
    let negotiation = read_mode_token(stream, budget);
    if let Err(e) = stream.set_read_timeout(None) {
        log::debug!("Cannot clear the read timeout: {e}");
    }
    negotiation
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn negotiate(bytes: &[u8]) -> ScanMode {
        read_mode_token(&mut Cursor::new(bytes), DEFAULT_HANDSHAKE_BUDGET).mode()
    }

    #[test]
    fn test_mode_table() {
        let table: [(&[u8], ScanMode); 8] = [
            (b"standard", ScanMode::Standard),
            (b"STANDARD", ScanMode::Standard),
            (b"normal", ScanMode::Standard),
            (b"NORMAL", ScanMode::Standard),
            (b"express", ScanMode::Express),
            (b"EXPRESS", ScanMode::Express),
            (b"", ScanMode::Express),
            (b"bogus", ScanMode::Express),
        ];
        for (bytes, expected) in table {
            assert_eq!(negotiate(bytes), expected, "{:?}", String::from_utf8_lossy(bytes));
        }
    }

    #[test]
    fn test_outcomes() {
        let budget = DEFAULT_HANDSHAKE_BUDGET;
        assert!(matches!(
            read_mode_token(&mut Cursor::new(b" normal\n"), budget),
            Negotiation::Requested(ScanMode::Standard)
        ));
        assert!(matches!(
            read_mode_token(&mut Cursor::new(b"bogus"), budget),
            Negotiation::Unknown(token) if token == "bogus"
        ));
        assert!(matches!(
            read_mode_token(&mut Cursor::new(b""), budget),
            Negotiation::Missing(_)
        ));
        assert!(matches!(
            read_mode_token(&mut Cursor::new(&[0xFF, 0xFE][..]), budget),
            Negotiation::Missing(_)
        ));
    }

    #[test]
    fn test_reads_at_most_budget() {
        let mut reader = Cursor::new(b"STANDARDXXXXXXXX".to_vec());
        let negotiation = read_mode_token(&mut reader, DEFAULT_HANDSHAKE_BUDGET);
        assert!(matches!(negotiation, Negotiation::Unknown(token) if token == "STANDARDXX"));
        assert_eq!(reader.position(), 10);
    }

    struct TimingOut;

    impl Read for TimingOut {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }
    }

    #[test]
    fn test_timeout_defaults_to_express() {
        let negotiation = read_mode_token(&mut TimingOut, DEFAULT_HANDSHAKE_BUDGET);
        assert!(matches!(negotiation, Negotiation::Missing(_)));
        assert_eq!(negotiation.mode(), ScanMode::Express);
    }
}
