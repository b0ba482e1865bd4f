use crate::config::ClientConfig;
use crate::error::{ClientError, ErrorKind};
use crate::retry::{retry, Sleeper, ThreadSleeper};
use crate::wire::{decode_revolution, read_full, PartialRead, PREFIX_LEN};
use lidar_data::{Revolution, ScanMode};
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected(FramePhase),
}

/// Where a connected client stands within the frame stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    AwaitingFrame,
    ReadingPayload,
}

/// Receives revolutions from a LiDAR server, one frame at a time.
///
/// ```no_run
/// use lidar_stream::{ClientConfig, LidarClient};
///
/// let mut client = LidarClient::new(ClientConfig::new("192.168.1.101"));
/// let mut session = client.session().unwrap();
/// let revolution = session.get_revolution().unwrap();
/// println!("{} points", revolution.len());
/// ```
pub struct LidarClient {
    config: ClientConfig,
    stream: Option<TcpStream>,
    state: ClientState,
    sleeper: Box<dyn Sleeper + Send>,
}

impl LidarClient {
    pub fn new(config: ClientConfig) -> LidarClient {
        LidarClient::with_sleeper(config, ThreadSleeper)
    }

    /// Uses `sleeper` to wait between connection attempts.
    pub fn with_sleeper(config: ClientConfig, sleeper: impl Sleeper + Send + 'static) -> LidarClient {
        LidarClient {
            config,
            stream: None,
            state: ClientState::Disconnected,
            sleeper: Box::new(sleeper),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ClientState::Connected(_))
    }

    pub fn scan_mode(&self) -> ScanMode {
        self.config.scan_mode
    }

    /// Opens the connection and requests the configured scan mode.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        if self.is_connected() {
            return Err(ClientError::AlreadyConnected);
        }
        self.state = ClientState::Connecting;
        match self.open() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = ClientState::Connected(FramePhase::AwaitingFrame);
                log::info!(
                    "Connected to {} in {} mode",
                    self.config.addr(),
                    self.config.scan_mode
                );
                Ok(())
            }
            Err(e) => {
                self.state = ClientState::Disconnected;
                Err(e)
            }
        }
    }

    fn open(&self) -> Result<TcpStream, ClientError> {
        let addr = self.config.addr();
        let timeout = self.config.timeout;
        let candidates: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|e| ClientError::from_connect(e, &addr))?
            .collect();

        let mut last_error = None;
        for candidate in candidates {
            log::debug!("Dialing {candidate}");
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(mut stream) => {
                    return request_mode(&mut stream, timeout, self.config.scan_mode)
                        .map(|_| stream)
                        .map_err(|e| ClientError::from_connect(e, &addr));
                }
                Err(e) => last_error = Some(ClientError::from_connect(e, &addr)),
            }
        }
        Err(last_error.unwrap_or_else(|| ClientError::Unreachable {
            addr: addr.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "no address resolved"),
        }))
    }

    /// `connect` with up to `retry.max_retries` additional attempts.
    /// `AlreadyConnected` is returned at once; otherwise the error of the last
    /// attempt is returned unchanged.
    pub fn connect_with_retry(&mut self) -> Result<(), ClientError> {
        let policy = self.config.retry;
        let addr = self.config.addr();
        let mut sleeper = std::mem::replace(&mut self.sleeper, Box::new(ThreadSleeper));
        let result = retry(
            &policy,
            sleeper.as_mut(),
            |e: &ClientError| !matches!(e, ClientError::AlreadyConnected),
            |attempt| {
                if attempt > 0 {
                    log::info!(
                        "[Attempt {}/{}] Reconnecting to {addr}",
                        attempt + 1,
                        policy.attempts()
                    );
                }
                self.connect()
            },
        );
        self.sleeper = sleeper;
        result
    }

    /// Reads the next complete revolution.
    ///
    /// A timeout while waiting for a new frame leaves the client connected.
    /// Anything that leaves the stream in the middle of a frame (an invalid
    /// length prefix, a timeout after part of the frame was read, a lost
    /// connection) disconnects, since frame boundaries can no longer be found.
    pub fn get_revolution(&mut self) -> Result<Revolution, ClientError> {
        let result = self.read_frame();
        if let Err(e) = &result {
            if self.is_connected() && self.must_drop_connection(e) {
                self.close();
            } else if self.is_connected() {
                self.state = ClientState::Connected(FramePhase::AwaitingFrame);
            }
        }
        result
    }

    fn must_drop_connection(&self, error: &ClientError) -> bool {
        match error.kind() {
            ErrorKind::Connection => true,
            ErrorKind::Timeout => self.state != ClientState::Connected(FramePhase::AwaitingFrame),
            ErrorKind::Data => matches!(error, ClientError::InvalidFrameLength { .. }),
        }
    }

    fn read_frame(&mut self) -> Result<Revolution, ClientError> {
        let stream = match (&mut self.stream, self.state) {
            (Some(stream), ClientState::Connected(_)) => stream,
            _ => return Err(ClientError::NotConnected),
        };

        let mut prefix = [0u8; PREFIX_LEN];
        if let Err(PartialRead { filled, error }) = read_full(stream, &mut prefix) {
            if filled > 0 {
                self.state = ClientState::Connected(FramePhase::ReadingPayload);
            }
            return Err(error);
        }
        self.state = ClientState::Connected(FramePhase::ReadingPayload);

        let length = u32::from_be_bytes(prefix);
        let bounds = self.config.frame_bounds;
        if !bounds.contains(length) {
            return Err(ClientError::InvalidFrameLength { length, bounds });
        }

        let mut payload = vec![0u8; length as usize];
        read_full(stream, &mut payload).map_err(|partial| partial.error)?;
        self.state = ClientState::Connected(FramePhase::AwaitingFrame);

        let revolution = decode_revolution(&payload)?;
        log::trace!("Received revolution: {} points, {length} bytes", revolution.len());
        Ok(revolution)
    }

    /// Closes the connection. Safe to call in any state.
    pub fn disconnect(&mut self) {
        if self.stream.is_some() {
            self.close();
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // the peer may already be gone
            let _ = stream.shutdown(Shutdown::Both);
            log::info!("Disconnected from {}", self.config.addr());
        }
        self.state = ClientState::Disconnected;
    }

    /// Connects (with retry) and returns a guard that disconnects when it
    /// goes out of scope.
    pub fn session(&mut self) -> Result<ClientSession<'_>, ClientError> {
        self.connect_with_retry()?;
        Ok(ClientSession { client: self })
    }
}

impl Drop for LidarClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn request_mode(stream: &mut TcpStream, timeout: Duration, mode: ScanMode) -> io::Result<()> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    stream.write_all(mode.token().as_bytes())
}

/// Connected client borrowed for a scope.
pub struct ClientSession<'a> {
    client: &'a mut LidarClient,
}

impl Deref for ClientSession<'_> {
    type Target = LidarClient;

    fn deref(&self) -> &LidarClient {
        self.client
    }
}

impl DerefMut for ClientSession<'_> {
    fn deref_mut(&mut self) -> &mut LidarClient {
        self.client
    }
}

impl Drop for ClientSession<'_> {
    fn drop(&mut self) {
        self.client.disconnect();
    }
}
