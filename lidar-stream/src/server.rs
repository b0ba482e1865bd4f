use crate::config::ServerConfig;
use crate::error::{SensorError, ServerError, WireError};
use crate::handshake::{negotiate_mode, Negotiation};
use crate::sensor::Sensor;
use crate::wire::{encode_revolution, write_frame};
use lidar_data::ScanMode;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Negotiating,
    Streaming,
}

/// Why a streaming session ended. Logged by the server, never returned as an
/// error: a failed session does not stop the accept loop.
#[derive(Debug, Error)]
pub enum SessionEnd {
    #[error("Shutdown requested")]
    Shutdown,
    #[error("Client disconnected: {0}")]
    ClientGone(#[source] io::Error),
    #[error("Client stopped reading, write timed out")]
    WriteTimeout,
    #[error("Sensor error: {0}")]
    Sensor(#[source] SensorError),
    #[error("Cannot encode revolution: {0}")]
    Encode(#[source] WireError),
}

impl SessionEnd {
    fn from_write(e: io::Error) -> SessionEnd {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => SessionEnd::WriteTimeout,
            _ => SessionEnd::ClientGone(e),
        }
    }
}

/// Summary of one client connection.
#[derive(Debug)]
pub struct SessionReport {
    pub peer: SocketAddr,
    pub mode: ScanMode,
    pub revolutions: u64,
    pub end: SessionEnd,
}

/// Cloneable flag used to ask a running server to stop, e.g. from a
/// Ctrl-C handler.
#[derive(Clone, Debug, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stops the sensor when the session goes out of scope, on every exit path.
struct StreamingSession<'a, S: Sensor> {
    sensor: &'a mut S,
}

impl<'a, S: Sensor> StreamingSession<'a, S> {
    fn start(sensor: &'a mut S, mode: ScanMode) -> Result<StreamingSession<'a, S>, SensorError> {
        let session = StreamingSession { sensor };
        session.sensor.start(mode)?;
        Ok(session)
    }
}

impl<S: Sensor> Drop for StreamingSession<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.sensor.stop() {
            log::warn!("Failed to stop the sensor: {e}");
        }
    }
}

/// Serves revolutions from `sensor` to one TCP client at a time.
pub struct Server<S: Sensor> {
    config: ServerConfig,
    listener: TcpListener,
    sensor: S,
    state: ServerState,
    shutdown: ShutdownHandle,
    released: bool,
}

impl<S: Sensor> Server<S> {
    pub fn bind(config: ServerConfig, sensor: S) -> Result<Server<S>, ServerError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        log::info!("Listening on {}", listener.local_addr()?);
        Ok(Server {
            config,
            listener,
            sensor,
            state: ServerState::Idle,
            shutdown: ShutdownHandle::default(),
            released: false,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Asks the server to stop. The accept loop notices within one poll
    /// interval, a streaming session before its next revolution.
    pub fn shutdown(&self) {
        self.shutdown.request();
    }

    /// Accepts and serves clients until shutdown, then releases the sensor.
    pub fn serve(&mut self) -> Result<(), ServerError> {
        let result = self.serve_until_shutdown();
        self.release_sensor();
        result
    }

    fn serve_until_shutdown(&mut self) -> Result<(), ServerError> {
        while self.serve_one()?.is_some() {}
        Ok(())
    }

    /// Waits for one client and streams to it until the session ends.
    /// Returns `None` when shutdown was requested before a client arrived.
    pub fn serve_one(&mut self) -> Result<Option<SessionReport>, ServerError> {
        log::info!("Waiting for a client...");
        let Some((stream, peer)) = self.accept()? else {
            return Ok(None);
        };
        log::info!("Client connected from {peer}");
        let report = self.handle_client(stream, peer);
        match &report.end {
            SessionEnd::Shutdown => log::info!(
                "Session with {peer} ended after {} revolutions: {}",
                report.revolutions,
                report.end
            ),
            end => log::warn!(
                "Session with {peer} ended after {} revolutions: {end}",
                report.revolutions
            ),
        }
        Ok(Some(report))
    }

    fn accept(&mut self) -> Result<Option<(TcpStream, SocketAddr)>, ServerError> {
        loop {
            if self.shutdown.is_requested() {
                return Ok(None);
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false)?;
                    return Ok(Some((stream, peer)));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(self.config.accept_poll_interval);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    log::debug!("Transient accept error: {e}");
                }
                Err(e) => return Err(ServerError::Accept(e)),
            }
        }
    }

    fn handle_client(&mut self, mut stream: TcpStream, peer: SocketAddr) -> SessionReport {
        self.state = ServerState::Negotiating;
        let negotiation = negotiate_mode(
            &mut stream,
            self.config.handshake_timeout,
            self.config.handshake_budget,
        );
        let mode = negotiation.mode();
        match &negotiation {
            Negotiation::Requested(_) => log::info!("Scan mode requested: {mode}"),
            Negotiation::Unknown(token) => {
                log::warn!("Unknown scan mode {token:?}, using {mode}")
            }
            Negotiation::Missing(e) => log::warn!("No scan mode received ({e}), using {mode}"),
        }

        let mut revolutions = 0;
        let end = match stream.set_write_timeout(self.config.write_timeout) {
            Ok(()) => self.stream_revolutions(&mut stream, mode, &mut revolutions),
            Err(e) => SessionEnd::ClientGone(e),
        };
        self.state = ServerState::Idle;
        if let Err(e) = stream.shutdown(std::net::Shutdown::Both) {
            log::debug!("Closing {peer}: {e}");
        }

        SessionReport {
            peer,
            mode,
            revolutions,
            end,
        }
    }

    fn stream_revolutions(
        &mut self,
        stream: &mut TcpStream,
        mode: ScanMode,
        revolutions: &mut u64,
    ) -> SessionEnd {
        let revolution_timeout = self.config.revolution_timeout;
        let frame_bounds = self.config.frame_bounds;
        let shutdown = self.shutdown.clone();
        if self.released {
            return SessionEnd::Sensor(SensorError::Released);
        }
        let session = match StreamingSession::start(&mut self.sensor, mode) {
            Ok(session) => session,
            Err(e) => return SessionEnd::Sensor(e),
        };
        self.state = ServerState::Streaming;

        loop {
            if shutdown.is_requested() {
                return SessionEnd::Shutdown;
            }
            let revolution = match session.sensor.next_revolution(revolution_timeout) {
                Ok(revolution) => revolution,
                Err(e) => return SessionEnd::Sensor(e),
            };
            let payload = match encode_revolution(&revolution) {
                Ok(payload) => payload,
                Err(e) => return SessionEnd::Encode(e),
            };
            // the client would drop the connection on this length
            let sendable = u32::try_from(payload.len())
                .map_or(false, |len| frame_bounds.contains(len));
            if !sendable {
                log::warn!(
                    "Skipping revolution: {} points encode to {} bytes, outside {frame_bounds}",
                    revolution.len(),
                    payload.len()
                );
                continue;
            }
            if let Err(e) = write_frame(stream, &payload) {
                return SessionEnd::from_write(e);
            }
            *revolutions += 1;
            log::debug!(
                "Rev #{revolutions}: {} points, {} bytes [{mode}]",
                revolution.len(),
                payload.len()
            );
        }
    }

    /// Stops and releases the sensor. Runs at most once.
    fn release_sensor(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.sensor.release() {
            Ok(()) => log::info!("Sensor released"),
            Err(e) => log::warn!("Failed to release the sensor: {e}"),
        }
    }
}

impl<S: Sensor> Drop for Server<S> {
    fn drop(&mut self) {
        self.release_sensor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_handle_is_shared() {
        let handle = ShutdownHandle::default();
        let clone = handle.clone();
        assert!(!clone.is_requested());
        handle.request();
        assert!(clone.is_requested());
    }

    #[test]
    fn test_write_error_classification() {
        assert!(matches!(
            SessionEnd::from_write(io::ErrorKind::WouldBlock.into()),
            SessionEnd::WriteTimeout
        ));
        assert!(matches!(
            SessionEnd::from_write(io::ErrorKind::BrokenPipe.into()),
            SessionEnd::ClientGone(_)
        ));
    }
}
