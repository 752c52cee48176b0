//! Control connection state machine

use bytes::{BufMut, BytesMut};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, trace, warn};

use super::auth::{self, Challenge};
use crate::cola::framing::{
    Cola2Header, ControlFrame, ControlFrameBuffer, DEFAULT_MAX_CONTROL_FRAME, encode_frame,
};
use crate::cola::{ColaError, ColaParam, Command, CommandBuilder, CommandReader, CommandType, ProtocolVariant};
use crate::types::UserLevel;
use crate::{Result, VisionaryError};

/// Connection and privilege state of a [`ControlSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticated(UserLevel),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => f.write_str("disconnected"),
            SessionState::Connected => f.write_str("connected"),
            SessionState::Authenticated(level) => write!(f, "authenticated as {}", level),
        }
    }
}

/// Acquisition state as last acknowledged by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    #[default]
    Stopped,
    Running,
}

/// Tunables for a [`ControlSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Deadline for one request/response exchange
    pub command_timeout: Duration,
    /// Idle timeout the device applies to a CoLa-2 session, in seconds
    pub session_timeout_s: u8,
    /// Client name announced when opening a CoLa-2 session
    pub client_id: String,
    /// Largest control frame accepted
    pub max_frame: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(5000),
            session_timeout_s: 50,
            client_id: "visionary".to_string(),
            max_frame: DEFAULT_MAX_CONTROL_FRAME,
        }
    }
}

/// Client side of a device control connection.
///
/// Owns one TCP stream exclusively. Every operation takes `&mut self`, so at most
/// one request is in flight; callers sharing a session across tasks must
/// serialize access themselves.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use visionary::cola::{CommandBuilder, CommandReader, ProtocolVariant};
/// use visionary::control::ControlSession;
/// use visionary::types::UserLevel;
///
/// # async fn example() -> visionary::Result<()> {
/// let mut session = ControlSession::new(ProtocolVariant::Cola2);
/// session.open("192.168.1.10:2122", Duration::from_secs(5)).await?;
/// session.login(UserLevel::AuthorizedClient, "CLIENT").await?;
///
/// let request = CommandBuilder::read_variable("humidity").build()?;
/// let response = session.send_command(&request).await?.into_result()?;
/// let humidity = CommandReader::new(&response).read_f64()?;
/// println!("humidity: {humidity}");
///
/// session.logout().await?;
/// session.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ControlSession {
    variant: ProtocolVariant,
    options: SessionOptions,
    stream: Option<TcpStream>,
    buffer: ControlFrameBuffer,
    state: SessionState,
    acquisition: AcquisitionState,
    session_id: u32,
    request_id: u16,
    /// CoLa-B requests that timed out; their answers may still arrive, in order
    unanswered: VecDeque<String>,
}

impl ControlSession {
    pub fn new(variant: ProtocolVariant) -> Self {
        Self::with_options(variant, SessionOptions::default())
    }

    pub fn with_options(variant: ProtocolVariant, options: SessionOptions) -> Self {
        let buffer = ControlFrameBuffer::new(variant, options.max_frame);
        Self {
            variant,
            options,
            stream: None,
            buffer,
            state: SessionState::Disconnected,
            acquisition: AcquisitionState::Stopped,
            session_id: 0,
            request_id: 0,
            unanswered: VecDeque::new(),
        }
    }

    /// Create a session for `variant` and open it in one step.
    pub async fn open_with<A: ToSocketAddrs>(
        variant: ProtocolVariant,
        address: A,
        timeout: Duration,
        options: SessionOptions,
    ) -> Result<Self> {
        let mut session = Self::with_options(variant, options);
        session.open(address, timeout).await?;
        Ok(session)
    }

    pub fn protocol(&self) -> ProtocolVariant {
        self.variant
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current privilege level, `None` unless authenticated.
    pub fn user_level(&self) -> Option<UserLevel> {
        match self.state {
            SessionState::Authenticated(level) => Some(level),
            _ => None,
        }
    }

    pub fn acquisition_state(&self) -> AcquisitionState {
        self.acquisition
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Session id assigned by a CoLa-2 device.
    pub fn session_id(&self) -> Option<u32> {
        (self.variant == ProtocolVariant::Cola2 && self.is_open()).then_some(self.session_id)
    }

    pub fn command_timeout(&self) -> Duration {
        self.options.command_timeout
    }

    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.options.command_timeout = timeout;
    }

    /// Connect to the device and, for CoLa-2, open a protocol session.
    ///
    /// Connect failures and rejected handshakes are
    /// [`Connection`](VisionaryError::Connection) errors; a device that accepts the
    /// TCP connection but never answers the handshake yields
    /// [`Timeout`](VisionaryError::Timeout).
    pub async fn open<A: ToSocketAddrs>(&mut self, address: A, timeout: Duration) -> Result<()> {
        if self.stream.is_some() {
            return Err(VisionaryError::connection_failed("control session already open"));
        }

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            Err(_) => {
                return Err(VisionaryError::connection_failed(format!(
                    "control connect timed out after {:?}",
                    timeout
                )));
            }
            Ok(Err(e)) => {
                return Err(VisionaryError::connection_failed_with_source("control connect failed", e));
            }
            Ok(Ok(stream)) => stream,
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle on control socket: {}", e);
        }
        let peer = stream.peer_addr().ok();

        self.stream = Some(stream);
        self.buffer.clear();
        self.session_id = 0;
        self.request_id = 0;
        self.unanswered.clear();

        if self.variant == ProtocolVariant::Cola2 {
            if let Err(e) = self.open_cola2_session(timeout).await {
                self.drop_connection();
                return Err(e);
            }
        }

        self.state = SessionState::Connected;
        self.acquisition = AcquisitionState::Stopped;
        info!(
            protocol = %self.variant,
            peer = ?peer,
            session_id = self.session_id,
            "Control session opened"
        );
        Ok(())
    }

    async fn open_cola2_session(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut body = BytesMut::new();
        body.put_slice(b"Ox");
        body.put_u8(self.options.session_timeout_s);
        self.options.client_id.encode(&mut body)?;

        let request_id = self.next_request_id();
        self.write_body(&body, request_id, deadline, "session open", timeout).await?;
        let frame =
            self.read_frame(deadline, "session open", timeout).await.map_err(|e| {
                if e.is_protocol_violation() {
                    VisionaryError::connection_failed_with_source("session handshake failed", e)
                } else {
                    e
                }
            })?;

        if let Some(code) = session_error(&frame.body) {
            return Err(VisionaryError::connection_failed(format!(
                "session open rejected: {}",
                code
            )));
        }
        match frame.header {
            Some(header) if frame.body.starts_with(b"OA") => {
                self.session_id = header.session_id;
                Ok(())
            }
            _ => Err(VisionaryError::connection_failed(format!(
                "unrecognized session open reply {:02x?}",
                &frame.body[..frame.body.len().min(8)]
            ))),
        }
    }

    /// Authenticate at `level` using the challenge-response login.
    ///
    /// Devices that do not know `GetChallenge` get the legacy `SetAccessMode`
    /// login instead. Success replaces any previous level. A refused login leaves
    /// the state unchanged.
    pub async fn login(&mut self, level: UserLevel, password: &str) -> Result<()> {
        self.ensure_open()?;

        let response = self.send_command(&auth::challenge_request(level)?).await?;
        if response.error() == ColaError::MethodUnknownIndex {
            debug!("Challenge login unsupported, using legacy access mode");
            return self.login_legacy(level, password).await;
        }
        if !response.is_ok() {
            return Err(VisionaryError::authentication(
                level,
                format!("challenge request failed: {}", response.error()),
            ));
        }
        let challenge = Challenge::from_response(level, &response)?;
        let hash = auth::password_hash(level, password, &challenge);

        let response = self.send_command(&auth::set_user_level_request(&hash, level)?).await?;
        if !response.is_ok() {
            return Err(VisionaryError::authentication(
                level,
                format!("user level change failed: {}", response.error()),
            ));
        }
        let status = CommandReader::new(&response).read_u8()?;
        if status != 0 {
            return Err(VisionaryError::authentication(
                level,
                format!("device rejected credentials (status {})", status),
            ));
        }

        self.state = SessionState::Authenticated(level);
        info!(level = %level, "Logged in");
        Ok(())
    }

    /// Authenticate with the legacy `SetAccessMode` login.
    pub async fn login_legacy(&mut self, level: UserLevel, password: &str) -> Result<()> {
        self.ensure_open()?;

        let response = self.send_command(&auth::set_access_mode_request(level, password)?).await?;
        if !response.is_ok() {
            return Err(VisionaryError::authentication(
                level,
                format!("access mode change failed: {}", response.error()),
            ));
        }
        if !CommandReader::new(&response).read_bool()? {
            return Err(VisionaryError::authentication(level, "device rejected credentials"));
        }

        self.state = SessionState::Authenticated(level);
        info!(level = %level, "Logged in with legacy access mode");
        Ok(())
    }

    /// Return to the unprivileged run level.
    ///
    /// The session is `Connected` afterwards even when the device refuses; the
    /// refusal is then reported as an [`Authentication`](VisionaryError::Authentication) error.
    pub async fn logout(&mut self) -> Result<()> {
        self.ensure_open()?;
        let previous = self.user_level().unwrap_or(UserLevel::Run);

        let result = self.send_command(&auth::logout_request()?).await;
        if self.is_open() {
            self.state = SessionState::Connected;
        }
        let response = result?;

        if !response.is_ok() {
            return Err(VisionaryError::authentication(
                previous,
                format!("logout failed: {}", response.error()),
            ));
        }
        if !CommandReader::new(&response).read_bool()? {
            return Err(VisionaryError::authentication(previous, "device refused logout"));
        }
        info!(previous = %previous, "Logged out");
        Ok(())
    }

    /// Send one request and wait for its response.
    ///
    /// Device error codes are data: they come back in the response's
    /// [`error`](Command::error) field, not as `Err`. Transport failures and
    /// framing violations close the session.
    ///
    /// A CoLa-B request that times out stays outstanding: whatever the device
    /// sends first on a later exchange is taken as its late answer and dropped.
    pub async fn send_command(&mut self, command: &Command) -> Result<Command> {
        let result = self.exchange(command).await;
        if let Err(e) = &result {
            if e.is_fatal() {
                warn!(command = command.name(), error = %e, "Control connection lost");
                self.drop_connection();
            }
        }
        result
    }

    async fn exchange(&mut self, command: &Command) -> Result<Command> {
        self.ensure_open()?;
        let expected = command.kind().response_kind().ok_or_else(|| VisionaryError::InvalidCommand {
            details: format!("{} is not a request", command.kind()),
        })?;

        let mut body = BytesMut::new();
        command.encode_body(&mut body);
        let request_id = self.next_request_id();
        let timeout = self.options.command_timeout;
        let deadline = Instant::now() + timeout;

        debug!(command = %command, request_id, "Sending command");
        self.write_body(&body, request_id, deadline, command.name(), timeout).await?;

        loop {
            let frame = match self.read_frame(deadline, command.name(), timeout).await {
                Ok(frame) => frame,
                Err(e) => {
                    let timed_out = matches!(e, VisionaryError::Timeout { .. });
                    if timed_out && self.variant == ProtocolVariant::ColaB {
                        self.unanswered.push_back(command.name().to_string());
                    }
                    return Err(e);
                }
            };
            if self.discard_late_answer(&frame, command.name()) {
                continue;
            }
            if let Some(header) = frame.header {
                if header.request_id != request_id {
                    warn!(
                        expected = request_id,
                        received = header.request_id,
                        "Discarding stale response"
                    );
                    continue;
                }
            }
            if let Some(code) = session_error(&frame.body) {
                return Err(VisionaryError::device(command.name(), code));
            }

            let response = Command::decode_body(&frame.body)?;
            if response.kind() == CommandType::Error {
                debug!(command = command.name(), error = %response.error(), "Device returned error");
                return Ok(Command::error_response(command.name(), response.error()));
            }
            if response.name() != command.name() {
                warn!(
                    expected = command.name(),
                    received = response.name(),
                    "Discarding stale response"
                );
                continue;
            }
            if response.kind() != expected {
                return Err(VisionaryError::protocol(
                    format!("response to {}", command.name()),
                    format!("expected {}, got {}", expected, response.kind()),
                ));
            }

            debug!(response = %response, "Received response");
            return Ok(response);
        }
    }

    /// Drop the answer to the oldest timed out CoLa-B request.
    ///
    /// A frame answering the current command under its own name, while the
    /// oldest outstanding request has another name, means the device skipped
    /// the outstanding ones.
    fn discard_late_answer(&mut self, frame: &ControlFrame, current: &str) -> bool {
        let Some(late) = self.unanswered.pop_front() else {
            return false;
        };
        let answers_current = match Command::decode_body(&frame.body) {
            Ok(response) => response.kind() != CommandType::Error && response.name() == current,
            Err(_) => false,
        };
        if answers_current && late != current {
            debug!(skipped = self.unanswered.len() + 1, "Device never answered timed out requests");
            self.unanswered.clear();
            return false;
        }
        warn!(
            request = %late,
            pending = self.unanswered.len(),
            "Discarding late answer to timed out request"
        );
        true
    }

    /// Start continuous acquisition (`PLAYSTART`).
    pub async fn start_acquisition(&mut self) -> Result<Command> {
        self.playback("PLAYSTART", AcquisitionState::Running).await
    }

    /// Stop acquisition (`PLAYSTOP`). Harmless when already stopped.
    pub async fn stop_acquisition(&mut self) -> Result<Command> {
        self.playback("PLAYSTOP", AcquisitionState::Stopped).await
    }

    /// Acquire exactly one frame (`PLAYNEXT`).
    pub async fn step_acquisition(&mut self) -> Result<Command> {
        self.playback("PLAYNEXT", AcquisitionState::Stopped).await
    }

    async fn playback(&mut self, method: &str, next: AcquisitionState) -> Result<Command> {
        let request = CommandBuilder::invoke_method(method).build()?;
        let response = self.send_command(&request).await?;
        if response.is_ok() {
            self.acquisition = next;
        }
        Ok(response)
    }

    /// Close the session and release the socket. Idempotent.
    ///
    /// CoLa-2 sessions are closed on the device first; failures there are only logged.
    pub async fn close(&mut self) {
        if self.stream.is_none() {
            self.state = SessionState::Disconnected;
            return;
        }

        if self.variant == ProtocolVariant::Cola2 {
            if let Err(e) = self.close_cola2_session().await {
                debug!("Session close not acknowledged: {}", e);
            }
        }
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("Control socket shutdown failed: {}", e);
            }
        }
        self.drop_connection();
        info!("Control session closed");
    }

    async fn close_cola2_session(&mut self) -> Result<()> {
        let timeout = self.options.command_timeout;
        let deadline = Instant::now() + timeout;
        let request_id = self.next_request_id();
        self.write_body(b"CX", request_id, deadline, "session close", timeout).await?;
        loop {
            let frame = self.read_frame(deadline, "session close", timeout).await?;
            if frame.body.starts_with(b"CA") {
                return Ok(());
            }
            trace!(bytes = frame.body.len(), "Ignoring frame while closing session");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.stream.is_some() {
            Ok(())
        } else {
            Err(VisionaryError::not_connected("control session"))
        }
    }

    fn drop_connection(&mut self) {
        self.stream = None;
        self.buffer.clear();
        self.unanswered.clear();
        self.state = SessionState::Disconnected;
        self.acquisition = AcquisitionState::Stopped;
    }

    fn next_request_id(&mut self) -> u16 {
        self.request_id = self.request_id.wrapping_add(1);
        self.request_id
    }

    async fn write_body(
        &mut self,
        body: &[u8],
        request_id: u16,
        deadline: Instant,
        operation: &str,
        timeout: Duration,
    ) -> Result<()> {
        let header = Cola2Header { session_id: self.session_id, request_id };
        let frame = encode_frame(self.variant, header, body);
        let stream =
            self.stream.as_mut().ok_or_else(|| VisionaryError::not_connected("control session"))?;

        trace!(bytes = frame.len(), "Writing control frame");
        match timeout_at(deadline, stream.write_all(&frame)).await {
            Err(_) => Err(VisionaryError::timeout(operation, timeout)),
            Ok(Err(e)) => Err(VisionaryError::connection_failed_with_source("control write failed", e)),
            Ok(Ok(())) => Ok(()),
        }
    }

    async fn read_frame(
        &mut self,
        deadline: Instant,
        operation: &str,
        timeout: Duration,
    ) -> Result<ControlFrame> {
        loop {
            match self.buffer.try_extract() {
                Ok(Some(frame)) => {
                    trace!(bytes = frame.body.len(), "Control frame received");
                    return Ok(frame);
                }
                Ok(None) => {}
                Err(e) => {
                    // the rest of the rejected frame is still in flight
                    warn!(error = %e, "Control stream out of sync, closing connection");
                    self.drop_connection();
                    return Err(e);
                }
            }
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| VisionaryError::not_connected("control session"))?;

            match timeout_at(deadline, stream.read_buf(self.buffer.buffer_mut())).await {
                Err(_) => return Err(VisionaryError::timeout(operation, timeout)),
                Ok(Ok(0)) => {
                    return Err(VisionaryError::connection_failed("control connection closed by device"));
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    return Err(VisionaryError::connection_failed_with_source("control read failed", e));
                }
            }
        }
    }
}

/// CoLa-2 session level error `FA <u16 code>`.
fn session_error(body: &[u8]) -> Option<ColaError> {
    match body {
        [b'F', b'A', hi, lo] => Some(ColaError::from_code(u16::from_be_bytes([*hi, *lo]))),
        _ => None,
    }
}
