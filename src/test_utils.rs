//! Loopback device simulators for tests and benchmarks
//!
//! [`SimulatedDevice`] answers the control protocol on a local port,
//! [`BlobFeeder`] plays the device side of the data port, and
//! [`sample_blob`] builds a valid blob for either device family.

#![cfg(any(test, feature = "benchmark"))]

use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::Result;
use crate::cola::framing::{Cola2Header, ControlFrameBuffer, DEFAULT_MAX_CONTROL_FRAME, encode_frame};
use crate::cola::{ColaError, ColaParam, Command, CommandReader, CommandType, ProtocolVariant};
use crate::control::{Challenge, legacy_password_hash, password_hash};
use crate::stream::BlobWriter;
use crate::types::{CameraParameters, DeviceFamily, UserLevel};

/// Session id handed out by the simulator on CoLa-2 handshakes.
pub const SIMULATED_SESSION_ID: u32 = 0x5A5A_0001;

/// Behavior switches of a [`SimulatedDevice`].
#[derive(Debug, Clone)]
pub struct SimulatorOptions {
    /// Read requests but never answer, handshakes included
    pub mute: bool,
    /// Precede every answer with a response the client must discard
    pub stale_responses: bool,
    /// Refuse CoLa-2 session handshakes
    pub reject_sessions: bool,
    /// Drop the connection on receiving a command with this name
    pub hang_up_on: Option<String>,
    /// Answer a command with this name only after the next request arrives
    pub hold_back: Option<String>,
    /// Answer `Run` with `false`
    pub refuse_logout: bool,
    /// Only support the legacy `SetAccessMode` login
    pub legacy_login: bool,
    /// Password per user level
    pub passwords: HashMap<UserLevel, String>,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        let passwords = HashMap::from([
            (UserLevel::Operator, "OPERATOR".to_string()),
            (UserLevel::Maintenance, "MAINTENANCE".to_string()),
            (UserLevel::AuthorizedClient, "CLIENT".to_string()),
            (UserLevel::Service, "CUST_SERV".to_string()),
        ]);
        Self {
            mute: false,
            stale_responses: false,
            reject_sessions: false,
            hang_up_on: None,
            hold_back: None,
            refuse_logout: false,
            legacy_login: false,
            passwords,
        }
    }
}

/// Device-wide state shared with the test.
#[derive(Debug, Default)]
struct DeviceState {
    variables: HashMap<String, Bytes>,
    received: Vec<String>,
    acquisition_running: bool,
}

/// Control side of a device, served on `127.0.0.1`.
///
/// Reads are open to everyone, writes need `AuthorizedClient` or above.
/// Connections are served one after another.
pub struct SimulatedDevice {
    addr: SocketAddr,
    state: Arc<Mutex<DeviceState>>,
    task: JoinHandle<()>,
}

impl SimulatedDevice {
    pub async fn start(variant: ProtocolVariant) -> Result<Self> {
        Self::start_with(variant, SimulatorOptions::default()).await
    }

    pub async fn start_with(variant: ProtocolVariant, options: SimulatorOptions) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let mut variables = HashMap::new();
        variables.insert("DeviceIdent".to_string(), device_ident_payload());
        variables.insert("framePeriodTime".to_string(), encoded(&33_333u32));
        variables.insert("frontendMode".to_string(), encoded(&0u8));
        let state = Arc::new(Mutex::new(DeviceState { variables, ..Default::default() }));

        let shared = Arc::clone(&state);
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, peer)) = listener.accept().await else { break };
                debug!(peer = %peer, "Simulator accepted control connection");
                let mut connection = Connection::new(variant, &options, Arc::clone(&shared));
                if let Err(e) = connection.serve(stream).await {
                    debug!("Simulator connection ended: {}", e);
                }
            }
        });

        Ok(Self { addr, state, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Raw payload of a variable.
    pub fn variable(&self, name: &str) -> Option<Bytes> {
        self.lock().variables.get(name).cloned()
    }

    pub fn set_variable(&self, name: &str, payload: impl Into<Bytes>) {
        self.lock().variables.insert(name.to_string(), payload.into());
    }

    /// Names of all commands received, in order.
    pub fn received(&self) -> Vec<String> {
        self.lock().received.clone()
    }

    pub fn acquisition_running(&self) -> bool {
        self.lock().acquisition_running
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Reply {
    Send(Vec<Bytes>),
    Silent,
    HangUp,
}

/// Per-connection protocol state.
struct Connection<'a> {
    variant: ProtocolVariant,
    options: &'a SimulatorOptions,
    state: Arc<Mutex<DeviceState>>,
    level: UserLevel,
    challenge: Option<(UserLevel, Challenge)>,
    session_id: u32,
    challenges_issued: u8,
    held: Option<Bytes>,
}

impl<'a> Connection<'a> {
    fn new(variant: ProtocolVariant, options: &'a SimulatorOptions, state: Arc<Mutex<DeviceState>>) -> Self {
        Self {
            variant,
            options,
            state,
            level: UserLevel::Run,
            challenge: None,
            session_id: 0,
            challenges_issued: 0,
            held: None,
        }
    }

    async fn serve(&mut self, mut stream: TcpStream) -> Result<()> {
        let mut buffer = ControlFrameBuffer::new(self.variant, DEFAULT_MAX_CONTROL_FRAME);
        loop {
            while let Some(frame) = buffer.try_extract()? {
                let header = frame.header.unwrap_or_default();
                match self.handle(&frame.body, header.request_id) {
                    Reply::Silent => {}
                    Reply::HangUp => return Ok(()),
                    Reply::Send(bodies) => {
                        for (i, body) in bodies.iter().enumerate() {
                            // extra leading bodies are stale and carry an older id
                            let stale = (bodies.len() - 1 - i) as u16;
                            let header = Cola2Header {
                                session_id: self.session_id,
                                request_id: header.request_id.wrapping_sub(stale),
                            };
                            stream.write_all(&encode_frame(self.variant, header, body)).await?;
                        }
                    }
                }
            }
            if stream.read_buf(buffer.buffer_mut()).await? == 0 {
                return Ok(());
            }
        }
    }

    fn handle(&mut self, body: &[u8], request_id: u16) -> Reply {
        if self.options.mute {
            return Reply::Silent;
        }
        if self.variant == ProtocolVariant::Cola2 {
            if body.starts_with(b"Ox") {
                if self.options.reject_sessions {
                    return Reply::Send(vec![Bytes::from_static(b"FA\x00\x22")]);
                }
                self.session_id = SIMULATED_SESSION_ID;
                return Reply::Send(vec![Bytes::from_static(b"OA")]);
            }
            if body.starts_with(b"CX") {
                return Reply::Send(vec![Bytes::from_static(b"CA")]);
            }
        }

        let command = match Command::decode_body(body) {
            Ok(command) => command,
            Err(e) => {
                debug!("Simulator rejecting malformed request: {}", e);
                return Reply::Send(vec![error_body("", ColaError::UnknownColaCommand)]);
            }
        };
        trace!(request_id, command = %command, "Simulator received");
        self.lock().received.push(command.name().to_string());

        if self.options.hang_up_on.as_deref() == Some(command.name()) {
            return Reply::HangUp;
        }

        let answer = match command.kind() {
            CommandType::ReadVariable => self.read(&command),
            CommandType::WriteVariable => self.write(&command),
            CommandType::MethodInvocation => self.invoke(&command),
            _ => error_body(command.name(), ColaError::UnknownColaCommand),
        };

        if self.options.hold_back.as_deref() == Some(command.name()) {
            self.held = Some(answer);
            return Reply::Silent;
        }

        let mut bodies = Vec::with_capacity(2);
        if let Some(held) = self.held.take() {
            bodies.push(held);
        }
        if self.options.stale_responses {
            bodies.push(response_body(CommandType::MethodReturnValue, "StaleAnswer", Bytes::new()));
        }
        bodies.push(answer);
        Reply::Send(bodies)
    }

    fn read(&self, command: &Command) -> Bytes {
        match self.lock().variables.get(command.name()) {
            Some(payload) => {
                response_body(CommandType::ReadVariableResponse, command.name(), payload.clone())
            }
            None => error_body(command.name(), ColaError::VariableUnknownIndex),
        }
    }

    fn write(&self, command: &Command) -> Bytes {
        let mut state = self.lock();
        if !state.variables.contains_key(command.name()) {
            return error_body(command.name(), ColaError::VariableUnknownIndex);
        }
        if self.level < UserLevel::AuthorizedClient {
            return error_body(command.name(), ColaError::VariableWriteAccessDenied);
        }
        state.variables.insert(command.name().to_string(), Bytes::copy_from_slice(command.payload()));
        response_body(CommandType::WriteVariableResponse, command.name(), Bytes::new())
    }

    fn invoke(&mut self, command: &Command) -> Bytes {
        let name = command.name();
        let payload = match name {
            "GetChallenge" | "SetUserLevel" if self.options.legacy_login => {
                return error_body(name, ColaError::MethodUnknownIndex);
            }
            "SetAccessMode" => self.check_legacy_login(command),
            "GetChallenge" => self.issue_challenge(command),
            "SetUserLevel" => self.check_login(command),
            "Run" if self.options.refuse_logout => encoded(&false),
            "Run" => {
                self.level = UserLevel::Run;
                self.challenge = None;
                encoded(&true)
            }
            "PLAYSTART" => {
                self.lock().acquisition_running = true;
                Bytes::new()
            }
            "PLAYSTOP" | "PLAYNEXT" => {
                self.lock().acquisition_running = false;
                Bytes::new()
            }
            _ => return error_body(name, ColaError::MethodUnknownIndex),
        };
        response_body(CommandType::MethodReturnValue, name, payload)
    }

    fn issue_challenge(&mut self, command: &Command) -> Bytes {
        let level = CommandReader::new(command).read_u8().ok().and_then(UserLevel::from_code);
        let Some(level) = level else {
            return encoded(&1u8);
        };
        self.challenges_issued = self.challenges_issued.wrapping_add(1);
        let challenge = Challenge { challenge: [self.challenges_issued; 16], salt: [0xA5; 16] };

        let mut payload = BytesMut::new();
        payload.put_u8(0);
        payload.extend_from_slice(&challenge.challenge);
        payload.extend_from_slice(&challenge.salt);
        self.challenge = Some((level, challenge));
        payload.freeze()
    }

    fn check_login(&mut self, command: &Command) -> Bytes {
        let mut reader = CommandReader::new(command);
        let hash = reader.read_bytes(32).map(<[u8]>::to_vec);
        let level = reader.read_u8().ok().and_then(UserLevel::from_code);

        let accepted = match (hash, level, self.challenge.take()) {
            (Ok(hash), Some(level), Some((challenged, challenge))) if challenged == level => self
                .options
                .passwords
                .get(&level)
                .map(|password| password_hash(level, password, &challenge).as_slice() == hash.as_slice())
                .unwrap_or(false),
            _ => false,
        };
        if accepted {
            if let Some(level) = level {
                self.level = level;
            }
            encoded(&0u8)
        } else {
            encoded(&1u8)
        }
    }

    fn check_legacy_login(&mut self, command: &Command) -> Bytes {
        let mut reader = CommandReader::new(command);
        let level = reader.read_i8().ok().and_then(|code| UserLevel::from_code(code as u8));
        let hash = reader.read_u32();

        let accepted = match (level, hash) {
            (Some(level), Ok(hash)) => self
                .options
                .passwords
                .get(&level)
                .is_some_and(|password| legacy_password_hash(password) == hash),
            _ => false,
        };
        if let (true, Some(level)) = (accepted, level) {
            self.level = level;
        }
        encoded(&accepted)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn response_body(kind: CommandType, name: &str, payload: Bytes) -> Bytes {
    let mut buf = BytesMut::new();
    Command::from_parts(kind, name.to_string(), payload).encode_body(&mut buf);
    buf.freeze()
}

fn error_body(name: &str, code: ColaError) -> Bytes {
    let mut buf = BytesMut::new();
    Command::error_response(name, code).encode_body(&mut buf);
    buf.freeze()
}

fn encoded<T: ColaParam>(value: &T) -> Bytes {
    let mut buf = BytesMut::new();
    value.encode(&mut buf).expect("simulator values are encodable");
    buf.freeze()
}

fn device_ident_payload() -> Bytes {
    let mut buf = BytesMut::new();
    for field in ["Visionary-T Mini CX", "2.1.0"] {
        field.to_string().encode(&mut buf).expect("short strings are encodable");
    }
    buf.freeze()
}

/// Device side of the data port: accepts one client and writes raw bytes to it.
pub struct BlobFeeder {
    listener: TcpListener,
    stream: Option<TcpStream>,
}

impl BlobFeeder {
    pub async fn bind() -> Result<Self> {
        Ok(Self { listener: TcpListener::bind("127.0.0.1:0").await?, stream: None })
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    pub async fn accept(&mut self) -> Result<()> {
        let (stream, _) = self.listener.accept().await?;
        self.stream = Some(stream);
        Ok(())
    }

    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        match self.stream.as_mut() {
            Some(stream) => Ok(stream.write_all(bytes).await?),
            None => Err(crate::VisionaryError::not_connected("blob feeder")),
        }
    }

    /// Close the client connection; the reader sees end of stream.
    pub async fn hang_up(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}

/// Calibration of a small synthetic sensor.
pub fn sample_camera(width: u16, height: u16) -> CameraParameters {
    CameraParameters {
        width,
        height,
        fx: 146.5,
        fy: 146.5,
        cx: f64::from(width) / 2.0,
        cy: f64::from(height) / 2.0,
        k1: -0.05,
        ..Default::default()
    }
}

/// Depth ramp used by [`sample_blob`]: pixel `i` holds `1000 + i`, wrapping.
pub fn sample_depth(pixels: usize) -> Vec<u16> {
    (0..pixels).map(|i| 1000u16.wrapping_add(i as u16)).collect()
}

/// Complete wire blob carrying every map `family` needs.
pub fn sample_blob(family: DeviceFamily, sequence: u32, width: u16, height: u16) -> Bytes {
    let camera = sample_camera(width, height);
    let pixels = camera.pixel_count();
    let writer = BlobWriter::new(sequence)
        .timestamp_ms(u64::from(sequence) * 33)
        .calibration(&camera)
        .depth(&sample_depth(pixels))
        .state(&vec![0u16; pixels]);

    match family {
        DeviceFamily::VisionaryS => writer.color(&vec![0xFF80_4020; pixels]).encode(),
        DeviceFamily::VisionaryTMini => writer.intensity(&vec![512u16; pixels]).encode(),
    }
}
