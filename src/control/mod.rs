//! Control channel: session lifecycle, authentication and command exchange.
//!
//! A [`ControlSession`] moves through
//! `Disconnected → Connected → Authenticated(level) → Disconnected`:
//!
//! - [`open`](ControlSession::open) connects and, for CoLa-2, opens a protocol session
//! - [`login`](ControlSession::login) runs the SHA-256 challenge-response login,
//!   or the legacy MD5 login on older firmware
//! - [`send_command`](ControlSession::send_command) performs one request/response exchange
//! - [`logout`](ControlSession::logout) drops back to `Connected`
//! - [`close`](ControlSession::close) releases the socket from any state

mod auth;
mod device;
mod session;


pub use auth::{Challenge, legacy_password_hash, password_hash};
pub use device::{DeviceIdent, FrontendMode, INFO_MESSAGE_COUNT, InfoMessage, IoFunction, MessageTime};
pub use session::{AcquisitionState, ControlSession, SessionOptions, SessionState};
