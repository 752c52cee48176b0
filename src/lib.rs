//! Async protocol engine for SICK Visionary 3D cameras.
//!
//! Visionary devices expose two TCP channels: a control channel speaking the
//! CoLa command protocol (CoLa-B or CoLa-2 framing) and a data channel
//! streaming binary blobs with depth, intensity, state and color maps.
//!
//! # Features
//!
//! - **Commands**: typed [`CommandBuilder`](cola::CommandBuilder) and
//!   [`CommandReader`](cola::CommandReader) over the CoLa binary encoding
//! - **Sessions**: connect, SHA-256 challenge login, request/response exchange
//!   and acquisition control through [`ControlSession`]
//! - **Streaming**: blob reassembly, CRC checking, sequence tracking and
//!   per-family decoding through [`FrameChannel`]
//! - **Acquisition**: a background driver publishing frames to any number of
//!   rate-limited subscribers
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use visionary::{DeviceConfig, UpdateRate, UserLevel, Visionary};
//!
//! #[tokio::main]
//! async fn main() -> visionary::Result<()> {
//!     let config = DeviceConfig::from_yaml_file("camera.yaml")?;
//!
//!     let mut control = Visionary::connect(&config).await?;
//!     control.login(UserLevel::AuthorizedClient, "CLIENT").await?;
//!     control.start_acquisition().await?.into_result()?;
//!
//!     let acquisition = Visionary::acquire(&config).await?;
//!     let mut frames = acquisition.subscribe(UpdateRate::Max(5));
//!     while let Some(frame) = frames.next().await {
//!         println!("frame {} at {} ms", frame.sequence, frame.timestamp_ms);
//!     }
//!
//!     let failures = acquisition.stop().await;
//!     println!("{}", failures);
//!     control.close().await;
//!     Ok(())
//! }
//! ```

mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Protocol layers
pub mod cola;
pub mod control;
pub mod decoder;
pub mod stream;

// Acquisition and collaborators
pub mod acquisition;
pub mod config;
pub mod discovery;
pub mod report;
pub mod source;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use acquisition::{Acquisition, AcquisitionHandle, AcquisitionOptions};
pub use config::DeviceConfig;
pub use control::{ControlSession, SessionState};
pub use decoder::{Decoder, FrameDecoder};
pub use report::{FailureKind, FailureLog};
pub use source::FrameSource;
pub use stream::FrameChannel;

/// Entry point building connections from a [`DeviceConfig`].
///
/// ```rust,no_run
/// use visionary::{DeviceConfig, Visionary};
///
/// # #[tokio::main]
/// # async fn main() -> visionary::Result<()> {
/// let config = DeviceConfig::default();
/// let mut session = Visionary::connect(&config).await?;
/// println!("{}", session.device_ident().await?);
/// # Ok(())
/// # }
/// ```
pub struct Visionary;

impl Visionary {
    /// Open the control channel.
    ///
    /// CoLa-2 sessions are opened on the device before this returns.
    pub async fn connect(config: &DeviceConfig) -> Result<ControlSession> {
        config.validate()?;
        let mut session = ControlSession::with_options(config.protocol, config.session_options());
        session
            .open((config.host.as_str(), config.control_port()), config.connect_timeout())
            .await?;
        Ok(session)
    }

    /// Open the data channel with the decoder of the configured family.
    pub async fn open_stream(config: &DeviceConfig) -> Result<FrameChannel> {
        config.validate()?;
        FrameChannel::open(
            &config.host,
            config.data_port,
            config.family.decoder(),
            config.stream_options(),
        )
        .await
    }

    /// Open the data channel and start a background acquisition on it.
    ///
    /// Acquisition on the device must be started separately through the control channel.
    pub async fn acquire(config: &DeviceConfig) -> Result<AcquisitionHandle> {
        let channel = Self::open_stream(config).await?;
        Ok(Acquisition::spawn(channel, config.acquisition_options()))
    }
}
