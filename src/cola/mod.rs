//! CoLa command protocol: parameter codec, commands and control framing.
//!
//! A request is assembled with [`CommandBuilder`], sent through a
//! [`ControlSession`](crate::control::ControlSession), and its response is taken
//! apart with [`CommandReader`]:
//!
//! ```rust
//! use visionary::cola::{CommandBuilder, CommandReader, CommandType};
//!
//! let request = CommandBuilder::write_variable("framePeriodTime")
//!     .param_u32(150_000)
//!     .build()?;
//! assert_eq!(request.kind(), CommandType::WriteVariable);
//!
//! let mut reader = CommandReader::new(&request);
//! assert_eq!(reader.read_u32()?, 150_000);
//! assert!(reader.is_exhausted());
//! # Ok::<(), visionary::VisionaryError>(())
//! ```

mod builder;
pub mod codec;
mod command;
mod error_code;
pub mod framing;
mod reader;

pub use builder::CommandBuilder;
pub use codec::{ColaParam, MAX_FLEX_STRING_LEN, decode_value, encode_value};
pub use command::{Command, CommandType, MAX_NAME_LEN, validate_name};
pub use error_code::ColaError;
pub use framing::ProtocolVariant;
pub use reader::CommandReader;
