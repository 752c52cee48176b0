//! Device-reported result codes

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! cola_errors {
    ($($variant:ident = $code:literal => $text:literal,)*) => {
        /// Result code carried by every response [`Command`](super::Command).
        ///
        /// `Ok` for successful responses; anything else is a normal protocol
        /// outcome the caller branches on, not a transport failure.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[non_exhaustive]
        pub enum ColaError {
            $($variant,)*
            /// Code not named by this crate
            Other(u16),
        }

        impl ColaError {
            /// Decode a wire code.
            pub const fn from_code(code: u16) -> Self {
                match code {
                    $($code => ColaError::$variant,)*
                    other => ColaError::Other(other),
                }
            }

            /// Wire code of this result.
            pub const fn code(self) -> u16 {
                match self {
                    $(ColaError::$variant => $code,)*
                    ColaError::Other(code) => code,
                }
            }

            fn description(self) -> Option<&'static str> {
                match self {
                    $(ColaError::$variant => Some($text),)*
                    ColaError::Other(_) => None,
                }
            }
        }
    };
}

cola_errors! {
    Ok = 0 => "ok",
    MethodAccessDenied = 1 => "method access denied",
    MethodUnknownIndex = 2 => "unknown method",
    VariableUnknownIndex = 3 => "unknown variable",
    LocalConditionFailed = 4 => "local condition failed",
    InvalidData = 5 => "invalid data",
    UnknownError = 6 => "unknown error",
    BufferOverflow = 7 => "buffer overflow",
    BufferUnderflow = 8 => "buffer underflow",
    UnknownType = 9 => "unknown type",
    VariableWriteAccessDenied = 10 => "variable write access denied",
    UnknownNameServerCommand = 11 => "unknown command for name server",
    UnknownColaCommand = 12 => "unknown CoLa command",
    MethodServerBusy = 13 => "method server busy",
    FlexOutOfBounds = 14 => "flex array or string out of bounds",
    EventRegUnknownIndex = 15 => "unknown event",
    ColaAValueOverflow = 16 => "CoLa-A value overflow",
    ColaAInvalidCharacter = 17 => "CoLa-A invalid character",
    OsaiNoMessage = 18 => "no message",
    OsaiNoAnswerMessage = 19 => "no answer message",
    Internal = 20 => "internal error",
    HubAddressCorrupted = 21 => "hub address corrupted",
    HubAddressDecoding = 22 => "hub address decoding failed",
    HubAddressExceeded = 23 => "hub address exceeded",
    HubAddressBlankExpected = 24 => "hub address blank expected",
    AsyncMethodsSuppressed = 25 => "asynchronous methods are suppressed",
    ComplexArraysNotSupported = 32 => "complex arrays not supported",
    SessionNoResources = 33 => "no session resources",
    SessionUnknownId = 34 => "unknown session id",
    CannotConnect = 35 => "cannot connect",
    InvalidPort = 36 => "invalid port",
    ScanAlreadyActive = 37 => "scan already active",
    OutOfTimers = 38 => "out of timers",
}

impl ColaError {
    pub fn is_ok(self) -> bool {
        self == ColaError::Ok
    }
}

impl Default for ColaError {
    fn default() -> Self {
        ColaError::Ok
    }
}

impl fmt::Display for ColaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(text) => write!(f, "{} (code {})", text, self.code()),
            None => write!(f, "device error code {}", self.code()),
        }
    }
}
