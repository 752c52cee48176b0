//! Device user levels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Authentication level of a control session.
///
/// Levels are ordered by privilege; a higher level supersedes the capabilities
/// of every lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UserLevel {
    Run,
    Operator,
    Maintenance,
    AuthorizedClient,
    Service,
}

impl UserLevel {
    /// Numeric code sent on the wire.
    pub const fn code(self) -> u8 {
        match self {
            UserLevel::Run => 0,
            UserLevel::Operator => 1,
            UserLevel::Maintenance => 2,
            UserLevel::AuthorizedClient => 3,
            UserLevel::Service => 4,
        }
    }

    /// Decode a wire code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(UserLevel::Run),
            1 => Some(UserLevel::Operator),
            2 => Some(UserLevel::Maintenance),
            3 => Some(UserLevel::AuthorizedClient),
            4 => Some(UserLevel::Service),
            _ => None,
        }
    }

    /// Name mixed into the password hash.
    pub const fn hash_name(self) -> &'static str {
        match self {
            UserLevel::Run => "Run",
            UserLevel::Operator => "Operator",
            UserLevel::Maintenance => "Maintenance",
            UserLevel::AuthorizedClient => "AuthorizedClient",
            UserLevel::Service => "Service",
        }
    }
}

impl fmt::Display for UserLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hash_name())
    }
}
