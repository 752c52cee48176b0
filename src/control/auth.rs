//! Login messages
//!
//! Current firmware uses the SHA-256 challenge-response login. Older firmware
//! only knows `SetAccessMode` with a 32-bit digest folded from MD5.

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::cola::{Command, CommandBuilder, CommandReader};
use crate::types::UserLevel;
use crate::{Result, VisionaryError};

pub(crate) const GET_CHALLENGE: &str = "GetChallenge";
pub(crate) const SET_USER_LEVEL: &str = "SetUserLevel";
pub(crate) const RUN: &str = "Run";
pub(crate) const SET_ACCESS_MODE: &str = "SetAccessMode";

const CHALLENGE_LEN: usize = 16;
const SALT_LEN: usize = 16;

/// Device realm mixed into every password hash.
const REALM: &str = "SICK Sensor";

/// Nonce and salt handed out by `GetChallenge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub challenge: [u8; CHALLENGE_LEN],
    pub salt: [u8; SALT_LEN],
}

impl Challenge {
    /// Parse a `GetChallenge` return value: status, challenge, salt.
    pub(crate) fn from_response(level: UserLevel, response: &Command) -> Result<Self> {
        let mut reader = CommandReader::new(response);
        let status = reader.read_u8()?;
        if status != 0 {
            return Err(VisionaryError::authentication(
                level,
                format!("challenge refused with status {}", status),
            ));
        }
        let mut challenge = [0u8; CHALLENGE_LEN];
        challenge.copy_from_slice(reader.read_bytes(CHALLENGE_LEN)?);
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(reader.read_bytes(SALT_LEN)?);
        Ok(Self { challenge, salt })
    }
}

/// Login hash: `SHA256(SHA256("<level>:SICK Sensor:<password>:" ++ salt) ++ challenge)`.
pub fn password_hash(level: UserLevel, password: &str, challenge: &Challenge) -> [u8; 32] {
    let mut inner = Sha256::new();
    inner.update(format!("{}:{}:{}:", level.hash_name(), REALM, password).as_bytes());
    inner.update(challenge.salt);
    let inner = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(inner);
    outer.update(challenge.challenge);
    outer.finalize().into()
}

/// Legacy password digest: MD5 of the password, its four words XORed together,
/// read little-endian.
pub fn legacy_password_hash(password: &str) -> u32 {
    let digest = Md5::digest(password.as_bytes());
    let mut folded = [0u8; 4];
    for (i, byte) in folded.iter_mut().enumerate() {
        *byte = digest[i] ^ digest[i + 4] ^ digest[i + 8] ^ digest[i + 12];
    }
    u32::from_le_bytes(folded)
}

pub(crate) fn set_access_mode_request(level: UserLevel, password: &str) -> Result<Command> {
    CommandBuilder::invoke_method(SET_ACCESS_MODE)
        .param_i8(level.code() as i8)
        .param_u32(legacy_password_hash(password))
        .build()
}

pub(crate) fn challenge_request(level: UserLevel) -> Result<Command> {
    CommandBuilder::invoke_method(GET_CHALLENGE).param_u8(level.code()).build()
}

pub(crate) fn set_user_level_request(hash: &[u8; 32], level: UserLevel) -> Result<Command> {
    CommandBuilder::invoke_method(SET_USER_LEVEL).param_bytes(hash).param_u8(level.code()).build()
}

pub(crate) fn logout_request() -> Result<Command> {
    CommandBuilder::invoke_method(RUN).build()
}
