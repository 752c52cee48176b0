//! Typed access to well-known device variables

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ControlSession;
use crate::cola::{Command, CommandBuilder, CommandReader};
use crate::{Result, VisionaryError};

/// Number of records in the `MSinfo` variable.
pub const INFO_MESSAGE_COUNT: usize = 25;

/// Device name and firmware version from `DeviceIdent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdent {
    pub name: String,
    pub version: String,
}

impl DeviceIdent {
    pub(crate) fn from_response(response: &Command) -> Result<Self> {
        let mut reader = CommandReader::new(response);
        Ok(Self { name: reader.read_flex_string()?, version: reader.read_flex_string()? })
    }
}

impl fmt::Display for DeviceIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Power-on counter and operating time at which a message was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageTime {
    pub power_on_count: u16,
    pub operating_seconds: u32,
    pub time_occurred: u32,
}

impl MessageTime {
    fn read(reader: &mut CommandReader<'_>) -> Result<Self> {
        Ok(Self {
            power_on_count: reader.read_u16()?,
            operating_seconds: reader.read_u32()?,
            time_occurred: reader.read_u32()?,
        })
    }
}

/// One entry of the device info message log (`MSinfo`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoMessage {
    pub id: u32,
    pub state: u32,
    pub first_time: MessageTime,
    pub last_time: MessageTime,
    pub occurrences: u16,
    pub extended_info: String,
}

impl InfoMessage {
    /// Parse all records; unused slots (id 0) are skipped.
    pub(crate) fn parse_all(response: &Command) -> Result<Vec<Self>> {
        let mut reader = CommandReader::new(response);
        let mut messages = Vec::new();
        for _ in 0..INFO_MESSAGE_COUNT {
            let id = reader.read_u32()?;
            let state = reader.read_u32()?;
            let first_time = MessageTime::read(&mut reader)?;
            let last_time = MessageTime::read(&mut reader)?;
            let occurrences = reader.read_u16()?;
            let _reserved = reader.read_u16()?;
            let extended_info = reader.read_flex_string()?;
            if id != 0 {
                messages.push(Self { id, state, first_time, last_time, occurrences, extended_info });
            }
        }
        Ok(messages)
    }
}

/// Acquisition front end mode (`frontendMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrontendMode {
    Continuous = 0,
    /// Front end idle, frames only on trigger
    Stopped = 1,
}

/// Function assigned to a digital IO pin (`DIO<n>Fnc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoFunction {
    Inactive = 0,
    Trigger = 7,
    TriggerBusy = 23,
}

impl ControlSession {
    /// Read a variable, turning a device error into [`VisionaryError::Device`].
    pub async fn read_variable(&mut self, name: &str) -> Result<Command> {
        let request = CommandBuilder::read_variable(name).build()?;
        self.send_command(&request).await?.into_result()
    }

    /// Send a prepared write request, turning a device error into [`VisionaryError::Device`].
    pub async fn write_variable(&mut self, request: &Command) -> Result<Command> {
        self.send_command(request).await?.into_result()
    }

    /// Read the device name and version.
    pub async fn device_ident(&mut self) -> Result<DeviceIdent> {
        let response = self.read_variable("DeviceIdent").await?;
        DeviceIdent::from_response(&response)
    }

    /// Read the active entries of the info message log.
    pub async fn info_messages(&mut self) -> Result<Vec<InfoMessage>> {
        let response = self.read_variable("MSinfo").await?;
        InfoMessage::parse_all(&response)
    }

    /// Switch between continuous and triggered acquisition. Needs AuthorizedClient.
    pub async fn set_frontend_mode(&mut self, mode: FrontendMode) -> Result<()> {
        let request = CommandBuilder::write_variable("frontendMode").param_u8(mode as u8).build()?;
        self.write_variable(&request).await.map(|_| ())
    }

    /// Assign a function to digital IO pin `pin` (1-based). Needs AuthorizedClient.
    pub async fn set_io_function(&mut self, pin: u8, function: IoFunction) -> Result<()> {
        if pin == 0 {
            return Err(VisionaryError::InvalidCommand { details: "IO pins are numbered from 1".into() });
        }
        let request = CommandBuilder::write_variable(format!("DIO{}Fnc", pin))
            .param_u8(function as u8)
            .build()?;
        self.write_variable(&request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_record(builder: CommandBuilder, id: u32, text: &str) -> CommandBuilder {
        builder
            .param_u32(id)
            .param_u32(1)
            .param_u16(2)
            .param_u32(3)
            .param_u32(4)
            .param_u16(5)
            .param_u32(6)
            .param_u32(7)
            .param_u16(8)
            .param_u16(0)
            .param_flex_string(text)
    }

    #[test]
    fn info_messages_skip_empty_slots() {
        let mut builder = info_record(CommandBuilder::read_variable("MSinfo"), 0x1234, "hot");
        for _ in 1..INFO_MESSAGE_COUNT {
            builder = info_record(builder, 0, "");
        }
        let response = builder.build().unwrap();

        let messages = InfoMessage::parse_all(&response).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 0x1234);
        assert_eq!(messages[0].occurrences, 8);
        assert_eq!(messages[0].last_time.power_on_count, 5);
        assert_eq!(messages[0].extended_info, "hot");
    }

    #[test]
    fn short_info_log_is_truncated() {
        let response =
            info_record(CommandBuilder::read_variable("MSinfo"), 1, "x").build().unwrap();
        assert!(matches!(
            InfoMessage::parse_all(&response),
            Err(VisionaryError::TruncatedPayload { .. })
        ));
    }

    #[test]
    fn device_ident_reads_two_strings() {
        let response = CommandBuilder::read_variable("DeviceIdent")
            .param_flex_string("Visionary-T Mini CX")
            .param_flex_string("2.1.0")
            .build()
            .unwrap();
        let ident = DeviceIdent::from_response(&response).unwrap();
        assert_eq!(ident.to_string(), "Visionary-T Mini CX 2.1.0");
    }
}
