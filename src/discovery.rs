//! Device discovery and IP assignment collaborator types
//!
//! The crate defines what a discovery implementation exchanges with callers;
//! the broadcast transport itself lives outside this crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use crate::cola::ProtocolVariant;
use crate::{Result, VisionaryError};

/// Hardware address of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

impl FromStr for MacAddress {
    type Err = VisionaryError;

    /// Accepts `:` or `-` separated hex octets.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || VisionaryError::config(format!("invalid MAC address '{}'", s));
        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for octet in &mut octets {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddress(octets))
    }
}

/// A device answering a discovery scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
    /// Device type name, e.g. "Visionary-T Mini CX"
    pub name: String,
    /// Control port reported by the device
    pub port: u16,
    pub subnet: Ipv4Addr,
}

/// Network configuration to push to a device identified by MAC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAssignment {
    pub mac: MacAddress,
    pub protocol: ProtocolVariant,
    pub ip: Ipv4Addr,
    pub prefix_length: u8,
    pub gateway: Ipv4Addr,
    pub dhcp: bool,
}

impl IpAssignment {
    pub fn validate(&self) -> Result<()> {
        if self.prefix_length > 32 {
            return Err(VisionaryError::config(format!(
                "prefix length {} exceeds 32",
                self.prefix_length
            )));
        }
        if !self.dhcp {
            if self.ip.is_unspecified() || self.ip.is_broadcast() || self.ip.is_multicast() {
                return Err(VisionaryError::config(format!("{} is not a host address", self.ip)));
            }
            if !self.gateway.is_unspecified() && !self.same_subnet(self.gateway) {
                return Err(VisionaryError::config(format!(
                    "gateway {} outside {}/{}",
                    self.gateway, self.ip, self.prefix_length
                )));
            }
        }
        Ok(())
    }

    /// Netmask derived from the prefix length.
    pub fn netmask(&self) -> Ipv4Addr {
        let bits = match self.prefix_length {
            0 => 0,
            n => u32::MAX << (32 - u32::from(n.min(32))),
        };
        Ipv4Addr::from(bits)
    }

    fn same_subnet(&self, other: Ipv4Addr) -> bool {
        let mask = u32::from(self.netmask());
        u32::from(self.ip) & mask == u32::from(other) & mask
    }
}

/// Pluggable discovery transport.
#[async_trait::async_trait]
pub trait DeviceDiscovery: Send {
    /// Collect devices answering within `timeout`.
    async fn scan(&mut self, timeout: Duration) -> Result<Vec<DeviceDescriptor>>;

    /// Push `assignment`; `Ok(false)` if the device did not acknowledge.
    async fn assign(&mut self, assignment: &IpAssignment, timeout: Duration) -> Result<bool>;
}

/// Drop repeated answers from the same device, keeping the first.
pub fn unique_by_mac(devices: Vec<DeviceDescriptor>) -> Vec<DeviceDescriptor> {
    let mut seen = HashSet::new();
    devices.into_iter().filter(|device| seen.insert(device.mac)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(last_octet: u8, ip: [u8; 4]) -> DeviceDescriptor {
        DeviceDescriptor {
            mac: MacAddress([0x00, 0x06, 0x77, 0x01, 0x02, last_octet]),
            ip: Ipv4Addr::from(ip),
            name: "Visionary-S CX".into(),
            port: 2122,
            subnet: Ipv4Addr::new(255, 255, 255, 0),
        }
    }

    fn assignment() -> IpAssignment {
        IpAssignment {
            mac: MacAddress([0, 6, 0x77, 1, 2, 3]),
            protocol: ProtocolVariant::Cola2,
            ip: Ipv4Addr::new(192, 168, 1, 10),
            prefix_length: 24,
            gateway: Ipv4Addr::new(192, 168, 1, 1),
            dhcp: false,
        }
    }

    #[test]
    fn mac_parse_and_display() {
        let mac: MacAddress = "00:06:77:0A:bb:FF".parse().unwrap();
        assert_eq!(mac.to_string(), "00:06:77:0a:bb:ff");
        assert_eq!("00-06-77-0a-bb-ff".parse::<MacAddress>().unwrap(), mac);

        assert!("00:06:77:0a:bb".parse::<MacAddress>().is_err());
        assert!("00:06:77:0a:bb:ff:01".parse::<MacAddress>().is_err());
        assert!("00:06:77:0a:bb:zz".parse::<MacAddress>().is_err());
        assert!("0:06:77:0a:bb:ff".parse::<MacAddress>().is_err());
    }

    #[test]
    fn assignment_validation() {
        assert!(assignment().validate().is_ok());
        assert_eq!(assignment().netmask(), Ipv4Addr::new(255, 255, 255, 0));

        let mut bad = assignment();
        bad.prefix_length = 33;
        assert!(bad.validate().is_err());

        let mut bad = assignment();
        bad.gateway = Ipv4Addr::new(10, 0, 0, 1);
        assert!(bad.validate().is_err());

        let mut dhcp = assignment();
        dhcp.dhcp = true;
        dhcp.ip = Ipv4Addr::UNSPECIFIED;
        assert!(dhcp.validate().is_ok());
    }

    #[test]
    fn duplicates_are_removed_in_order() {
        let devices = vec![
            descriptor(1, [192, 168, 1, 10]),
            descriptor(2, [192, 168, 1, 11]),
            descriptor(1, [192, 168, 1, 10]),
        ];
        let unique = unique_by_mac(devices);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[1].ip, Ipv4Addr::new(192, 168, 1, 11));
    }
}
