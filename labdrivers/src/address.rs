//! Parsing of resource strings such as "ASRL4::INSTR",
//! "serial::/dev/ttyUSB0::9600::8N1" or "TCPIP0::169.254.169.1::inst0::INSTR".

use std::fmt;
use std::fmt::{Display, Formatter};

use crate::transport::serial::SerialParams;
use crate::Error;

/// Represents a parsed address string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    /// A serial port. Without explicit parameters the ones from the
    /// instrument options are used.
    Serial {
        path: String,
        params: Option<SerialParams>,
    },
    /// A raw TCP socket.
    Tcp { host: String, port: u16 },
    /// Anything else is handed to the VISA library verbatim.
    Visa { resource: String },
}

impl Address {
    /// Create a new `Address` by parsing the given address string.
    /// Addresses not matching any of the known prefixes are treated as VISA resources.
    pub fn parse(addr: &str) -> crate::Result<Self> {
        let invalid = || Error::InvalidAddress(addr.to_string());
        let splits: Vec<&str> = addr.trim().split("::").collect();
        if splits.len() < 2 || splits.iter().any(|x| x.is_empty()) {
            return Err(invalid());
        }
        let kind = splits[0].to_lowercase();
        let last = splits[splits.len() - 1].to_uppercase();

        if kind == "serial" {
            // serial::/dev/ttyUSB0 or serial::/dev/ttyUSB0::9600::8N1
            match splits.len() {
                2 => Ok(Address::Serial {
                    path: splits[1].to_string(),
                    params: None,
                }),
                4 => {
                    let (path, params) = SerialParams::from_address(&splits[1..4])?;
                    Ok(Address::Serial {
                        path,
                        params: Some(params),
                    })
                }
                _ => Err(invalid()),
            }
        } else if kind == "tcp" {
            // tcp::192.168.0.1:5025
            if splits.len() != 2 {
                return Err(invalid());
            }
            let (host, port) = splits[1].rsplit_once(':').ok_or_else(invalid)?;
            let port: u16 = port.parse().map_err(|_| invalid())?;
            if host.is_empty() {
                return Err(invalid());
            }
            Ok(Address::Tcp {
                host: host.to_string(),
                port,
            })
        } else if kind.starts_with("asrl") && last == "INSTR" && splits.len() == 2 {
            // ASRL4::INSTR or ASRL/dev/ttyUSB0::INSTR
            let port = &splits[0][4..];
            let path = if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
                let num: u32 = port.parse().map_err(|_| invalid())?;
                serial_port_name(num).ok_or_else(invalid)?
            } else if port.is_empty() {
                return Err(invalid());
            } else {
                port.to_string()
            };
            Ok(Address::Serial { path, params: None })
        } else if kind.starts_with("tcpip") && last == "SOCKET" && splits.len() == 4 {
            // TCPIP0::192.168.0.1::5025::SOCKET
            let port: u16 = splits[2].parse().map_err(|_| invalid())?;
            Ok(Address::Tcp {
                host: splits[1].to_string(),
                port,
            })
        } else {
            Ok(Address::Visa {
                resource: addr.trim().to_string(),
            })
        }
    }

    pub fn is_serial(&self) -> bool {
        matches!(self, Address::Serial { .. })
    }
}

/// Maps a VISA serial port number onto the platform's device name.
fn serial_port_name(num: u32) -> Option<String> {
    if num == 0 {
        return None;
    }
    if cfg!(windows) {
        Some(format!("COM{}", num))
    } else {
        Some(format!("/dev/ttyS{}", num - 1))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Address::Serial { path, params: None } => write!(f, "serial::{}", path),
            Address::Serial {
                path,
                params: Some(params),
            } => write!(f, "serial::{}::{}", path, params),
            Address::Tcp { host, port } => write!(f, "tcp::{}:{}", host, port),
            Address::Visa { resource } => f.write_str(resource),
        }
    }
}
