use serde::{Deserialize, Serialize};

pub mod error;
pub mod scpi;

pub use crate::error::{Error, ProtocolError, TransportError};
pub use crate::scpi::{Idn, ScpiRequest, ScpiResponse};

pub type Result<T> = std::result::Result<T, Error>;

/// Serial port configuration as written in address strings, e.g. `9600` and `8N1`.
#[derive(Clone, Serialize, Deserialize, Debug, Hash, PartialEq, Eq)]
pub struct SerialPortConfig {
    pub config: String,
    pub baudrate: u32,
}

impl Default for SerialPortConfig {
    fn default() -> Self {
        SerialPortConfig {
            config: "8N1".to_string(),
            baudrate: 9600,
        }
    }
}
