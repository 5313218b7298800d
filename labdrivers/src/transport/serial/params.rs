//! Line settings of a serial port. The frame format is written the usual way,
//! data bits, parity and stop bits in one word such as `8N1` or `7E2`.

use std::convert::TryFrom;
use std::fmt::{self, Display, Formatter};

use anyhow::anyhow;
use labdrivers_protocol::SerialPortConfig;
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Eq, PartialEq, Clone, Copy, Serialize, Deserialize, Hash)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

#[derive(Debug, Eq, PartialEq, Clone, Copy, Serialize, Deserialize, Hash)]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Eq, PartialEq, Clone, Copy, Serialize, Deserialize, Hash)]
pub enum StopBits {
    One,
    Two,
}

const DATA_BITS: [(char, DataBits); 4] = [
    ('5', DataBits::Five),
    ('6', DataBits::Six),
    ('7', DataBits::Seven),
    ('8', DataBits::Eight),
];
const PARITIES: [(char, Parity); 3] = [('N', Parity::None), ('O', Parity::Odd), ('E', Parity::Even)];
const STOP_BITS: [(char, StopBits); 2] = [('1', StopBits::One), ('2', StopBits::Two)];

fn lookup<T: Copy + PartialEq>(table: &[(char, T)], c: char) -> Option<T> {
    let c = c.to_ascii_uppercase();
    table.iter().find(|(k, _)| *k == c).map(|(_, v)| *v)
}

fn code<T: Copy + PartialEq>(table: &[(char, T)], value: T) -> char {
    table.iter().find(|(_, v)| *v == value).map(|(k, _)| *k).unwrap_or('?')
}

/// Split a frame format such as `8N1` into its parts.
pub fn parse_frame(frame: &str) -> crate::Result<(DataBits, Parity, StopBits)> {
    let invalid = || Error::argument(anyhow!("Invalid serial settings `{}`", frame));
    let chars: Vec<char> = frame.trim().chars().collect();
    if chars.len() != 3 {
        return Err(invalid());
    }
    Ok((
        lookup(&DATA_BITS, chars[0]).ok_or_else(invalid)?,
        lookup(&PARITIES, chars[1]).ok_or_else(invalid)?,
        lookup(&STOP_BITS, chars[2]).ok_or_else(invalid)?,
    ))
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize, Hash)]
pub struct SerialParams {
    pub baud: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
}

impl Default for SerialParams {
    fn default() -> Self {
        Self::with_baud(9600)
    }
}

impl SerialParams {
    /// 8N1 at the given baud rate.
    pub fn with_baud(baud: u32) -> Self {
        SerialParams {
            baud,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
        }
    }

    /// Parses `[path, baud, frame]`, e.g. `["/dev/ttyUSB0", "9600", "8N1"]`.
    pub fn from_address(parts: &[&str]) -> crate::Result<(String, SerialParams)> {
        let (path, baud, frame) = match parts {
            [path, baud, frame] => (path, baud, frame),
            _ => return Err(Error::InvalidAddress(parts.join("::"))),
        };
        let baud: u32 = baud
            .parse()
            .map_err(|_| Error::InvalidAddress(parts.join("::")))?;
        let (data_bits, parity, stop_bits) = parse_frame(frame)?;
        let params = SerialParams {
            baud,
            data_bits,
            stop_bits,
            parity,
        };
        Ok((path.to_string(), params))
    }

    pub fn frame(&self) -> String {
        [
            code(&DATA_BITS, self.data_bits),
            code(&PARITIES, self.parity),
            code(&STOP_BITS, self.stop_bits),
        ]
        .iter()
        .collect()
    }
}

impl TryFrom<SerialPortConfig> for SerialParams {
    type Error = Error;

    fn try_from(config: SerialPortConfig) -> crate::Result<Self> {
        let (data_bits, parity, stop_bits) = parse_frame(&config.config)?;
        Ok(SerialParams {
            baud: config.baudrate,
            data_bits,
            stop_bits,
            parity,
        })
    }
}

impl From<SerialParams> for SerialPortConfig {
    fn from(params: SerialParams) -> Self {
        SerialPortConfig {
            config: params.frame(),
            baudrate: params.baud,
        }
    }
}

impl Display for SerialParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.baud, self.frame())
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(x: DataBits) -> Self {
        match x {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(x: Parity) -> Self {
        match x {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(x: StopBits) -> Self {
        match x {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames() {
        assert_eq!(
            parse_frame("7e2").unwrap(),
            (DataBits::Seven, Parity::Even, StopBits::Two)
        );
        assert!(parse_frame("8N").is_err());
        assert!(parse_frame("9N1").is_err());
        assert!(parse_frame("8X1").is_err());
        assert!(parse_frame("8N3").is_err());
    }

    #[test]
    fn config_conversion() {
        let params = SerialParams::with_baud(115200);
        let config: SerialPortConfig = params.clone().into();
        assert_eq!(config.config, "8N1");
        assert_eq!(SerialParams::try_from(config).unwrap(), params);
        assert_eq!(params.to_string(), "115200::8N1");
        assert_eq!(SerialParams::default().baud, 9600);
    }

    #[test]
    fn from_address_parts() {
        let (path, params) = SerialParams::from_address(&["/dev/ttyACM0", "19200", "8O1"]).unwrap();
        assert_eq!(path, "/dev/ttyACM0");
        assert_eq!(params.baud, 19200);
        assert_eq!(params.parity, Parity::Odd);
        assert!(SerialParams::from_address(&["/dev/ttyACM0", "fast", "8N1"]).is_err());
        assert!(SerialParams::from_address(&["/dev/ttyACM0", "9600"]).is_err());
    }
}
