/// This module implements some base types and functions to interact with SCPI-based instruments
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ScpiRequest {
    Write(String),
    QueryString(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ScpiResponse {
    Done,
    String(String),
}

/// Identification record returned by `*IDN?`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Idn {
    pub vendor: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl Idn {
    /// Parse a comma separated `*IDN?` reply. Missing fields stay empty.
    pub fn parse(reply: &str) -> crate::Result<Self> {
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(Error::unexpected_response(reply));
        }
        let mut fields = reply.splitn(4, ',').map(|x| x.trim().to_string());
        Ok(Idn {
            vendor: fields.next().unwrap_or_default(),
            model: fields.next().unwrap_or_default(),
            serial: fields.next().unwrap_or_default(),
            firmware: fields.next().unwrap_or_default(),
        })
    }
}

/// Below this magnitude [`format_float`] switches to exponent notation.
const EXPONENT_THRESHOLD: f64 = 1e-4;

/// Render a float the way the instruments expect plain numeric arguments:
/// integral values keep a trailing `.0`, tiny values such as ramp residues
/// use exponent form, everything else the shortest representation that
/// round-trips.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value == value.trunc() && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else if value.is_finite() && value.abs() < EXPONENT_THRESHOLD {
        format!("{:e}", value)
    } else {
        format!("{}", value)
    }
}

/// Scientific notation with `precision` digits after the decimal point and a
/// signed, at least two digit exponent, e.g. `1.00000e+01`.
pub fn format_sci(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*e}", precision, value);
    let (mantissa, exponent) = match formatted.split_once('e') {
        Some(x) => x,
        None => return formatted,
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{}e{}{:0>2}", mantissa, sign, digits)
}

/// Clean up a string reply: trims whitespace, lowercases and removes one pair
/// of surrounding quotes.
pub fn clean_response(reply: &str) -> String {
    let s = reply.trim().to_lowercase();
    let quoted = s.len() >= 2
        && (s.starts_with('"') && s.ends_with('"') || s.starts_with('\'') && s.ends_with('\''));
    if quoted {
        s[1..s.len() - 1].to_string()
    } else {
        s
    }
}

/// Parse a numeric reply. Accepts integer and float formatting.
pub fn parse_number(reply: &str) -> crate::Result<f64> {
    let cleaned = reply.trim().trim_matches(|c| c == '"' || c == '\'');
    cleaned
        .parse::<f64>()
        .map_err(|_| Error::unexpected_response(reply))
}

/// Parse a boolean reply (`1`, `0`, `ON`, `OFF`, or any number).
pub fn parse_bool(reply: &str) -> crate::Result<bool> {
    match clean_response(reply).as_str() {
        "on" | "true" => Ok(true),
        "off" | "false" => Ok(false),
        _ => parse_number(reply).map(|x| x != 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_idn() {
        let idn = Idn::parse("BARRERA,DCDAC (Simulated),1337,0.0.01\n").unwrap();
        assert_eq!(idn.vendor, "BARRERA");
        assert_eq!(idn.model, "DCDAC (Simulated)");
        assert_eq!(idn.serial, "1337");
        assert_eq!(idn.firmware, "0.0.01");

        let idn = Idn::parse("YOKOGAWA,765611").unwrap();
        assert_eq!(idn.model, "765611");
        assert_eq!(idn.serial, "");
        assert!(Idn::parse("  ").is_err());
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(-10.0), "-10.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(24e3), "24000.0");
        assert_eq!(format_float(1e-4), "0.0001");
        assert_eq!(format_float(0.0), "0.0");
    }

    #[test]
    fn tiny_floats_use_exponent() {
        assert_eq!(format_float(5.551115123125783e-17), "5.551115123125783e-17");
        assert_eq!(format_float(-2.5e-6), "-2.5e-6");
        assert_eq!(format_float(5e-5).parse::<f64>().unwrap(), 5e-5);
    }

    #[test]
    fn sci_formatting() {
        assert_eq!(format_sci(10.0, 5), "1.00000e+01");
        assert_eq!(format_sci(0.005, 5), "5.00000e-03");
        assert_eq!(format_sci(-1.5, 5), "-1.50000e+00");
        assert_eq!(format_sci(0.0, 5), "0.00000e+00");
        assert_eq!(format_sci(1.2e-100, 2), "1.20e-100");
    }

    #[test]
    fn cleaning() {
        assert_eq!(clean_response("\"VOLT:DC\"\n"), "volt:dc");
        assert_eq!(clean_response("'MOV'"), "mov");
        assert_eq!(clean_response("REP"), "rep");
        assert_eq!(clean_response("\""), "\"");
    }

    #[test]
    fn numbers_and_bools() {
        assert_eq!(parse_number("+1.000000E+00").unwrap(), 1.0);
        assert_eq!(parse_number("5").unwrap(), 5.0);
        assert!(parse_number("abc").is_err());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("ON").unwrap());
        assert!(parse_bool("what").is_err());
    }
}
