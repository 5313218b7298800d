use std::convert::TryInto;
use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;
use labdrivers_protocol::SerialPortConfig;
use serde::{Deserialize, Serialize};

use crate::transport::serial::SerialParams;
use crate::Error;

/// Connection settings shared by all instruments.
///
/// Durations are given in seconds so the options can be written by hand:
///
/// ```json
/// { "terminator": "\n", "timeout": 5.0, "boot_delay": 0.0, "serial": { "config": "8N1", "baudrate": 9600 } }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InstrumentOptions {
    pub terminator: String,
    /// Read timeout in seconds.
    pub timeout: f64,
    /// Settling time after opening the port, in seconds. `None` uses the
    /// instrument's own default.
    pub boot_delay: Option<f64>,
    /// Used for serial resources that do not carry their own settings.
    pub serial: SerialPortConfig,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self {
            terminator: "\n".to_string(),
            timeout: crate::transport::DEFAULT_TIMEOUT.as_secs_f64(),
            boot_delay: None,
            serial: SerialPortConfig::default(),
        }
    }
}

impl InstrumentOptions {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let ret: Self = serde_json::from_str(json).map_err(Error::argument)?;
        ret.validate()?;
        Ok(ret)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Options for simulated instruments: no settling time.
    pub fn without_boot_delay() -> Self {
        Self {
            boot_delay: Some(0.0),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.terminator.is_empty() {
            return Err(Error::argument(anyhow!("Terminator must not be empty")));
        }
        self.timeout()?;
        self.boot_delay_or(Duration::from_secs(0))?;
        self.serial_params()?;
        Ok(())
    }

    pub fn timeout(&self) -> crate::Result<Duration> {
        secs_to_duration("timeout", self.timeout).and_then(|x| {
            if x == Duration::from_secs(0) {
                Err(Error::argument(anyhow!("timeout must be positive")))
            } else {
                Ok(x)
            }
        })
    }

    pub fn boot_delay_or(&self, default: Duration) -> crate::Result<Duration> {
        match self.boot_delay {
            Some(x) => secs_to_duration("boot_delay", x),
            None => Ok(default),
        }
    }

    pub fn serial_params(&self) -> crate::Result<SerialParams> {
        self.serial.clone().try_into()
    }
}

fn secs_to_duration(name: &str, secs: f64) -> crate::Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(Error::argument(anyhow!("{} must be a non-negative number of seconds, got {}", name, secs)));
    }
    Ok(Duration::from_secs_f64(secs))
}
