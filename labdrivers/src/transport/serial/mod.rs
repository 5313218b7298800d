use std::io;
use std::time::Duration;

use anyhow::anyhow;
use serialport::SerialPort;

pub use params::SerialParams;

use super::stream::{LineStream, TimeoutStream};
use super::Transport;
use crate::config::InstrumentOptions;

pub mod params;

#[cfg(target_os = "linux")]
mod linux_low_latency;

impl TimeoutStream for Box<dyn SerialPort> {
    fn apply_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        SerialPort::set_timeout(self.as_mut(), timeout).map_err(io::Error::from)
    }
}

/// Serial port transport, as used by the Arduino based DACs (`ASRLn::INSTR`).
pub struct SerialTransport {
    inner: LineStream<Box<dyn SerialPort>>,
    path: String,
    params: SerialParams,
}

impl SerialTransport {
    pub fn open(path: &str, params: &SerialParams, options: &InstrumentOptions) -> crate::Result<Self> {
        let port = Self::open_serial_port(path, params, options.timeout()?)?;
        Ok(Self {
            inner: LineStream::new(port, &options.terminator, options.timeout()?)?,
            path: path.to_string(),
            params: params.clone(),
        })
    }

    fn open_serial_port(path: &str, params: &SerialParams, timeout: Duration) -> crate::Result<Box<dyn SerialPort>> {
        let builder = serialport::new(path, params.baud)
            .parity(params.parity.into())
            .stop_bits(params.stop_bits.into())
            .data_bits(params.data_bits.into())
            .flow_control(serialport::FlowControl::None)
            .timeout(timeout);

        #[cfg(target_os = "linux")]
        {
            let port = builder.open_native().map_err(map_serial_error)?;
            match linux_low_latency::apply_low_latency(&port) {
                Ok(()) => log::debug!("Applied ASYNC_LOW_LATENCY to {}", path),
                Err(x) => log::warn!("Cannot set ASYNC_LOW_LATENCY on serial port {}: {}", path, x),
            }
            Ok(Box::new(port))
        }

        #[cfg(not(target_os = "linux"))]
        {
            builder.open().map_err(map_serial_error)
        }
    }

    pub fn params(&self) -> &SerialParams {
        &self.params
    }
}

impl Transport for SerialTransport {
    fn write_line(&mut self, line: &str) -> crate::Result<()> {
        self.inner.write_line(line)
    }

    fn read_line(&mut self) -> crate::Result<String> {
        self.inner.read_line()
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) -> crate::Result<()> {
        self.inner.set_timeout(timeout)
    }

    fn resource(&self) -> String {
        format!("serial::{}::{}", self.path, self.params)
    }
}

pub(crate) fn map_serial_error(err: serialport::Error) -> crate::Error {
    match err.kind() {
        serialport::ErrorKind::Io(kind) => io::Error::new(kind, err.description).into(),
        _ => crate::Error::transport(anyhow!(err)),
    }
}

/// Names of the serial ports present on this machine.
pub fn list_devices() -> crate::Result<Vec<String>> {
    match serialport::available_ports() {
        Ok(x) => Ok(x.iter().map(|x| x.port_name.clone()).collect()),
        Err(err) => Err(map_serial_error(err)),
    }
}
