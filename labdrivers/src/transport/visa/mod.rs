use std::time::Duration;

pub use visa_sys::{VisaError, VisaResult};
use visa_sys::Instrument as VisaInstrument;

use super::{decode_line, Transport};
use crate::config::InstrumentOptions;

mod visa_sys;

const READ_CHUNK: usize = 1024;

/// Transport through the system VISA library, for GPIB, USB-TMC and VXI-11
/// resources.
pub struct VisaTransport {
    instr: VisaInstrument,
    terminator: String,
    timeout: Duration,
}

impl VisaTransport {
    /// `ASRL` resources get the terminator as VISA termchar. Addresses parsed
    /// by [`crate::Address`] route serial ports to the native serial
    /// transport, so this only matters when opening a resource directly.
    pub fn open(resource: &str, options: &InstrumentOptions) -> crate::Result<Self> {
        let timeout = options.timeout()?;
        let instr = VisaInstrument::open(resource, timeout)?;
        if resource.to_uppercase().starts_with("ASRL") {
            if let Some(term) = options.terminator.bytes().last() {
                instr.set_termchar(term)?;
            }
        }
        Ok(Self {
            instr,
            terminator: options.terminator.clone(),
            timeout,
        })
    }
}

impl Transport for VisaTransport {
    fn write_line(&mut self, line: &str) -> crate::Result<()> {
        let data = format!("{}{}", line, self.terminator);
        self.instr.write(data.as_bytes())?;
        Ok(())
    }

    fn read_line(&mut self) -> crate::Result<String> {
        let mut ret = Vec::new();
        loop {
            let (chunk, more) = self.instr.read(READ_CHUNK)?;
            ret.extend_from_slice(&chunk);
            if !more || ret.ends_with(self.terminator.as_bytes()) {
                break;
            }
        }
        Ok(decode_line(&ret, &self.terminator))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> crate::Result<()> {
        self.instr.set_timeout(timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    fn resource(&self) -> String {
        self.instr.addr().to_string()
    }
}
