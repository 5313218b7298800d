//! Line-oriented transports used to talk to the instruments.
//!
//! Every instrument in this crate speaks newline terminated ASCII. A
//! [`Transport`] writes one command line and reads one reply line; it does not
//! interpret the content.

use std::time::Duration;

use crate::address::Address;
use crate::config::InstrumentOptions;

pub mod loopback;
pub mod serial;
mod stream;
pub mod tcp;
pub mod visa;

pub use loopback::{Loopback, LoopbackLog};
pub use serial::SerialTransport;
pub use tcp::TcpTransport;
pub use visa::VisaTransport;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

pub trait Transport: Send {
    /// Write `line` followed by the terminator.
    fn write_line(&mut self, line: &str) -> crate::Result<()>;

    /// Read up to and including the next terminator. The returned string has
    /// the terminator and surrounding whitespace removed.
    fn read_line(&mut self) -> crate::Result<String>;

    fn query(&mut self, line: &str) -> crate::Result<String> {
        self.write_line(line)?;
        self.read_line()
    }

    fn timeout(&self) -> Duration;

    fn set_timeout(&mut self, timeout: Duration) -> crate::Result<()>;

    /// Human readable resource name, used in log messages.
    fn resource(&self) -> String;
}

/// Open the transport matching `address`.
pub fn open(address: &Address, options: &InstrumentOptions) -> crate::Result<Box<dyn Transport>> {
    log::debug!("Opening {}", address);
    let ret: Box<dyn Transport> = match address {
        Address::Serial { path, params } => {
            let params = match params {
                Some(params) => params.clone(),
                None => options.serial_params()?,
            };
            Box::new(SerialTransport::open(path, &params, options)?)
        }
        Address::Tcp { host, port } => Box::new(TcpTransport::connect(host, *port, options)?),
        Address::Visa { resource } => Box::new(VisaTransport::open(resource, options)?),
    };
    Ok(ret)
}

/// Strip the terminator and surrounding whitespace off a raw reply.
pub(crate) fn decode_line(data: &[u8], terminator: &str) -> String {
    let data = data.strip_suffix(terminator.as_bytes()).unwrap_or(data);
    String::from_utf8_lossy(data).trim().to_string()
}
