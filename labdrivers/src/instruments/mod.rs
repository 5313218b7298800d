//! Drivers for the individual instruments.
//!
//! Every driver owns a [`Session`] and hands clones of it to its channels.
//! Parameters are validated before anything is written, and the last value
//! read or written is kept for [`Snapshot`](crate::parameter::Snapshot)s.

use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::address::Address;
use crate::config::InstrumentOptions;
use crate::session::Session;
use crate::transport::{self, Transport};
use crate::Error;

pub mod acdac9106;
pub mod dcdac5764;
pub mod dmm6500;
pub mod gs820;

pub use acdac9106::{Acdac9106, Acdac9106Channel, DisplayMode};
pub use dcdac5764::{Dcdac5764, Dcdac5764Channel};
pub use dmm6500::{Dmm6500, Mode};
pub use gs820::{Gs820, Gs820Channel, SourceMode};

/// Settling time the Arduino based DACs need after the port has been opened.
pub const DAC_BOOT_DELAY: Duration = Duration::from_secs(3);

/// Open the transport for `address` with the given options.
pub fn connect(address: &str, options: &InstrumentOptions) -> crate::Result<Box<dyn Transport>> {
    options.validate()?;
    let address = Address::parse(address)?;
    transport::open(&address, options)
}

/// Wrap a transport into a session and wait for the device to boot.
pub(crate) fn start_session(
    transport: Box<dyn Transport>,
    options: &InstrumentOptions,
    default_boot_delay: Duration,
) -> crate::Result<(Session, Instant)> {
    let begin = Instant::now();
    let session = Session::new(transport);
    session.set_timeout(options.timeout()?)?;
    let delay = options.boot_delay_or(default_boot_delay)?;
    if delay > Duration::from_secs(0) {
        log::debug!("Waiting {:?} for {} to boot", delay, session.resource());
        sleep(delay);
    }
    Ok((session, begin))
}

/// Map a channel name such as `channel3` to its index, starting at 1.
pub(crate) fn parse_channel_name(name: &str, prefix: &str, count: usize) -> crate::Result<usize> {
    name.strip_prefix(prefix)
        .and_then(|x| x.parse::<usize>().ok())
        .filter(|x| (1..=count).contains(x))
        .ok_or_else(|| Error::InvalidChannel(name.to_string()))
}

pub(crate) fn check_channel(number: usize, prefix: &str, count: usize) -> crate::Result<usize> {
    if (1..=count).contains(&number) {
        Ok(number - 1)
    } else {
        Err(Error::InvalidChannel(format!("{}{}", prefix, number)))
    }
}
