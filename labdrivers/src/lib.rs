//! Drivers for the lab's SCPI style instruments: the custom AC and DC DACs,
//! the Keithley DMM6500 multimeter and the Yokogawa GS820 source-measure
//! unit. Instruments are reached over serial, raw TCP or VISA.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate dlopen_derive;

pub mod address;
pub mod config;
pub mod instruments;
pub mod monitor;
pub mod parameter;
pub mod ramp;
pub mod session;
pub mod transport;
pub mod validators;

pub use labdrivers_protocol::{Error, Idn, ProtocolError, Result, TransportError};

pub use crate::address::Address;
pub use crate::config::InstrumentOptions;
pub use crate::parameter::{NumericParameter, Snapshot};
pub use crate::session::Session;
pub use crate::transport::Transport;
