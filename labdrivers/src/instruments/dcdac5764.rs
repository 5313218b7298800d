//! Custom made 8 channel DC DAC (AD5764) behind an Arduino.

use labdrivers_protocol::scpi::format_float;
use labdrivers_protocol::Idn;

use super::{check_channel, parse_channel_name, start_session, DAC_BOOT_DELAY};
use crate::config::InstrumentOptions;
use crate::parameter::{NumericParameter, ParameterCache, Snapshot};
use crate::session::Session;
use crate::transport::Transport;
use crate::validators::{Ints, Numbers};

pub const CHANNEL_COUNT: usize = 8;
pub const CHANNEL_PREFIX: &str = "channel";

pub const VOLTAGE: Numbers = Numbers::new(-10.0, 10.0);
/// Signed 8 bit
pub const OFFSET: Ints = Ints::signed_bits(8);
/// Signed 6 bit
pub const STEP: Ints = Ints::signed_bits(6);

pub struct Dcdac5764Channel {
    session: Session,
    number: usize,
    cache: ParameterCache,
}

impl Dcdac5764Channel {
    fn new(session: Session, number: usize) -> Self {
        Self {
            session,
            number,
            cache: ParameterCache::default(),
        }
    }

    pub fn name(&self) -> String {
        format!("{}{}", CHANNEL_PREFIX, self.number)
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Output voltage in V.
    pub fn voltage(&mut self) -> crate::Result<f64> {
        let ret = self.session.ask_number(format!("{}:VOLTAGE?", self.name()))?;
        self.cache.set("voltage", ret);
        Ok(ret)
    }

    pub fn set_voltage(&mut self, voltage: f64) -> crate::Result<()> {
        let voltage = VOLTAGE.validate("voltage", voltage)?;
        self.session
            .write(format!("{}:VOLTAGE {}", self.name(), format_float(voltage)))?;
        self.cache.set("voltage", voltage);
        Ok(())
    }

    /// The offset register cannot be read back.
    pub fn set_offset(&mut self, offset: i64) -> crate::Result<()> {
        let offset = OFFSET.validate("offset", offset)?;
        self.session.write(format!("{}:OFFSET {}", self.name(), offset))?;
        self.cache.set("offset", offset);
        Ok(())
    }

    pub fn offset(&self) -> Option<i64> {
        self.cache.get("offset").and_then(|x| x.as_i64())
    }

    /// The step register cannot be read back.
    pub fn set_step(&mut self, step: i64) -> crate::Result<()> {
        let step = STEP.validate("step", step)?;
        self.session.write(format!("{}:STEP {}", self.name(), step))?;
        self.cache.set("step", step);
        Ok(())
    }

    pub fn step(&self) -> Option<i64> {
        self.cache.get("step").and_then(|x| x.as_i64())
    }

    pub fn voltage_param(&mut self) -> Voltage<'_> {
        Voltage(self)
    }

    pub fn snapshot(&mut self, update: bool) -> crate::Result<Snapshot> {
        if update {
            self.voltage()?;
        }
        Ok(Snapshot::new(&self.name(), &self.cache))
    }
}

/// Channel voltage as a rampable parameter.
pub struct Voltage<'a>(&'a mut Dcdac5764Channel);

impl<'a> NumericParameter for Voltage<'a> {
    fn name(&self) -> String {
        format!("{}_voltage", self.0.name())
    }

    fn get(&mut self) -> crate::Result<f64> {
        self.0.voltage()
    }

    fn set(&mut self, value: f64) -> crate::Result<()> {
        self.0.set_voltage(value)
    }
}

pub struct Dcdac5764 {
    name: String,
    session: Session,
    idn: Option<Idn>,
    channels: [Dcdac5764Channel; CHANNEL_COUNT],
}

impl Dcdac5764 {
    pub fn open(name: &str, address: &str, options: &InstrumentOptions) -> crate::Result<Self> {
        let transport = super::connect(address, options)?;
        Self::with_transport(name, transport, options)
    }

    pub fn with_transport(
        name: &str,
        transport: Box<dyn Transport>,
        options: &InstrumentOptions,
    ) -> crate::Result<Self> {
        let (session, begin) = start_session(transport, options, DAC_BOOT_DELAY)?;
        let channels = std::array::from_fn(|i| Dcdac5764Channel::new(session.clone(), i + 1));
        let idn = session.connect_message(name, begin);
        Ok(Self {
            name: name.to_string(),
            session,
            idn,
            channels,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn idn(&self) -> Option<&Idn> {
        self.idn.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Channel `number`, counting from 1.
    pub fn channel(&mut self, number: usize) -> crate::Result<&mut Dcdac5764Channel> {
        let idx = check_channel(number, CHANNEL_PREFIX, CHANNEL_COUNT)?;
        Ok(&mut self.channels[idx])
    }

    pub fn channel_by_name(&mut self, name: &str) -> crate::Result<&mut Dcdac5764Channel> {
        let number = parse_channel_name(name, CHANNEL_PREFIX, CHANNEL_COUNT)?;
        self.channel(number)
    }

    pub fn channels(&mut self) -> &mut [Dcdac5764Channel; CHANNEL_COUNT] {
        &mut self.channels
    }

    /// Set every channel to 0 V and clear offsets and steps.
    pub fn reset(&mut self) -> crate::Result<()> {
        self.session.write("*RST")?;
        for channel in self.channels.iter_mut() {
            channel.set_offset(0)?;
            channel.set_step(0)?;
        }
        log::debug!("{}: reset instrument, re-querying settings", self.name);
        self.snapshot(true)?;
        Ok(())
    }

    pub fn snapshot(&mut self, update: bool) -> crate::Result<Snapshot> {
        let mut ret = Snapshot::new(&self.name, &ParameterCache::default()).with_idn(self.idn.clone());
        for channel in self.channels.iter_mut() {
            ret.add_submodule(channel.snapshot(update)?);
        }
        Ok(ret)
    }

    pub fn close(self) {
        log::info!("{}: closing {}", self.name, self.session.resource());
    }
}
