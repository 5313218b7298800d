//! Custom made 4 channel AC DAC (AD9106) behind an Arduino.
//!
//! Channel settings only take effect once the pattern is updated, so every
//! write is followed by `PAT:UPDATE` on the same line.

use std::fmt::{self, Display};
use std::str::FromStr;

use labdrivers_protocol::scpi::format_float;
use labdrivers_protocol::Idn;
use serde::{Deserialize, Serialize};

use super::{check_channel, parse_channel_name, start_session, DAC_BOOT_DELAY};
use crate::config::InstrumentOptions;
use crate::parameter::{NumericParameter, ParameterCache, Snapshot};
use crate::session::Session;
use crate::transport::Transport;
use crate::validators::Numbers;
use crate::Error;

pub const CHANNEL_COUNT: usize = 4;
pub const CHANNEL_PREFIX: &str = "ch";

/// Amplitude in mV.
pub const VOLTAGE: Numbers = Numbers::new(0.0, 450.0);
/// Phase in degrees.
pub const PHASE: Numbers = Numbers::new(-180.0, 180.0);
/// Pattern frequency in Hz.
pub const FREQUENCY: Numbers = Numbers::new(0.0, 1e6);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayMode {
    Normal,
    Focus1,
    Focus2,
    Focus3,
    Focus4,
    /// Front panel shows that the DAC is under remote control.
    Remote,
}

impl DisplayMode {
    pub fn code(&self) -> u8 {
        match self {
            DisplayMode::Normal => 0,
            DisplayMode::Focus1 => 1,
            DisplayMode::Focus2 => 2,
            DisplayMode::Focus3 => 3,
            DisplayMode::Focus4 => 4,
            DisplayMode::Remote => 5,
        }
    }
}

impl Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let x = match self {
            DisplayMode::Normal => "NORMAL",
            DisplayMode::Focus1 => "FOCUS1",
            DisplayMode::Focus2 => "FOCUS2",
            DisplayMode::Focus3 => "FOCUS3",
            DisplayMode::Focus4 => "FOCUS4",
            DisplayMode::Remote => "REMOTE",
        };
        f.write_str(x)
    }
}

impl FromStr for DisplayMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NORMAL" => Ok(DisplayMode::Normal),
            "FOCUS1" => Ok(DisplayMode::Focus1),
            "FOCUS2" => Ok(DisplayMode::Focus2),
            "FOCUS3" => Ok(DisplayMode::Focus3),
            "FOCUS4" => Ok(DisplayMode::Focus4),
            "REMOTE" => Ok(DisplayMode::Remote),
            _ => Err(Error::InvalidValue {
                parameter: "display_mode".to_string(),
                value: s.to_string(),
                allowed: "NORMAL, FOCUS1, FOCUS2, FOCUS3, FOCUS4, REMOTE".to_string(),
            }),
        }
    }
}

pub struct Acdac9106Channel {
    session: Session,
    number: usize,
    cache: ParameterCache,
}

impl Acdac9106Channel {
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

    /// Channel name used on the wire.
    pub fn wire_name(&self) -> String {
        format!("CHAN{}", self.number)
    }

    /// Amplitude in mV.
    pub fn voltage(&mut self) -> crate::Result<f64> {
        let ret = self.session.ask_number(format!("{}:VOLTAGE?", self.wire_name()))?;
        self.cache.set("voltage", ret);
        Ok(ret)
    }

    pub fn set_voltage(&mut self, voltage: f64) -> crate::Result<()> {
        let voltage = VOLTAGE.validate("voltage", voltage)?;
        self.session.write(format!(
            "{}:VOLTAGE {};PAT:UPDATE",
            self.wire_name(),
            format_float(voltage)
        ))?;
        self.cache.set("voltage", voltage);
        Ok(())
    }

    /// Phase in degrees.
    pub fn phase(&mut self) -> crate::Result<f64> {
        let ret = self.session.ask_number(format!("{}:PHASE?", self.wire_name()))?;
        self.cache.set("phase", ret);
        Ok(ret)
    }

    pub fn set_phase(&mut self, phase: f64) -> crate::Result<()> {
        let phase = PHASE.validate("phase", phase)?;
        self.session.write(format!(
            "{}:PHASE {};PAT:UPDATE",
            self.wire_name(),
            format_float(phase)
        ))?;
        self.cache.set("phase", phase);
        Ok(())
    }

    pub fn voltage_param(&mut self) -> ChannelParam<'_> {
        ChannelParam {
            channel: self,
            kind: ChannelParamKind::Voltage,
        }
    }

    pub fn phase_param(&mut self) -> ChannelParam<'_> {
        ChannelParam {
            channel: self,
            kind: ChannelParamKind::Phase,
        }
    }

    pub fn snapshot(&mut self, update: bool) -> crate::Result<Snapshot> {
        if update {
            self.voltage()?;
            self.phase()?;
        }
        Ok(Snapshot::new(&self.name(), &self.cache))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChannelParamKind {
    Voltage,
    Phase,
}

/// Voltage or phase of one channel, for ramping.
pub struct ChannelParam<'a> {
    channel: &'a mut Acdac9106Channel,
    kind: ChannelParamKind,
}

impl<'a> NumericParameter for ChannelParam<'a> {
    fn name(&self) -> String {
        match self.kind {
            ChannelParamKind::Voltage => format!("{}_voltage", self.channel.name()),
            ChannelParamKind::Phase => format!("{}_phase", self.channel.name()),
        }
    }

    fn get(&mut self) -> crate::Result<f64> {
        match self.kind {
            ChannelParamKind::Voltage => self.channel.voltage(),
            ChannelParamKind::Phase => self.channel.phase(),
        }
    }

    fn set(&mut self, value: f64) -> crate::Result<()> {
        match self.kind {
            ChannelParamKind::Voltage => self.channel.set_voltage(value),
            ChannelParamKind::Phase => self.channel.set_phase(value),
        }
    }
}

pub struct Acdac9106 {
    name: String,
    session: Session,
    idn: Option<Idn>,
    channels: [Acdac9106Channel; CHANNEL_COUNT],
    cache: ParameterCache,
}

impl Acdac9106 {
    pub fn open(name: &str, address: &str, options: &InstrumentOptions) -> crate::Result<Self> {
        let transport = super::connect(address, options)?;
        Self::with_transport(name, transport, options)
    }

    /// Connects and switches the front panel to remote mode.
    pub fn with_transport(
        name: &str,
        transport: Box<dyn Transport>,
        options: &InstrumentOptions,
    ) -> crate::Result<Self> {
        let (session, begin) = start_session(transport, options, DAC_BOOT_DELAY)?;
        let channels = std::array::from_fn(|i| Acdac9106Channel::new(session.clone(), i + 1));
        let idn = session.connect_message(name, begin);
        let mut ret = Self {
            name: name.to_string(),
            session,
            idn,
            channels,
            cache: ParameterCache::default(),
        };
        ret.set_display_mode(DisplayMode::Remote)?;
        Ok(ret)
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

    pub fn channel(&mut self, number: usize) -> crate::Result<&mut Acdac9106Channel> {
        let idx = check_channel(number, CHANNEL_PREFIX, CHANNEL_COUNT)?;
        Ok(&mut self.channels[idx])
    }

    /// Look up a channel by its name, `ch1` to `ch4`.
    pub fn channel_by_name(&mut self, name: &str) -> crate::Result<&mut Acdac9106Channel> {
        let number = parse_channel_name(name, CHANNEL_PREFIX, CHANNEL_COUNT)?;
        self.channel(number)
    }

    pub fn channels(&mut self) -> &mut [Acdac9106Channel; CHANNEL_COUNT] {
        &mut self.channels
    }

    pub fn frequency(&mut self) -> crate::Result<f64> {
        let ret = self.session.ask_number("FREQ?")?;
        self.cache.set("frequency", ret);
        Ok(ret)
    }

    pub fn set_frequency(&mut self, frequency: f64) -> crate::Result<()> {
        let frequency = FREQUENCY.validate("frequency", frequency)?;
        self.session
            .write(format!("FREQ {};PAT:UPDATE", format_float(frequency)))?;
        self.cache.set("frequency", frequency);
        Ok(())
    }

    pub fn frequency_param(&mut self) -> Frequency<'_> {
        Frequency(self)
    }

    /// Oldest entry of the error queue.
    pub fn error(&mut self) -> crate::Result<String> {
        self.session.ask("SYS:ERR?")
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) -> crate::Result<()> {
        self.session.write(format!("SYS:DISP:MODE {}", mode.code()))?;
        self.cache.set("display_mode", mode);
        Ok(())
    }

    /// Last display mode set. The DAC does not report it.
    pub fn display_mode(&self) -> Option<DisplayMode> {
        self.cache
            .get("display_mode")
            .and_then(|x| serde_json::from_value(x.clone()).ok())
    }

    /// Zero amplitude and phase on every channel.
    pub fn reset(&mut self) -> crate::Result<()> {
        self.session.write("*RST")?;
        self.set_display_mode(DisplayMode::Remote)?;
        log::debug!("{}: reset instrument, re-querying settings", self.name);
        self.snapshot(true)?;
        Ok(())
    }

    pub fn snapshot(&mut self, update: bool) -> crate::Result<Snapshot> {
        if update {
            self.frequency()?;
        }
        let mut ret = Snapshot::new(&self.name, &self.cache).with_idn(self.idn.clone());
        for channel in self.channels.iter_mut() {
            ret.add_submodule(channel.snapshot(update)?);
        }
        Ok(ret)
    }

    pub fn close(self) {
        log::info!("{}: closing {}", self.name, self.session.resource());
    }
}

/// Pattern frequency as a rampable parameter.
pub struct Frequency<'a>(&'a mut Acdac9106);

impl<'a> NumericParameter for Frequency<'a> {
    fn name(&self) -> String {
        format!("{}_frequency", self.0.name())
    }

    fn get(&mut self) -> crate::Result<f64> {
        self.0.frequency()
    }

    fn set(&mut self, value: f64) -> crate::Result<()> {
        self.0.set_frequency(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_modes() {
        assert_eq!("remote".parse::<DisplayMode>().unwrap(), DisplayMode::Remote);
        assert_eq!("FOCUS3".parse::<DisplayMode>().unwrap().code(), 3);
        assert_eq!(DisplayMode::Normal.to_string(), "NORMAL");
        assert!("FOCUS5".parse::<DisplayMode>().is_err());
        assert_eq!(
            serde_json::to_value(DisplayMode::Focus2).unwrap(),
            serde_json::Value::from("FOCUS2")
        );
    }
}
