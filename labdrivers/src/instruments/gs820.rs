//! Yokogawa GS820 two channel source-measure unit.
//!
//! Each channel sources either voltage or current. Level and range settings
//! belong to one of the two source modes and are only accessible while the
//! channel is in that mode. The mode itself can only be changed with the
//! output switched off.

use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Duration;

use labdrivers_protocol::scpi::{clean_response, format_float, format_sci, parse_bool};
use labdrivers_protocol::Idn;
use serde::{Deserialize, Serialize};

use super::{check_channel, parse_channel_name, start_session};
use crate::config::InstrumentOptions;
use crate::parameter::{NumericParameter, ParameterCache, Snapshot};
use crate::ramp;
use crate::session::Session;
use crate::transport::Transport;
use crate::validators::{on_off, Enum, Ints, Numbers};
use crate::Error;

pub const CHANNEL_COUNT: usize = 2;
pub const CHANNEL_PREFIX: &str = "channel";

pub const SUPPORTED_MODELS: [&str; 4] = ["765601", "765602", "765611", "765612"];

const VOLTAGE_RANGES_18V: [f64; 4] = [200e-3, 2e0, 7e0, 18e0];
const VOLTAGE_RANGES_50V: [f64; 4] = [200e-3, 2e0, 20e0, 50e0];
const CURRENT_RANGES_3A: [f64; 9] = [200e-9, 2e-6, 20e-6, 200e-6, 2e-3, 20e-3, 200e-3, 1.2e0, 3.2e0];
const CURRENT_RANGES_1A: [f64; 9] = [200e-9, 2e-6, 20e-6, 200e-6, 2e-3, 20e-3, 200e-3, 600e-3, 1.2e0];

pub const VOLTAGE_LIMIT: Ints = Ints::new(1, 30);
pub const CURRENT_LIMIT: Numbers = Numbers::new(1e-3, 200e-3);

/// Source range tables of one model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ranges {
    pub voltage: &'static [f64],
    pub current: &'static [f64],
}

impl Ranges {
    pub fn for_model(model: &str) -> crate::Result<Self> {
        match model {
            "765601" | "765602" => Ok(Ranges {
                voltage: &VOLTAGE_RANGES_18V,
                current: &CURRENT_RANGES_3A,
            }),
            "765611" | "765612" => Ok(Ranges {
                voltage: &VOLTAGE_RANGES_50V,
                current: &CURRENT_RANGES_1A,
            }),
            _ => Err(Error::UnsupportedModel {
                model: model.to_string(),
                supported: SUPPORTED_MODELS.join(", "),
            }),
        }
    }

    pub fn table(&self, mode: SourceMode) -> &'static [f64] {
        match mode {
            SourceMode::Volt => self.voltage,
            SourceMode::Curr => self.current,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceMode {
    Volt,
    Curr,
}

impl SourceMode {
    fn parameter(&self) -> &'static str {
        match self {
            SourceMode::Volt => "voltage",
            SourceMode::Curr => "current",
        }
    }

    fn range_parameter(&self) -> &'static str {
        match self {
            SourceMode::Volt => "voltage_range",
            SourceMode::Curr => "current_range",
        }
    }

    fn other(&self) -> SourceMode {
        match self {
            SourceMode::Volt => SourceMode::Curr,
            SourceMode::Curr => SourceMode::Volt,
        }
    }
}

impl Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMode::Volt => f.write_str("VOLT"),
            SourceMode::Curr => f.write_str("CURR"),
        }
    }
}

impl FromStr for SourceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match clean_response(s).as_str() {
            "volt" | "voltage" => Ok(SourceMode::Volt),
            "curr" | "current" => Ok(SourceMode::Curr),
            _ => Err(Error::InvalidValue {
                parameter: "source_mode".to_string(),
                value: s.to_string(),
                allowed: "VOLT, CURR".to_string(),
            }),
        }
    }
}

pub struct Gs820Channel {
    session: Session,
    number: usize,
    ranges: Ranges,
    mode: SourceMode,
    cache: ParameterCache,
}

impl Gs820Channel {
    /// Reads the present source mode, which may have been changed on the
    /// front panel or by an earlier session.
    fn connect(session: Session, number: usize, ranges: Ranges) -> crate::Result<Self> {
        let mut ret = Self {
            session,
            number,
            ranges,
            mode: SourceMode::Volt,
            cache: ParameterCache::default(),
        };
        ret.query_source_mode()?;
        Ok(ret)
    }

    pub fn name(&self) -> String {
        format!("{}{}", CHANNEL_PREFIX, self.number)
    }

    pub fn ranges(&self) -> Ranges {
        self.ranges
    }

    pub fn output(&mut self) -> crate::Result<bool> {
        let reply = self.session.ask(format!("{}:OUTPUT:STATE?", self.name()))?;
        let ret = parse_bool(&reply)?;
        self.cache.set("output", ret);
        Ok(ret)
    }

    pub fn set_output(&mut self, on: bool) -> crate::Result<()> {
        self.session
            .write(format!("{}:OUTPUT:STATE {}", self.name(), on_off(on)))?;
        self.cache.set("output", on);
        Ok(())
    }

    pub fn on(&mut self) -> crate::Result<()> {
        self.set_output(true)
    }

    pub fn off(&mut self) -> crate::Result<()> {
        self.set_output(false)
    }

    /// Last known source mode.
    pub fn source_mode(&self) -> SourceMode {
        self.mode
    }

    pub fn query_source_mode(&mut self) -> crate::Result<SourceMode> {
        let mode: SourceMode = self.session.ask(format!("{}:SOUR:FUNC?", self.name()))?.parse()?;
        self.update_mode(mode);
        Ok(mode)
    }

    /// Fails with [`Error::OutputEnabled`] if the output is on.
    pub fn set_source_mode(&mut self, mode: SourceMode) -> crate::Result<()> {
        if self.output()? {
            return Err(Error::OutputEnabled);
        }
        self.session.write(format!("{}:SOUR:FUNC {}", self.name(), mode))?;
        self.update_mode(mode);
        Ok(())
    }

    fn update_mode(&mut self, mode: SourceMode) {
        self.mode = mode;
        self.cache.set("source_mode", mode);
        let other = mode.other();
        self.cache.invalidate(other.parameter());
        self.cache.invalidate(other.range_parameter());
    }

    fn assert_mode(&self, required: SourceMode) -> crate::Result<()> {
        if self.mode != required {
            return Err(Error::mode_mismatch(required, self.mode));
        }
        Ok(())
    }

    fn get_range(&mut self, mode: SourceMode) -> crate::Result<f64> {
        self.assert_mode(mode)?;
        let ret = self
            .session
            .ask_number(format!("{}:SOUR:{}:RANGE?", self.name(), mode))?;
        self.cache.set(mode.range_parameter(), ret);
        Ok(ret)
    }

    fn set_range_for(&mut self, mode: SourceMode, range: f64) -> crate::Result<()> {
        self.assert_mode(mode)?;
        let range = Enum::new(self.ranges.table(mode)).validate(mode.range_parameter(), range)?;
        self.session.write(format!(
            "{}:SOUR:{}:RANGE {}",
            self.name(),
            mode,
            format_float(range)
        ))?;
        self.cache.set(mode.range_parameter(), range);
        Ok(())
    }

    pub fn voltage_range(&mut self) -> crate::Result<f64> {
        self.get_range(SourceMode::Volt)
    }

    pub fn set_voltage_range(&mut self, range: f64) -> crate::Result<()> {
        self.set_range_for(SourceMode::Volt, range)
    }

    pub fn current_range(&mut self) -> crate::Result<f64> {
        self.get_range(SourceMode::Curr)
    }

    pub fn set_current_range(&mut self, range: f64) -> crate::Result<()> {
        self.set_range_for(SourceMode::Curr, range)
    }

    /// Range of the present source mode.
    pub fn range(&mut self) -> crate::Result<f64> {
        self.get_range(self.mode)
    }

    pub fn set_range(&mut self, range: f64) -> crate::Result<()> {
        self.set_range_for(self.mode, range)
    }

    pub fn auto_range(&mut self) -> crate::Result<bool> {
        let reply = self.session.ask(format!("{}:SOUR:RANGE:AUTO?", self.name()))?;
        let ret = parse_bool(&reply)?;
        self.cache.set("auto_range", ret);
        Ok(ret)
    }

    pub fn set_auto_range(&mut self, enabled: bool) -> crate::Result<()> {
        self.session
            .write(format!("{}:SOUR:RANGE:AUTO {}", self.name(), on_off(enabled)))?;
        self.cache.set("auto_range", enabled);
        Ok(())
    }

    fn get_level(&mut self, mode: SourceMode) -> crate::Result<f64> {
        self.assert_mode(mode)?;
        let ret = self
            .session
            .ask_number(format!("{}:SOUR:{}:LEV?", self.name(), mode))?;
        self.cache.set(mode.parameter(), ret);
        Ok(ret)
    }

    /// Largest magnitude the level may take: the configured range, or the
    /// largest range of the mode while auto range is on.
    fn level_limit(&mut self, mode: SourceMode) -> crate::Result<f64> {
        if self.auto_range()? {
            Enum::new(self.ranges.table(mode))
                .max()
                .ok_or_else(|| Error::internal(anyhow::anyhow!("Empty range table")))
        } else {
            self.get_range(mode)
        }
    }

    fn check_level(&mut self, mode: SourceMode, level: f64) -> crate::Result<f64> {
        self.assert_mode(mode)?;
        let limit = self.level_limit(mode)?.abs();
        Numbers::new(-limit, limit).validate(mode.parameter(), level)
    }

    fn set_level(&mut self, mode: SourceMode, level: f64) -> crate::Result<()> {
        let level = self.check_level(mode, level)?;
        self.session.write(format!(
            "{}:SOUR:{}:LEV {}",
            self.name(),
            mode,
            format_sci(level, 5)
        ))?;
        self.cache.set(mode.parameter(), level);
        Ok(())
    }

    pub fn voltage(&mut self) -> crate::Result<f64> {
        self.get_level(SourceMode::Volt)
    }

    pub fn set_voltage(&mut self, voltage: f64) -> crate::Result<()> {
        self.set_level(SourceMode::Volt, voltage)
    }

    pub fn current(&mut self) -> crate::Result<f64> {
        self.get_level(SourceMode::Curr)
    }

    pub fn set_current(&mut self, current: f64) -> crate::Result<()> {
        self.set_level(SourceMode::Curr, current)
    }

    /// Source level of the present mode, in V or A.
    pub fn output_level(&mut self) -> crate::Result<f64> {
        self.get_level(self.mode)
    }

    pub fn set_output_level(&mut self, level: f64) -> crate::Result<()> {
        self.set_level(self.mode, level)
    }

    pub fn output_level_param(&mut self) -> OutputLevel<'_> {
        OutputLevel(self)
    }

    pub fn voltage_limit(&mut self) -> crate::Result<i64> {
        let ret = self.session.ask_number(":SOUR:PROT:VOLT?")?.round() as i64;
        self.cache.set("voltage_limit", ret);
        Ok(ret)
    }

    pub fn set_voltage_limit(&mut self, limit: i64) -> crate::Result<()> {
        let limit = VOLTAGE_LIMIT.validate("voltage_limit", limit)?;
        self.session.write(format!(":SOUR:PROT:VOLT {}", limit))?;
        self.cache.set("voltage_limit", limit);
        Ok(())
    }

    pub fn current_limit(&mut self) -> crate::Result<f64> {
        let ret = self.session.ask_number(":SOUR:PROT:CURR?")?;
        self.cache.set("current_limit", ret);
        Ok(ret)
    }

    pub fn set_current_limit(&mut self, limit: f64) -> crate::Result<()> {
        let limit = CURRENT_LIMIT.validate("current_limit", limit)?;
        self.session.write(format!(":SOUR:PROT:CURR {:.3}", limit))?;
        self.cache.set("current_limit", limit);
        Ok(())
    }

    pub fn four_wire(&mut self) -> crate::Result<bool> {
        let ret = parse_bool(&self.session.ask(":SENS:REM?")?)?;
        self.cache.set("four_wire", ret);
        Ok(ret)
    }

    pub fn set_four_wire(&mut self, enabled: bool) -> crate::Result<()> {
        self.session.write(format!(":SENS:REM {}", on_off(enabled)))?;
        self.cache.set("four_wire", enabled);
        Ok(())
    }

    /// Pops the oldest entry off the error log.
    pub fn system_errors(&mut self) -> crate::Result<String> {
        self.session.ask(":SYSTem:ERRor?")
    }

    pub fn reset(&mut self) -> crate::Result<()> {
        self.session.write("*RST")?;
        log::debug!("Reset {}, updating settings", self.name());
        self.snapshot(true)?;
        Ok(())
    }

    /// Step the voltage from its present level to `target`, waiting `delay`
    /// between writes.
    pub fn ramp_voltage(&mut self, target: f64, step: f64, delay: Duration) -> crate::Result<()> {
        self.ramp_source(SourceMode::Volt, target, step, delay)
    }

    pub fn ramp_current(&mut self, target: f64, step: f64, delay: Duration) -> crate::Result<()> {
        self.ramp_source(SourceMode::Curr, target, step, delay)
    }

    fn ramp_source(&mut self, mode: SourceMode, target: f64, step: f64, delay: Duration) -> crate::Result<()> {
        self.check_level(mode, target)?;
        ramp::sweep(&mut self.output_level_param(), target, step, delay)
    }

    /// Parameters of the inactive source mode are left out.
    pub fn snapshot(&mut self, update: bool) -> crate::Result<Snapshot> {
        if update {
            self.query_source_mode()?;
            self.output()?;
            self.auto_range()?;
            self.range()?;
            self.output_level()?;
            self.voltage_limit()?;
            self.current_limit()?;
            self.four_wire()?;
        }
        Ok(Snapshot::new(&self.name(), &self.cache))
    }
}

/// Source level of the active mode, as a rampable parameter.
pub struct OutputLevel<'a>(&'a mut Gs820Channel);

impl<'a> NumericParameter for OutputLevel<'a> {
    fn name(&self) -> String {
        format!("{}_{}", self.0.name(), self.0.mode.parameter())
    }

    fn get(&mut self) -> crate::Result<f64> {
        self.0.output_level()
    }

    fn set(&mut self, value: f64) -> crate::Result<()> {
        self.0.set_output_level(value)
    }
}

pub struct Gs820 {
    name: String,
    session: Session,
    idn: Option<Idn>,
    model: String,
    channels: [Gs820Channel; CHANNEL_COUNT],
}

impl Gs820 {
    pub fn open(name: &str, address: &str, options: &InstrumentOptions) -> crate::Result<Self> {
        let transport = super::connect(address, options)?;
        Self::with_transport(name, transport, options)
    }

    /// Fails with [`Error::UnsupportedModel`] unless `*IDN?` names one of
    /// [`SUPPORTED_MODELS`].
    pub fn with_transport(
        name: &str,
        transport: Box<dyn Transport>,
        options: &InstrumentOptions,
    ) -> crate::Result<Self> {
        let (session, begin) = start_session(transport, options, Duration::from_secs(0))?;
        let model = session.idn()?.model;
        let ranges = Ranges::for_model(&model)?;
        let channels = [
            Gs820Channel::connect(session.clone(), 1, ranges)?,
            Gs820Channel::connect(session.clone(), 2, ranges)?,
        ];
        let idn = session.connect_message(name, begin);
        Ok(Self {
            name: name.to_string(),
            session,
            idn,
            model,
            channels,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn idn(&self) -> Option<&Idn> {
        self.idn.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn channel(&mut self, number: usize) -> crate::Result<&mut Gs820Channel> {
        let idx = check_channel(number, CHANNEL_PREFIX, CHANNEL_COUNT)?;
        Ok(&mut self.channels[idx])
    }

    pub fn channel_by_name(&mut self, name: &str) -> crate::Result<&mut Gs820Channel> {
        let number = parse_channel_name(name, CHANNEL_PREFIX, CHANNEL_COUNT)?;
        self.channel(number)
    }

    pub fn channels(&mut self) -> &mut [Gs820Channel; CHANNEL_COUNT] {
        &mut self.channels
    }

    pub fn set_display_text(&mut self, text: &str) -> crate::Result<()> {
        if text.contains('"') {
            return Err(Error::InvalidValue {
                parameter: "display_text".to_string(),
                value: text.to_string(),
                allowed: "text without double quotes".to_string(),
            });
        }
        self.session.write(format!("SYST:DISP:TEXT \"{}\"", text))
    }

    /// Factory defaults for the whole unit. Cancels pending commands.
    pub fn reset(&mut self) -> crate::Result<()> {
        self.session.write("*RST")?;
        for channel in self.channels.iter_mut() {
            channel.query_source_mode()?;
        }
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
