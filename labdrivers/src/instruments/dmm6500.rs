//! Keithley DMM6500 bench multimeter, SCPI command set only.
//!
//! Measurement settings such as NPLC or averaging belong to the active
//! measurement function and are addressed as `<function>:<setting>`.

use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Duration;

use labdrivers_protocol::scpi::{clean_response, format_float, parse_bool, parse_number};
use labdrivers_protocol::Idn;
use serde::{Deserialize, Serialize};

use super::start_session;
use crate::config::InstrumentOptions;
use crate::parameter::{ParameterCache, Snapshot};
use crate::session::Session;
use crate::transport::Transport;
use crate::validators::{on_off, Ints, Numbers};
use crate::Error;

pub const NPLC: Numbers = Numbers::new(0.01, 10.0);
pub const AVERAGING_COUNT: Ints = Ints::new(1, 100);
pub const DIGITS: Ints = Ints::new(4, 7);
pub const TRIGGER_COUNT: Ints = Ints::new(1, 9999);
pub const TIMER: Ints = Ints::new(1, 4);
/// Trigger delays and scan intervals, in s.
pub const INTERVAL: Numbers = Numbers::new(0.0, 999_999.999);

/// Measurement function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "ac current")]
    AcCurrent,
    #[serde(rename = "dc current")]
    DcCurrent,
    #[serde(rename = "ac voltage")]
    AcVoltage,
    #[serde(rename = "dc voltage")]
    DcVoltage,
    #[serde(rename = "2w resistance")]
    Resistance2W,
    #[serde(rename = "4w resistance")]
    Resistance4W,
    #[serde(rename = "temperature")]
    Temperature,
    #[serde(rename = "frequency")]
    Frequency,
}

const MODES: [Mode; 8] = [
    Mode::AcCurrent,
    Mode::DcCurrent,
    Mode::AcVoltage,
    Mode::DcVoltage,
    Mode::Resistance2W,
    Mode::Resistance4W,
    Mode::Temperature,
    Mode::Frequency,
];

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::AcCurrent => "ac current",
            Mode::DcCurrent => "dc current",
            Mode::AcVoltage => "ac voltage",
            Mode::DcVoltage => "dc voltage",
            Mode::Resistance2W => "2w resistance",
            Mode::Resistance4W => "4w resistance",
            Mode::Temperature => "temperature",
            Mode::Frequency => "frequency",
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Mode::AcCurrent => "CURR:AC",
            Mode::DcCurrent => "CURR:DC",
            Mode::AcVoltage => "VOLT:AC",
            Mode::DcVoltage => "VOLT:DC",
            Mode::Resistance2W => "RES",
            Mode::Resistance4W => "FRES",
            Mode::Temperature => "TEMP",
            Mode::Frequency => "FREQ",
        }
    }

    /// Parse the reply of `SENS:FUNC?`, e.g. `"VOLT:DC"`.
    pub fn from_reply(reply: &str) -> crate::Result<Self> {
        let reply_clean = clean_response(reply);
        MODES
            .iter()
            .copied()
            .find(|x| x.command().eq_ignore_ascii_case(&reply_clean))
            .ok_or_else(|| Error::unexpected_response(reply))
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        MODES
            .iter()
            .copied()
            .find(|x| x.name() == s)
            .ok_or_else(|| Error::InvalidValue {
                parameter: "mode".to_string(),
                value: s.clone(),
                allowed: MODES.iter().map(Mode::name).collect::<Vec<_>>().join(", "),
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AveragingType {
    Moving,
    Repeat,
}

impl AveragingType {
    fn command(&self) -> &'static str {
        match self {
            AveragingType::Moving => "moving",
            AveragingType::Repeat => "repeat",
        }
    }

    fn from_reply(reply: &str) -> crate::Result<Self> {
        match clean_response(reply).as_str() {
            "mov" | "moving" => Ok(AveragingType::Moving),
            "rep" | "repeat" => Ok(AveragingType::Repeat),
            _ => Err(Error::unexpected_response(reply)),
        }
    }
}

/// Brightness of the front panel. `Blackout` also turns off the indicators
/// and key lights.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backlight {
    On100,
    On75,
    On50,
    On25,
    Off,
    Blackout,
}

const BACKLIGHTS: [Backlight; 6] = [
    Backlight::On100,
    Backlight::On75,
    Backlight::On50,
    Backlight::On25,
    Backlight::Off,
    Backlight::Blackout,
];

impl Backlight {
    fn command(&self) -> &'static str {
        match self {
            Backlight::On100 => "ON100",
            Backlight::On75 => "ON75",
            Backlight::On50 => "ON50",
            Backlight::On25 => "ON25",
            Backlight::Off => "OFF",
            Backlight::Blackout => "BLACkout",
        }
    }

    fn from_reply(reply: &str) -> crate::Result<Self> {
        let cleaned = clean_response(reply);
        // the long form `blackout` is reported as `blac`
        BACKLIGHTS
            .iter()
            .copied()
            .find(|x| {
                let cmd = x.command().to_lowercase();
                cmd == cleaned || (*x == Backlight::Blackout && cleaned.starts_with("blac"))
            })
            .ok_or_else(|| Error::unexpected_response(reply))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerCount {
    Count(u32),
    Inf,
    Default,
    Minimum,
    Maximum,
}

impl TriggerCount {
    /// The meter reports an infinite count as 9.9e37.
    const INFINITE_REPLY: f64 = 9.9e37;

    fn from_reply(reply: &str) -> crate::Result<Self> {
        let count = parse_number(reply)?;
        if count >= Self::INFINITE_REPLY {
            Ok(TriggerCount::Inf)
        } else if count >= 0.0 && count <= u32::MAX as f64 && count.fract() == 0.0 {
            Ok(TriggerCount::Count(count as u32))
        } else {
            Err(Error::unexpected_response(reply))
        }
    }

    fn validate(&self) -> crate::Result<()> {
        if let TriggerCount::Count(x) = self {
            TRIGGER_COUNT.validate("trigger_count", *x as i64)?;
        }
        Ok(())
    }
}

impl Display for TriggerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerCount::Count(x) => write!(f, "{}", x),
            TriggerCount::Inf => f.write_str("inf"),
            TriggerCount::Default => f.write_str("default"),
            TriggerCount::Minimum => f.write_str("minimum"),
            TriggerCount::Maximum => f.write_str("maximum"),
        }
    }
}

/// Start stimulus of a trigger timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerSource {
    Immediate,
    Timer1,
    Timer2,
    Timer3,
    Timer4,
    Notify1,
    Notify2,
    Notify3,
    FrontPanel,
    Bus,
    External,
}

const TRIGGER_SOURCES: [TriggerSource; 11] = [
    TriggerSource::Immediate,
    TriggerSource::Timer1,
    TriggerSource::Timer2,
    TriggerSource::Timer3,
    TriggerSource::Timer4,
    TriggerSource::Notify1,
    TriggerSource::Notify2,
    TriggerSource::Notify3,
    TriggerSource::FrontPanel,
    TriggerSource::Bus,
    TriggerSource::External,
];

impl TriggerSource {
    fn command(&self) -> &'static str {
        match self {
            TriggerSource::Immediate => "NONE",
            TriggerSource::Timer1 => "TIM1",
            TriggerSource::Timer2 => "TIM2",
            TriggerSource::Timer3 => "TIM3",
            TriggerSource::Timer4 => "TIM4",
            TriggerSource::Notify1 => "NOT1",
            TriggerSource::Notify2 => "NOT2",
            TriggerSource::Notify3 => "NOT3",
            TriggerSource::FrontPanel => "DISP",
            TriggerSource::Bus => "COMM",
            TriggerSource::External => "EXT",
        }
    }

    fn from_reply(reply: &str) -> crate::Result<Self> {
        let cleaned = clean_response(reply);
        TRIGGER_SOURCES
            .iter()
            .copied()
            .find(|x| x.command().eq_ignore_ascii_case(&cleaned))
            .ok_or_else(|| Error::unexpected_response(reply))
    }
}

/// Input impedance in dc voltage mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputImpedance {
    #[serde(rename = "10")]
    TenMegaohm,
    #[serde(rename = "auto")]
    Auto,
}

impl InputImpedance {
    fn command(&self) -> &'static str {
        match self {
            InputImpedance::TenMegaohm => "MOHM10",
            InputImpedance::Auto => "AUTO",
        }
    }

    fn from_reply(reply: &str) -> crate::Result<Self> {
        match clean_response(reply).as_str() {
            "mohm10" => Ok(InputImpedance::TenMegaohm),
            "auto" => Ok(InputImpedance::Auto),
            _ => Err(Error::unexpected_response(reply)),
        }
    }
}

pub struct Dmm6500 {
    name: String,
    session: Session,
    idn: Option<Idn>,
    cache: ParameterCache,
}

impl Dmm6500 {
    pub fn open(name: &str, address: &str, options: &InstrumentOptions, reset_device: bool) -> crate::Result<Self> {
        let transport = super::connect(address, options)?;
        Self::with_transport(name, transport, options, reset_device)
    }

    /// Fails with [`Error::CommandSet`] unless the meter uses the SCPI command
    /// set. Optionally resets the meter, then selects ASCII data transfer.
    pub fn with_transport(
        name: &str,
        transport: Box<dyn Transport>,
        options: &InstrumentOptions,
        reset_device: bool,
    ) -> crate::Result<Self> {
        let (session, begin) = start_session(transport, options, Duration::from_secs(0))?;
        let command_set = session.ask("*LANG?")?.trim().to_string();
        if command_set != "SCPI" {
            return Err(Error::CommandSet(command_set));
        }
        let mut ret = Self {
            name: name.to_string(),
            session,
            idn: None,
            cache: ParameterCache::default(),
        };
        if reset_device {
            ret.reset()?;
        }
        ret.session.write("FORM:DATA ASCII")?;
        ret.idn = ret.session.connect_message(name, begin);
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

    pub fn mode(&mut self) -> crate::Result<Mode> {
        let ret = Mode::from_reply(&self.session.ask("SENS:FUNC?")?)?;
        self.cache.set("mode", ret);
        Ok(ret)
    }

    pub fn set_mode(&mut self, mode: Mode) -> crate::Result<()> {
        self.session.write(format!("SENS:FUNC '{}'", mode.command()))?;
        self.cache.set("mode", mode);
        Ok(())
    }

    fn get_mode_param(&mut self, parameter: &str) -> crate::Result<String> {
        let mode = self.mode()?;
        self.session.ask(format!("{}:{}?", mode.command(), parameter))
    }

    fn set_mode_param(&mut self, parameter: &str, value: &str) -> crate::Result<()> {
        let mode = self.mode()?;
        self.session
            .write(format!("{}:{} {}", mode.command(), parameter, value))
    }

    /// Integration time in power line cycles.
    pub fn nplc(&mut self) -> crate::Result<f64> {
        let ret = parse_number(&self.get_mode_param("NPLC")?)?;
        self.cache.set("nplc", ret);
        Ok(ret)
    }

    pub fn set_nplc(&mut self, nplc: f64) -> crate::Result<()> {
        let nplc = NPLC.validate("nplc", nplc)?;
        self.set_mode_param("NPLC", &format_float(nplc))?;
        self.cache.set("nplc", nplc);
        Ok(())
    }

    pub fn range(&mut self) -> crate::Result<f64> {
        let ret = parse_number(&self.get_mode_param("RANG")?)?;
        self.cache.set("range", ret);
        Ok(ret)
    }

    /// The allowed ranges depend on the measurement function; the meter
    /// picks the smallest range that fits.
    pub fn set_range(&mut self, range: f64) -> crate::Result<()> {
        let range = Numbers::new(f64::MIN, f64::MAX).validate("range", range)?;
        self.set_mode_param("RANG", &format_float(range))?;
        self.cache.set("range", range);
        Ok(())
    }

    pub fn auto_range(&mut self) -> crate::Result<bool> {
        let ret = parse_bool(&self.get_mode_param("RANG:AUTO")?)?;
        self.cache.set("auto_range_enabled", ret);
        Ok(ret)
    }

    pub fn set_auto_range(&mut self, enabled: bool) -> crate::Result<()> {
        self.set_mode_param("RANG:AUTO", on_off(enabled))?;
        self.cache.set("auto_range_enabled", enabled);
        Ok(())
    }

    pub fn averaging_type(&mut self) -> crate::Result<AveragingType> {
        let ret = AveragingType::from_reply(&self.get_mode_param("AVER:TCON")?)?;
        self.cache.set("averaging_type", ret);
        Ok(ret)
    }

    pub fn set_averaging_type(&mut self, kind: AveragingType) -> crate::Result<()> {
        self.set_mode_param("AVER:TCON", kind.command())?;
        self.cache.set("averaging_type", kind);
        Ok(())
    }

    pub fn averaging_count(&mut self) -> crate::Result<i64> {
        let ret = parse_number(&self.get_mode_param("AVER:COUN")?)? as i64;
        self.cache.set("averaging_count", ret);
        Ok(ret)
    }

    pub fn set_averaging_count(&mut self, count: i64) -> crate::Result<()> {
        let count = AVERAGING_COUNT.validate("averaging_count", count)?;
        self.set_mode_param("AVER:COUN", &count.to_string())?;
        self.cache.set("averaging_count", count);
        Ok(())
    }

    pub fn averaging_enabled(&mut self) -> crate::Result<bool> {
        let ret = parse_bool(&self.get_mode_param("AVER:STAT")?)?;
        self.cache.set("averaging_enabled", ret);
        Ok(ret)
    }

    pub fn set_averaging_enabled(&mut self, enabled: bool) -> crate::Result<()> {
        self.set_mode_param("AVER:STAT", on_off(enabled))?;
        self.cache.set("averaging_enabled", enabled);
        Ok(())
    }

    /// Number of displayed digits.
    pub fn digits(&mut self) -> crate::Result<i64> {
        let ret = self.session.ask_number("DISP:VOLT:DC:DIG?")? as i64;
        self.cache.set("digits", ret);
        Ok(ret)
    }

    pub fn set_digits(&mut self, digits: i64) -> crate::Result<()> {
        let digits = DIGITS.validate("digits", digits)?;
        self.session.write(format!("DISP:VOLT:DC:DIG {}", digits))?;
        self.cache.set("digits", digits);
        Ok(())
    }

    pub fn display_backlight(&mut self) -> crate::Result<Backlight> {
        let ret = Backlight::from_reply(&self.session.ask("DISP:LIGH:STAT?")?)?;
        self.cache.set("display_backlight", ret);
        Ok(ret)
    }

    pub fn set_display_backlight(&mut self, level: Backlight) -> crate::Result<()> {
        self.session.write(format!("DISP:LIGH:STAT {}", level.command()))?;
        self.cache.set("display_backlight", level);
        Ok(())
    }

    pub fn trigger_count(&mut self) -> crate::Result<TriggerCount> {
        let ret = TriggerCount::from_reply(&self.session.ask("ROUT:SCAN:COUN:SCAN?")?)?;
        self.cache.set("trigger_count", ret);
        Ok(ret)
    }

    pub fn set_trigger_count(&mut self, count: TriggerCount) -> crate::Result<()> {
        count.validate()?;
        self.session.write(format!("ROUT:SCAN:COUN:SCAN {}", count))?;
        self.cache.set("trigger_count", count);
        Ok(())
    }

    /// Delay of trigger timer `timer` (1 to 4), in s.
    pub fn trigger_delay(&mut self, timer: i64) -> crate::Result<f64> {
        let timer = TIMER.validate("timer", timer)?;
        let ret = self.session.ask_number(format!("TRIG:TIM{}:DEL?", timer))?;
        self.cache.set(&format!("trigger{}_delay", timer), ret);
        Ok(ret)
    }

    pub fn set_trigger_delay(&mut self, timer: i64, delay: f64) -> crate::Result<()> {
        let timer = TIMER.validate("timer", timer)?;
        let delay = INTERVAL.validate(&format!("trigger{}_delay", timer), delay)?;
        self.session
            .write(format!("TRIG:TIM{}:DEL {}", timer, format_float(delay)))?;
        self.cache.set(&format!("trigger{}_delay", timer), delay);
        Ok(())
    }

    pub fn trigger_source(&mut self, timer: i64) -> crate::Result<TriggerSource> {
        let timer = TIMER.validate("timer", timer)?;
        let ret = TriggerSource::from_reply(&self.session.ask(format!("TRIG:TIM{}:STAR:STIM?", timer))?)?;
        self.cache.set(&format!("trigger{}_source", timer), ret);
        Ok(ret)
    }

    pub fn set_trigger_source(&mut self, timer: i64, source: TriggerSource) -> crate::Result<()> {
        let timer = TIMER.validate("timer", timer)?;
        self.session
            .write(format!("TRIG:TIM{}:STAR:STIM {}", timer, source.command()))?;
        self.cache.set(&format!("trigger{}_source", timer), source);
        Ok(())
    }

    /// Interval between scans, in s. 0 is the power-on value.
    pub fn trigger_timer(&mut self) -> crate::Result<f64> {
        let ret = self.session.ask_number("ROUT:SCAN:INT?")?;
        self.cache.set("trigger_timer", ret);
        Ok(ret)
    }

    pub fn set_trigger_timer(&mut self, interval: f64) -> crate::Result<()> {
        let interval = INTERVAL.validate("trigger_timer", interval)?;
        self.session
            .write(format!("ROUT:SCAN:INT {}", format_float(interval)))?;
        self.cache.set("trigger_timer", interval);
        Ok(())
    }

    /// Take a reading.
    pub fn amplitude(&mut self) -> crate::Result<f64> {
        self.session.ask_number("READ?")
    }

    fn assert_dc_voltage(&mut self) -> crate::Result<()> {
        let mode = self.mode()?;
        if mode != Mode::DcVoltage {
            return Err(Error::mode_mismatch(Mode::DcVoltage, mode));
        }
        Ok(())
    }

    /// Only available in dc voltage mode.
    pub fn input_impedance(&mut self) -> crate::Result<InputImpedance> {
        self.assert_dc_voltage()?;
        let ret = InputImpedance::from_reply(&self.session.ask(":VOLT:DC:INPutimpedance?")?)?;
        self.cache.set("input_impedance", ret);
        Ok(ret)
    }

    pub fn set_input_impedance(&mut self, impedance: InputImpedance) -> crate::Result<()> {
        self.assert_dc_voltage()?;
        self.session
            .write(format!(":VOLT:DC:INPutimpedance {}", impedance.command()))?;
        self.cache.set("input_impedance", impedance);
        Ok(())
    }

    pub fn reset(&mut self) -> crate::Result<()> {
        self.session.write("*RST")?;
        self.cache.clear();
        Ok(())
    }

    pub fn trigger(&mut self) -> crate::Result<()> {
        self.session.write("INIT")
    }

    /// Measure continuously until triggered to stop.
    pub fn continuous_measure(&mut self) -> crate::Result<()> {
        self.session.write(":TRIG:LOAD \"DurationLoop\", 10, 0.01")?;
        self.session.write("INIT")?;
        self.session.write("*WAI")
    }

    /// Input impedance is only reported in dc voltage mode.
    pub fn snapshot(&mut self, update: bool) -> crate::Result<Snapshot> {
        if update {
            let mode = self.mode()?;
            self.nplc()?;
            self.range()?;
            self.auto_range()?;
            self.averaging_type()?;
            self.averaging_count()?;
            self.averaging_enabled()?;
            self.digits()?;
            self.display_backlight()?;
            self.trigger_count()?;
            for timer in TIMER.min..=TIMER.max {
                self.trigger_delay(timer)?;
                self.trigger_source(timer)?;
            }
            self.trigger_timer()?;
            if mode == Mode::DcVoltage {
                self.input_impedance()?;
            } else {
                self.cache.invalidate("input_impedance");
            }
        }
        Ok(Snapshot::new(&self.name, &self.cache).with_idn(self.idn.clone()))
    }

    pub fn close(self) {
        log::info!("{}: closing {}", self.name, self.session.resource());
    }
}
