mod common;

use common::{as_refs, assert_close, dmm_registers, options, simulated};
use labdrivers::instruments::dmm6500::{AveragingType, Backlight, InputImpedance, TriggerCount, TriggerSource};
use labdrivers::instruments::{Dmm6500, Mode};
use labdrivers::transport::LoopbackLog;
use labdrivers::Error;

fn dmm(reset: bool) -> (Dmm6500, LoopbackLog) {
    let registers = dmm_registers();
    let (transport, log) = simulated(&as_refs(&registers));
    let dmm = Dmm6500::with_transport("dmm", transport, &options(), reset).unwrap();
    (dmm, log)
}

#[test]
fn connect_sequence() {
    let (dmm, log) = dmm(false);
    assert_eq!(log.lines(), vec!["*LANG?", "FORM:DATA ASCII", "*IDN?"]);
    assert_eq!(dmm.idn().unwrap().model, "MODEL DMM6500");

    let (_, log) = self::dmm(true);
    assert_eq!(log.lines(), vec!["*LANG?", "*RST", "FORM:DATA ASCII", "*IDN?"]);
}

#[test]
fn requires_scpi_command_set() {
    let mut registers = dmm_registers();
    registers[0].1 = "TSP".to_string();
    let (transport, log) = simulated(&as_refs(&registers));
    let err = Dmm6500::with_transport("dmm", transport, &options(), false).err().unwrap();
    assert!(matches!(err, Error::CommandSet(ref x) if x == "TSP"));
    assert_eq!(
        err.to_string(),
        "This driver is only compatible with the 'SCPI' command set, not 'TSP' set"
    );
    assert_eq!(log.lines(), vec!["*LANG?"]);
}

#[test]
fn mode_parameters_follow_mode() {
    let (mut dmm, log) = dmm(false);
    assert_eq!(dmm.mode().unwrap(), Mode::DcVoltage);
    assert_close(dmm.nplc().unwrap(), 1.0);
    dmm.set_nplc(0.5).unwrap();
    dmm.set_mode(Mode::AcCurrent).unwrap();
    assert_eq!(dmm.mode().unwrap(), Mode::AcCurrent);
    dmm.set_nplc(2.0).unwrap();
    dmm.set_auto_range(false).unwrap();
    dmm.set_range(3.0).unwrap();
    dmm.set_averaging_type(AveragingType::Moving).unwrap();
    dmm.set_averaging_count(100).unwrap();
    dmm.set_averaging_enabled(true).unwrap();
    assert_eq!(
        log.writes(),
        vec![
            "FORM:DATA ASCII",
            "VOLT:DC:NPLC 0.5",
            "SENS:FUNC 'CURR:AC'",
            "CURR:AC:NPLC 2.0",
            "CURR:AC:RANG:AUTO 0",
            "CURR:AC:RANG 3.0",
            "CURR:AC:AVER:TCON moving",
            "CURR:AC:AVER:COUN 100",
            "CURR:AC:AVER:STAT 1",
        ]
    );
    assert_close(dmm.nplc().unwrap(), 2.0);
    assert_close(dmm.range().unwrap(), 3.0);
    assert!(!dmm.auto_range().unwrap());
    assert_eq!(dmm.averaging_type().unwrap(), AveragingType::Moving);
    assert_eq!(dmm.averaging_count().unwrap(), 100);
    assert!(dmm.averaging_enabled().unwrap());
}

#[test]
fn validation_happens_before_io() {
    let (mut dmm, log) = dmm(false);
    log.clear();
    assert!(dmm.set_nplc(0.001).is_err());
    assert!(dmm.set_nplc(10.5).is_err());
    assert!(dmm.set_averaging_count(0).is_err());
    assert!(dmm.set_averaging_count(101).is_err());
    assert!(dmm.set_digits(8).is_err());
    assert!(dmm.set_digits(3).is_err());
    assert!(dmm.set_range(f64::NAN).is_err());
    assert!(dmm.set_trigger_count(TriggerCount::Count(0)).is_err());
    assert!(dmm.set_trigger_delay(5, 1.0).is_err());
    assert!(dmm.set_trigger_delay(1, -1.0).is_err());
    assert!(dmm.set_trigger_timer(1e6).is_err());
    assert!(log.lines().is_empty());
}

#[test]
fn display_and_triggers() {
    let (mut dmm, log) = dmm(false);
    log.clear();
    dmm.set_digits(5).unwrap();
    assert_eq!(dmm.digits().unwrap(), 5);
    dmm.set_display_backlight(Backlight::Blackout).unwrap();
    dmm.set_trigger_count(TriggerCount::Inf).unwrap();
    assert_eq!(dmm.trigger_count().unwrap(), TriggerCount::Inf);
    dmm.set_trigger_count(TriggerCount::Count(25)).unwrap();
    assert_eq!(dmm.trigger_count().unwrap(), TriggerCount::Count(25));
    dmm.set_trigger_delay(2, 0.25).unwrap();
    assert_close(dmm.trigger_delay(2).unwrap(), 0.25);
    dmm.set_trigger_source(4, TriggerSource::External).unwrap();
    assert_eq!(dmm.trigger_source(4).unwrap(), TriggerSource::External);
    assert_eq!(dmm.trigger_source(1).unwrap(), TriggerSource::Immediate);
    dmm.set_trigger_timer(1.5).unwrap();
    assert_close(dmm.trigger_timer().unwrap(), 1.5);
    assert_eq!(
        log.writes(),
        vec![
            "DISP:VOLT:DC:DIG 5",
            "DISP:LIGH:STAT BLACkout",
            "ROUT:SCAN:COUN:SCAN inf",
            "ROUT:SCAN:COUN:SCAN 25",
            "TRIG:TIM2:DEL 0.25",
            "TRIG:TIM4:STAR:STIM EXT",
            "ROUT:SCAN:INT 1.5",
        ]
    );
    assert_eq!(dmm.display_backlight().unwrap(), Backlight::Blackout);
}

#[test]
fn input_impedance_only_in_dc_voltage() {
    let (mut dmm, log) = dmm(false);
    assert_eq!(dmm.input_impedance().unwrap(), InputImpedance::Auto);
    dmm.set_input_impedance(InputImpedance::TenMegaohm).unwrap();
    assert_eq!(dmm.input_impedance().unwrap(), InputImpedance::TenMegaohm);

    dmm.set_mode(Mode::Resistance2W).unwrap();
    log.clear();
    let err = dmm.set_input_impedance(InputImpedance::Auto).unwrap_err();
    assert!(matches!(err, Error::ModeMismatch { .. }));
    assert_eq!(
        err.to_string(),
        "Cannot get/set dc voltage settings while in 2w resistance mode"
    );
    assert!(dmm.input_impedance().is_err());
    assert!(log.writes().is_empty());
}

#[test]
fn measurement_commands() {
    let (mut dmm, log) = dmm(false);
    log.clear();
    assert_close(dmm.amplitude().unwrap(), -1.234567e-3);
    dmm.trigger().unwrap();
    dmm.continuous_measure().unwrap();
    dmm.reset().unwrap();
    assert_eq!(
        log.writes(),
        vec![
            "INIT",
            ":TRIG:LOAD \"DurationLoop\", 10, 0.01",
            "INIT",
            "*WAI",
            "*RST"
        ]
    );
}

#[test]
fn snapshot_depends_on_mode() {
    let (mut dmm, _) = dmm(false);
    let snapshot = dmm.snapshot(true).unwrap();
    assert_eq!(snapshot.parameter("mode"), Some(&serde_json::Value::from("dc voltage")));
    assert_eq!(snapshot.parameter("input_impedance"), Some(&serde_json::Value::from("auto")));
    assert_eq!(snapshot.parameter("averaging_type"), Some(&serde_json::Value::from("repeat")));
    assert!(snapshot.parameter("trigger4_source").is_some());

    dmm.set_mode(Mode::AcCurrent).unwrap();
    let snapshot = dmm.snapshot(true).unwrap();
    assert!(snapshot.parameter("input_impedance").is_none());
}

#[test]
fn trigger_count_has_one_snapshot_type() {
    let mut registers = dmm_registers();
    for (k, v) in registers.iter_mut() {
        if k.as_str() == "ROUT:SCAN:COUN:SCAN" {
            *v = "9.9E37".to_string();
        }
    }
    let (transport, _) = simulated(&as_refs(&registers));
    let mut dmm = Dmm6500::with_transport("dmm", transport, &options(), false).unwrap();
    let queried = dmm.snapshot(true).unwrap();
    dmm.set_trigger_count(TriggerCount::Inf).unwrap();
    let written = dmm.snapshot(false).unwrap();
    assert_eq!(queried.parameter("trigger_count"), Some(&serde_json::Value::from("inf")));
    assert_eq!(queried.parameter("trigger_count"), written.parameter("trigger_count"));

    dmm.set_trigger_count(TriggerCount::Count(3)).unwrap();
    let written = dmm.snapshot(false).unwrap();
    let queried = dmm.snapshot(true).unwrap();
    assert_eq!(written.parameter("trigger_count"), queried.parameter("trigger_count"));
}
