mod common;

use std::time::Duration;

use common::{acdac_registers, as_refs, assert_close, options, simulated};
use labdrivers::instruments::{Acdac9106, DisplayMode};
use labdrivers::parameter::NumericParameter;
use labdrivers::ramp::{paramp, ramp_to, RampMode, RampOptions};
use labdrivers::transport::LoopbackLog;
use labdrivers::Error;

fn acdac() -> (Acdac9106, LoopbackLog) {
    let registers = acdac_registers();
    let (transport, log) = simulated(&as_refs(&registers));
    let dac = Acdac9106::with_transport("acdac_sim", transport, &options()).unwrap();
    (dac, log)
}

#[test]
fn init_switches_to_remote_display() {
    let (dac, log) = acdac();
    let idn = dac.idn().unwrap();
    assert_eq!(idn.vendor, "BARRERA");
    assert_eq!(idn.model, "ACDAC (Simulated)");
    assert_eq!(log.lines(), vec!["*IDN?", "SYS:DISP:MODE 5"]);
    assert_eq!(dac.display_mode(), Some(DisplayMode::Remote));
}

#[test]
fn voltage_and_phase() {
    let (mut dac, log) = acdac();
    log.clear();
    let ch3 = dac.channel_by_name("ch3").unwrap();
    assert_eq!(ch3.wire_name(), "CHAN3");
    ch3.set_voltage(400.0).unwrap();
    ch3.set_phase(-24.5).unwrap();
    assert_close(ch3.voltage().unwrap(), 400.0);
    assert_close(ch3.phase().unwrap(), -24.5);
    assert_eq!(
        log.writes(),
        vec!["CHAN3:VOLTAGE 400.0;PAT:UPDATE", "CHAN3:PHASE -24.5;PAT:UPDATE"]
    );
}

#[test]
fn out_of_range_values_are_not_sent() {
    let (mut dac, log) = acdac();
    log.clear();
    let ch1 = dac.channel(1).unwrap();
    assert!(matches!(ch1.set_voltage(450.1), Err(Error::OutOfRange { .. })));
    assert!(matches!(ch1.set_voltage(-0.1), Err(Error::OutOfRange { .. })));
    assert!(matches!(ch1.set_phase(180.5), Err(Error::OutOfRange { .. })));
    assert!(matches!(dac.set_frequency(1e6 + 1.0), Err(Error::OutOfRange { .. })));
    assert!(matches!(dac.set_frequency(-1.0), Err(Error::OutOfRange { .. })));
    assert!(log.lines().is_empty());
}

#[test]
fn frequency_and_display() {
    let (mut dac, log) = acdac();
    log.clear();
    dac.set_frequency(24e3).unwrap();
    assert_close(dac.frequency().unwrap(), 24e3);
    dac.set_display_mode("FOCUS4".parse().unwrap()).unwrap();
    assert_eq!(dac.display_mode(), Some(DisplayMode::Focus4));
    assert_eq!(dac.error().unwrap(), "0,\"No error\"");
    assert_eq!(
        log.lines(),
        vec!["FREQ 24000.0;PAT:UPDATE", "FREQ?", "SYS:DISP:MODE 4", "SYS:ERR?"]
    );
}

#[test]
fn reset_returns_to_zero_and_remote() {
    let (mut dac, log) = acdac();
    dac.set_display_mode(DisplayMode::Normal).unwrap();
    for ch in 1..=4 {
        let channel = dac.channel(ch).unwrap();
        channel.set_voltage(100.0 * ch as f64).unwrap();
        channel.set_phase(45.0).unwrap();
    }
    log.clear();
    dac.reset().unwrap();
    assert_eq!(log.writes(), vec!["*RST", "SYS:DISP:MODE 5"]);
    assert_eq!(dac.display_mode(), Some(DisplayMode::Remote));
    for channel in dac.channels().iter_mut() {
        assert_close(channel.voltage().unwrap(), 0.0);
        assert_close(channel.phase().unwrap(), 0.0);
    }
}

#[test]
fn only_four_channels() {
    let (mut dac, _) = acdac();
    assert!(matches!(dac.channel_by_name("ch5"), Err(Error::InvalidChannel(_))));
    assert!(matches!(dac.channel(5), Err(Error::InvalidChannel(_))));
    assert!(matches!(dac.channel_by_name("CHAN1"), Err(Error::InvalidChannel(_))));
}

#[test]
fn snapshot() {
    let (mut dac, _) = acdac();
    dac.channel(4).unwrap().set_phase(90.0).unwrap();
    let snapshot = dac.snapshot(false).unwrap();
    assert_eq!(snapshot.parameter("display_mode"), Some(&serde_json::Value::from("REMOTE")));
    assert!(snapshot.parameter("frequency").is_none());
    assert_eq!(
        snapshot.submodules["ch4"].parameter("phase"),
        Some(&serde_json::Value::from(90.0))
    );
    let snapshot = dac.snapshot(true).unwrap();
    assert_eq!(snapshot.parameter("frequency"), Some(&serde_json::Value::from(1000.0)));
}

#[test]
fn ramps_voltage_and_phase() {
    let (mut dac, log) = acdac();
    log.clear();
    let options = RampOptions {
        steps: 3,
        delay: Duration::from_millis(0),
        mode: RampMode::Sequential,
    };
    {
        let [_, _, ch3, ch4] = dac.channels();
        let mut v3 = ch3.voltage_param();
        let mut p4 = ch4.phase_param();
        assert_eq!(p4.name(), "ch4_phase");
        let mut params: [&mut dyn NumericParameter; 2] = [&mut v3, &mut p4];
        paramp(&mut params, Some(&[400.0, 90.0]), &options).unwrap();
    }
    ramp_to(&mut dac.frequency_param(), 3000.0, &options).unwrap();
    assert_eq!(
        log.writes(),
        vec![
            "CHAN3:VOLTAGE 0.0;PAT:UPDATE",
            "CHAN3:VOLTAGE 200.0;PAT:UPDATE",
            "CHAN3:VOLTAGE 400.0;PAT:UPDATE",
            "CHAN4:PHASE 0.0;PAT:UPDATE",
            "CHAN4:PHASE 45.0;PAT:UPDATE",
            "CHAN4:PHASE 90.0;PAT:UPDATE",
            "FREQ 1000.0;PAT:UPDATE",
            "FREQ 2000.0;PAT:UPDATE",
            "FREQ 3000.0;PAT:UPDATE",
        ]
    );
}
