#![allow(dead_code)]

use labdrivers::transport::{Loopback, LoopbackLog};
use labdrivers::InstrumentOptions;

pub fn options() -> InstrumentOptions {
    InstrumentOptions::without_boot_delay()
}

/// Register file device plus the record of what was written to it.
pub fn simulated(initial: &[(&str, &str)]) -> (Box<Loopback>, LoopbackLog) {
    let lb = Loopback::registers(initial);
    let log = lb.log();
    (Box::new(lb), log)
}

pub fn dcdac_registers() -> Vec<(String, String)> {
    let mut ret = vec![("*IDN".to_string(), "BARRERA,DCDAC (Simulated),1337,0.0.01".to_string())];
    for ch in 1..=8 {
        ret.push((format!("channel{}:VOLTAGE", ch), "0".to_string()));
    }
    ret
}

pub fn acdac_registers() -> Vec<(String, String)> {
    let mut ret = vec![
        ("*IDN".to_string(), "BARRERA,ACDAC (Simulated),1,0.1".to_string()),
        ("FREQ".to_string(), "1000".to_string()),
        ("SYS:ERR".to_string(), "0,\"No error\"".to_string()),
    ];
    for ch in 1..=4 {
        ret.push((format!("CHAN{}:VOLTAGE", ch), "0".to_string()));
        ret.push((format!("CHAN{}:PHASE", ch), "0".to_string()));
    }
    ret
}

pub fn gs820_registers(model: &str) -> Vec<(String, String)> {
    let mut ret = vec![
        ("*IDN".to_string(), format!("YOKOGAWA,{},91T000001,1.02", model)),
        (":SOUR:PROT:VOLT".to_string(), "30".to_string()),
        (":SOUR:PROT:CURR".to_string(), "0.2".to_string()),
        (":SENS:REM".to_string(), "0".to_string()),
        (":SYSTem:ERRor".to_string(), "0,\"No error\"".to_string()),
    ];
    for ch in 1..=2 {
        let ch = format!("channel{}", ch);
        for (key, value) in [
            ("SOUR:FUNC", "VOLT"),
            ("OUTPUT:STATE", "0"),
            ("SOUR:RANGE:AUTO", "0"),
            ("SOUR:VOLT:RANGE", "2.0"),
            ("SOUR:VOLT:LEV", "0.0"),
            ("SOUR:CURR:RANGE", "0.2"),
            ("SOUR:CURR:LEV", "0.0"),
        ] {
            ret.push((format!("{}:{}", ch, key), value.to_string()));
        }
    }
    ret
}

pub fn dmm_registers() -> Vec<(String, String)> {
    let mut ret: Vec<(String, String)> = [
        ("*LANG", "SCPI"),
        ("*IDN", "KEITHLEY INSTRUMENTS,MODEL DMM6500,04456789,1.7.0b"),
        ("SENS:FUNC", "\"VOLT:DC\""),
        ("DISP:VOLT:DC:DIG", "6"),
        ("DISP:LIGH:STAT", "ON50"),
        ("ROUT:SCAN:COUN:SCAN", "1"),
        ("ROUT:SCAN:INT", "0"),
        (":VOLT:DC:INPutimpedance", "AUTO"),
        ("READ", "-1.234567E-03"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for mode in ["VOLT:DC", "CURR:AC"] {
        for (key, value) in [
            ("NPLC", "1"),
            ("RANG", "10"),
            ("RANG:AUTO", "1"),
            ("AVER:TCON", "REP"),
            ("AVER:COUN", "10"),
            ("AVER:STAT", "0"),
        ] {
            ret.push((format!("{}:{}", mode, key), value.to_string()));
        }
    }
    for timer in 1..=4 {
        ret.push((format!("TRIG:TIM{}:DEL", timer), "0".to_string()));
        ret.push((format!("TRIG:TIM{}:STAR:STIM", timer), "NONE".to_string()));
    }
    ret
}

pub fn as_refs(registers: &[(String, String)]) -> Vec<(&str, &str)> {
    registers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "{} is not close to {}",
        actual,
        expected
    );
}
