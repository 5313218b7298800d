//! Interactive serial console, in the spirit of the Arduino serial monitor.
//!
//! Incoming lines are printed by a background thread while the calling thread
//! forwards every line typed on stdin to the device.

use std::fmt::{self, Display};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::str::FromStr;
use std::thread::{self, sleep};
use std::time::Duration;

use anyhow::anyhow;
use serialport::SerialPort;

use crate::transport::serial::SerialParams;
use crate::Error;

/// Read timeout used when none is given. Only bounds how long the reader
/// thread blocks before polling again.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after each sent line so the device can answer before the next
/// prompt.
const WRITE_PAUSE: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEnding {
    None,
    Lf,
    Cr,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::None => "",
            LineEnding::Lf => "\n",
            LineEnding::Cr => "\r",
            LineEnding::CrLf => "\r\n",
        }
    }

    pub fn append(&self, line: &str) -> String {
        format!("{}{}", line, self.as_str())
    }
}

impl Default for LineEnding {
    fn default() -> Self {
        LineEnding::Lf
    }
}

impl Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let x = match self {
            LineEnding::None => "none",
            LineEnding::Lf => "LF",
            LineEnding::Cr => "CR",
            LineEnding::CrLf => "CRLF",
        };
        f.write_str(x)
    }
}

impl FromStr for LineEnding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(LineEnding::None),
            "LF" => Ok(LineEnding::Lf),
            "CR" => Ok(LineEnding::Cr),
            "CRLF" => Ok(LineEnding::CrLf),
            _ => Err(Error::argument(anyhow!(
                "Invalid line ending `{}`, expected one of none, LF, CR, CRLF",
                s
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MonitorOptions {
    pub port: String,
    pub params: SerialParams,
    pub line_ending: LineEnding,
    pub timeout: Option<Duration>,
    /// Time given to the device to boot after the port was opened.
    pub boot_delay: Duration,
}

impl MonitorOptions {
    pub fn new(port: &str, baud: u32) -> Self {
        Self {
            port: port.to_string(),
            params: SerialParams::with_baud(baud),
            line_ending: LineEnding::default(),
            timeout: None,
            boot_delay: crate::instruments::DAC_BOOT_DELAY,
        }
    }
}

/// Copy lines from `device` to `out` until the device goes away. Read
/// timeouts are not errors, the device may just be quiet.
pub fn forward_device<R: Read, W: Write>(device: R, mut out: W) -> io::Result<()> {
    let mut reader = BufReader::new(device);
    let mut buf = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                if !buf.is_empty() {
                    writeln!(out, "{}", String::from_utf8_lossy(&buf).trim())?;
                }
                return Ok(());
            }
            Ok(_) => {
                if buf.ends_with(b"\n") {
                    writeln!(out, "{}", String::from_utf8_lossy(&buf).trim())?;
                    out.flush()?;
                    buf.clear();
                }
            }
            Err(x) if x.kind() == io::ErrorKind::TimedOut || x.kind() == io::ErrorKind::WouldBlock => {}
            Err(x) if x.kind() == io::ErrorKind::Interrupted => {}
            Err(x) => return Err(x),
        }
    }
}

/// Send every line of `input` to `device` with `ending` appended.
pub fn forward_input<R: BufRead, W: Write, P: Write>(
    input: R,
    mut device: W,
    mut prompt: P,
    ending: LineEnding,
    pause: Duration,
) -> io::Result<()> {
    write!(prompt, "> ")?;
    prompt.flush()?;
    for line in input.lines() {
        let line = line?;
        device.write_all(ending.append(&line).as_bytes())?;
        device.flush()?;
        log::debug!("sent: {:?}", line);
        sleep(pause);
        write!(prompt, "> ")?;
        prompt.flush()?;
    }
    Ok(())
}

fn open_port(options: &MonitorOptions) -> crate::Result<Box<dyn SerialPort>> {
    serialport::new(&options.port, options.params.baud)
        .parity(options.params.parity.into())
        .stop_bits(options.params.stop_bits.into())
        .data_bits(options.params.data_bits.into())
        .timeout(options.timeout.unwrap_or(POLL_TIMEOUT))
        .open()
        .map_err(crate::transport::serial::map_serial_error)
}

/// Run the console on stdin/stdout until stdin is closed.
pub fn run(options: &MonitorOptions) -> crate::Result<()> {
    let port = open_port(options)?;
    println!("Connected to {} at {} baud.", options.port, options.params.baud);
    sleep(options.boot_delay);

    let reader = port.try_clone().map_err(crate::transport::serial::map_serial_error)?;
    let port_name = options.port.clone();
    thread::spawn(move || {
        if let Err(x) = forward_device(reader, io::stdout()) {
            log::error!("Reading from {} failed: {}", port_name, x);
        }
    });

    let stdin = io::stdin();
    forward_input(stdin.lock(), port, io::stdout(), options.line_ending, WRITE_PAUSE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn line_endings() {
        assert_eq!("CRLF".parse::<LineEnding>().unwrap(), LineEnding::CrLf);
        assert_eq!("none".parse::<LineEnding>().unwrap().append("x"), "x");
        assert_eq!(LineEnding::Cr.append("*IDN?"), "*IDN?\r");
        assert_eq!(LineEnding::default(), LineEnding::Lf);
        assert!("lf".parse::<LineEnding>().is_err());
        assert_eq!(LineEnding::CrLf.to_string(), "CRLF");
    }

    #[test]
    fn forwards_input_lines() {
        let input = Cursor::new("*IDN?\nchannel1:VOLTAGE 1.0\n");
        let mut device = Vec::new();
        let mut prompt = Vec::new();
        forward_input(input, &mut device, &mut prompt, LineEnding::CrLf, Duration::from_millis(0)).unwrap();
        assert_eq!(device, b"*IDN?\r\nchannel1:VOLTAGE 1.0\r\n");
        assert_eq!(prompt, b"> > > ");
    }

    #[test]
    fn forwards_device_lines() {
        let device = Cursor::new("BARRERA,DCDAC,1,0\r\n0.5\npartial");
        let mut out = Vec::new();
        forward_device(device, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "BARRERA,DCDAC,1,0\n0.5\npartial\n");
    }
}
