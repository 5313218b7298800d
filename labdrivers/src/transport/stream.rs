use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use anyhow::anyhow;

use super::decode_line;
use crate::Error;

const READ_CHUNK: usize = 256;

/// A byte stream whose read timeout can be adjusted.
pub(crate) trait TimeoutStream: Read + Write + Send {
    fn apply_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

/// Line framing on top of a byte stream, shared by the serial and TCP transports.
pub(crate) struct LineStream<S: TimeoutStream> {
    stream: S,
    terminator: String,
    timeout: Duration,
    rx: Vec<u8>,
}

impl<S: TimeoutStream> LineStream<S> {
    pub(crate) fn new(mut stream: S, terminator: &str, timeout: Duration) -> crate::Result<Self> {
        stream.apply_timeout(timeout)?;
        Ok(Self {
            stream,
            terminator: terminator.to_string(),
            timeout,
            rx: Vec::new(),
        })
    }

    pub(crate) fn write_line(&mut self, line: &str) -> crate::Result<()> {
        let mut data = Vec::with_capacity(line.len() + self.terminator.len());
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.terminator.as_bytes());
        self.stream.write_all(&data)?;
        self.stream.flush()?;
        Ok(())
    }

    pub(crate) fn read_line(&mut self) -> crate::Result<String> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }
            if Instant::now() > deadline {
                return Err(Error::protocol_timeout());
            }
            let mut chunk = [0_u8; READ_CHUNK];
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(Error::transport(anyhow!("Connection closed by instrument")));
                }
                Ok(n) => self.rx.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let term = self.terminator.as_bytes();
        let pos = self.rx.windows(term.len()).position(|w| w == term)?;
        let rest = self.rx.split_off(pos + term.len());
        let line = std::mem::replace(&mut self.rx, rest);
        Some(decode_line(&line, &self.terminator))
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) -> crate::Result<()> {
        self.stream.apply_timeout(timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    pub(crate) fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}
