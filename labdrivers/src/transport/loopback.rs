//! In-process stand-in for an instrument.
//!
//! A [`Loopback`] hands every written line to a responder closure. Whatever the
//! responder returns is queued as the reply for the next read. This is enough
//! to simulate the instruments in this crate, which answer queries (lines
//! ending in `?`) and stay silent otherwise.
//!
//! [`Loopback::registers`] builds the common case: a device that stores every
//! `KEY value` command and answers `KEY?` with the stored value.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::Transport;
use crate::Error;

type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

/// Shared record of the lines written to a [`Loopback`].
#[derive(Clone, Default)]
pub struct LoopbackLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LoopbackLog {
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Lines written so far that are not queries.
    pub fn writes(&self) -> Vec<String> {
        self.lines().into_iter().filter(|x| !x.ends_with('?')).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }

    fn push(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

pub struct Loopback {
    responder: Responder,
    pending: VecDeque<String>,
    log: LoopbackLog,
    timeout: Duration,
}

impl Loopback {
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&str) -> Option<String> + Send + 'static,
    {
        Self {
            responder: Box::new(responder),
            pending: VecDeque::new(),
            log: LoopbackLog::default(),
            timeout: super::DEFAULT_TIMEOUT,
        }
    }

    /// A device that never answers.
    pub fn silent() -> Self {
        Self::new(|_| None)
    }

    /// A register file device. `initial` holds the power-on values, which are
    /// restored on `*RST`. Commands may be chained with `;`, unknown queries
    /// are not answered.
    pub fn registers(initial: &[(&str, &str)]) -> Self {
        let initial: HashMap<String, String> = initial
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut state = initial.clone();
        Self::new(move |line| {
            let mut replies = Vec::new();
            for cmd in line.split(';').map(str::trim).filter(|x| !x.is_empty()) {
                if cmd == "*RST" {
                    state = initial.clone();
                } else if let Some(key) = cmd.strip_suffix('?') {
                    if let Some(value) = state.get(key) {
                        replies.push(value.clone());
                    }
                } else if let Some((key, value)) = cmd.split_once(' ') {
                    state.insert(key.to_string(), value.trim().to_string());
                }
            }
            if replies.is_empty() {
                None
            } else {
                Some(replies.join(";"))
            }
        })
    }

    pub fn log(&self) -> LoopbackLog {
        self.log.clone()
    }
}

impl Transport for Loopback {
    fn write_line(&mut self, line: &str) -> crate::Result<()> {
        self.log.push(line);
        if let Some(reply) = (self.responder)(line) {
            self.pending.push_back(reply);
        }
        Ok(())
    }

    fn read_line(&mut self) -> crate::Result<String> {
        self.pending.pop_front().ok_or_else(Error::protocol_timeout)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> crate::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn resource(&self) -> String {
        "loopback".to_string()
    }
}
