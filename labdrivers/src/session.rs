use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use labdrivers_protocol::scpi::parse_number;
use labdrivers_protocol::{Idn, ScpiRequest, ScpiResponse};

use crate::transport::Transport;
use crate::Error;

/// Handle to an open transport.
///
/// An instrument and all of its channels hold clones of the same session, so
/// each of them can issue commands on its own. Every request is a single
/// write or a write followed by one read.
#[derive(Clone)]
pub struct Session {
    transport: Arc<Mutex<Box<dyn Transport>>>,
    resource: Arc<str>,
}

impl Session {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        let resource = transport.resource();
        Self {
            transport: Arc::new(Mutex::new(transport)),
            resource: resource.into(),
        }
    }

    fn lock(&self) -> crate::Result<MutexGuard<'_, Box<dyn Transport>>> {
        self.transport
            .lock()
            .map_err(|_| Error::internal(anyhow!("Transport of {} is poisoned", self.resource)))
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn request(&self, req: ScpiRequest) -> crate::Result<ScpiResponse> {
        let mut transport = self.lock()?;
        match req {
            ScpiRequest::Write(cmd) => {
                log::debug!("[{}] write: {}", self.resource, cmd);
                transport.write_line(&cmd)?;
                Ok(ScpiResponse::Done)
            }
            ScpiRequest::QueryString(cmd) => {
                log::debug!("[{}] query: {}", self.resource, cmd);
                let reply = transport.query(&cmd)?;
                log::debug!("[{}] reply: {}", self.resource, reply);
                Ok(ScpiResponse::String(reply))
            }
        }
    }

    pub fn write<T: AsRef<str>>(&self, cmd: T) -> crate::Result<()> {
        self.request(ScpiRequest::Write(cmd.as_ref().to_string()))
            .map(|_| ())
    }

    pub fn ask<T: AsRef<str>>(&self, cmd: T) -> crate::Result<String> {
        match self.request(ScpiRequest::QueryString(cmd.as_ref().to_string()))? {
            ScpiResponse::String(reply) => Ok(reply),
            ScpiResponse::Done => Err(Error::unexpected_response("")),
        }
    }

    pub fn ask_number<T: AsRef<str>>(&self, cmd: T) -> crate::Result<f64> {
        parse_number(&self.ask(cmd)?)
    }

    pub fn ask_parse<R: FromStr, T: AsRef<str>>(&self, cmd: T) -> crate::Result<R> {
        let reply = self.ask(cmd)?;
        reply.trim().parse().map_err(|_| Error::unexpected_response(reply))
    }

    pub fn idn(&self) -> crate::Result<Idn> {
        Idn::parse(&self.ask("*IDN?")?)
    }

    /// Logs who we are connected to and how long connecting took. A device
    /// that does not answer `*IDN?` is not an error here.
    pub fn connect_message(&self, name: &str, begin: Instant) -> Option<Idn> {
        match self.idn() {
            Ok(idn) => {
                log::info!(
                    "{}: connected to {} {} (serial:{}, firmware:{}) in {:.2}s",
                    name,
                    idn.vendor,
                    idn.model,
                    idn.serial,
                    idn.firmware,
                    begin.elapsed().as_secs_f64()
                );
                Some(idn)
            }
            Err(err) => {
                log::warn!("{}: cannot identify instrument at {}: {}", name, self.resource, err);
                None
            }
        }
    }

    pub fn set_timeout(&self, timeout: Duration) -> crate::Result<()> {
        self.lock()?.set_timeout(timeout)
    }

    pub fn timeout(&self) -> crate::Result<Duration> {
        Ok(self.lock()?.timeout())
    }
}
