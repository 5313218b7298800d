use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::anyhow;

use super::stream::{LineStream, TimeoutStream};
use super::Transport;
use crate::config::InstrumentOptions;
use crate::Error;

impl TimeoutStream for TcpStream {
    fn apply_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }
}

/// Raw socket transport (`TCPIP::host::port::SOCKET`).
pub struct TcpTransport {
    inner: LineStream<TcpStream>,
    host: String,
    port: u16,
}

impl TcpTransport {
    pub fn connect(host: &str, port: u16, options: &InstrumentOptions) -> crate::Result<Self> {
        let timeout = options.timeout()?;
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::transport(anyhow!("Cannot resolve {}:{}", host, port)))?;
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            inner: LineStream::new(stream, &options.terminator, timeout)?,
            host: host.to_string(),
            port,
        })
    }
}

impl Transport for TcpTransport {
    fn write_line(&mut self, line: &str) -> crate::Result<()> {
        self.inner.write_line(line)
    }

    fn read_line(&mut self) -> crate::Result<String> {
        self.inner.read_line()
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) -> crate::Result<()> {
        self.inner.set_timeout(timeout)
    }

    fn resource(&self) -> String {
        format!("tcp::{}:{}", self.host, self.port)
    }
}
