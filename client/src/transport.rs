//! Blocking duplex transport: TCP or a Unix domain socket (spec.md §6
//! "Transport"). No TLS — upgrading the stream is out of scope.
//!
//! The teacher's `PacketChannel` wraps a single `TcpStream` handle and
//! reads/writes through it directly; this crate additionally supports a
//! local domain socket (spec.md §6) and buffers reads through a cloned
//! read half, since `PacketFramer` needs one `Read + Write` value and a
//! `TcpStream`/`UnixStream` can be split cheaply via `try_clone`.

use std::io::{self, BufReader, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::time::Duration;

use crate::error::Result;
use crate::options::ConnectionOptions;

/// One half-duplex pair: buffered reads, unbuffered (but `flush`ed on
/// every packet write by `PacketFramer`) writes.
#[derive(Debug)]
enum Inner {
    Tcp {
        reader: BufReader<TcpStream>,
        writer: TcpStream,
    },
    #[cfg(unix)]
    Unix {
        reader: BufReader<UnixStream>,
        writer: UnixStream,
    },
}

#[derive(Debug)]
pub struct Transport(Inner);

impl Transport {
    pub fn connect(options: &ConnectionOptions) -> Result<Self> {
        #[cfg(unix)]
        if let Some(path) = &options.socket_path {
            let stream = UnixStream::connect(path)?;
            let reader = BufReader::new(stream.try_clone()?);
            return Ok(Self(Inner::Unix { reader, writer: stream }));
        }

        let addr = (options.hostname.as_str(), options.port);
        let stream = match options.connect_timeout {
            Some(timeout) => connect_tcp_with_timeout(addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        if let Some(timeout) = options.read_timeout {
            stream.set_read_timeout(Some(timeout))?;
        }
        if let Some(timeout) = options.write_timeout {
            stream.set_write_timeout(Some(timeout))?;
        }
        stream.set_nodelay(true).ok();
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self(Inner::Tcp { reader, writer: stream }))
    }
}

fn connect_tcp_with_timeout(addr: (&str, u16), timeout: Duration) -> io::Result<TcpStream> {
    use std::net::ToSocketAddrs;
    let mut last_err = None;
    for sock_addr in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&sock_addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no addresses to connect to")))
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.0 {
            Inner::Tcp { reader, .. } => reader.read(buf),
            #[cfg(unix)]
            Inner::Unix { reader, .. } => reader.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.0 {
            Inner::Tcp { writer, .. } => writer.write(buf),
            #[cfg(unix)]
            Inner::Unix { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.0 {
            Inner::Tcp { writer, .. } => writer.flush(),
            #[cfg(unix)]
            Inner::Unix { writer, .. } => writer.flush(),
        }
    }
}
