// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::util::Target;
use picow_ota_host_core::UpdateError;
use std::io::{self, Error as IoError, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Serial reads always need a timeout, used when none is given on the command line
const SERIAL_DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) enum Connection {
    Tcp(TcpStream),
    Serial(Box<dyn serialport::SerialPort>),
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.read(buf),
            Connection::Serial(serial) => serial.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.write(buf),
            Connection::Serial(serial) => serial.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.flush(),
            Connection::Serial(serial) => serial.flush(),
        }
    }
}

/// Opens the single connection used for the whole upload.
///
/// With no timeout a TCP connection blocks for as long as the device stays silent.
pub(crate) fn connect(target: &Target, timeout: Option<Duration>, baud_rate: u32) -> Result<Connection, UpdateError> {
    let connection_error = |source: IoError| UpdateError::Connection {
        address: target.to_string(),
        source,
    };

    match target {
        Target::Tcp { host, port } => {
            let stream = match timeout {
                Some(timeout) => connect_with_timeout(host, *port, timeout),
                None => TcpStream::connect((host.as_str(), *port)),
            }
            .map_err(connection_error)?;
            stream.set_read_timeout(timeout).map_err(connection_error)?;
            stream.set_write_timeout(timeout).map_err(connection_error)?;
            log::info!("Connected to {}", target);
            Ok(Connection::Tcp(stream))
        }
        Target::Serial { port_name } => {
            let timeout = timeout.unwrap_or(SERIAL_DEFAULT_TIMEOUT);
            let serial = serialport::new(port_name, baud_rate)
                .timeout(timeout)
                .open()
                .map_err(|e| connection_error(IoError::new(ErrorKind::ConnectionRefused, e.to_string())))?;
            log::info!("Connected to {} at {} baud, timeout {:?}", port_name, baud_rate, timeout);
            Ok(Connection::Serial(serial))
        }
    }
}

fn connect_with_timeout(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = IoError::new(ErrorKind::NotFound, format!("{host} did not resolve to any address"));
    for address in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&address, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                log::debug!("Connecting to {} failed: {}", address, e);
                last_error = e;
            }
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use picow_ota_host_core::ErrorKind as UpdateErrorKind;
    use std::net::TcpListener;

    #[test]
    fn refused_connection_is_a_connection_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let target = Target::Tcp { host: "127.0.0.1".into(), port };

        let err = connect(&target, None, 115_200).err().unwrap();
        assert_eq!(err.kind(), UpdateErrorKind::Connection);
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }

    #[test]
    fn timeout_applies_to_tcp_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let target = Target::Tcp { host: "127.0.0.1".into(), port };

        let connection = connect(&target, Some(Duration::from_millis(250)), 115_200).unwrap();
        match connection {
            Connection::Tcp(stream) => {
                assert_eq!(stream.read_timeout().unwrap(), Some(Duration::from_millis(250)));
            }
            Connection::Serial(_) => panic!("expected a TCP connection"),
        }
    }

    #[test]
    fn missing_serial_port_is_a_connection_error() {
        let target = Target::Serial { port_name: "/dev/does-not-exist-ota".into() };
        let err = connect(&target, None, 115_200).err().unwrap();
        assert_eq!(err.kind(), UpdateErrorKind::Connection);
    }
}
